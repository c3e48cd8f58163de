//! The model represents the static input data provided by the user.
use crate::basin::{Basin, LinkKind, Node};
use crate::forecast::Forecast;
use crate::simulation::TreatyNodes;
use crate::year::Calendar;
use anyhow::{Context, Result, ensure};
use std::path::{Path, PathBuf};

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition
#[derive(Debug)]
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// Maps timesteps onto calendar months
    pub calendar: Calendar,
    /// The basin network in its initial state
    pub basin: Basin,
    /// The number of monthly timesteps to simulate
    pub num_timesteps: u32,
    /// The nodes the treaty applies to
    pub treaty_nodes: TreatyNodes,
}

impl Model {
    /// Create a new [`Model`], checking the nodes named by the regulator exist and are of the right
    /// kind
    pub fn new(
        model_path: &Path,
        parameters: ModelParameters,
        basin: Basin,
        num_timesteps: u32,
    ) -> Result<Self> {
        let calendar = parameters.calendar()?;
        let treaty_nodes =
            resolve_treaty_nodes(&parameters, &basin).context("Invalid regulator configuration")?;

        Ok(Self {
            model_path: model_path.to_path_buf(),
            parameters,
            calendar,
            basin,
            num_timesteps,
            treaty_nodes,
        })
    }

    /// Iterate over the calendar years the simulation covers
    pub fn iter_years(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.num_timesteps)
            .filter(|&timestep| Calendar::is_year_start(timestep))
            .map(|timestep| self.calendar.year(timestep))
    }

    /// Check every forecast has a value for every simulated timestep
    pub fn check_forecast_coverage(&self) -> Result<()> {
        for node in self.basin.iter_nodes() {
            for forecast in node_forecasts(node) {
                ensure!(
                    forecast.len() >= self.num_timesteps as usize,
                    "Forecast {} has {} values but the model runs for {} timesteps",
                    forecast.name(),
                    forecast.len(),
                    self.num_timesteps
                );
            }
        }

        Ok(())
    }
}

/// Find the nodes the regulator refers to.
///
/// The regulating reservoir is released after the rest of the basin has been routed, so it may
/// only drain into the treaty outlet. The coupled aquifer must discharge into it.
fn resolve_treaty_nodes(parameters: &ModelParameters, basin: &Basin) -> Result<TreatyNodes> {
    let config = &parameters.regulator;

    let regulating_reservoir = basin.get_node_index(&config.regulating_reservoir.0)?;
    let reservoir = basin.reservoir(regulating_reservoir)?;
    ensure!(
        reservoir.forecasts.storage_objective.is_some(),
        "Regulating reservoir {} has no storage objective",
        reservoir.id
    );

    let outlet = basin.get_node_index(&config.outlet.0)?;
    basin.outlet(outlet)?;

    for downstream in basin.downstream(regulating_reservoir) {
        ensure!(
            downstream == outlet,
            "Regulating reservoir {} drains into {} rather than the treaty outlet {}",
            reservoir.id,
            basin.node(downstream).id(),
            config.outlet
        );
    }
    ensure!(
        basin.downstream(regulating_reservoir).next().is_some(),
        "Regulating reservoir {} does not drain into the treaty outlet {}",
        reservoir.id,
        config.outlet
    );

    let coupled_aquifer = basin.get_node_index(&config.coupled_aquifer.0)?;
    basin.aquifer(coupled_aquifer)?;
    ensure!(
        basin
            .get_link(LinkKind::Transfer, coupled_aquifer, regulating_reservoir)
            .is_some(),
        "Coupled aquifer {} has no transfer link into regulating reservoir {}",
        config.coupled_aquifer,
        reservoir.id
    );

    Ok(TreatyNodes {
        regulating_reservoir,
        outlet,
        coupled_aquifer,
    })
}

/// All the forecasts driving a node
fn node_forecasts(node: &Node) -> Vec<&Forecast> {
    match node {
        Node::Reservoir(reservoir) => {
            let forecasts = &reservoir.forecasts;
            let mut all = vec![
                &forecasts.inflow,
                &forecasts.crop_demand,
                &forecasts.net_evaporation,
            ];
            all.extend(forecasts.storage_objective.as_ref());
            all
        }
        Node::Aquifer(aquifer) => aquifer.pumping_demand.iter().collect(),
        Node::Outlet(outlet) => vec![&outlet.inflow_forecast],
    }
}
