//! Functionality for running the basin simulation.
//!
//! Each monthly timestep runs in a fixed order:
//!
//! 1. Every node reads its forecasts for the month.
//! 2. Water is routed through the basin from upstream to downstream, balancing each reservoir and
//!    running the aquifer model.
//! 3. The regulating reservoir releases water to follow its storage objective (treaty stage A).
//! 4. The flow at the outlet is split between the claimant and the joint quota (treaty stage B).
//! 5. The claimant's withdrawal is reconciled against the treaty.
use crate::basin::{Basin, Node};
use crate::history::{History, Tracked};
use crate::institution::{BasinOperator, Claimant, Regulator};
use crate::model::Model;
use crate::output::DataWriter;
use crate::year::Calendar;
use anyhow::{Context, Result, ensure};
use log::{debug, info};
use petgraph::graph::NodeIndex;
use std::path::Path;

pub mod aquifer;
use aquifer::update_aquifer;
pub mod reconciliation;
use reconciliation::reconcile;
pub mod reservoir;
use reservoir::{apply_balance, check_reservoir, record_link_flows, route_inflow};
pub mod treaty;
pub use treaty::TreatyNodes;
use treaty::{release_regulating_reservoir, split_at_outlet};

/// The state of a running simulation
pub struct Simulation {
    calendar: Calendar,
    basin: Basin,
    treaty_nodes: TreatyNodes,
    operator: BasinOperator,
    regulator: Regulator,
    claimant: Claimant,
    num_timesteps: u32,
    next_timestep: u32,
}

impl Simulation {
    /// Set up a simulation of a model, with every party in its initial state
    pub fn new(model: Model) -> Self {
        let parameters = model.parameters;
        let claimant = Claimant::new(parameters.claimant, &parameters.treaty.concession);
        let regulator = Regulator::new(parameters.regulator, parameters.treaty);

        Self {
            calendar: model.calendar,
            basin: model.basin,
            treaty_nodes: model.treaty_nodes,
            operator: BasinOperator::default(),
            regulator,
            claimant,
            num_timesteps: model.num_timesteps,
            next_timestep: 0,
        }
    }

    /// The basin network in its current state
    pub fn basin(&self) -> &Basin {
        &self.basin
    }

    /// The calendar the simulation runs on
    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// The upstream party
    pub fn operator(&self) -> &BasinOperator {
        &self.operator
    }

    /// The joint regulator
    pub fn regulator(&self) -> &Regulator {
        &self.regulator
    }

    /// The downstream claimant
    pub fn claimant(&self) -> &Claimant {
        &self.claimant
    }

    /// The nodes the treaty is applied to
    pub fn treaty_nodes(&self) -> &TreatyNodes {
        &self.treaty_nodes
    }

    /// Whether every timestep has been simulated
    pub fn is_finished(&self) -> bool {
        self.next_timestep >= self.num_timesteps
    }

    /// Iterate over the nodes of the basin and then the institutions
    pub fn iter_tracked(&self) -> impl Iterator<Item = &dyn Tracked> {
        self.basin
            .iter_nodes()
            .map(|node| node as &dyn Tracked)
            .chain(self.iter_institutions())
    }

    /// Iterate over the institutions
    pub fn iter_institutions(&self) -> impl Iterator<Item = &dyn Tracked> {
        [
            &self.operator as &dyn Tracked,
            &self.regulator as &dyn Tracked,
            &self.claimant as &dyn Tracked,
        ]
        .into_iter()
    }

    /// Simulate the next timestep, returning the timestep simulated
    pub fn step(&mut self) -> Result<u32> {
        let timestep = self.next_timestep;
        ensure!(
            !self.is_finished(),
            "All {} timesteps have already been simulated",
            self.num_timesteps
        );

        let year = self.calendar.year(timestep);
        if Calendar::is_year_start(timestep) {
            info!("Simulating year {year}");
        }
        debug!(
            "Timestep {timestep}: month {} of {year}",
            Calendar::month_index(timestep) + 1
        );

        self.refresh(timestep)?;
        self.route_through_basin(timestep)?;

        release_regulating_reservoir(
            &mut self.basin,
            &self.regulator,
            &self.treaty_nodes,
            timestep,
        )
        .with_context(|| format!("Regulating reservoir release failed in timestep {timestep}"))?;
        split_at_outlet(
            &mut self.basin,
            &mut self.regulator,
            &self.treaty_nodes,
            &self.calendar,
            timestep,
        )
        .with_context(|| format!("Treaty split failed in timestep {timestep}"))?;

        let remainder_share = self.basin.outlet(self.treaty_nodes.outlet)?.remainder_share;
        reconcile(
            &mut self.claimant,
            &mut self.regulator,
            remainder_share,
            timestep,
        );

        self.next_timestep += 1;
        Ok(timestep)
    }

    /// Read this timestep's forecasts for every node
    fn refresh(&mut self, timestep: u32) -> Result<()> {
        for node in self.basin.iter_nodes_mut() {
            node.refresh(timestep)?;
        }
        self.basin.reset_link_flows();
        self.operator.reset();

        Ok(())
    }

    /// Route water through the basin from upstream to downstream
    fn route_through_basin(&mut self, timestep: u32) -> Result<()> {
        let order: Vec<_> = self.basin.iter_upstream_to_downstream().collect();
        for index in order {
            let node = self.basin.node(index);
            let (kind, id) = (node.kind(), node.id().clone());
            self.update_node(index, timestep)
                .with_context(|| format!("Error updating {kind} {id} in timestep {timestep}"))?;
        }

        Ok(())
    }

    /// Route water into a node and work out its balance
    fn update_node(&mut self, index: NodeIndex, timestep: u32) -> Result<()> {
        match self.basin.node(index) {
            Node::Reservoir(_) => self.update_reservoir(index),
            Node::Aquifer(_) => {
                update_aquifer(&mut self.basin, index, self.operator.wadi_losses, timestep)
            }
            // The treaty outlet is handled in stage B
            Node::Outlet(_) if index == self.treaty_nodes.outlet => Ok(()),
            Node::Outlet(_) => {
                let routed = route_inflow(&self.basin, index)?;
                record_link_flows(&mut self.basin, index, &routed)?;
                let outlet = self.basin.outlet_mut(index)?;
                outlet.inflow_total = outlet.inflow + routed.surface + routed.groundwater;
                outlet.remainder_share = outlet.inflow_total;
                Ok(())
            }
        }
    }

    /// Route water into a reservoir and balance it.
    ///
    /// The regulating reservoir is balanced in stage A, once the coupled aquifer has been updated.
    fn update_reservoir(&mut self, index: NodeIndex) -> Result<()> {
        let routed = route_inflow(&self.basin, index)?;
        record_link_flows(&mut self.basin, index, &routed)?;
        self.operator.wadi_losses += routed.losses;

        let is_regulating = index == self.treaty_nodes.regulating_reservoir;
        let reservoir = self.basin.reservoir_mut(index)?;
        reservoir.inflow_total = reservoir.inflow + routed.surface;
        reservoir.wadi_losses = routed.losses;
        if is_regulating {
            return Ok(());
        }

        reservoir.inflow_total += routed.groundwater;
        apply_balance(reservoir);
        check_reservoir(reservoir, true)
    }
}

/// Run the simulation.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `output_path` - The folder to which output files will be written
/// * `debug_model` - Whether to write additional information (e.g. link flows) to file
///
/// # Returns
///
/// The recorded history of every node and party.
pub fn run(model: Model, output_path: &Path, debug_model: bool) -> Result<History> {
    let mut writer = DataWriter::create(output_path, &model, debug_model)?;
    let mut simulation = Simulation::new(model);
    let mut history = History::default();

    while !simulation.is_finished() {
        let timestep = simulation.step()?;
        history.record(timestep, simulation.iter_tracked())?;
        writer.write_timestep(timestep, &simulation)?;
    }
    writer.flush()?;

    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use crate::history::Attribute;
    use crate::reservoir::Activation;
    use crate::units::Volume;
    use rstest::rstest;

    #[rstest]
    fn test_simulation_step(model: Model) {
        let mut simulation = Simulation::new(model);
        assert_eq!(simulation.step().unwrap(), 0);
        assert_eq!(simulation.step().unwrap(), 1);

        // Before the reservoir is built, its inflow passes straight through to the outlet
        let nodes = *simulation.treaty_nodes();
        let outlet = simulation.basin().outlet(nodes.outlet).unwrap();
        let reservoir = simulation.basin().reservoir(nodes.regulating_reservoir).unwrap();
        assert_eq!(reservoir.activation, Activation::NotBuilt);
        assert!(outlet.inflow_total > outlet.inflow);
        assert!(
            (outlet.quota_share + outlet.remainder_share).approx_eq(outlet.inflow_total)
        );
    }

    #[rstest]
    fn test_simulation_runs_to_end(model: Model) {
        let num_timesteps = model.num_timesteps;
        let mut simulation = Simulation::new(model);
        let mut history = History::default();
        while !simulation.is_finished() {
            let timestep = simulation.step().unwrap();
            history.record(timestep, simulation.iter_tracked()).unwrap();
        }
        assert!(simulation.step().is_err());
        assert_eq!(history.num_timesteps(), num_timesteps);

        // The reservoir enters service in April of the first year
        let activation = history.get("Dam", Attribute::Activation).unwrap();
        assert_eq!(activation[2], 0.0);
        assert_eq!(activation[3], 1.0);

        // Once built, it is held at its storage objective
        let storage = history.get("Dam", Attribute::Storage).unwrap();
        assert!(storage[..3].iter().all(|&value| value == 0.0));
        assert!(storage[20] <= 20.0);
        assert!(
            history
                .get("Aquifer", Attribute::Outflow)
                .unwrap()
                .iter()
                .all(|&value| value >= 1.0)
        );
        assert!(
            history
                .get("claimant", Attribute::Withdrawal)
                .unwrap()
                .iter()
                .all(|&value| value >= 0.0)
        );
    }

    #[rstest]
    fn test_simulation_forecast_exhausted(mut model: Model) {
        model.num_timesteps = 49;
        let mut simulation = Simulation::new(model);
        for _ in 0..48 {
            simulation.step().unwrap();
        }
        let err = simulation.step().unwrap_err();
        assert!(
            err.chain()
                .any(|cause| cause.to_string().contains("exhausted at timestep 48"))
        );
        assert_eq!(
            simulation.basin().outlet(simulation.treaty_nodes().outlet).unwrap().quota_share,
            Volume::ZERO
        );
    }
}
