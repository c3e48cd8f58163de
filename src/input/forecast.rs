//! Code for reading the forecast CSV files.
use super::{WideTable, read_wide_csv};
use crate::basin::NodeID;
use crate::forecast::Forecast;
use crate::id::IDCollection;
use crate::reservoir::ReservoirForecasts;
use anyhow::{Context, Result};
use indexmap::IndexSet;
use std::path::Path;

const INFLOW_FILE_NAME: &str = "inflow.csv";
const CROP_DEMAND_FILE_NAME: &str = "crop_demand.csv";
const NET_EVAPORATION_FILE_NAME: &str = "net_evaporation.csv";
const STORAGE_OBJECTIVE_FILE_NAME: &str = "storage_objective.csv";
const PUMPING_DEMAND_FILE_NAME: &str = "pumping_demand.csv";

/// The name of the key column of forecast files
const TIMESTEP_COLUMN: &str = "timestep";

/// Read a forecast file, in which row `i` holds the values for timestep `i`
fn read_forecast_file(file_path: &Path) -> Result<WideTable> {
    read_wide_csv(file_path, TIMESTEP_COLUMN, |row| row as f64)
}

/// Read a forecast file which the model may leave out
fn read_optional_forecast_file(file_path: &Path) -> Result<WideTable> {
    if !file_path.exists() {
        return Ok(WideTable::default());
    }

    read_forecast_file(file_path)
}

/// All the forecast tables of a model
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTables {
    inflow: WideTable,
    crop_demand: WideTable,
    net_evaporation: WideTable,
    storage_objective: WideTable,
    pumping_demand: WideTable,
}

impl ForecastTables {
    /// Read the forecast tables from the model directory.
    ///
    /// `storage_objective.csv` and `pumping_demand.csv` are optional.
    pub fn from_path(model_dir: &Path) -> Result<Self> {
        Ok(Self {
            inflow: read_forecast_file(&model_dir.join(INFLOW_FILE_NAME))?,
            crop_demand: read_forecast_file(&model_dir.join(CROP_DEMAND_FILE_NAME))?,
            net_evaporation: read_forecast_file(&model_dir.join(NET_EVAPORATION_FILE_NAME))?,
            storage_objective: read_optional_forecast_file(
                &model_dir.join(STORAGE_OBJECTIVE_FILE_NAME),
            )?,
            pumping_demand: read_optional_forecast_file(&model_dir.join(PUMPING_DEMAND_FILE_NAME))?,
        })
    }

    /// The number of timesteps covered by the inflow forecasts
    pub fn inflow_len(&self) -> u32 {
        self.inflow.len() as u32
    }

    /// The forecasts driving a reservoir
    pub fn reservoir_forecasts(&self, id: &NodeID) -> Result<ReservoirForecasts> {
        Ok(ReservoirForecasts {
            inflow: get_forecast(&self.inflow, "inflow", id)?,
            crop_demand: get_forecast(&self.crop_demand, "crop demand", id)?,
            net_evaporation: get_forecast(&self.net_evaporation, "net evaporation", id)?,
            storage_objective: get_optional_forecast(
                &self.storage_objective,
                "storage objective",
                id,
            ),
        })
    }

    /// The catchment inflow forecast for an outlet
    pub fn outlet_inflow(&self, id: &NodeID) -> Result<Forecast> {
        get_forecast(&self.inflow, "inflow", id)
    }

    /// The own pumping demand of an aquifer, if it has one
    pub fn pumping_demand(&self, id: &NodeID) -> Option<Forecast> {
        get_optional_forecast(&self.pumping_demand, "pumping demand", id)
    }

    /// Check every column of every table refers to a known node
    pub fn check_node_ids(&self, node_ids: &IndexSet<NodeID>) -> Result<()> {
        for (table, file_name) in [
            (&self.inflow, INFLOW_FILE_NAME),
            (&self.crop_demand, CROP_DEMAND_FILE_NAME),
            (&self.net_evaporation, NET_EVAPORATION_FILE_NAME),
            (&self.storage_objective, STORAGE_OBJECTIVE_FILE_NAME),
            (&self.pumping_demand, PUMPING_DEMAND_FILE_NAME),
        ] {
            for id in table.ids() {
                node_ids
                    .get_id(&id.0)
                    .with_context(|| format!("Invalid column in {file_name}"))?;
            }
        }

        Ok(())
    }
}

/// Get the forecast for a node from a table, which must have a column for it
fn get_forecast(table: &WideTable, what: &str, id: &NodeID) -> Result<Forecast> {
    get_optional_forecast(table, what, id).with_context(|| format!("No {what} forecast for {id}"))
}

fn get_optional_forecast(table: &WideTable, what: &str, id: &NodeID) -> Option<Forecast> {
    let values = table.column(&id.0)?;
    Some(Forecast::new(&format!("{what} for {id}"), values.to_vec()))
}
