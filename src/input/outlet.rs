//! Code for reading outlets.
use super::forecast::ForecastTables;
use super::read_csv;
use crate::basin::NodeID;
use crate::outlet::Outlet;
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

const OUTLETS_FILE_NAME: &str = "outlets.csv";

/// A row of the outlets CSV file
#[derive(Debug, Deserialize, PartialEq)]
struct OutletRaw {
    id: NodeID,
    index: u32,
}

/// Read the outlets of a model, each with its catchment inflow forecast
pub fn read_outlets(model_dir: &Path, forecasts: &ForecastTables) -> Result<Vec<Outlet>> {
    let file_path = model_dir.join(OUTLETS_FILE_NAME);
    read_csv::<OutletRaw>(&file_path)?
        .map(|raw| -> Result<Outlet> {
            let inflow = forecasts.outlet_inflow(&raw.id)?;
            Ok(Outlet::new(raw.id, raw.index, inflow))
        })
        .collect()
}
