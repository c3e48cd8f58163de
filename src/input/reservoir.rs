//! Code for reading reservoirs and their area-storage curves.
use super::forecast::ForecastTables;
use super::{WideTable, check_non_negative, input_err_msg, read_csv, read_wide_csv};
use crate::basin::NodeID;
use crate::model::ModelParameters;
use crate::reservoir::{AREA_STORAGE_POINTS, Reservoir, ReservoirDefinition};
use crate::units::Volume;
use crate::year::Calendar;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const RESERVOIRS_FILE_NAME: &str = "reservoirs.csv";
const AREA_STORAGE_FILE_NAME: &str = "area_storage.csv";

/// The name of the key column of the area-storage file
const STORAGE_PERCENT_COLUMN: &str = "storage_percent";

/// A row of the reservoirs CSV file
#[derive(Debug, Deserialize, PartialEq)]
struct ReservoirRaw {
    id: NodeID,
    index: u32,
    capacity: f64,
    service_year: u32,
    end_year: Option<u32>,
    #[serde(default)]
    inhabitants: f64,
}

/// Read the reservoirs of a model, in their state at the start of the simulation.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `parameters` - Model parameters
/// * `calendar` - The simulation calendar
/// * `forecasts` - The model's forecast tables
pub fn read_reservoirs(
    model_dir: &Path,
    parameters: &ModelParameters,
    calendar: &Calendar,
    forecasts: &ForecastTables,
) -> Result<Vec<Reservoir>> {
    let file_path = model_dir.join(AREA_STORAGE_FILE_NAME);
    let area_storage = read_wide_csv(&file_path, STORAGE_PERCENT_COLUMN, |row| 2.0 * row as f64)?;

    let file_path = model_dir.join(RESERVOIRS_FILE_NAME);
    let raws = read_csv::<ReservoirRaw>(&file_path)?;
    let definitions = create_reservoir_definitions(raws, &area_storage)
        .with_context(|| input_err_msg(&file_path))?;

    definitions
        .into_iter()
        .map(|definition| -> Result<Reservoir> {
            let reservoir_forecasts = forecasts.reservoir_forecasts(&definition.id)?;
            Ok(Reservoir::new(
                definition,
                parameters.reservoir_parameters,
                reservoir_forecasts,
                calendar,
            ))
        })
        .collect()
}

/// Check the rows of the reservoirs file and attach each reservoir's area-storage curve
fn create_reservoir_definitions<I>(
    raws: I,
    area_storage: &WideTable,
) -> Result<Vec<ReservoirDefinition>>
where
    I: Iterator<Item = ReservoirRaw>,
{
    ensure!(
        area_storage.len() == AREA_STORAGE_POINTS,
        "{AREA_STORAGE_FILE_NAME} must have {AREA_STORAGE_POINTS} rows (0% to 100% in steps of 2%)"
    );

    raws.map(|raw| -> Result<ReservoirDefinition> {
        check_non_negative(raw.capacity, format!("Capacity of {}", raw.id))?;
        check_non_negative(raw.inhabitants, format!("Inhabitants of {}", raw.id))?;
        if let Some(end_year) = raw.end_year {
            ensure!(
                end_year > raw.service_year,
                "Reservoir {} must leave service after it enters service",
                raw.id
            );
        }

        let curve = area_storage
            .column(&raw.id.0)
            .with_context(|| format!("No area-storage curve for {}", raw.id))?;
        for &area in curve {
            check_non_negative(area, format!("Area of {}", raw.id))?;
        }

        Ok(ReservoirDefinition {
            id: raw.id,
            index: raw.index,
            capacity: Volume(raw.capacity),
            service_year: raw.service_year,
            end_year: raw.end_year,
            inhabitants: raw.inhabitants,
            area_storage: curve.to_vec(),
        })
    })
    .collect()
}
