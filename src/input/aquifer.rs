//! Code for reading aquifers.
use super::forecast::ForecastTables;
use super::{check_non_negative, input_err_msg, read_csv};
use crate::aquifer::{Aquifer, AquiferDefinition};
use crate::model::ModelParameters;
use anyhow::{Context, Result, ensure};
use std::path::Path;

const AQUIFERS_FILE_NAME: &str = "aquifers.csv";

/// Read the aquifers of a model.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `parameters` - Model parameters
/// * `forecasts` - The model's forecast tables
pub fn read_aquifers(
    model_dir: &Path,
    parameters: &ModelParameters,
    forecasts: &ForecastTables,
) -> Result<Vec<Aquifer>> {
    let file_path = model_dir.join(AQUIFERS_FILE_NAME);
    let definitions = read_csv::<AquiferDefinition>(&file_path)?;

    definitions
        .map(|definition| -> Result<Aquifer> {
            check_aquifer_definition(&definition).with_context(|| input_err_msg(&file_path))?;
            let pumping_demand = forecasts.pumping_demand(&definition.id);
            Ok(Aquifer::new(
                definition,
                parameters.aquifer_parameters,
                pumping_demand,
            ))
        })
        .collect()
}

/// Check the base flow parameters of an aquifer
fn check_aquifer_definition(definition: &AquiferDefinition) -> Result<()> {
    let id = &definition.id;
    check_non_negative(
        definition.historical_base_flow.value(),
        format!("historical_base_flow of {id}"),
    )?;
    check_non_negative(definition.trigger.value(), format!("trigger of {id}"))?;
    check_non_negative(
        definition.min_base_flow.value(),
        format!("min_base_flow of {id}"),
    )?;
    ensure!(
        definition.min_base_flow <= definition.historical_base_flow,
        "min_base_flow of {id} cannot exceed its historical_base_flow"
    );

    Ok(())
}
