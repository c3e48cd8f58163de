//! Basin-wide settings for a model, read from `model.toml`.
use crate::aquifer::AquiferParameters;
use crate::input::{input_err_msg, read_toml};
use crate::institution::{ClaimantConfig, RegulatorConfig, TreatySchedule};
use crate::reservoir::ReservoirParameters;
use crate::year::Calendar;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

/// April, the start of the water year
fn default_commissioning_month() -> u32 {
    4
}

/// The contents of `model.toml`
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// The calendar year of the first timestep (which is always January)
    pub start_year: u32,
    /// The number of monthly timesteps to simulate.
    ///
    /// Defaults to the length of the inflow forecasts.
    pub num_timesteps: Option<u32>,
    /// The month (1-12) in which reservoirs enter and leave service
    #[serde(default = "default_commissioning_month")]
    pub commissioning_month: u32,
    /// Parameters shared by all reservoirs
    #[serde(default)]
    pub reservoir_parameters: ReservoirParameters,
    /// Parameters shared by all aquifers
    #[serde(default)]
    pub aquifer_parameters: AquiferParameters,
    /// What the claimant is owed each month
    #[serde(default)]
    pub treaty: TreatySchedule,
    /// Configuration for the joint regulator
    pub regulator: RegulatorConfig,
    /// Configuration for the claimant
    #[serde(default)]
    pub claimant: ClaimantConfig,
}

/// Check that the `num_timesteps` parameter is valid
fn check_num_timesteps(value: Option<u32>) -> Result<()> {
    ensure!(value != Some(0), "num_timesteps cannot be zero");

    Ok(())
}

impl ModelParameters {
    /// Read and check `model.toml` in `model_dir`
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let params: ModelParameters = read_toml(&file_path)?;
        params.validate().with_context(|| input_err_msg(&file_path))?;

        Ok(params)
    }

    /// The calendar the simulation runs on
    pub fn calendar(&self) -> Result<Calendar> {
        Calendar::new(self.start_year, self.commissioning_month)
    }

    /// Check each section in turn
    fn validate(&self) -> Result<()> {
        check_num_timesteps(self.num_timesteps)?;
        self.calendar()?;

        self.reservoir_parameters
            .validate()
            .context("Invalid reservoir_parameters")?;
        self.aquifer_parameters
            .validate()
            .context("Invalid aquifer_parameters")?;
        self.treaty.validate().context("Invalid treaty")?;
        self.regulator.validate().context("Invalid regulator")?;
        self.claimant.validate().context("Invalid claimant")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const REGULATOR_TOML: &str = r#"
[regulator]
regulating_reservoir = "Dam"
outlet = "Outlet"
coupled_aquifer = "Aquifer"
"#;

    fn parse(toml: &str) -> ModelParameters {
        toml::from_str(&format!("{toml}\n{REGULATOR_TOML}")).unwrap()
    }

    #[test]
    fn test_check_num_timesteps() {
        assert!(check_num_timesteps(None).is_ok());
        assert!(check_num_timesteps(Some(1)).is_ok());
        assert_error!(check_num_timesteps(Some(0)), "num_timesteps cannot be zero");
    }

    #[test]
    fn test_model_params_defaults() {
        let params = parse("start_year = 2004");
        assert_eq!(params.num_timesteps, None);
        assert_eq!(params.commissioning_month, 4);
        assert_eq!(params.reservoir_parameters, ReservoirParameters::default());
        assert_eq!(params.treaty, TreatySchedule::default());
        assert_eq!(params.claimant, ClaimantConfig::default());
        assert!(params.validate().is_ok());
        assert_eq!(params.calendar().unwrap().start_year, 2004);
    }

    #[test]
    fn test_model_params_bad_commissioning_month() {
        let params = parse("start_year = 2004\ncommissioning_month = 0");
        assert_error!(
            params.validate(),
            "commissioning_month must be between 1 and 12"
        );
    }

    #[test]
    fn test_model_params_invalid_section() {
        let mut params = parse("start_year = 2004");
        params.regulator.quota_update_month = 0;
        assert_error!(params.validate(), "Invalid regulator");
    }

    #[test]
    fn test_model_params_from_path() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(file, "start_year = 1983\nnum_timesteps = 24\n{REGULATOR_TOML}").unwrap();
        }

        let params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(params.start_year, 1983);
        assert_eq!(params.num_timesteps, Some(24));
    }

    #[test]
    fn test_model_params_missing_regulator() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(file, "start_year = 1983").unwrap();
        }

        assert!(ModelParameters::from_path(dir.path()).is_err());
    }
}
