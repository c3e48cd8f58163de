//! The parties sharing the basin and the treaty that binds them.
//!
//! Each party is configured from `model.toml` and carries its own state through the run. The
//! decision procedures acting on this state live in the [`crate::simulation`] module.
use crate::year::MonthlySchedule;
use anyhow::{Context, Result};
use serde::Deserialize;

pub mod claimant;
pub use claimant::{Claimant, ClaimantConfig};
pub mod operator;
pub use operator::BasinOperator;
pub mod regulator;
pub use regulator::{QuotaPeriod, Regulator, RegulatorConfig};

/// The names the parties are recorded under, which basin nodes may not use
pub const INSTITUTION_NAMES: [&str; 3] = [BasinOperator::NAME, Regulator::NAME, Claimant::NAME];

/// The monthly allocation and concession owed to the claimant downstream of the outlet
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TreatySchedule {
    /// The fixed monthly allocation
    pub allocation: MonthlySchedule,
    /// Water the claimant may take in a month and which is returned to the joint quota later
    pub concession: MonthlySchedule,
}

impl Default for TreatySchedule {
    fn default() -> Self {
        let mut allocation = [2.0; 12];
        allocation[11] = 3.0;
        let mut concession = [2.0; 12];
        concession[10] = 0.0;
        concession[11] = 0.0;

        Self {
            allocation: MonthlySchedule(allocation),
            concession: MonthlySchedule(concession),
        }
    }
}

impl TreatySchedule {
    /// Check the monthly values are valid
    pub fn validate(&self) -> Result<()> {
        self.allocation
            .validate()
            .context("Invalid treaty allocation")?;
        self.concession
            .validate()
            .context("Invalid treaty concession")?;

        Ok(())
    }
}
