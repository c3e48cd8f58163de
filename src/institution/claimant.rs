//! The claimant party downstream of the outlet, which pumps its share of the flow.
use crate::units::Volume;
use crate::year::MonthlySchedule;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// 3.95 m³/s over a 30-day month, in hm³
const DEFAULT_PUMPING_CAPACITY: Volume = Volume(3.95 * 86400.0 * 30.0 / 1e6);

fn default_pumping_capacity() -> Volume {
    DEFAULT_PUMPING_CAPACITY
}

/// Configuration for the [`Claimant`]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClaimantConfig {
    /// The most the claimant can physically withdraw in a month
    #[serde(default = "default_pumping_capacity")]
    pub pumping_capacity: Volume,
    /// Flow bypassing the claimant's intake which is credited to the joint quota
    pub bypass: MonthlySchedule,
}

impl Default for ClaimantConfig {
    fn default() -> Self {
        Self {
            pumping_capacity: DEFAULT_PUMPING_CAPACITY,
            bypass: MonthlySchedule::default(),
        }
    }
}

impl ClaimantConfig {
    /// Check the configuration is valid
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.pumping_capacity.is_finite() && self.pumping_capacity >= Volume::ZERO,
            "pumping_capacity must be a finite, non-negative number"
        );
        self.bypass.validate().context("Invalid bypass schedule")?;

        Ok(())
    }
}

/// The claimant's state
#[derive(Debug, Clone, PartialEq)]
pub struct Claimant {
    /// Configuration for this party
    pub config: ClaimantConfig,
    /// Concession actually taken, by calendar month.
    ///
    /// Starts out as a copy of the nominal concession and is overwritten month by month.
    pub observed_concession: MonthlySchedule,
    /// Water pumped from the outlet's remainder share this month
    pub withdrawal: Volume,
    /// Remainder share beyond the pumping capacity, lost to both parties
    pub pumping_loss: Volume,
    /// Water counted against the claimant's allocation this month
    pub quantity_available: Volume,
    /// Concession taken this month
    pub concession_used: Volume,
    /// Water credited back to the joint quota this month
    pub concession_credit: Volume,
}

impl Claimant {
    /// The name the party's history is recorded under
    pub const NAME: &str = "claimant";

    /// Create a new [`Claimant`]
    pub fn new(config: ClaimantConfig, nominal_concession: &MonthlySchedule) -> Self {
        Self {
            config,
            observed_concession: *nominal_concession,
            withdrawal: Volume::ZERO,
            pumping_loss: Volume::ZERO,
            quantity_available: Volume::ZERO,
            concession_used: Volume::ZERO,
            concession_credit: Volume::ZERO,
        }
    }
}
