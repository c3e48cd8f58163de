//! The regulating party: operates the regulating reservoir and holds the joint annual quota.
use super::TreatySchedule;
use crate::basin::NodeID;
use crate::units::Volume;
use crate::year::{Calendar, MonthlySchedule};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;

fn default_quota_distribution() -> Vec<QuotaPeriod> {
    let mut percent = [0.0; 12];
    percent[0] = 100.0;
    vec![QuotaPeriod {
        until_year: None,
        percent: MonthlySchedule(percent),
    }]
}

fn default_quota_update_month() -> u32 {
    4
}

fn default_quota_floor() -> Volume {
    Volume(55.0)
}

fn default_quota_margin() -> Volume {
    Volume(30.0)
}

fn default_max_quota_decrease() -> Volume {
    Volume(20.0)
}

/// How the annual quota is spread over the months of a year, for years before `until_year`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuotaPeriod {
    /// The first year this distribution no longer applies to. The last period must leave it out.
    pub until_year: Option<u32>,
    /// Percentage of the annual quota targeted in each calendar month
    pub percent: MonthlySchedule,
}

/// Configuration for the [`Regulator`]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegulatorConfig {
    /// The reservoir whose release follows a storage objective
    pub regulating_reservoir: NodeID,
    /// The basin outlet where the treaty split takes place
    pub outlet: NodeID,
    /// The aquifer discharging into the regulating reservoir
    pub coupled_aquifer: NodeID,
    /// The joint annual quota before its first recalculation
    #[serde(default)]
    pub initial_quota: Volume,
    /// Water delivered to the joint quota from sources outside the basin
    #[serde(default)]
    pub supplementary: MonthlySchedule,
    /// Monthly distribution of the annual quota, by period
    #[serde(default = "default_quota_distribution")]
    pub quota_distribution: Vec<QuotaPeriod>,
    /// The month (1-12) in which the annual quota is recalculated
    #[serde(default = "default_quota_update_month")]
    pub quota_update_month: u32,
    /// The annual quota never falls below this
    #[serde(default = "default_quota_floor")]
    pub quota_floor: Volume,
    /// Added to the storage-based estimate of the annual quota
    #[serde(default = "default_quota_margin")]
    pub quota_margin: Volume,
    /// The annual quota never falls by more than this from one year to the next
    #[serde(default = "default_max_quota_decrease")]
    pub max_quota_decrease: Volume,
    /// Percentage of `annual_abstraction` taken from the regulating reservoir's inflow each month
    #[serde(default)]
    pub seasonal_abstraction: MonthlySchedule,
    /// Annual volume abstracted upstream of the regulating reservoir
    #[serde(default)]
    pub annual_abstraction: Volume,
}

impl RegulatorConfig {
    /// Check the configuration is valid
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=12).contains(&self.quota_update_month),
            "quota_update_month must be between 1 and 12"
        );
        for (value, name) in [
            (self.initial_quota, "initial_quota"),
            (self.quota_floor, "quota_floor"),
            (self.quota_margin, "quota_margin"),
            (self.max_quota_decrease, "max_quota_decrease"),
            (self.annual_abstraction, "annual_abstraction"),
        ] {
            ensure!(
                value.is_finite() && value >= Volume::ZERO,
                "{name} must be a finite, non-negative number"
            );
        }
        self.supplementary
            .validate()
            .context("Invalid supplementary schedule")?;
        self.seasonal_abstraction
            .validate()
            .context("Invalid seasonal_abstraction")?;
        check_quota_distribution(&self.quota_distribution)?;

        Ok(())
    }
}

/// Check the periods of the quota distribution are in order and cover every year
fn check_quota_distribution(periods: &[QuotaPeriod]) -> Result<()> {
    let (last, rest) = periods
        .split_last()
        .context("quota_distribution must contain at least one period")?;
    ensure!(
        last.until_year.is_none(),
        "The last quota_distribution period must not have an until_year"
    );

    let mut previous = None;
    for period in rest {
        let until_year = period
            .until_year
            .context("Only the last quota_distribution period may leave out until_year")?;
        ensure!(
            previous.is_none_or(|previous| until_year > previous),
            "quota_distribution periods must be in order of until_year"
        );
        previous = Some(until_year);
    }

    for period in periods {
        period
            .percent
            .validate()
            .context("Invalid quota_distribution percentages")?;
    }

    Ok(())
}

/// The regulating party's state
#[derive(Debug, Clone, PartialEq)]
pub struct Regulator {
    /// Configuration for this party
    pub config: RegulatorConfig,
    /// The treaty schedule owed to the downstream claimant
    pub treaty: TreatySchedule,
    /// The current joint annual quota
    pub annual_quota: Volume,
    /// The joint quota targeted at the outlet this month
    pub quota_target: Volume,
    /// Water credited to the joint quota this month
    pub quota_delivered: Volume,
}

impl Regulator {
    /// The name the party's history is recorded under
    pub const NAME: &str = "regulator";

    /// Create a new [`Regulator`]
    pub fn new(config: RegulatorConfig, treaty: TreatySchedule) -> Self {
        let annual_quota = config.initial_quota;
        Self {
            config,
            treaty,
            annual_quota,
            quota_target: Volume::ZERO,
            quota_delivered: Volume::ZERO,
        }
    }

    /// The claimant's guaranteed share at the outlet for this month (allocation plus concession)
    pub fn guaranteed_share(&self, timestep: u32) -> Volume {
        self.treaty.allocation.volume(timestep) + self.treaty.concession.volume(timestep)
    }

    /// The quota distribution in force for the given calendar year
    pub fn quota_distribution(&self, year: u32) -> &MonthlySchedule {
        self.config
            .quota_distribution
            .iter()
            .find(|period| period.until_year.is_none_or(|until_year| year < until_year))
            .map_or(&self.config.quota_distribution[0].percent, |period| {
                &period.percent
            })
    }

    /// The joint quota to be met at the outlet this month.
    ///
    /// This is the month's share of the annual quota, less what the supplementary source already
    /// delivers. It is never negative.
    pub fn monthly_quota_target(&self, calendar: &Calendar, timestep: u32) -> Volume {
        let fraction = self
            .quota_distribution(calendar.year(timestep))
            .fraction(timestep);
        let target = self.annual_quota * fraction - self.config.supplementary.volume(timestep);

        target.max(Volume::ZERO)
    }

    /// Whether the annual quota is recalculated at this timestep
    pub fn is_quota_update_month(&self, timestep: u32) -> bool {
        Calendar::month_index(timestep) + 1 == self.config.quota_update_month as usize
    }

    /// Recalculate the annual quota from the regulating reservoir's storage.
    ///
    /// The new quota credits storage and the supplementary source against what the treaty owes
    /// the claimant, but never falls below the floor or by more than the maximum decrease.
    pub fn update_annual_quota(&mut self, storage: Volume) {
        let estimate = storage + self.config.supplementary.annual_total()
            - self.treaty.allocation.annual_total()
            - self.treaty.concession.annual_total()
            + self.config.quota_margin;
        let ratchet = self.annual_quota - self.config.max_quota_decrease;

        self.annual_quota = self.config.quota_floor.max(estimate).max(ratchet);
    }
}
