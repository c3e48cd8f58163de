//! Code for working with the monthly calendar of the simulation.
//!
//! A timestep is one month. Timestep zero is January of the start year, so `timestep % 12` gives
//! the calendar month and `timestep / 12` gives the number of whole years elapsed.
use crate::units::{Dimensionless, Volume};
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// The number of timesteps in a year
pub const MONTHS_PER_YEAR: u32 = 12;

/// Maps simulation timesteps onto calendar years and months
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calendar {
    /// The calendar year of timestep zero
    pub start_year: u32,
    /// The month (1-12) in which reservoirs are commissioned or decommissioned
    pub commissioning_month: u32,
}

impl Calendar {
    /// Create a new [`Calendar`], checking the commissioning month is valid
    pub fn new(start_year: u32, commissioning_month: u32) -> Result<Self> {
        ensure!(
            (1..=MONTHS_PER_YEAR).contains(&commissioning_month),
            "commissioning_month must be between 1 and 12"
        );

        Ok(Self {
            start_year,
            commissioning_month,
        })
    }

    /// The zero-based calendar month of a timestep
    pub fn month_index(timestep: u32) -> usize {
        (timestep % MONTHS_PER_YEAR) as usize
    }

    /// The number of whole years elapsed since the start of the simulation
    pub fn elapsed_years(timestep: u32) -> u32 {
        timestep / MONTHS_PER_YEAR
    }

    /// The calendar year of a timestep
    pub fn year(&self, timestep: u32) -> u32 {
        self.start_year + Self::elapsed_years(timestep)
    }

    /// Whether the timestep is the first month of a calendar year
    pub fn is_year_start(timestep: u32) -> bool {
        timestep % MONTHS_PER_YEAR == 0
    }

    /// The timestep at which a change of service status dated to `year` takes effect.
    ///
    /// Returns `None` if the change took effect before the simulation started.
    pub fn commissioning_timestep(&self, year: u32) -> Option<u32> {
        let years = year.checked_sub(self.start_year)?;
        Some(years * MONTHS_PER_YEAR + self.commissioning_month - 1)
    }
}

/// A value for each calendar month, recurring every year
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthlySchedule(pub [f64; 12]);

impl MonthlySchedule {
    /// The value for the calendar month of `timestep`
    pub fn get(&self, timestep: u32) -> f64 {
        self.0[Calendar::month_index(timestep)]
    }

    /// The value for the calendar month of `timestep`, as a volume
    pub fn volume(&self, timestep: u32) -> Volume {
        Volume(self.get(timestep))
    }

    /// The value for the calendar month of `timestep`, interpreted as a percentage
    pub fn fraction(&self, timestep: u32) -> Dimensionless {
        Dimensionless(self.get(timestep) / 100.0)
    }

    /// The sum over the whole year
    pub fn annual_total(&self) -> Volume {
        Volume(self.0.iter().sum())
    }

    /// Check that all values are finite and non-negative
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.0.iter().all(|v| v.is_finite() && *v >= 0.0),
            "Monthly values must be finite, non-negative numbers"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, 1983)]
    #[case(11, 11, 1983)]
    #[case(12, 0, 1984)]
    #[case(27, 3, 1985)]
    fn test_calendar(#[case] timestep: u32, #[case] month: usize, #[case] year: u32) {
        let calendar = Calendar::new(1983, 4).unwrap();
        assert_eq!(Calendar::month_index(timestep), month);
        assert_eq!(calendar.year(timestep), year);
    }

    #[test]
    fn test_calendar_invalid_month() {
        assert!(Calendar::new(1983, 0).is_err());
        assert!(Calendar::new(1983, 13).is_err());
    }

    #[rstest]
    #[case(1983, Some(3))]
    #[case(1985, Some(27))]
    #[case(1982, None)]
    fn test_commissioning_timestep(#[case] year: u32, #[case] expected: Option<u32>) {
        let calendar = Calendar::new(1983, 4).unwrap();
        assert_eq!(calendar.commissioning_timestep(year), expected);
    }

    #[test]
    fn test_monthly_schedule() {
        let schedule = MonthlySchedule([2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 3.0]);
        assert_eq!(schedule.get(11), 3.0);
        assert_eq!(schedule.get(23), 3.0);
        assert_eq!(schedule.volume(12), Volume(2.0));
        assert_eq!(schedule.annual_total(), Volume(25.0));
        assert!(schedule.validate().is_ok());

        let mut bad = schedule;
        bad.0[4] = -1.0;
        assert!(bad.validate().is_err());
    }
}
