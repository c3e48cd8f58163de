//! The upstream party, which operates the reservoirs above the regulating reservoir.
use crate::units::Volume;

/// The upstream party's state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasinOperator {
    /// Water lost from channels across the basin this month
    pub wadi_losses: Volume,
}

impl BasinOperator {
    /// The name the party's history is recorded under
    pub const NAME: &str = "basin_operator";

    /// Forget the previous month's losses
    pub fn reset(&mut self) {
        self.wadi_losses = Volume::ZERO;
    }
}
