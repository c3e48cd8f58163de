//! Outlets: the points where water leaves the basin and is shared under the treaty.
use crate::basin::NodeID;
use crate::forecast::Forecast;
use crate::units::Volume;
use anyhow::Result;

/// An outlet and its state for the current timestep
#[derive(Debug, Clone, PartialEq)]
pub struct Outlet {
    /// Unique name
    pub id: NodeID,
    /// Basin index, used in link names
    pub index: u32,
    /// Inflow from the outlet's own catchment
    pub inflow_forecast: Forecast,
    /// This timestep's catchment inflow
    pub inflow: Volume,
    /// Catchment inflow plus everything routed from upstream and drawn from storage
    pub inflow_total: Volume,
    /// The share counted against the joint quota
    pub quota_share: Volume,
    /// Everything else, available to the downstream claimant
    pub remainder_share: Volume,
    /// Water drawn from the regulating reservoir to make up the shares
    pub drawdown: Volume,
    /// The part of the guaranteed share which could not be delivered
    pub guaranteed_shortfall: Volume,
}

impl Outlet {
    /// Create a new [`Outlet`]
    pub fn new(id: NodeID, index: u32, inflow_forecast: Forecast) -> Self {
        Self {
            id,
            index,
            inflow_forecast,
            inflow: Volume::ZERO,
            inflow_total: Volume::ZERO,
            quota_share: Volume::ZERO,
            remainder_share: Volume::ZERO,
            drawdown: Volume::ZERO,
            guaranteed_shortfall: Volume::ZERO,
        }
    }

    /// Update the outlet's exogenous state for a new timestep
    pub fn refresh(&mut self, timestep: u32) -> Result<()> {
        self.inflow = Volume(self.inflow_forecast.get(timestep)?);
        self.inflow_total = self.inflow;
        self.quota_share = Volume::ZERO;
        self.remainder_share = Volume::ZERO;
        self.drawdown = Volume::ZERO;
        self.guaranteed_shortfall = Volume::ZERO;

        Ok(())
    }
}
