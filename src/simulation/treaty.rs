//! The treaty allocation model.
//!
//! Runs in two stages each month. Stage A releases water from the regulating reservoir so that it
//! follows its storage objective. Stage B gathers the flow reaching the outlet and splits it between
//! the claimant's guaranteed share and the joint quota, drawing on the regulating reservoir's
//! storage to make up any shortfall.
use super::reservoir::{check_reservoir, record_link_flows, route_inflow};
use crate::basin::Basin;
use crate::institution::Regulator;
use crate::reservoir::Activation;
use crate::units::{VOLUME_TOLERANCE, Volume};
use crate::year::Calendar;
use anyhow::{Context, Result, ensure};
use log::warn;
use petgraph::graph::NodeIndex;

/// The nodes the treaty is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreatyNodes {
    /// The reservoir whose release follows a storage objective
    pub regulating_reservoir: NodeIndex,
    /// The outlet where the flow is split
    pub outlet: NodeIndex,
    /// The aquifer discharging into the regulating reservoir
    pub coupled_aquifer: NodeIndex,
}

/// Stage A: release water from the regulating reservoir.
///
/// The coupled aquifer's base flow joins the reservoir's inflow, less what is pumped from the
/// aquifer beyond what it can supply, but never below the aquifer's minimum base flow. The
/// reservoir then holds back enough to meet its storage objective before releasing the rest.
pub fn release_regulating_reservoir(
    basin: &mut Basin,
    regulator: &Regulator,
    nodes: &TreatyNodes,
    timestep: u32,
) -> Result<()> {
    let aquifer = basin.aquifer(nodes.coupled_aquifer)?;
    let (base_flow, aquifer_deficit, min_base_flow) =
        (aquifer.outflow, aquifer.deficit, aquifer.min_base_flow);

    let reservoir = basin.reservoir_mut(nodes.regulating_reservoir)?;
    reservoir.inflow_total += base_flow;
    let abstraction = (reservoir.inflow_total - min_base_flow)
        .min(aquifer_deficit)
        .max(Volume::ZERO);
    reservoir.inflow_total -= abstraction;

    if reservoir.activation == Activation::NotBuilt {
        reservoir.deficit = Volume::ZERO;
        reservoir.outflow = Volume::ZERO;
        reservoir.storage = Volume::ZERO;
        return Ok(());
    }

    let config = &regulator.config;
    let seasonal = (config.seasonal_abstraction.fraction(timestep) * config.annual_abstraction)
        .min(reservoir.inflow_total - min_base_flow)
        .max(Volume::ZERO);
    reservoir.inflow_total -= seasonal;

    let objective = reservoir.storage_objective.with_context(|| {
        format!(
            "No storage objective for regulating reservoir {}",
            reservoir.id
        )
    })?;
    let available = reservoir.inflow_total + reservoir.storage_open - objective;
    if available - reservoir.demand >= Volume::ZERO {
        reservoir.outflow = available - reservoir.demand;
        reservoir.deficit = Volume::ZERO;
        reservoir.storage = objective;
    } else if available > Volume::ZERO {
        reservoir.outflow = Volume::ZERO;
        reservoir.deficit = reservoir.demand - available;
        reservoir.storage = objective;
    } else {
        reservoir.outflow = Volume::ZERO;
        reservoir.deficit = reservoir.demand;
        reservoir.storage = reservoir.inflow_total + reservoir.storage_open;
    }

    check_reservoir(reservoir, false)
}

/// How the flow at the outlet is divided
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutletSplit {
    /// The share counted against the joint quota
    pub quota_share: Volume,
    /// Everything else, which includes the guaranteed share
    pub remainder_share: Volume,
    /// Water drawn from the regulating reservoir
    pub drawdown: Volume,
    /// The part of the guaranteed share which could not be delivered
    pub shortfall: Volume,
}

/// Divide the flow at the outlet between the guaranteed share and the joint quota.
///
/// The guaranteed share comes first, then the joint quota up to its target. If the regulating
/// reservoir is built (`storage` is given) its storage makes up any shortfall in either. Whatever
/// is left over goes to the remainder share, so the two shares always add up to the inflow plus
/// the draw-down.
pub fn split_outlet_flow(
    inflow: Volume,
    guaranteed: Volume,
    quota_target: Volume,
    storage: Option<Volume>,
) -> OutletSplit {
    let Some(storage) = storage else {
        let guaranteed_met = inflow.min(guaranteed);
        let quota_share = (inflow - guaranteed_met).min(quota_target);
        return OutletSplit {
            quota_share,
            remainder_share: inflow - quota_share,
            drawdown: Volume::ZERO,
            shortfall: (guaranteed - inflow).max(Volume::ZERO),
        };
    };

    if inflow <= guaranteed {
        let drawdown = storage.min(guaranteed - inflow).max(Volume::ZERO);
        let total = inflow + drawdown;
        return OutletSplit {
            quota_share: Volume::ZERO,
            remainder_share: total,
            drawdown,
            shortfall: (guaranteed - total).max(Volume::ZERO),
        };
    }

    let excess = inflow - guaranteed;
    let drawdown = if excess < quota_target {
        storage.min(quota_target - excess).max(Volume::ZERO)
    } else {
        Volume::ZERO
    };
    let total = inflow + drawdown;
    let quota_share = (total - guaranteed).min(quota_target);

    OutletSplit {
        quota_share,
        remainder_share: total - quota_share,
        drawdown,
        shortfall: Volume::ZERO,
    }
}

/// Stage B: gather the flow reaching the outlet and split it under the treaty.
///
/// Once a year, the annual quota is recalculated from the regulating reservoir's storage.
pub fn split_at_outlet(
    basin: &mut Basin,
    regulator: &mut Regulator,
    nodes: &TreatyNodes,
    calendar: &Calendar,
    timestep: u32,
) -> Result<()> {
    let routed = route_inflow(basin, nodes.outlet)?;
    record_link_flows(basin, nodes.outlet, &routed)?;
    let outlet = basin.outlet_mut(nodes.outlet)?;
    outlet.inflow_total = outlet.inflow + routed.surface + routed.groundwater;
    let inflow = outlet.inflow_total;

    let guaranteed = regulator.guaranteed_share(timestep);
    regulator.quota_target = regulator.monthly_quota_target(calendar, timestep);

    let reservoir = basin.reservoir(nodes.regulating_reservoir)?;
    let storage = reservoir.is_active().then_some(reservoir.storage);
    if let Some(storage) = storage.filter(|_| regulator.is_quota_update_month(timestep)) {
        regulator.update_annual_quota(storage);
    }

    let split = split_outlet_flow(inflow, guaranteed, regulator.quota_target, storage);

    let reservoir = basin.reservoir_mut(nodes.regulating_reservoir)?;
    reservoir.storage -= split.drawdown;
    reservoir.outflow += split.drawdown;

    let outlet = basin.outlet_mut(nodes.outlet)?;
    outlet.inflow_total += split.drawdown;
    outlet.drawdown = split.drawdown;
    outlet.quota_share = split.quota_share;
    outlet.remainder_share = split.remainder_share;
    outlet.guaranteed_shortfall = split.shortfall;
    if split.shortfall > Volume::ZERO {
        warn!(
            "Insufficient flow at {} in timestep {timestep}: guaranteed share short by {}",
            outlet.id, split.shortfall
        );
    }

    ensure!(
        (outlet.quota_share + outlet.remainder_share).approx_eq(outlet.inflow_total),
        "Outlet shares ({} + {}) do not add up to its inflow ({})",
        outlet.quota_share,
        outlet.remainder_share,
        outlet.inflow_total
    );
    ensure!(
        outlet.quota_share >= -Volume(VOLUME_TOLERANCE)
            && outlet.remainder_share >= -Volume(VOLUME_TOLERANCE),
        "Negative outlet share"
    );

    regulator.quota_delivered =
        split.quota_share + regulator.config.supplementary.volume(timestep);

    Ok(())
}
