//! The aquifer model: delayed pumping and recharge deplete base flow.
use crate::aquifer::Aquifer;
use crate::basin::Basin;
use crate::units::{Dimensionless, VOLUME_TOLERANCE, Volume};
use anyhow::{Result, ensure};
use petgraph::graph::NodeIndex;

/// How pumping affects an aquifer's base flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseRegime {
    /// Net pumping is small enough to have no effect
    Unaffected,
    /// Net pumping reduces base flow, which stays above its minimum
    Depleting,
    /// Base flow is at its minimum and some demand goes unmet
    Floor,
}

/// The base flow an aquifer releases and the demand it cannot meet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseFlowRelease {
    /// Which regime applies
    pub regime: ReleaseRegime,
    /// Base flow discharged
    pub outflow: Volume,
    /// Demand which could not be met
    pub deficit: Volume,
    /// Fraction of demand which was met
    pub satisfied_ratio: Dimensionless,
}

/// Work out an aquifer's base flow from its delayed demand and recharge
pub fn base_flow_release(aquifer: &Aquifer, demand: Volume, inflow: Volume) -> BaseFlowRelease {
    let gap = demand - inflow;
    let headroom = aquifer.trigger + aquifer.historical_base_flow - aquifer.min_base_flow;

    if gap <= aquifer.trigger {
        BaseFlowRelease {
            regime: ReleaseRegime::Unaffected,
            outflow: aquifer.historical_base_flow,
            deficit: Volume::ZERO,
            satisfied_ratio: Dimensionless(1.0),
        }
    } else if gap <= headroom {
        BaseFlowRelease {
            regime: ReleaseRegime::Depleting,
            outflow: aquifer.trigger + aquifer.historical_base_flow - gap,
            deficit: Volume::ZERO,
            satisfied_ratio: Dimensionless(1.0),
        }
    } else {
        let deficit = gap - headroom;
        let satisfied_ratio = if demand > Volume::ZERO {
            1.0 - deficit / demand
        } else {
            Dimensionless(1.0)
        };
        BaseFlowRelease {
            regime: ReleaseRegime::Floor,
            outflow: aquifer.min_base_flow,
            deficit,
            satisfied_ratio,
        }
    }
}

/// Run the aquifer model for one aquifer.
///
/// The deficits of the reservoirs directly upstream are pumped from the aquifer, and irrigation
/// return flows recharge it, both with a transit delay. A wadi-coupled aquifer is also recharged by
/// channel losses across the basin. Pumping the aquifer can supply relieves upstream deficits.
pub fn update_aquifer(
    basin: &mut Basin,
    index: NodeIndex,
    wadi_losses: Volume,
    timestep: u32,
) -> Result<()> {
    let upstream: Vec<_> = basin.upstream_reservoirs(index).collect();
    let mut upstream_deficit = Volume::ZERO;
    let mut return_flows = Volume::ZERO;
    for &up in &upstream {
        let reservoir = basin.reservoir(up)?;
        upstream_deficit += reservoir.deficit;
        return_flows += reservoir.parameters.return_flow
            * (1.0 - reservoir.parameters.irrigation_efficiency)
            * reservoir.demand;
    }

    let aquifer = basin.aquifer_mut(index)?;
    aquifer.demand_buffer.add(timestep, upstream_deficit);
    aquifer.demand = aquifer.demand_buffer.mean();

    let mut recharge = return_flows;
    if aquifer.wadi_coupled {
        let parameters = &aquifer.parameters;
        recharge += parameters.wadi_return_flow * wadi_losses
            + parameters.return_flow * (1.0 - parameters.irrigation_efficiency) * aquifer.demand;
    }
    aquifer.inflow_total = recharge;
    aquifer.inflow_buffer.add(timestep, recharge);
    aquifer.inflow = aquifer.inflow_buffer.mean();

    let release = base_flow_release(aquifer, aquifer.demand, aquifer.inflow);
    aquifer.outflow = release.outflow;
    aquifer.deficit = release.deficit;
    check_aquifer(aquifer)?;

    for up in upstream {
        let reservoir = basin.reservoir_mut(up)?;
        reservoir.deficit = match release.regime {
            ReleaseRegime::Unaffected | ReleaseRegime::Depleting => Volume::ZERO,
            ReleaseRegime::Floor => {
                reservoir.deficit - reservoir.deficit * release.satisfied_ratio
            }
        };
    }

    Ok(())
}

/// Check an aquifer's state after the aquifer model has run
fn check_aquifer(aquifer: &Aquifer) -> Result<()> {
    ensure!(
        aquifer.outflow >= aquifer.min_base_flow - Volume(VOLUME_TOLERANCE),
        "Base flow ({}) below minimum ({})",
        aquifer.outflow,
        aquifer.min_base_flow
    );
    ensure!(
        aquifer.deficit >= -Volume(VOLUME_TOLERANCE),
        "Negative deficit ({})",
        aquifer.deficit
    );

    Ok(())
}
