//! Routing water between reservoirs and the monthly reservoir water balance.
use crate::basin::{Basin, LinkKind};
use crate::reservoir::{Activation, Reservoir};
use crate::topology::nearest_active_upstream_reservoirs;
use crate::units::{VOLUME_TOLERANCE, Volume};
use anyhow::{Result, bail, ensure};
use petgraph::graph::NodeIndex;

/// How an upstream reservoir's release reaches one of the nodes below it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Conveyance {
    /// Water entering the natural channel to the target
    pub natural: Volume,
    /// Water entering the controlled channel to the target
    pub controlled: Volume,
    /// Water arriving at the target
    pub gain: Volume,
    /// Water lost on the way
    pub loss: Volume,
}

/// Work out how much of an active reservoir's release reaches a node downstream of it.
///
/// A controlled channel takes as much of the release as it can carry. Whatever it cannot carry
/// spills down the natural channel, or is lost if there is none. If the controlled channel leads
/// somewhere other than `target`, only the spill reaches `target`.
pub fn convey_release(basin: &Basin, upstream: NodeIndex, target: NodeIndex) -> Result<Conveyance> {
    let release = basin.reservoir(upstream)?.outflow;
    let natural = basin.get_link(LinkKind::Natural, upstream, target);
    let controlled = basin.get_link(LinkKind::Controlled, upstream, target);

    let conveyance = match (natural, controlled) {
        (None, None) => bail!(
            "No channel from {} to {}",
            basin.node(upstream).id(),
            basin.node(target).id()
        ),
        (Some(natural), None) => {
            let diverted = basin
                .outgoing_link(upstream, LinkKind::Controlled)
                .map_or(Volume::ZERO, |(_, canal)| release.min(canal.capacity()));
            let spill = release - diverted;
            Conveyance {
                natural: spill,
                gain: natural.link_yield * spill,
                loss: (1.0 - natural.link_yield) * spill,
                ..Conveyance::default()
            }
        }
        (None, Some(controlled)) => {
            let conveyed = release.min(controlled.capacity());
            let mut loss = (1.0 - controlled.link_yield) * conveyed;
            if basin.outgoing_link(upstream, LinkKind::Natural).is_none() {
                // Nowhere for the excess to go
                loss += release - conveyed;
            }
            Conveyance {
                controlled: conveyed,
                gain: controlled.link_yield * conveyed,
                loss,
                ..Conveyance::default()
            }
        }
        (Some(natural), Some(controlled)) => {
            let conveyed = release.min(controlled.capacity());
            let spill = release - conveyed;
            Conveyance {
                natural: spill,
                controlled: conveyed,
                gain: controlled.link_yield * conveyed + natural.link_yield * spill,
                loss: (1.0 - controlled.link_yield) * conveyed + (1.0 - natural.link_yield) * spill,
            }
        }
    };

    Ok(conveyance)
}

/// Water routed to a node from the nodes directly upstream of it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoutedInflow {
    /// Water arriving from upstream reservoirs
    pub surface: Volume,
    /// Base flow arriving from upstream aquifers
    pub groundwater: Volume,
    /// Water lost from channels on the way
    pub losses: Volume,
    /// Flow entering each link into the node
    pub link_flows: Vec<(LinkKind, NodeIndex, Volume)>,
}

/// Route water to a node from the nodes directly upstream of it.
///
/// Active reservoirs contribute their release through whichever channels join them to the node.
/// A reservoir which is not in service passes everything reaching it straight through its
/// natural channel; with only a controlled channel it contributes nothing. Aquifers contribute
/// their base flow.
pub fn route_inflow(basin: &Basin, node: NodeIndex) -> Result<RoutedInflow> {
    let active = nearest_active_upstream_reservoirs(basin, node);
    let mut routed = RoutedInflow::default();

    for upstream in basin.upstream_reservoirs(node) {
        if active.contains(&upstream) {
            let conveyance = convey_release(basin, upstream, node)?;
            routed.surface += conveyance.gain;
            routed.losses += conveyance.loss;
            if basin.get_link(LinkKind::Natural, upstream, node).is_some() {
                routed
                    .link_flows
                    .push((LinkKind::Natural, upstream, conveyance.natural));
            }
            if basin.get_link(LinkKind::Controlled, upstream, node).is_some() {
                routed
                    .link_flows
                    .push((LinkKind::Controlled, upstream, conveyance.controlled));
            }
        } else if basin.get_link(LinkKind::Natural, upstream, node).is_some() {
            let passed = basin.reservoir(upstream)?.inflow_total;
            routed.surface += passed;
            routed
                .link_flows
                .push((LinkKind::Natural, upstream, passed));
        }
    }

    for upstream in basin.upstream_aquifers(node) {
        let base_flow = basin.aquifer(upstream)?.outflow;
        routed.groundwater += base_flow;
        routed
            .link_flows
            .push((LinkKind::Transfer, upstream, base_flow));
    }

    Ok(routed)
}

/// Record routed flows on the links into `node`
pub fn record_link_flows(basin: &mut Basin, node: NodeIndex, routed: &RoutedInflow) -> Result<()> {
    for &(kind, upstream, flow) in &routed.link_flows {
        basin.set_link_flow(kind, upstream, node, flow)?;
    }

    Ok(())
}

/// The result of a reservoir water balance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    /// Storage at the end of the timestep
    pub storage: Volume,
    /// Release downstream
    pub outflow: Volume,
    /// Demand which could not be met
    pub deficit: Volume,
}

/// Balance inflow and opening storage against demand, spilling anything beyond `max_storage`
pub fn balance(
    inflow_total: Volume,
    storage_open: Volume,
    max_storage: Volume,
    demand: Volume,
) -> Balance {
    let surplus = inflow_total + storage_open - demand;
    if surplus >= Volume::ZERO {
        Balance {
            storage: surplus.min(max_storage),
            outflow: (surplus - max_storage).max(Volume::ZERO),
            deficit: Volume::ZERO,
        }
    } else {
        Balance {
            storage: Volume::ZERO,
            outflow: Volume::ZERO,
            deficit: -surplus,
        }
    }
}

/// Apply the water balance to a reservoir, according to whether it is in service.
///
/// A reservoir which is not built holds nothing and releases nothing. A decommissioned reservoir
/// can hold no more than it already does.
pub fn apply_balance(reservoir: &mut Reservoir) {
    let max_storage = match reservoir.activation {
        Activation::NotBuilt => {
            reservoir.storage = Volume::ZERO;
            reservoir.outflow = Volume::ZERO;
            reservoir.deficit = Volume::ZERO;
            return;
        }
        Activation::Active => reservoir.capacity,
        Activation::Decommissioned => reservoir.storage_open.max(Volume::ZERO),
    };

    let result = balance(
        reservoir.inflow_total,
        reservoir.storage_open,
        max_storage,
        reservoir.demand,
    );
    reservoir.storage = result.storage;
    reservoir.outflow = result.outflow;
    reservoir.deficit = result.deficit;
}

/// Check a reservoir's state after its water balance
pub fn check_reservoir(reservoir: &Reservoir, check_capacity: bool) -> Result<()> {
    ensure!(
        reservoir.storage >= -Volume(VOLUME_TOLERANCE),
        "Negative storage ({})",
        reservoir.storage
    );
    if check_capacity && reservoir.activation == Activation::Active {
        ensure!(
            reservoir.storage <= reservoir.capacity + Volume(VOLUME_TOLERANCE),
            "Storage ({}) exceeds capacity ({})",
            reservoir.storage,
            reservoir.capacity
        );
    }
    ensure!(
        reservoir.deficit >= -Volume(VOLUME_TOLERANCE),
        "Negative deficit ({})",
        reservoir.deficit
    );
    ensure!(
        reservoir.outflow >= -Volume(VOLUME_TOLERANCE),
        "Negative outflow ({})",
        reservoir.outflow
    );
    ensure!(
        reservoir.capacity >= Volume::ZERO,
        "Negative capacity ({})",
        reservoir.capacity
    );

    Ok(())
}
