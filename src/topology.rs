//! Resolving which reservoirs upstream of a node are currently in service.
use crate::basin::{Basin, LinkKind};
use petgraph::graph::NodeIndex;
use std::collections::VecDeque;

/// Find the nearest active reservoirs upstream of a node.
///
/// Starts from the reservoirs directly upstream. An active reservoir is kept. A reservoir which is
/// not active is replaced by the reservoirs upstream of it that reach it through a natural
/// channel, since water bypasses a dam which is not in service through the river bed. A controlled
/// channel never leads through such a reservoir.
///
/// The result is in the order reservoirs were found, without duplicates.
pub fn nearest_active_upstream_reservoirs(basin: &Basin, node: NodeIndex) -> Vec<NodeIndex> {
    let mut resolved = Vec::new();
    let mut pending: VecDeque<_> = basin.upstream_reservoirs(node).collect();
    while let Some(candidate) = pending.pop_front() {
        let is_active = basin
            .node(candidate)
            .as_reservoir()
            .is_some_and(|reservoir| reservoir.is_active());

        if is_active {
            if !resolved.contains(&candidate) {
                resolved.push(candidate);
            }
            continue;
        }

        pending.extend(
            basin
                .upstream_reservoirs(candidate)
                .filter(|&up| basin.get_link(LinkKind::Natural, up, candidate).is_some()),
        );
    }

    resolved
}
