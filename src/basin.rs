//! The basin network: reservoirs, aquifers and outlets joined by directed links.
//!
//! Nodes and links are held in a [`petgraph`] arena and addressed by index. Links are also known by
//! a name encoding their kind and the basin indices of their endpoints (e.g. `RS_3-1` for the
//! natural channel from reservoir 3 to reservoir 1).
use crate::aquifer::Aquifer;
use crate::id::define_id_type;
use crate::institution::INSTITUTION_NAMES;
use crate::outlet::Outlet;
use crate::reservoir::Reservoir;
use crate::units::{Dimensionless, Volume};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use petgraph::Direction::{Incoming, Outgoing};
use petgraph::algo::toposort;
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Directed;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::collections::HashMap;

define_id_type! {NodeID}

/// The graph underlying a [`Basin`]
pub type BasinGraph = Graph<Node, Link, Directed>;

/// A node in the basin network
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A dam and the water it stores
    Reservoir(Reservoir),
    /// A groundwater body
    Aquifer(Aquifer),
    /// A point where water leaves the basin
    Outlet(Outlet),
}

impl Node {
    /// The node's unique name
    pub fn id(&self) -> &NodeID {
        match self {
            Node::Reservoir(reservoir) => &reservoir.id,
            Node::Aquifer(aquifer) => &aquifer.id,
            Node::Outlet(outlet) => &outlet.id,
        }
    }

    /// The node's basin index
    pub fn index(&self) -> u32 {
        match self {
            Node::Reservoir(reservoir) => reservoir.index,
            Node::Aquifer(aquifer) => aquifer.index,
            Node::Outlet(outlet) => outlet.index,
        }
    }

    /// A description of the kind of node, for messages
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Reservoir(_) => "reservoir",
            Node::Aquifer(_) => "aquifer",
            Node::Outlet(_) => "outlet",
        }
    }

    /// Update the node's exogenous state for a new timestep
    pub fn refresh(&mut self, timestep: u32) -> Result<()> {
        match self {
            Node::Reservoir(reservoir) => reservoir.refresh(timestep),
            Node::Aquifer(aquifer) => aquifer.refresh(timestep),
            Node::Outlet(outlet) => outlet.refresh(timestep),
        }
        .with_context(|| format!("Could not update {} {}", self.kind(), self.id()))
    }

    /// The node as a reservoir, if it is one
    pub fn as_reservoir(&self) -> Option<&Reservoir> {
        match self {
            Node::Reservoir(reservoir) => Some(reservoir),
            _ => None,
        }
    }

    /// The node as a mutable reservoir, if it is one
    pub fn as_reservoir_mut(&mut self) -> Option<&mut Reservoir> {
        match self {
            Node::Reservoir(reservoir) => Some(reservoir),
            _ => None,
        }
    }

    /// The node as an aquifer, if it is one
    pub fn as_aquifer(&self) -> Option<&Aquifer> {
        match self {
            Node::Aquifer(aquifer) => Some(aquifer),
            _ => None,
        }
    }

    /// The node as a mutable aquifer, if it is one
    pub fn as_aquifer_mut(&mut self) -> Option<&mut Aquifer> {
        match self {
            Node::Aquifer(aquifer) => Some(aquifer),
            _ => None,
        }
    }

    /// The node as an outlet, if it is one
    pub fn as_outlet(&self) -> Option<&Outlet> {
        match self {
            Node::Outlet(outlet) => Some(outlet),
            _ => None,
        }
    }

    /// The node as a mutable outlet, if it is one
    pub fn as_outlet_mut(&mut self) -> Option<&mut Outlet> {
        match self {
            Node::Outlet(outlet) => Some(outlet),
            _ => None,
        }
    }
}

/// The kind of a link between two nodes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeLabeledStringEnum, DeserializeLabeledStringEnum,
)]
pub enum LinkKind {
    /// An uncontrolled river channel
    #[string = "natural"]
    Natural,
    /// A capacity-limited canal, which exists once its upstream reservoir is built
    #[string = "controlled"]
    Controlled,
    /// An exchange between groundwater and surface water
    #[string = "transfer"]
    Transfer,
}

impl LinkKind {
    /// The prefix used in link names
    pub fn prefix(self) -> &'static str {
        match self {
            LinkKind::Natural => "RS",
            LinkKind::Controlled => "C",
            LinkKind::Transfer => "GW",
        }
    }

    /// The yield of links of this kind when none is given
    pub fn default_yield(self) -> Dimensionless {
        match self {
            LinkKind::Natural | LinkKind::Controlled => Dimensionless(0.5),
            LinkKind::Transfer => Dimensionless(1.0),
        }
    }
}

/// Get the name of the link of the given kind between two basin indices
pub fn link_name(kind: LinkKind, upstream: u32, downstream: u32) -> String {
    format!("{}_{upstream}-{downstream}", kind.prefix())
}

/// A directed link between two nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Name encoding the kind and endpoints of the link
    pub name: String,
    /// The kind of link
    pub kind: LinkKind,
    /// Fraction of conveyed water which arrives; the rest is lost
    pub link_yield: Dimensionless,
    /// The most the link can carry in a timestep, for controlled channels
    pub max_flow: Option<Volume>,
    /// Water entering the link this timestep
    pub flow: Volume,
}

impl Link {
    /// The most the link can carry in a timestep
    pub fn capacity(&self) -> Volume {
        self.max_flow.unwrap_or(Volume(f64::INFINITY))
    }
}

/// The description of a link, referring to its endpoints by name
#[derive(Debug, Clone, PartialEq)]
pub struct LinkDefinition {
    /// The kind of link
    pub kind: LinkKind,
    /// The node water flows from
    pub upstream: NodeID,
    /// The node water flows to
    pub downstream: NodeID,
    /// Fraction of conveyed water which arrives
    pub link_yield: Dimensionless,
    /// The most the link can carry in a timestep
    pub max_flow: Option<Volume>,
}

/// The basin network and the state of every node in it
#[derive(Debug, Clone)]
pub struct Basin {
    graph: BasinGraph,
    node_indices: HashMap<NodeID, NodeIndex>,
    link_indices: IndexMap<String, EdgeIndex>,
    order: Vec<NodeIndex>,
}

impl Basin {
    /// Assemble a basin from its nodes and links, checking the network is well formed.
    ///
    /// The network must be acyclic. Each reservoir may have at most one natural and one
    /// controlled channel leaving it.
    pub fn new(nodes: Vec<Node>, links: Vec<LinkDefinition>) -> Result<Self> {
        let mut graph = BasinGraph::new();
        let mut node_indices = HashMap::new();
        let mut basin_indices = HashMap::new();
        for node in nodes {
            let id = node.id().clone();
            ensure!(
                !INSTITUTION_NAMES.contains(&id.0.as_ref()),
                "Node ID {id} is reserved for a party to the treaty"
            );
            let index = node.index();
            if let Some(other) = basin_indices.insert(index, id.clone()) {
                bail!("Nodes {other} and {id} have the same basin index {index}");
            }

            let node_index = graph.add_node(node);
            ensure!(
                node_indices.insert(id.clone(), node_index).is_none(),
                "Duplicate node ID {id}"
            );
        }

        let mut link_indices = IndexMap::new();
        for link in links {
            let get_index = |id: &NodeID| {
                node_indices
                    .get(id)
                    .copied()
                    .with_context(|| format!("Link refers to unknown node {id}"))
            };
            let upstream = get_index(&link.upstream)?;
            let downstream = get_index(&link.downstream)?;
            let name = link_name(
                link.kind,
                graph[upstream].index(),
                graph[downstream].index(),
            );
            check_link(&graph, &link, upstream, downstream)
                .with_context(|| format!("Invalid link {name}"))?;

            let edge = graph.add_edge(
                upstream,
                downstream,
                Link {
                    name: name.clone(),
                    kind: link.kind,
                    link_yield: link.link_yield,
                    max_flow: link.max_flow,
                    flow: Volume::ZERO,
                },
            );
            ensure!(
                link_indices.insert(name.clone(), edge).is_none(),
                "Duplicate link {name}"
            );
        }

        check_outgoing_channels(&graph)?;
        let order = toposort(&graph, None).map_err(|cycle| {
            anyhow::anyhow!(
                "The basin network contains a cycle through {}",
                graph[cycle.node_id()].id()
            )
        })?;

        Ok(Self {
            graph,
            node_indices,
            link_indices,
            order,
        })
    }

    /// Get the index of the node with the given name
    pub fn get_node_index(&self, id: &str) -> Result<NodeIndex> {
        self.node_indices
            .get(id)
            .copied()
            .with_context(|| format!("Unknown node {id}"))
    }

    /// Get a node
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }

    /// Get a node mutably
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.graph[index]
    }

    /// Get a reservoir, or an error if the node is not a reservoir
    pub fn reservoir(&self, index: NodeIndex) -> Result<&Reservoir> {
        let node = self.node(index);
        node.as_reservoir()
            .with_context(|| format!("Node {} is not a reservoir", node.id()))
    }

    /// Get a reservoir mutably, or an error if the node is not a reservoir
    pub fn reservoir_mut(&mut self, index: NodeIndex) -> Result<&mut Reservoir> {
        let node = &mut self.graph[index];
        let id = node.id().clone();
        node.as_reservoir_mut()
            .with_context(|| format!("Node {id} is not a reservoir"))
    }

    /// Get an aquifer, or an error if the node is not an aquifer
    pub fn aquifer(&self, index: NodeIndex) -> Result<&Aquifer> {
        let node = self.node(index);
        node.as_aquifer()
            .with_context(|| format!("Node {} is not an aquifer", node.id()))
    }

    /// Get an aquifer mutably, or an error if the node is not an aquifer
    pub fn aquifer_mut(&mut self, index: NodeIndex) -> Result<&mut Aquifer> {
        let node = &mut self.graph[index];
        let id = node.id().clone();
        node.as_aquifer_mut()
            .with_context(|| format!("Node {id} is not an aquifer"))
    }

    /// Get an outlet, or an error if the node is not an outlet
    pub fn outlet(&self, index: NodeIndex) -> Result<&Outlet> {
        let node = self.node(index);
        node.as_outlet()
            .with_context(|| format!("Node {} is not an outlet", node.id()))
    }

    /// Get an outlet mutably, or an error if the node is not an outlet
    pub fn outlet_mut(&mut self, index: NodeIndex) -> Result<&mut Outlet> {
        let node = &mut self.graph[index];
        let id = node.id().clone();
        node.as_outlet_mut()
            .with_context(|| format!("Node {id} is not an outlet"))
    }

    /// Iterate over the nodes directly upstream of a node
    pub fn upstream(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(index, Incoming).unique()
    }

    /// Iterate over the nodes directly downstream of a node
    pub fn downstream(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(index, Outgoing).unique()
    }

    /// Iterate over the reservoirs directly upstream of a node
    pub fn upstream_reservoirs(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.upstream(index)
            .filter(|&up| matches!(self.graph[up], Node::Reservoir(_)))
    }

    /// Iterate over the aquifers directly upstream of a node
    pub fn upstream_aquifers(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.upstream(index)
            .filter(|&up| matches!(self.graph[up], Node::Aquifer(_)))
    }

    /// Find a link by name
    pub fn find_link(&self, name: &str) -> Option<&Link> {
        self.link_indices.get(name).map(|&edge| &self.graph[edge])
    }

    /// Get the link of the given kind between two nodes, if there is one
    pub fn get_link(
        &self,
        kind: LinkKind,
        upstream: NodeIndex,
        downstream: NodeIndex,
    ) -> Option<&Link> {
        self.find_link(&link_name(
            kind,
            self.graph[upstream].index(),
            self.graph[downstream].index(),
        ))
    }

    /// Get the link of the given kind leaving a node and the node it leads to, if there is one
    pub fn outgoing_link(&self, index: NodeIndex, kind: LinkKind) -> Option<(NodeIndex, &Link)> {
        self.graph
            .edges_directed(index, Outgoing)
            .find(|edge| edge.weight().kind == kind)
            .map(|edge| (edge.target(), edge.weight()))
    }

    /// Record the flow entering a link this timestep
    pub fn set_link_flow(
        &mut self,
        kind: LinkKind,
        upstream: NodeIndex,
        downstream: NodeIndex,
        flow: Volume,
    ) -> Result<()> {
        let name = link_name(
            kind,
            self.graph[upstream].index(),
            self.graph[downstream].index(),
        );
        let edge = *self
            .link_indices
            .get(&name)
            .with_context(|| format!("Link {name} not found"))?;
        self.graph[edge].flow = flow;

        Ok(())
    }

    /// Iterate over nodes in an order where every node comes after all the nodes upstream of it
    pub fn iter_upstream_to_downstream(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.order.iter().copied()
    }

    /// Iterate over all nodes in the order they were defined
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Iterate over all nodes mutably in the order they were defined
    pub fn iter_nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.graph.node_weights_mut()
    }

    /// Iterate over all links in the order they were defined
    pub fn iter_links(&self) -> impl Iterator<Item = &Link> {
        self.link_indices.values().map(|&edge| &self.graph[edge])
    }

    /// Forget the flows recorded on links in the previous timestep
    pub fn reset_link_flows(&mut self) {
        for link in self.graph.edge_weights_mut() {
            link.flow = Volume::ZERO;
        }
    }
}

/// Check a link's endpoints and parameters
fn check_link(
    graph: &BasinGraph,
    link: &LinkDefinition,
    upstream: NodeIndex,
    downstream: NodeIndex,
) -> Result<()> {
    ensure!(upstream != downstream, "A link cannot join a node to itself");
    ensure!(
        link.link_yield > Dimensionless(0.0) && link.link_yield <= Dimensionless(1.0),
        "Yield must be greater than 0 and at most 1"
    );

    let (from, to) = (&graph[upstream], &graph[downstream]);
    match link.kind {
        LinkKind::Natural | LinkKind::Controlled => {
            ensure!(
                matches!(from, Node::Reservoir(_)),
                "Channels must start at a reservoir, not {} {}",
                from.kind(),
                from.id()
            );
            ensure!(
                !matches!(to, Node::Aquifer(_)),
                "Channels cannot end at an aquifer; use a transfer link"
            );
        }
        LinkKind::Transfer => {
            ensure!(
                matches!(from, Node::Aquifer(_)) != matches!(to, Node::Aquifer(_)),
                "Transfer links must join an aquifer to surface water"
            );
        }
    }

    match (link.kind, link.max_flow) {
        (LinkKind::Controlled, None) => bail!("Controlled channels must have a max_flow"),
        (LinkKind::Controlled, Some(max_flow)) => ensure!(
            max_flow.is_finite() && max_flow >= Volume::ZERO,
            "max_flow must be a finite, non-negative number"
        ),
        (_, Some(_)) => bail!("Only controlled channels can have a max_flow"),
        (_, None) => {}
    }

    Ok(())
}

/// Check no reservoir has more than one channel of each kind leaving it
fn check_outgoing_channels(graph: &BasinGraph) -> Result<()> {
    for index in graph.node_indices() {
        for kind in [LinkKind::Natural, LinkKind::Controlled] {
            let count = graph
                .edges_directed(index, Outgoing)
                .filter(|edge| edge.weight().kind == kind)
                .count();
            ensure!(
                count <= 1,
                "Reservoir {} has more than one {} channel leaving it",
                graph[index].id(),
                kind.prefix()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, basin, link, outlet, reservoir_with_index};
    use rstest::rstest;

    #[rstest]
    fn test_basin_queries(basin: Basin) {
        let upper = basin.get_node_index("Upper").unwrap();
        let lower = basin.get_node_index("Lower").unwrap();
        let outlet = basin.get_node_index("Outlet").unwrap();

        assert_eq!(basin.upstream(lower).collect_vec(), [upper]);
        assert_eq!(basin.downstream(upper).collect_vec(), [lower]);
        assert_eq!(basin.upstream_reservoirs(outlet).collect_vec(), [lower]);
        assert!(basin.get_node_index("Missing").is_err());
    }

    #[rstest]
    fn test_link_names(basin: Basin) {
        let upper = basin.get_node_index("Upper").unwrap();
        let lower = basin.get_node_index("Lower").unwrap();

        let link = basin.find_link("RS_2-1").unwrap();
        assert_eq!(link.kind, LinkKind::Natural);
        assert_eq!(basin.get_link(LinkKind::Natural, upper, lower), Some(link));
        assert!(basin.get_link(LinkKind::Controlled, upper, lower).is_none());
        assert_eq!(link_name(LinkKind::Transfer, 100, 1), "GW_100-1");
    }

    #[rstest]
    fn test_upstream_to_downstream(basin: Basin) {
        let order = basin
            .iter_upstream_to_downstream()
            .map(|index| basin.node(index).id().to_string())
            .collect_vec();
        assert_eq!(order, ["Upper", "Lower", "Outlet"]);
    }

    #[test]
    fn test_basin_cycle() {
        let nodes = vec![
            Node::Reservoir(reservoir_with_index("A", 1)),
            Node::Reservoir(reservoir_with_index("B", 2)),
        ];
        let links = vec![
            link(LinkKind::Natural, "A", "B"),
            link(LinkKind::Controlled, "B", "A"),
        ];
        assert!(Basin::new(nodes, links).is_err());
    }

    #[test]
    fn test_basin_unknown_node() {
        let nodes = vec![Node::Reservoir(reservoir_with_index("A", 1))];
        let links = vec![link(LinkKind::Natural, "A", "B")];
        assert_error!(Basin::new(nodes, links), "Link refers to unknown node B");
    }

    #[test]
    fn test_basin_duplicate_index() {
        let nodes = vec![
            Node::Reservoir(reservoir_with_index("A", 1)),
            Node::Reservoir(reservoir_with_index("B", 1)),
        ];
        assert_error!(
            Basin::new(nodes, Vec::new()),
            "Nodes A and B have the same basin index 1"
        );
    }

    #[rstest]
    #[case("regulator")]
    #[case("claimant")]
    #[case("basin_operator")]
    fn test_basin_reserved_node_id(#[case] id: &str) {
        let nodes = vec![Node::Reservoir(reservoir_with_index(id, 1))];
        assert_error!(
            Basin::new(nodes, Vec::new()),
            format!("Node ID {id} is reserved for a party to the treaty")
        );
    }

    #[test]
    fn test_basin_duplicate_link() {
        let nodes = vec![
            Node::Reservoir(reservoir_with_index("A", 1)),
            Node::Reservoir(reservoir_with_index("B", 2)),
        ];
        let links = vec![
            link(LinkKind::Natural, "A", "B"),
            link(LinkKind::Natural, "A", "B"),
        ];
        assert_error!(Basin::new(nodes, links), "Duplicate link RS_1-2");
    }

    #[test]
    fn test_basin_two_natural_channels() {
        let nodes = vec![
            Node::Reservoir(reservoir_with_index("A", 1)),
            Node::Reservoir(reservoir_with_index("B", 2)),
            Node::Outlet(outlet()),
        ];
        let links = vec![
            link(LinkKind::Natural, "A", "B"),
            link(LinkKind::Natural, "A", "Outlet"),
        ];
        assert_error!(
            Basin::new(nodes, links),
            "Reservoir A has more than one RS channel leaving it"
        );
    }

    #[rstest]
    #[case(LinkKind::Controlled, 0.5, None, "Controlled channels must have a max_flow")]
    #[case(LinkKind::Natural, 0.5, Some(1.0), "Only controlled channels can have a max_flow")]
    #[case(LinkKind::Natural, 0.0, None, "Yield must be greater than 0 and at most 1")]
    #[case(LinkKind::Natural, 1.5, None, "Yield must be greater than 0 and at most 1")]
    #[case(LinkKind::Transfer, 1.0, None, "Transfer links must join an aquifer to surface water")]
    fn test_check_link(
        #[case] kind: LinkKind,
        #[case] link_yield: f64,
        #[case] max_flow: Option<f64>,
        #[case] msg: &str,
    ) {
        let nodes = vec![
            Node::Reservoir(reservoir_with_index("A", 1)),
            Node::Reservoir(reservoir_with_index("B", 2)),
        ];
        let definition = LinkDefinition {
            link_yield: Dimensionless(link_yield),
            max_flow: max_flow.map(Volume),
            ..link(kind, "A", "B")
        };
        let result = Basin::new(nodes, vec![definition]);
        let err = result.unwrap_err();
        assert_eq!(err.chain().last().unwrap().to_string(), msg);
    }

    #[rstest]
    fn test_set_link_flow(mut basin: Basin) {
        let upper = basin.get_node_index("Upper").unwrap();
        let lower = basin.get_node_index("Lower").unwrap();

        basin
            .set_link_flow(LinkKind::Natural, upper, lower, Volume(3.0))
            .unwrap();
        assert_eq!(basin.find_link("RS_2-1").unwrap().flow, Volume(3.0));
        assert!(
            basin
                .set_link_flow(LinkKind::Controlled, upper, lower, Volume(1.0))
                .is_err()
        );

        basin.reset_link_flows();
        assert_eq!(basin.find_link("RS_2-1").unwrap().flow, Volume::ZERO);
    }
}
