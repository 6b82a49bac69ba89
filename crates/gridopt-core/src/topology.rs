//! Topological analysis of the bus/branch graph.
//!
//! The OPF formulation assumes every bus can exchange power with the slack
//! bus; an electrically islanded bus makes the balance equations infeasible
//! in a way that only shows up as solver nonconvergence. Checking component
//! counts up front turns that into an early diagnostic.

use crate::{BranchId, BusId, Network};
use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;

/// Build the undirected bus/branch incidence graph for a network.
///
/// Node weights are bus ids, edge weights branch ids, so callers can map
/// petgraph indices back to network elements.
pub fn bus_graph(network: &Network) -> UnGraph<BusId, BranchId> {
    let mut graph = UnGraph::new_undirected();
    let nodes: Vec<_> = network
        .buses
        .iter()
        .map(|bus| graph.add_node(bus.id))
        .collect();
    for branch in &network.branches {
        graph.add_edge(
            nodes[branch.from_bus.value()],
            nodes[branch.to_bus.value()],
            branch.id,
        );
    }
    graph
}

/// Number of electrical islands (connected components) in the network.
///
/// A network without buses has zero islands; a healthy transmission case
/// has exactly one.
pub fn island_count(network: &Network) -> usize {
    if network.buses.is_empty() {
        return 0;
    }
    connected_components(&bus_graph(network))
}

/// True when every bus is reachable from every other bus.
pub fn is_connected(network: &Network) -> bool {
    island_count(network) <= 1
}
