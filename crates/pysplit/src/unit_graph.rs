//! Import graph between generated units
//!
//! Units import each other through sibling imports. A cycle means one of the files will
//! see a partially initialized module when the package is imported, so cycles are
//! reported as warnings.

use log::debug;
use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::FxHashMap;

use crate::partitioner::OutputUnit;

/// Directed graph of sibling imports, edges point from importer to imported unit
#[derive(Debug)]
pub struct UnitGraph {
    graph: DiGraph<String, ()>,
}

impl UnitGraph {
    pub fn from_units(units: &[OutputUnit]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map: FxHashMap<&str, NodeIndex> = FxHashMap::default();

        for unit in units {
            let node = graph.add_node(unit.module_name.clone());
            node_map.insert(unit.module_name.as_str(), node);
        }
        for unit in units {
            let from = node_map[unit.module_name.as_str()];
            for target in unit.sibling_imports.keys() {
                if let Some(&to) = node_map.get(target.as_str()) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        debug!(
            "Unit graph has {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Self { graph }
    }

    /// Groups of units that import each other, each group in source order
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&node| self.graph.contains_edge(node, node))
            })
            .map(|mut component| {
                component.sort_unstable();
                component
                    .into_iter()
                    .map(|node| self.graph[node].clone())
                    .collect()
            })
            .collect();
        cycles.sort();
        cycles
    }
}
