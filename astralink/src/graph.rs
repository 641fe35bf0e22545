use hashbrown::HashMap;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::spot::SpotId;

/// Undirected simple graph of linked spots, one weighted edge per linked pair.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    graph: UnGraph<SpotId, f64>,
    node_index: HashMap<SpotId, NodeIndex>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `spot` unless present; returns its node either way.
    pub fn add_vertex(&mut self, spot: SpotId) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&spot) {
            return idx;
        }
        let idx = self.graph.add_node(spot);
        self.node_index.insert(spot, idx);
        idx
    }

    pub fn contains_vertex(&self, spot: SpotId) -> bool {
        self.node_index.contains_key(&spot)
    }

    /// Links two spots already added as vertices. Returns `None` without
    /// touching the graph when the pair is already linked (in either order),
    /// when `source == target` or when a vertex is missing.
    pub fn add_edge(&mut self, source: SpotId, target: SpotId, weight: f64) -> Option<EdgeIndex> {
        if source == target {
            return None;
        }
        let a = *self.node_index.get(&source)?;
        let b = *self.node_index.get(&target)?;
        if self.graph.find_edge(a, b).is_some() {
            return None;
        }
        Some(self.graph.add_edge(a, b, weight))
    }

    pub fn edge_weight(&self, source: SpotId, target: SpotId) -> Option<f64> {
        let a = *self.node_index.get(&source)?;
        let b = *self.node_index.get(&target)?;
        let edge = self.graph.find_edge(a, b)?;
        self.graph.edge_weight(edge).copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertices(&self) -> impl Iterator<Item = SpotId> + '_ {
        self.graph.node_indices().map(|idx| self.graph[idx])
    }

    /// Edges as `(source, target, weight)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (SpotId, SpotId, f64)> + '_ {
        self.graph
            .edge_references()
            .map(|edge| (self.graph[edge.source()], self.graph[edge.target()], *edge.weight()))
    }

    /// Spots linked to `spot`.
    pub fn neighbors(&self, spot: SpotId) -> Vec<SpotId> {
        self.node_index
            .get(&spot)
            .map(|&idx| self.graph.neighbors(idx).map(|n| self.graph[n]).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_and_repeated_edges_are_ignored() {
        let (a, b, c) = (SpotId::unique(), SpotId::unique(), SpotId::unique());
        let mut graph = LinkGraph::new();
        for spot in [a, b, c] {
            graph.add_vertex(spot);
        }

        assert!(graph.add_edge(a, b, 0.9).is_some());
        assert!(graph.add_edge(a, b, 0.1).is_none());
        assert!(graph.add_edge(b, a, 0.2).is_none());
        assert!(graph.add_edge(c, c, 1.0).is_none());
        assert!(graph.add_edge(b, c, 0.5).is_some());

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edge_weight(b, a), Some(0.9));
        assert_eq!(graph.edges().collect::<Vec<_>>(), [(a, b, 0.9), (b, c, 0.5)]);
        assert_eq!(graph.neighbors(b).len(), 2);
    }

    #[test]
    fn vertices_are_added_once() {
        let a = SpotId::unique();
        let mut graph = LinkGraph::new();
        let first = graph.add_vertex(a);
        assert_eq!(graph.add_vertex(a), first);
        assert_eq!(graph.vertex_count(), 1);
        assert!(graph.contains_vertex(a));
        assert!(graph.add_edge(a, SpotId::unique(), 1.0).is_none());
        assert!(graph.neighbors(SpotId::unique()).is_empty());
    }
}
