//! Typed knowledge graph stored as one edge list in `knowledge/graph.json`.
//!
//! [`KnowledgeStore::add_edge`] deduplicates on the edge key;
//! [`KnowledgeStore::add_edges_bulk`] does not, and expects trusted batch
//! producers to pre-deduplicate.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use super::types::{Edge, EdgeKey, NewEdge, NodeRef};
use super::{atomic, now, KnowledgeStore};
use crate::error::StoreResult;

pub const DEFAULT_TRAVERSE_DEPTH: usize = 2;
pub const MAX_TRAVERSE_DEPTH: usize = 5;

#[derive(Debug, Default, Serialize, Deserialize)]
struct GraphDocument {
    #[serde(default)]
    edges: Vec<Edge>,
}

/// Result returned from [`KnowledgeStore::add_edge`].
#[derive(Debug, Clone, Serialize)]
pub struct EdgeInsert {
    pub edge: Edge,
    /// `true` if this exact edge already existed and nothing was written.
    pub deduplicated: bool,
}

impl KnowledgeStore {
    /// Idempotent single-edge insert.
    pub fn add_edge(&self, new: NewEdge) -> StoreResult<EdgeInsert> {
        let _guard = self.write_guard()?;
        let path = self.layout.graph();
        let mut graph: GraphDocument = atomic::read_json(&path)?;

        let key = new.key();
        if let Some(existing) = graph.edges.iter().find(|e| e.key() == key) {
            return Ok(EdgeInsert {
                edge: existing.clone(),
                deduplicated: true,
            });
        }

        let edge = into_edge(new, now());
        graph.edges.push(edge.clone());
        atomic::write_json(&path, &graph)?;

        tracing::debug!(
            from = %edge.from_id,
            relation = %edge.relation,
            to = %edge.to_id,
            "edge added"
        );
        Ok(EdgeInsert {
            edge,
            deduplicated: false,
        })
    }

    /// Unchecked bulk append for trusted producers. Returns the number of
    /// edges written; duplicates are stored as given.
    pub fn add_edges_bulk(&self, edges: Vec<NewEdge>) -> StoreResult<usize> {
        if edges.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_guard()?;
        let path = self.layout.graph();
        let mut graph: GraphDocument = atomic::read_json(&path)?;

        let timestamp = now();
        let count = edges.len();
        graph
            .edges
            .extend(edges.into_iter().map(|e| into_edge(e, timestamp.clone())));
        atomic::write_json(&path, &graph)?;

        tracing::info!(count, "edges bulk-added");
        Ok(count)
    }

    pub fn edges(&self) -> StoreResult<Vec<Edge>> {
        let _guard = self.read_guard()?;
        let graph: GraphDocument = atomic::read_json(&self.layout.graph())?;
        Ok(graph.edges)
    }

    /// Edges with `node` on either end.
    pub fn edges_for(&self, node: &NodeRef) -> StoreResult<Vec<Edge>> {
        Ok(self
            .edges()?
            .into_iter()
            .filter(|e| e.touches(node))
            .collect())
    }

    /// Breadth-first walk from `start`, treating edges as undirected.
    ///
    /// `max_depth` defaults to 2 and is clamped into `1..=5`. Returns every
    /// distinct edge touched within that many hops, in discovery order.
    pub fn traverse(&self, start: &NodeRef, max_depth: Option<usize>) -> StoreResult<Vec<Edge>> {
        let depth = max_depth
            .unwrap_or(DEFAULT_TRAVERSE_DEPTH)
            .clamp(1, MAX_TRAVERSE_DEPTH);
        let edges = self.edges()?;
        Ok(walk(&edges, start, depth))
    }
}

fn into_edge(new: NewEdge, created_at: String) -> Edge {
    Edge {
        from_type: new.from.kind,
        from_id: new.from.id,
        to_type: new.to.kind,
        to_id: new.to.id,
        relation: new.relation,
        created_at,
    }
}

fn walk(edges: &[Edge], start: &NodeRef, depth: usize) -> Vec<Edge> {
    let mut adjacency: HashMap<NodeRef, Vec<usize>> = HashMap::new();
    for (idx, edge) in edges.iter().enumerate() {
        adjacency.entry(edge.from_node()).or_default().push(idx);
        adjacency.entry(edge.to_node()).or_default().push(idx);
    }

    let mut visited: HashSet<NodeRef> = HashSet::from([start.clone()]);
    let mut seen: HashSet<EdgeKey> = HashSet::new();
    let mut queue: VecDeque<(NodeRef, usize)> = VecDeque::from([(start.clone(), 0)]);
    let mut touched = Vec::new();

    while let Some((node, hops)) = queue.pop_front() {
        if hops >= depth {
            continue;
        }
        let Some(incident) = adjacency.get(&node) else {
            continue;
        };
        for &idx in incident {
            let edge = &edges[idx];
            if seen.insert(edge.key()) {
                touched.push(edge.clone());
            }
            let from = edge.from_node();
            let other = if from == node { edge.to_node() } else { from };
            if visited.insert(other.clone()) {
                queue.push_back((other, hops + 1));
            }
        }
    }
    touched
}
