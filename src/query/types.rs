//! Query types and result structures

use crate::graph::{Citation, Edge, Node, NodeKey};
use crate::storage::{GraphStore, StorageResult};
use serde::Serialize;

/// Direction for edge traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Follow outgoing edges (source -> target)
    Outgoing,
    /// Follow incoming edges (target <- source)
    Incoming,
    /// Follow edges in both directions
    #[default]
    Both,
}

/// A node together with every citation recorded for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub node: Node,
    /// Most recent first, one per source document
    pub citations: Vec<Citation>,
}

impl Hit {
    /// Attach the node's recorded citations.
    pub fn load(store: &dyn GraphStore, node: Node) -> StorageResult<Self> {
        let mut citations = store.citations(&node.key)?;
        if citations.is_empty() {
            citations.extend(node.citation.clone());
        }
        Ok(Self { node, citations })
    }

    pub fn load_all(store: &dyn GraphStore, nodes: Vec<Node>) -> StorageResult<Vec<Self>> {
        nodes.into_iter().map(|node| Self::load(store, node)).collect()
    }

    pub fn key(&self) -> &NodeKey {
        &self.node.key
    }
}

/// Result of a lookup query
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub hits: Vec<Hit>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_hits(hits: Vec<Hit>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn keys(&self) -> Vec<&NodeKey> {
        self.hits.iter().map(Hit::key).collect()
    }
}

/// Result of a neighborhood traversal
#[derive(Debug, Clone, Serialize)]
pub struct NeighborhoodResult {
    pub origin: NodeKey,
    /// Level 0 = origin, level 1 = immediate neighbors, etc.
    /// Empty when the origin does not exist.
    pub levels: Vec<Vec<Hit>>,
    /// Edges traversed, each once
    pub edges: Vec<Edge>,
}

impl NeighborhoodResult {
    pub fn new(origin: NodeKey) -> Self {
        Self {
            origin,
            levels: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// All discovered nodes, excluding the origin
    pub fn neighbors(&self) -> Vec<&Hit> {
        self.levels.iter().skip(1).flatten().collect()
    }

    pub fn at_depth(&self, depth: usize) -> &[Hit] {
        self.levels.get(depth).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn max_depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }
}

/// A node reached over a MAPS_TO edge.
#[derive(Debug, Clone, Serialize)]
pub struct MappingHit {
    pub hit: Hit,
    pub confidence: f64,
    pub evidence: Option<String>,
    /// `Outgoing` when the origin is the mapping's source
    pub direction: Direction,
}
