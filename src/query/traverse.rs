//! Neighborhood traversal

use super::types::{Direction, Hit, NeighborhoodResult};
use crate::graph::{Edge, EdgeKey, NodeKey, Relation};
use crate::storage::{GraphStore, StorageResult};
use std::collections::HashSet;

/// Breadth-first expansion from one node.
#[derive(Debug, Clone)]
pub struct NeighborhoodQuery {
    pub origin: NodeKey,
    /// Maximum depth (0 = origin only, 1 = immediate neighbors, etc.)
    pub hops: usize,
    pub direction: Direction,
    /// Only follow edges of this relation
    pub relation: Option<Relation>,
}

impl NeighborhoodQuery {
    /// One hop, both directions, every relation.
    pub fn from(origin: NodeKey) -> Self {
        Self {
            origin,
            hops: 1,
            direction: Direction::Both,
            relation: None,
        }
    }

    pub fn hops(mut self, hops: usize) -> Self {
        self.hops = hops;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relation = Some(relation);
        self
    }

    pub fn execute(&self, store: &dyn GraphStore) -> StorageResult<NeighborhoodResult> {
        let mut result = NeighborhoodResult::new(self.origin.clone());

        let Some(origin) = store.load_node(&self.origin)? else {
            return Ok(result);
        };
        result.levels.push(vec![Hit::load(store, origin)?]);

        let mut visited: HashSet<NodeKey> = HashSet::new();
        let mut seen_edges: HashSet<EdgeKey> = HashSet::new();
        let mut current_level = vec![self.origin.clone()];
        visited.insert(self.origin.clone());

        for _depth in 0..self.hops {
            if current_level.is_empty() {
                break;
            }

            let mut next_level = Vec::new();
            let mut level_hits = Vec::new();

            for key in &current_level {
                for edge in store.edges_touching(key, self.relation)? {
                    let Some(neighbor) = self.follow(&edge, key) else {
                        continue;
                    };
                    let neighbor = neighbor.clone();

                    if !visited.contains(&neighbor) {
                        let Some(node) = store.load_node(&neighbor)? else {
                            continue;
                        };
                        visited.insert(neighbor.clone());
                        next_level.push(neighbor);
                        level_hits.push(Hit::load(store, node)?);
                    }
                    if seen_edges.insert(edge.key()) {
                        result.edges.push(edge);
                    }
                }
            }

            if !level_hits.is_empty() {
                result.levels.push(level_hits);
            }
            current_level = next_level;
        }

        Ok(result)
    }

    /// The neighbor across `edge` from `key`, if the direction allows it.
    fn follow<'a>(&self, edge: &'a Edge, key: &NodeKey) -> Option<&'a NodeKey> {
        match self.direction {
            Direction::Outgoing if &edge.source == key => Some(&edge.target),
            Direction::Incoming if &edge.target == key => Some(&edge.source),
            Direction::Both => edge.other_end(key),
            _ => None,
        }
    }
}
