//! Cross-framework mapping lookup

use super::types::{Direction, Hit, MappingHit};
use crate::graph::{Framework, NodeKey, Relation};
use crate::storage::{GraphStore, StorageResult};
use std::collections::HashMap;

/// Nodes in other frameworks connected to `origin` by MAPS_TO, in either
/// direction. Strongest mappings first; a node mapped both ways appears
/// once, with its strongest edge.
#[derive(Debug, Clone)]
pub struct CrossFrameworkQuery {
    pub origin: NodeKey,
    pub framework: Option<Framework>,
    pub min_confidence: Option<f64>,
}

impl CrossFrameworkQuery {
    pub fn from(origin: NodeKey) -> Self {
        Self {
            origin,
            framework: None,
            min_confidence: None,
        }
    }

    /// Only mappings into this framework.
    pub fn into_framework(mut self, framework: Framework) -> Self {
        self.framework = Some(framework);
        self
    }

    pub fn min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = Some(confidence);
        self
    }

    pub fn execute(&self, store: &dyn GraphStore) -> StorageResult<Vec<MappingHit>> {
        let mut best: HashMap<NodeKey, MappingHit> = HashMap::new();
        for edge in store.edges_touching(&self.origin, Some(Relation::MapsTo))? {
            if self.min_confidence.is_some_and(|min| edge.confidence < min) {
                continue;
            }
            let (other, direction) = if edge.source == self.origin {
                (&edge.target, Direction::Outgoing)
            } else {
                (&edge.source, Direction::Incoming)
            };
            if self.framework.is_some_and(|f| other.framework != f) {
                continue;
            }
            if best
                .get(other)
                .is_some_and(|kept| kept.confidence >= edge.confidence)
            {
                continue;
            }
            let Some(node) = store.load_node(other)? else {
                continue;
            };
            best.insert(
                other.clone(),
                MappingHit {
                    hit: Hit::load(store, node)?,
                    confidence: edge.confidence,
                    evidence: edge.evidence.clone(),
                    direction,
                },
            );
        }

        let mut hits: Vec<MappingHit> = best.into_values().collect();
        hits.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.hit.key().cmp(b.hit.key()))
        });
        Ok(hits)
    }
}
