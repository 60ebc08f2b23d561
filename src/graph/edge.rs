//! Edge representation with confidence and evidence

use super::framework::Relation;
use super::node::NodeKey;
use serde::{Deserialize, Serialize};

/// Identity of an edge: duplicate `(relation, source, target)` triples merge.
pub type EdgeKey = (Relation, NodeKey, NodeKey);

/// A directed relationship between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub relation: Relation,
    pub source: NodeKey,
    pub target: NodeKey,
    /// 1.0 for source-asserted edges, below 1.0 for inferred mappings
    pub confidence: f64,
    /// Match basis; required when confidence is below 1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Edge {
    /// An edge stated directly by the source data.
    pub fn asserted(relation: Relation, source: NodeKey, target: NodeKey) -> Self {
        Self {
            relation,
            source,
            target,
            confidence: 1.0,
            evidence: None,
        }
    }

    /// A MAPS_TO edge computed by the cross-framework resolver.
    pub fn mapping(
        source: NodeKey,
        target: NodeKey,
        confidence: f64,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            relation: Relation::MapsTo,
            source,
            target,
            confidence,
            evidence: Some(evidence.into()),
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    pub fn key(&self) -> EdgeKey {
        (self.relation, self.source.clone(), self.target.clone())
    }

    pub fn is_inferred(&self) -> bool {
        self.confidence < 1.0
    }

    /// The endpoint opposite `key`, if `key` is one of this edge's endpoints.
    pub fn other_end(&self, key: &NodeKey) -> Option<&NodeKey> {
        if &self.source == key {
            Some(&self.target)
        } else if &self.target == key {
            Some(&self.source)
        } else {
            None
        }
    }
}
