//! Graph statistics

use crate::graph::{Framework, NodeKind, Relation};
use crate::storage::{GraphStore, StorageResult};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindCount {
    pub framework: Framework,
    pub kind: NodeKind,
    pub count: usize,
}

/// Node and edge totals, broken down by framework, kind and relation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub nodes_by_framework: BTreeMap<Framework, usize>,
    pub nodes_by_kind: Vec<KindCount>,
    pub edges_by_relation: BTreeMap<Relation, usize>,
}

impl GraphStats {
    pub fn collect(store: &dyn GraphStore) -> StorageResult<Self> {
        let mut stats = Self {
            nodes: store.node_count()?,
            edges: store.edge_count()?,
            ..Default::default()
        };
        for (framework, kind, count) in store.node_counts_by_kind()? {
            *stats.nodes_by_framework.entry(framework).or_default() += count;
            stats.nodes_by_kind.push(KindCount {
                framework,
                kind,
                count,
            });
        }
        stats.edges_by_relation = store.edge_counts_by_relation()?.into_iter().collect();
        Ok(stats)
    }

    /// Nodes ingested for one framework (0 when never ingested).
    pub fn framework_nodes(&self, framework: Framework) -> usize {
        self.nodes_by_framework.get(&framework).copied().unwrap_or(0)
    }
}
