//! Lookup queries: by identifier, by category, by keyword

use super::types::{Hit, QueryResult};
use crate::graph::{Framework, NodeKind};
use crate::storage::{GraphStore, NodeFilter, StorageResult};

/// Find nodes by framework-native identifier.
///
/// Without a framework the lookup spans all of them; identifiers shared by
/// several frameworks return every match.
#[derive(Debug, Clone)]
pub struct IdentifierQuery {
    pub external_id: String,
    pub framework: Option<Framework>,
    pub kind: Option<NodeKind>,
}

impl IdentifierQuery {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            framework: None,
            kind: None,
        }
    }

    pub fn in_framework(mut self, framework: Framework) -> Self {
        self.framework = Some(framework);
        self
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn execute(&self, store: &dyn GraphStore) -> StorageResult<QueryResult> {
        let external_id = self.external_id.trim();
        if external_id.is_empty() {
            return Ok(QueryResult::empty());
        }
        let mut filter = NodeFilter::new().with_external_id(external_id);
        if let Some(framework) = self.framework {
            filter = filter.in_framework(framework);
        }
        if let Some(kind) = self.kind {
            filter = filter.with_kind(kind);
        }
        let nodes = store.find_nodes(&filter)?;
        Ok(QueryResult::from_hits(Hit::load_all(store, nodes)?))
    }
}

/// All nodes of one kind in one framework, ordered by external id.
#[derive(Debug, Clone)]
pub struct CategoryQuery {
    pub framework: Framework,
    pub kind: NodeKind,
    pub limit: Option<usize>,
}

impl CategoryQuery {
    pub fn new(framework: Framework, kind: NodeKind) -> Self {
        Self {
            framework,
            kind,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn execute(&self, store: &dyn GraphStore) -> StorageResult<QueryResult> {
        let mut filter = NodeFilter::new()
            .in_framework(self.framework)
            .with_kind(self.kind);
        if let Some(limit) = self.limit {
            filter = filter.with_limit(limit);
        }
        let nodes = store.find_nodes(&filter)?;
        Ok(QueryResult::from_hits(Hit::load_all(store, nodes)?))
    }
}

/// Case-insensitive keyword search over identifier, name and description.
/// A node matches when any keyword occurs.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    /// Empty = every framework
    pub frameworks: Vec<Framework>,
    /// Empty = every kind
    pub kinds: Vec<NodeKind>,
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(terms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Split a free-text phrase into keywords.
    pub fn phrase(text: &str) -> Self {
        Self::new(text.split_whitespace())
    }

    pub fn in_framework(mut self, framework: Framework) -> Self {
        self.frameworks.push(framework);
        self
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn execute(&self, store: &dyn GraphStore) -> StorageResult<QueryResult> {
        let terms: Vec<String> = self
            .terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return Ok(QueryResult::empty());
        }

        let mut base = NodeFilter::new().with_kinds(self.kinds.iter().copied());
        if let Some(limit) = self.limit {
            base = base.with_limit(limit);
        }

        let mut nodes = if self.frameworks.is_empty() {
            store.search_nodes(&terms, &base)?
        } else {
            let mut merged = Vec::new();
            for framework in &self.frameworks {
                merged.extend(store.search_nodes(&terms, &base.clone().in_framework(*framework))?);
            }
            merged.sort_by(|a, b| a.key.cmp(&b.key));
            merged.dedup_by(|a, b| a.key == b.key);
            merged
        };
        if let Some(limit) = self.limit {
            nodes.truncate(limit);
        }

        Ok(QueryResult::from_hits(Hit::load_all(store, nodes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Citation, Node, NodeKey};
    use crate::storage::{OpenStore, SqliteStore};

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let nodes = vec![
            Node::new(NodeKey::new(Framework::ThreatModel, NodeKind::Technique, "T1055"), "Process Injection")
                .with_description("Adversaries may inject code into processes.")
                .with_citation(Citation::new("enterprise-attack", "attack-pattern--43e7dc91", "inject")),
            Node::new(NodeKey::new(Framework::ThreatModel, NodeKind::Technique, "T1003"), "OS Credential Dumping"),
            Node::new(NodeKey::new(Framework::ControlsCatalog, NodeKind::Control, "AC-1"), "Policy and Procedures")
                .with_citation(Citation::new("nist-800-53", "page 4", "Control AC-1")),
            Node::new(NodeKey::new(Framework::ControlsCatalog, NodeKind::Control, "AC-2"), "Account Management")
                .with_citation(Citation::new("nist-800-53", "page 5", "Control AC-2")),
            Node::new(NodeKey::new(Framework::PaymentSecurity, NodeKind::Requirement, "1"), "Network Security Controls")
                .with_citation(Citation::new("pci-dss", "page 2", "Requirement 1")),
            Node::new(NodeKey::new(Framework::FinancialExam, NodeKind::Requirement, "1"), "Board oversight")
                .with_citation(Citation::new("ffiec", "page 9", "Objective 1")),
        ];
        store.upsert_batch(&nodes, &[]).unwrap();
        store
    }

    #[test]
    fn identifier_lookup_returns_single_hit_with_citation() {
        let store = store();
        let result = IdentifierQuery::new("T1055").execute(&store).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.hits[0].node.name, "Process Injection");
        assert_eq!(result.hits[0].citations[0].document_id, "enterprise-attack");
    }

    #[test]
    fn ambiguous_identifier_returns_every_framework() {
        let store = store();
        let result = IdentifierQuery::new("1").execute(&store).unwrap();
        assert_eq!(result.len(), 2);

        let scoped = IdentifierQuery::new("1")
            .in_framework(Framework::PaymentSecurity)
            .execute(&store)
            .unwrap();
        assert_eq!(scoped.len(), 1);
    }

    #[test]
    fn unknown_identifier_is_empty_not_error() {
        let store = store();
        assert!(IdentifierQuery::new("T9999").execute(&store).unwrap().is_empty());
        assert!(IdentifierQuery::new("  ").execute(&store).unwrap().is_empty());
    }

    #[test]
    fn category_is_ordered_by_external_id() {
        let store = store();
        let result = CategoryQuery::new(Framework::ThreatModel, NodeKind::Technique)
            .execute(&store)
            .unwrap();
        let ids: Vec<_> = result.hits.iter().map(|h| h.node.external_id()).collect();
        assert_eq!(ids, vec!["T1003", "T1055"]);
    }

    #[test]
    fn category_of_empty_framework_is_empty() {
        let store = store();
        let result = CategoryQuery::new(Framework::HealthPrivacy, NodeKind::Section)
            .execute(&store)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn search_matches_any_keyword_case_insensitively() {
        let store = store();
        let result = SearchQuery::phrase("INJECTION account").execute(&store).unwrap();
        let ids: Vec<_> = result.hits.iter().map(|h| h.node.external_id()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"T1055"));
        assert!(ids.contains(&"AC-2"));
    }

    #[test]
    fn search_respects_framework_and_limit() {
        let store = store();
        let result = SearchQuery::phrase("a")
            .in_framework(Framework::ControlsCatalog)
            .limit(1)
            .execute(&store)
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.hits[0].node.framework(), Framework::ControlsCatalog);
    }
}
