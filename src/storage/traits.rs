//! Storage trait definitions

use crate::graph::{Citation, Edge, Framework, Node, NodeKey, NodeKind, Relation, UnknownTag};
use crate::ingest::IngestionRun;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Stored value out of vocabulary: {0}")]
    Vocabulary(#[from] UnknownTag),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Storage task failed: {0}")]
    Task(String),
}

impl StorageError {
    /// Whether retrying the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_) | Self::Unavailable(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Filter criteria for querying nodes
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub framework: Option<Framework>,
    /// Match any of these kinds (empty = all kinds)
    pub kinds: Vec<NodeKind>,
    pub external_id: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_framework(mut self, framework: Framework) -> Self {
        self.framework = Some(framework);
        self
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// An edge the store refused because an endpoint does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEdge {
    pub edge: Edge,
    pub missing: NodeKey,
}

/// Outcome of one committed batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertResult {
    /// Nodes written (created or overwritten)
    pub nodes_written: usize,
    /// Subset of `nodes_written` whose identity key was new
    pub nodes_created: usize,
    /// Edges written (duplicates merge and still count once)
    pub edges_written: usize,
    /// Edges refused for a missing endpoint
    pub rejected: Vec<RejectedEdge>,
}

impl UpsertResult {
    pub fn is_fully_committed(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Trait for graph storage backends
///
/// Implementations must be thread-safe (Send + Sync) to support concurrent
/// ingestion runs and queries.
pub trait GraphStore: Send + Sync {
    // === Writes ===

    /// Merge one batch in a single transaction.
    ///
    /// Nodes match on identity key: absent keys are created, present keys have
    /// name, description, properties and citation overwritten. Edges match on
    /// `(relation, source, target)`; an edge whose endpoint is missing after the
    /// batch's nodes are applied is rejected and reported. Any `Err` means the
    /// whole transaction rolled back.
    fn upsert_batch(&self, nodes: &[Node], edges: &[Edge]) -> StorageResult<UpsertResult>;

    // === Node reads ===

    fn load_node(&self, key: &NodeKey) -> StorageResult<Option<Node>>;

    /// Nodes matching the filter, ordered by framework, kind, external id.
    fn find_nodes(&self, filter: &NodeFilter) -> StorageResult<Vec<Node>>;

    /// Nodes where any term occurs (case-insensitively) in the external id,
    /// name or description.
    fn search_nodes(&self, terms: &[String], filter: &NodeFilter) -> StorageResult<Vec<Node>>;

    /// All citations recorded for a node, most recent first, one per document.
    fn citations(&self, key: &NodeKey) -> StorageResult<Vec<Citation>>;

    // === Edge reads ===

    /// Edges with `key` as source or target, optionally restricted to one relation.
    fn edges_touching(&self, key: &NodeKey, relation: Option<Relation>) -> StorageResult<Vec<Edge>>;

    // === Statistics ===

    fn node_count(&self) -> StorageResult<usize>;

    fn edge_count(&self) -> StorageResult<usize>;

    fn node_counts_by_kind(&self) -> StorageResult<Vec<(Framework, NodeKind, usize)>>;

    fn edge_counts_by_relation(&self) -> StorageResult<Vec<(Relation, usize)>>;
}

/// Durable audit trail of ingestion runs.
pub trait RunStore: Send + Sync {
    /// Persist a run that has reached a terminal status.
    fn save_run(&self, run: &IngestionRun) -> StorageResult<()>;

    /// Runs, newest first, optionally for one framework.
    fn list_runs(&self, framework: Option<Framework>) -> StorageResult<Vec<IngestionRun>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
