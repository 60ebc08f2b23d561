//! Cyberweave: a citation-backed knowledge graph of security frameworks
//!
//! Ingests six threat and compliance frameworks into one canonical graph,
//! infers cross-framework mappings and answers lookups with their sources.
//!
//! # Core Concepts
//!
//! - **Nodes**: framework units (techniques, controls, requirements, ...) keyed
//!   by `(framework, kind, external_id)`, each with its citation
//! - **Edges**: typed relations; source-asserted edges have confidence 1.0,
//!   inferred `MAPS_TO` edges carry a score and evidence
//! - **Ingestion runs**: the audit record of each fetch-parse-upsert pass
//!
//! # Example
//!
//! ```
//! use cyberweave::{Framework, NodeKey, NodeKind};
//!
//! let key = NodeKey::new(Framework::ThreatModel, NodeKind::Technique, "T1055");
//! assert_eq!(key.to_string(), "THREAT_MODEL/Technique/T1055");
//! ```

pub mod adapter;
pub mod api;
pub mod config;
mod graph;
pub mod ingest;
pub mod normalize;
pub mod query;
pub mod resolve;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use api::WeaveApi;
pub use config::{Config, ConfigError};
pub use graph::{
    Citation, Edge, EdgeKey, Framework, Node, NodeKey, NodeKind, Properties, PropertyValue,
    Relation, UnknownTag, EXCERPT_LIMIT,
};
pub use ingest::{IngestionEngine, IngestionRun, RunOptions, RunRegistry, RunStatus};
pub use query::{
    CategoryQuery, CrossFrameworkQuery, Direction, GraphStats, Hit, IdentifierQuery,
    NeighborhoodQuery, QueryResult, SearchQuery,
};
pub use resolve::{Resolver, ResolverConfig};
pub use storage::{GraphStore, OpenStore, RunStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
