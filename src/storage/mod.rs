//! Storage backends
//!
//! The graph store is reached only through the `GraphStore` trait. The
//! bundled implementation is `SqliteStore`, which also keeps the ingestion-run
//! audit trail (`RunStore`).

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{
    GraphStore, NodeFilter, OpenStore, RejectedEdge, RunStore, StorageError, StorageResult,
    UpsertResult,
};
