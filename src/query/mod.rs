//! Read-only queries over the knowledge graph
//!
//! Every lookup returns nodes together with their citations. Frameworks that
//! were never ingested give empty results, never errors.

mod find;
mod mapping;
mod stats;
mod traverse;
mod types;

pub use find::{CategoryQuery, IdentifierQuery, SearchQuery};
pub use mapping::CrossFrameworkQuery;
pub use stats::{GraphStats, KindCount};
pub use traverse::NeighborhoodQuery;
pub use types::{Direction, Hit, MappingHit, NeighborhoodResult, QueryResult};
