//! Ingestion pipeline
//!
//! Fetch, adapt, normalize and upsert one framework per run, with the run
//! registry as the audit trail and per-framework gates serializing writers.

mod engine;
mod gates;
mod gateway;
mod registry;
mod run;

pub use engine::{IngestionEngine, RunOptions, SourceBinding, DEFAULT_BATCH_SIZE};
pub use gates::IngestionGates;
pub use gateway::{RetryPolicy, UpsertError, UpsertGateway};
pub use registry::{RegistryError, RunRegistry};
pub use run::{IngestionRun, RunId, RunStatus, SkipCounter, SkipReason, SkipStage, MAX_SKIP_REASONS};
