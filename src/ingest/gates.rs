//! Per-framework ingestion gates
//!
//! An ingestion run holds its framework's gate exclusively; the resolver holds
//! the gates of both frameworks it compares in shared mode, so it never reads
//! a half-ingested framework. Queries take no gate.

use crate::graph::Framework;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

#[derive(Clone)]
pub struct IngestionGates {
    gates: Arc<HashMap<Framework, Arc<RwLock<()>>>>,
}

impl IngestionGates {
    pub fn new() -> Self {
        let gates = Framework::ALL
            .iter()
            .map(|f| (*f, Arc::new(RwLock::new(()))))
            .collect();
        Self {
            gates: Arc::new(gates),
        }
    }

    fn gate(&self, framework: Framework) -> Arc<RwLock<()>> {
        // Every framework gets a gate at construction.
        self.gates[&framework].clone()
    }

    /// Wait for exclusive access while a framework is being ingested.
    pub async fn ingest(&self, framework: Framework) -> OwnedRwLockWriteGuard<()> {
        self.gate(framework).write_owned().await
    }

    /// Wait until no ingestion is running for any of `frameworks`.
    ///
    /// Guards are acquired in framework order so concurrent readers and
    /// writers cannot deadlock.
    pub async fn settled(&self, frameworks: &[Framework]) -> Vec<OwnedRwLockReadGuard<()>> {
        let mut ordered = frameworks.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for framework in ordered {
            guards.push(self.gate(framework).read_owned().await);
        }
        guards
    }

    /// Whether the gate is held, by an ingestion or a settled reader.
    pub fn is_held(&self, framework: Framework) -> bool {
        self.gate(framework).try_write().is_err()
    }
}

impl Default for IngestionGates {
    fn default() -> Self {
        Self::new()
    }
}
