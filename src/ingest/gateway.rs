//! Graph upsert gateway: batched, retried merges into the graph store

use crate::graph::{Edge, Node};
use crate::storage::{GraphStore, StorageError, UpsertResult};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Bounded exponential backoff for batch transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn exponential() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }

    /// A policy that never sleeps; used in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0 = first retry).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        if secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("batch transaction failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: StorageError },

    #[error("batch rejected by store: {0}")]
    Permanent(StorageError),
}

/// Idempotent batch merge with an injected retry policy.
///
/// Holds no state beyond the store handle; each call is one transaction per
/// attempt, run on the blocking pool.
#[derive(Clone)]
pub struct UpsertGateway {
    store: Arc<dyn GraphStore>,
    policy: RetryPolicy,
}

impl UpsertGateway {
    pub fn new(store: Arc<dyn GraphStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn upsert(&self, nodes: &[Node], edges: &[Edge]) -> Result<UpsertResult, UpsertError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        let batch = Arc::new((nodes.to_vec(), edges.to_vec()));

        loop {
            if attempt > 0 {
                let delay = self.policy.delay_for_attempt(attempt - 1);
                debug!(attempt, ?delay, "retrying batch upsert");
                tokio::time::sleep(delay).await;
            }

            match self.submit(&batch).await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_transient() => return Err(UpsertError::Permanent(e)),
                Err(e) => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        nodes = nodes.len(),
                        edges = edges.len(),
                        error = %e,
                        "batch upsert failed"
                    );
                    if attempt >= attempts {
                        return Err(UpsertError::Exhausted { attempts, last: e });
                    }
                }
            }
        }
    }

    async fn submit(&self, batch: &Arc<(Vec<Node>, Vec<Edge>)>) -> Result<UpsertResult, StorageError> {
        let store = self.store.clone();
        let batch = batch.clone();
        tokio::task::spawn_blocking(move || store.upsert_batch(&batch.0, &batch.1))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}
