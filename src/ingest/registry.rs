//! Process-wide registry of ingestion runs
//!
//! Created by the caller at startup and passed explicitly to the engine and
//! the API facade. Entries are appended per run and sealed once their run
//! reaches a terminal status.

use super::run::{IngestionRun, RunId};
use crate::graph::Framework;
use crate::storage::RunStore;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("run {0} is not registered")]
    UnknownRun(RunId),

    #[error("run {0} already reached a terminal status")]
    Sealed(RunId),

    #[error("run {0} is already registered")]
    Duplicate(RunId),
}

struct RegistryInner {
    runs: DashMap<RunId, IngestionRun>,
    /// Registration order, oldest first
    order: Mutex<Vec<RunId>>,
    store: Option<Arc<dyn RunStore>>,
}

/// Shared handle to the run registry. Clones share state.
#[derive(Clone)]
pub struct RunRegistry {
    inner: Arc<RegistryInner>,
}

impl RunRegistry {
    /// An in-memory registry.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A registry that also persists terminal runs as an audit trail.
    pub fn with_store(store: Arc<dyn RunStore>) -> Self {
        Self::build(Some(store))
    }

    fn build(store: Option<Arc<dyn RunStore>>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                runs: DashMap::new(),
                order: Mutex::new(Vec::new()),
                store,
            }),
        }
    }

    pub fn register(&self, run: &IngestionRun) -> Result<(), RegistryError> {
        let id = run.run_id().clone();
        if self.inner.runs.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        self.inner.runs.insert(id.clone(), run.clone());
        self.inner.order.lock().unwrap().push(id);
        self.persist_if_terminal(run);
        Ok(())
    }

    /// Replace the entry for `run`. Refused once the stored entry is terminal.
    pub fn update(&self, run: &IngestionRun) -> Result<(), RegistryError> {
        {
            let mut entry = self
                .inner
                .runs
                .get_mut(run.run_id())
                .ok_or_else(|| RegistryError::UnknownRun(run.run_id().clone()))?;
            if entry.status().is_terminal() {
                return Err(RegistryError::Sealed(run.run_id().clone()));
            }
            *entry = run.clone();
        }
        self.persist_if_terminal(run);
        Ok(())
    }

    fn persist_if_terminal(&self, run: &IngestionRun) {
        if !run.status().is_terminal() {
            return;
        }
        if let Some(store) = &self.inner.store {
            if let Err(e) = store.save_run(run) {
                warn!(run_id = %run.run_id(), error = %e, "failed to persist ingestion run");
            }
        }
    }

    pub fn get(&self, run_id: &RunId) -> Option<IngestionRun> {
        self.inner.runs.get(run_id).map(|entry| entry.clone())
    }

    /// All runs registered in this process, oldest first.
    pub fn list(&self) -> Vec<IngestionRun> {
        let order = self.inner.order.lock().unwrap();
        order.iter().filter_map(|id| self.get(id)).collect()
    }

    /// The most recently registered run for a framework.
    pub fn latest(&self, framework: Framework) -> Option<IngestionRun> {
        let order = self.inner.order.lock().unwrap();
        order
            .iter()
            .rev()
            .filter_map(|id| self.get(id))
            .find(|run| run.framework() == framework)
    }

    /// Persisted history (newest first), falling back to this process's runs
    /// when no store is attached.
    pub fn history(&self, framework: Option<Framework>) -> Vec<IngestionRun> {
        if let Some(store) = &self.inner.store {
            match store.list_runs(framework) {
                Ok(runs) => return runs,
                Err(e) => warn!(error = %e, "failed to read run history"),
            }
        }
        let mut runs: Vec<_> = self
            .list()
            .into_iter()
            .filter(|run| framework.map_or(true, |f| run.framework() == f))
            .collect();
        runs.reverse();
        runs
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RunStatus;
    use crate::storage::{OpenStore, SqliteStore};

    #[test]
    fn register_then_update_until_terminal() {
        let registry = RunRegistry::new();
        let mut run = IngestionRun::pending(Framework::ControlsCatalog);
        registry.register(&run).unwrap();

        run.start();
        registry.update(&run).unwrap();
        assert_eq!(registry.get(run.run_id()).unwrap().status(), RunStatus::Running);

        run.conclude();
        registry.update(&run).unwrap();
        assert_eq!(registry.get(run.run_id()).unwrap().status(), RunStatus::Succeeded);
    }

    #[test]
    fn terminal_entries_are_sealed() {
        let registry = RunRegistry::new();
        let mut run = IngestionRun::pending(Framework::ThreatModel);
        run.start();
        run.fail("fetch failed");
        registry.register(&run).unwrap();

        let err = registry.update(&run).unwrap_err();
        assert_eq!(err, RegistryError::Sealed(run.run_id().clone()));
    }

    #[test]
    fn unknown_and_duplicate_runs_are_refused() {
        let registry = RunRegistry::new();
        let run = IngestionRun::pending(Framework::ThreatModel);
        assert!(matches!(registry.update(&run), Err(RegistryError::UnknownRun(_))));

        registry.register(&run).unwrap();
        assert!(matches!(registry.register(&run), Err(RegistryError::Duplicate(_))));
    }

    #[test]
    fn latest_picks_most_recent_for_framework() {
        let registry = RunRegistry::new();
        let first = IngestionRun::pending(Framework::RiskFunctions);
        let other = IngestionRun::pending(Framework::ThreatModel);
        let second = IngestionRun::pending(Framework::RiskFunctions);
        for run in [&first, &other, &second] {
            registry.register(run).unwrap();
        }

        let latest = registry.latest(Framework::RiskFunctions).unwrap();
        assert_eq!(latest.run_id(), second.run_id());
        assert_eq!(registry.list().len(), 3);
        assert!(registry.latest(Framework::PaymentSecurity).is_none());
    }

    #[test]
    fn terminal_runs_are_persisted() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let registry = RunRegistry::with_store(store.clone());

        let mut run = IngestionRun::pending(Framework::HealthPrivacy);
        registry.register(&run).unwrap();
        run.start();
        registry.update(&run).unwrap();
        assert!(store.list_runs(None).unwrap().is_empty());

        run.conclude();
        registry.update(&run).unwrap();
        assert_eq!(store.list_runs(None).unwrap(), vec![run.clone()]);
        assert_eq!(registry.history(Some(Framework::HealthPrivacy)), vec![run]);
    }
}
