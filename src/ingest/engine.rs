//! Ingestion engine: fetch, adapt, normalize and upsert one framework
//!
//! Each run owns its `IngestionRun` record and publishes every state change
//! to the registry. Node batches are always submitted before any edge batch,
//! so an edge only ever references nodes from batches already sent.

use super::gates::IngestionGates;
use super::gateway::UpsertGateway;
use super::registry::RunRegistry;
use super::run::{IngestionRun, SkipStage};
use crate::adapter::{
    adapter_for, AdapterConfig, AdapterEvent, CancellationToken, FetchError, FrameworkAdapter,
    RawFetcher, SourceSpec,
};
use crate::graph::{Edge, Framework, Node};
use crate::normalize::{Canonical, Normalizer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default number of records per upsert batch.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Where a framework's source lives and how its citations are labelled.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBinding {
    pub spec: SourceSpec,
    pub document_id: String,
}

impl SourceBinding {
    pub fn new(spec: SourceSpec, document_id: impl Into<String>) -> Self {
        Self {
            spec,
            document_id: document_id.into(),
        }
    }
}

/// Caller controls for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Bounds time spent fetching and parsing; store writes and their
    /// retries are not counted
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Why a run stopped early. Recorded as the run's failure reason.
#[derive(Debug, Error)]
enum RunAbort {
    #[error("no source configured for {0}")]
    NoSource(Framework),

    #[error("no adapter registered for {0}")]
    NoAdapter(Framework),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,
}

/// Time charged against a run's timeout.
struct Budget {
    limit: Option<Duration>,
    spent: Duration,
}

impl Budget {
    fn new(limit: Option<Duration>) -> Self {
        Self {
            limit,
            spent: Duration::ZERO,
        }
    }

    fn charge<T>(&mut self, work: impl FnOnce() -> T) -> T {
        let began = Instant::now();
        let out = work();
        self.spent += began.elapsed();
        out
    }

    fn check(&self) -> Result<(), RunAbort> {
        match self.limit {
            Some(limit) if self.spent >= limit => Err(RunAbort::Timeout(limit)),
            _ => Ok(()),
        }
    }
}

#[derive(Clone)]
pub struct IngestionEngine {
    gateway: UpsertGateway,
    fetcher: Arc<dyn RawFetcher>,
    sources: Arc<HashMap<Framework, SourceBinding>>,
    adapters: Arc<HashMap<Framework, Arc<dyn FrameworkAdapter>>>,
    registry: RunRegistry,
    gates: IngestionGates,
    batch_size: usize,
    page_limit: Option<usize>,
}

impl IngestionEngine {
    /// An engine with the built-in adapter for every framework and no sources.
    pub fn new(
        gateway: UpsertGateway,
        fetcher: Arc<dyn RawFetcher>,
        registry: RunRegistry,
        gates: IngestionGates,
    ) -> Self {
        let adapters = Framework::ALL
            .iter()
            .map(|f| (*f, adapter_for(*f)))
            .collect();
        Self {
            gateway,
            fetcher,
            sources: Arc::new(HashMap::new()),
            adapters: Arc::new(adapters),
            registry,
            gates,
            batch_size: DEFAULT_BATCH_SIZE,
            page_limit: None,
        }
    }

    pub fn with_source(mut self, framework: Framework, binding: SourceBinding) -> Self {
        Arc::make_mut(&mut self.sources).insert(framework, binding);
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn FrameworkAdapter>) -> Self {
        Arc::make_mut(&mut self.adapters).insert(adapter.framework(), adapter);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Cap on pages read from paged documents.
    pub fn with_page_limit(mut self, page_limit: Option<usize>) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    pub fn gates(&self) -> &IngestionGates {
        &self.gates
    }

    pub fn gateway(&self) -> &UpsertGateway {
        &self.gateway
    }

    pub fn source(&self, framework: Framework) -> Option<&SourceBinding> {
        self.sources.get(&framework)
    }

    /// Ingest one framework. Always returns a terminal run; failures are
    /// recorded in it, never raised.
    pub async fn run(&self, framework: Framework, options: RunOptions) -> IngestionRun {
        let mut run = IngestionRun::pending(framework);
        if let Err(e) = self.registry.register(&run) {
            warn!(run_id = %run.run_id(), error = %e, "run registration refused");
        }

        let _gate = self.gates.ingest(framework).await;
        run.start();
        self.publish(&run);
        info!(framework = %framework, run_id = %run.run_id(), "ingestion started");

        match self.execute(&mut run, &options).await {
            Ok(()) => run.conclude(),
            Err(abort) => {
                warn!(framework = %framework, run_id = %run.run_id(), reason = %abort, "ingestion aborted");
                run.fail(abort.to_string());
            }
        }
        self.publish(&run);

        info!(
            framework = %framework,
            run_id = %run.run_id(),
            status = %run.status(),
            nodes_upserted = run.nodes_upserted(),
            edges_upserted = run.edges_upserted(),
            records_skipped = run.records_skipped().count,
            "ingestion finished"
        );
        run
    }

    /// Ingest several frameworks concurrently, one task per framework.
    /// Results come back in the order requested.
    pub async fn run_many(&self, frameworks: &[Framework], options: RunOptions) -> Vec<IngestionRun> {
        let handles: Vec<_> = frameworks
            .iter()
            .map(|&framework| {
                let engine = self.clone();
                let options = options.clone();
                (framework, tokio::spawn(async move { engine.run(framework, options).await }))
            })
            .collect();

        let mut runs = Vec::with_capacity(handles.len());
        for (framework, handle) in handles {
            match handle.await {
                Ok(run) => runs.push(run),
                Err(e) => error!(framework = %framework, error = %e, "ingestion task panicked"),
            }
        }
        runs
    }

    fn publish(&self, run: &IngestionRun) {
        if let Err(e) = self.registry.update(run) {
            warn!(run_id = %run.run_id(), error = %e, "run registry update refused");
        }
    }

    async fn execute(&self, run: &mut IngestionRun, options: &RunOptions) -> Result<(), RunAbort> {
        let framework = run.framework();
        let binding = self
            .sources
            .get(&framework)
            .ok_or(RunAbort::NoSource(framework))?;
        let adapter = self
            .adapters
            .get(&framework)
            .ok_or(RunAbort::NoAdapter(framework))?;
        let mut budget = Budget::new(options.timeout);

        let started = Instant::now();
        let fetch = self.fetcher.fetch(&binding.spec);
        let raw = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| RunAbort::Timeout(limit))??,
            None => fetch.await?,
        };
        budget.spent += started.elapsed();
        debug!(framework = %framework, origin = %raw.origin, bytes = raw.bytes.len(), "source fetched");

        let normalizer = Normalizer::new(framework);
        let config =
            AdapterConfig::new(binding.document_id.as_str()).with_page_limit(self.page_limit);
        let mut nodes: Vec<Node> = Vec::new();
        let mut edges: Vec<Edge> = Vec::new();

        let mut events = budget.charge(|| adapter.parse(raw, &config));
        while let Some(event) = budget.charge(|| events.next()) {
            if options.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                return Err(RunAbort::Cancelled);
            }
            budget.check()?;

            let record = match event {
                AdapterEvent::Record(record) => record,
                AdapterEvent::Skipped(e) => {
                    debug!(framework = %framework, reason = %e, "unit skipped");
                    run.skip(SkipStage::Parse, e.to_string());
                    continue;
                }
            };

            match normalizer.normalize(record) {
                Ok(Canonical::Node(node)) => {
                    nodes.push(node);
                    if nodes.len() >= self.batch_size {
                        self.flush_nodes(run, &mut nodes).await;
                    }
                }
                Ok(Canonical::Edge(edge)) => {
                    edges.push(edge);
                    if edges.len() >= self.batch_size {
                        self.flush_nodes(run, &mut nodes).await;
                        self.flush_edges(run, &mut edges).await;
                    }
                }
                Err(e) => {
                    debug!(framework = %framework, reason = %e, "record failed validation");
                    run.skip(SkipStage::Validation, e.to_string());
                }
            }
        }

        self.flush_nodes(run, &mut nodes).await;
        self.flush_edges(run, &mut edges).await;
        Ok(())
    }

    async fn flush_nodes(&self, run: &mut IngestionRun, nodes: &mut Vec<Node>) {
        if nodes.is_empty() {
            return;
        }
        let batch = std::mem::take(nodes);
        match self.gateway.upsert(&batch, &[]).await {
            Ok(result) => run.record_upsert(&result),
            Err(e) => {
                warn!(framework = %run.framework(), records = batch.len(), error = %e, "node batch skipped");
                run.record_batch_failure(batch.len(), e.to_string());
            }
        }
    }

    async fn flush_edges(&self, run: &mut IngestionRun, edges: &mut Vec<Edge>) {
        if edges.is_empty() {
            return;
        }
        let batch = std::mem::take(edges);
        match self.gateway.upsert(&[], &batch).await {
            Ok(result) => {
                if !result.rejected.is_empty() {
                    debug!(framework = %run.framework(), rejected = result.rejected.len(), "edges with missing endpoints");
                }
                run.record_upsert(&result);
            }
            Err(e) => {
                warn!(framework = %run.framework(), records = batch.len(), error = %e, "edge batch skipped");
                run.record_batch_failure(batch.len(), e.to_string());
            }
        }
    }
}
