//! Consumer-facing API layer.
//!
//! `WeaveApi` is the single entry point for the CLI and embedders: trigger
//! re-ingestion, read run status, run the resolver and run queries. It never
//! formats presentation text; every result is a typed, serializable value.

use std::sync::Arc;
use std::time::Duration;

use crate::adapter::RawFetcher;
use crate::config::{Config, ConfigError};
use crate::graph::{Framework, NodeKind};
use crate::ingest::{
    IngestionEngine, IngestionGates, IngestionRun, RunId, RunOptions, RunRegistry, UpsertGateway,
};
use crate::query::{
    CategoryQuery, CrossFrameworkQuery, GraphStats, IdentifierQuery, MappingHit,
    NeighborhoodQuery, NeighborhoodResult, QueryResult, SearchQuery,
};
use crate::resolve::{ResolveReport, Resolver};
use crate::storage::{GraphStore, RunStore, StorageResult};

/// Single entry point for all consumer-facing operations.
#[derive(Clone)]
pub struct WeaveApi {
    store: Arc<dyn GraphStore>,
    engine: IngestionEngine,
    resolver: Arc<Resolver>,
    timeout: Option<Duration>,
}

impl WeaveApi {
    pub fn new(store: Arc<dyn GraphStore>, engine: IngestionEngine, resolver: Resolver) -> Self {
        Self {
            store,
            engine,
            resolver: Arc::new(resolver),
            timeout: None,
        }
    }

    /// Wire engine, resolver and run history from a configuration.
    ///
    /// `store` backs both the graph and the run audit trail.
    pub fn from_config<S>(
        config: &Config,
        store: Arc<S>,
        fetcher: Arc<dyn RawFetcher>,
    ) -> Result<Self, ConfigError>
    where
        S: GraphStore + RunStore + 'static,
    {
        config.validate()?;
        let graph: Arc<dyn GraphStore> = store.clone();
        let runs: Arc<dyn RunStore> = store;

        let gateway = UpsertGateway::new(graph.clone(), config.retry.policy());
        let gates = IngestionGates::new();
        let mut engine = IngestionEngine::new(
            gateway.clone(),
            fetcher,
            RunRegistry::with_store(runs),
            gates.clone(),
        )
        .with_batch_size(config.batch_size)
        .with_page_limit(config.max_pages);
        for (framework, binding) in config.bindings()? {
            engine = engine.with_source(framework, binding);
        }
        let resolver = Resolver::new(gateway, gates).with_config(config.resolver);

        let mut api = Self::new(graph, engine, resolver);
        api.timeout = config.fetch_timeout();
        Ok(api)
    }

    /// Default timeout applied by `reingest`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn engine(&self) -> &IngestionEngine {
        &self.engine
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    fn default_options(&self) -> RunOptions {
        RunOptions {
            timeout: self.timeout,
            cancel: None,
        }
    }

    // --- Write ---

    /// Re-ingest one framework. Always a merge; safe to call at any time.
    pub async fn reingest(&self, framework: Framework) -> IngestionRun {
        self.engine.run(framework, self.default_options()).await
    }

    pub async fn reingest_with(&self, framework: Framework, options: RunOptions) -> IngestionRun {
        self.engine.run(framework, options).await
    }

    /// Re-ingest several frameworks concurrently.
    pub async fn reingest_many(&self, frameworks: &[Framework]) -> Vec<IngestionRun> {
        self.engine.run_many(frameworks, self.default_options()).await
    }

    /// Resolve every pair with a mapping policy.
    pub async fn resolve(&self) -> ResolveReport {
        self.resolver.resolve(&self.resolver.pairs()).await
    }

    pub async fn resolve_pairs(&self, pairs: &[(Framework, Framework)]) -> ResolveReport {
        self.resolver.resolve(pairs).await
    }

    // --- Runs ---

    pub fn run(&self, run_id: &RunId) -> Option<IngestionRun> {
        self.engine.registry().get(run_id)
    }

    /// Runs started by this process, oldest first.
    pub fn runs(&self) -> Vec<IngestionRun> {
        self.engine.registry().list()
    }

    pub fn latest_run(&self, framework: Framework) -> Option<IngestionRun> {
        self.engine.registry().latest(framework)
    }

    /// Persisted run history, newest first.
    pub fn run_history(&self, framework: Option<Framework>) -> Vec<IngestionRun> {
        self.engine.registry().history(framework)
    }

    // --- Queries ---

    pub fn find_by_id(
        &self,
        external_id: &str,
        framework: Option<Framework>,
    ) -> StorageResult<QueryResult> {
        let mut query = IdentifierQuery::new(external_id);
        if let Some(framework) = framework {
            query = query.in_framework(framework);
        }
        query.execute(self.store.as_ref())
    }

    pub fn category(&self, framework: Framework, kind: NodeKind) -> StorageResult<QueryResult> {
        CategoryQuery::new(framework, kind).execute(self.store.as_ref())
    }

    pub fn neighborhood(&self, query: &NeighborhoodQuery) -> StorageResult<NeighborhoodResult> {
        query.execute(self.store.as_ref())
    }

    pub fn mappings(&self, query: &CrossFrameworkQuery) -> StorageResult<Vec<MappingHit>> {
        query.execute(self.store.as_ref())
    }

    pub fn search(&self, query: &SearchQuery) -> StorageResult<QueryResult> {
        query.execute(self.store.as_ref())
    }

    pub fn stats(&self) -> StorageResult<GraphStats> {
        GraphStats::collect(self.store.as_ref())
    }
}
