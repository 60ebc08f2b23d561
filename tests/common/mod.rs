//! Shared harness for the integration tests

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;

use async_trait::async_trait;
use cyberweave::adapter::{FetchError, RawFetcher, RawSource, SourceSpec, StaticFetcher};
use cyberweave::ingest::{IngestionGates, RetryPolicy, SourceBinding, UpsertGateway};
use cyberweave::storage::{NodeFilter, UpsertResult};
use cyberweave::{
    Citation, Edge, Framework, GraphStore, IngestionEngine, Node, NodeKey, NodeKind, OpenStore,
    Relation, Resolver, RunRegistry, SqliteStore, StorageError, StorageResult, WeaveApi,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Memory-blob name and citation label for each framework's fixture.
pub fn fixture_source(framework: Framework) -> (&'static str, &'static str) {
    match framework {
        Framework::ThreatModel => ("attack.json", ATTACK_DOCUMENT),
        Framework::ControlsCatalog => ("controls.txt", "nist-sp-800-53r5"),
        Framework::RiskFunctions => ("risk.txt", "nist-csf-2.0"),
        Framework::HealthPrivacy => ("hipaa.txt", "hipaa-security-rule"),
        Framework::FinancialExam => ("ffiec.txt", "ffiec-it-handbook"),
        Framework::PaymentSecurity => ("pci.txt", "pci-dss-v4"),
    }
}

pub fn fixture_text(framework: Framework) -> String {
    match framework {
        Framework::ThreatModel => attack_bundle(),
        Framework::ControlsCatalog => CONTROLS.to_string(),
        Framework::RiskFunctions => RISK_FUNCTIONS.to_string(),
        Framework::HealthPrivacy => HEALTH_PRIVACY.to_string(),
        Framework::FinancialExam => FINANCIAL_EXAM.to_string(),
        Framework::PaymentSecurity => PAYMENT_SECURITY.to_string(),
    }
}

/// Every framework's fixture served from memory.
pub fn fixture_fetcher() -> StaticFetcher {
    Framework::ALL.iter().fold(StaticFetcher::new(), |fetcher, &f| {
        fetcher.with_memory(fixture_source(f).0, fixture_text(f))
    })
}

/// Test setup: one in-memory store behind the engine, the resolver and the API.
pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub api: WeaveApi,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_fetcher(Arc::new(fixture_fetcher()))
    }

    pub fn with_fetcher(fetcher: Arc<dyn RawFetcher>) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let api = build_api(store.clone(), store.clone(), fetcher);
        Self { store, api }
    }

    /// Harness whose graph writes go through `graph` while runs persist to SQLite.
    pub fn over(graph: Arc<dyn GraphStore>) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let api = build_api(graph, store.clone(), Arc::new(fixture_fetcher()));
        Self { store, api }
    }

    pub fn engine(&self) -> &IngestionEngine {
        self.api.engine()
    }

    pub fn all_nodes(&self) -> Vec<Node> {
        self.store.find_nodes(&NodeFilter::new()).unwrap()
    }

    /// Every stored edge, once.
    pub fn all_edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .all_nodes()
            .iter()
            .flat_map(|node| self.store.edges_touching(&node.key, None).unwrap())
            .collect();
        edges.sort_by(|a, b| a.key().cmp(&b.key()));
        edges.dedup_by(|a, b| a.key() == b.key());
        edges
    }

    pub fn maps_to(&self) -> Vec<Edge> {
        self.all_edges()
            .into_iter()
            .filter(|e| e.relation == Relation::MapsTo)
            .collect()
    }
}

fn build_api(
    graph: Arc<dyn GraphStore>,
    runs: Arc<SqliteStore>,
    fetcher: Arc<dyn RawFetcher>,
) -> WeaveApi {
    let gateway = UpsertGateway::new(graph.clone(), RetryPolicy::immediate(3));
    let gates = IngestionGates::new();
    let mut engine = IngestionEngine::new(
        gateway.clone(),
        fetcher,
        RunRegistry::with_store(runs),
        gates.clone(),
    );
    for framework in Framework::ALL {
        let (name, document_id) = fixture_source(framework);
        engine = engine.with_source(
            framework,
            SourceBinding::new(SourceSpec::Memory(name.into()), document_id),
        );
    }
    WeaveApi::new(graph, engine, Resolver::new(gateway, gates))
}

pub fn key(framework: Framework, kind: NodeKind, external_id: &str) -> NodeKey {
    NodeKey::new(framework, kind, external_id)
}

/// Delegates to SQLite but fails the first `failures` batch upserts with a
/// transient error.
pub struct FailingStore {
    inner: SqliteStore,
    failures: AtomicUsize,
    attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl GraphStore for FailingStore {
    fn upsert_batch(&self, nodes: &[Node], edges: &[Edge]) -> StorageResult<UpsertResult> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StorageError::Unavailable("database is locked".into()));
        }
        self.inner.upsert_batch(nodes, edges)
    }

    fn load_node(&self, key: &NodeKey) -> StorageResult<Option<Node>> {
        self.inner.load_node(key)
    }

    fn find_nodes(&self, filter: &NodeFilter) -> StorageResult<Vec<Node>> {
        self.inner.find_nodes(filter)
    }

    fn search_nodes(&self, terms: &[String], filter: &NodeFilter) -> StorageResult<Vec<Node>> {
        self.inner.search_nodes(terms, filter)
    }

    fn citations(&self, key: &NodeKey) -> StorageResult<Vec<Citation>> {
        self.inner.citations(key)
    }

    fn edges_touching(&self, key: &NodeKey, relation: Option<Relation>) -> StorageResult<Vec<Edge>> {
        self.inner.edges_touching(key, relation)
    }

    fn node_count(&self) -> StorageResult<usize> {
        self.inner.node_count()
    }

    fn edge_count(&self) -> StorageResult<usize> {
        self.inner.edge_count()
    }

    fn node_counts_by_kind(&self) -> StorageResult<Vec<(Framework, NodeKind, usize)>> {
        self.inner.node_counts_by_kind()
    }

    fn edge_counts_by_relation(&self) -> StorageResult<Vec<(Relation, usize)>> {
        self.inner.edge_counts_by_relation()
    }
}

/// Serves the fixtures after a fixed delay.
pub struct SlowFetcher {
    inner: StaticFetcher,
    delay: Duration,
}

impl SlowFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: fixture_fetcher(),
            delay,
        }
    }
}

#[async_trait]
impl RawFetcher for SlowFetcher {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawSource, FetchError> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch(spec).await
    }
}
