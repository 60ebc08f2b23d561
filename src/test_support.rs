//! Store wrappers and source builders for unit tests

use crate::graph::{Citation, Edge, Framework, Node, NodeKey, NodeKind, Relation};
use crate::storage::{GraphStore, NodeFilter, StorageError, StorageResult, UpsertResult};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Fails the first `failures` batch upserts with a transient error.
pub struct FlakyStore<S> {
    inner: S,
    failures: AtomicUsize,
    calls: AtomicUsize,
    /// Blocking sleep before every upsert
    delay: Duration,
}

impl<S: GraphStore> FlakyStore<S> {
    pub fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: GraphStore> GraphStore for FlakyStore<S> {
    fn upsert_batch(&self, nodes: &[Node], edges: &[Edge]) -> StorageResult<UpsertResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected transaction failure".into()));
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

/// A PDF with one page per entry, each line drawn as its own text object.
pub fn pdf_bytes(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]));
            operations.push(Operation::new("Td", vec![Object::Integer(72), Object::Integer(720 - 14 * i as i64)]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0, 0, 595, 842].into_iter().map(Object::Integer).collect::<Vec<_>>(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
