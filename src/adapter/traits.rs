//! Adapter trait: the contract framework adapters implement
//!
//! An adapter turns one fetched source into a lazy, finite sequence of
//! intermediate records and skip events. The sequence owns its input, so
//! iterating again requires a fresh fetch.

use super::fetch::RawSource;
use super::types::AdapterEvent;
use crate::graph::Framework;

/// Per-run adapter settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterConfig {
    /// Identifier recorded in every citation this run produces
    pub document_id: String,
    /// Pages read from a paged source; `None` reads them all
    pub page_limit: Option<usize>,
}

impl AdapterConfig {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            page_limit: None,
        }
    }

    pub fn with_page_limit(mut self, page_limit: Option<usize>) -> Self {
        self.page_limit = page_limit;
        self
    }
}

/// Lazy adapter output.
pub type AdapterEvents = Box<dyn Iterator<Item = AdapterEvent> + Send>;

pub trait FrameworkAdapter: Send + Sync {
    fn framework(&self) -> Framework;

    /// Parse raw bytes into events, one at a time.
    ///
    /// Never fails as a whole: unreadable input surfaces as a single
    /// `AdapterEvent::Skipped`.
    fn parse(&self, raw: RawSource, config: &AdapterConfig) -> AdapterEvents;
}
