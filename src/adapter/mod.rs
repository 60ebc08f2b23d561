//! Framework adapters
//!
//! Raw fetchers retrieve source bytes; adapters turn them into a lazy
//! sequence of intermediate records and skip events. One adapter per
//! framework: the structured bundle adapter for the threat model, and the
//! catalog-driven document adapter for the other five.

mod bundle;
mod cancel;
pub mod catalogs;
mod document;
mod fetch;
mod pdf;
mod traits;
mod types;

use crate::graph::Framework;
use std::sync::Arc;

pub use bundle::BundleAdapter;
pub use cancel::CancellationToken;
pub use document::{
    Catalog, DocumentAdapter, FieldRule, HeadingRule, IdScheme, ParentRule,
    DEFAULT_PAGE_LIMIT,
};
pub use fetch::{
    FetchError, FileFetcher, HttpFetcher, RawFetcher, RawSource, SourceFetcher, SourceSpec,
    StaticFetcher,
};
pub use traits::{AdapterConfig, AdapterEvents, FrameworkAdapter};
pub use types::{AdapterEvent, IntermediateRecord, LinkRecord, ParseError, UnitRecord, UnitRef};

/// The built-in adapter for a framework.
pub fn adapter_for(framework: Framework) -> Arc<dyn FrameworkAdapter> {
    match catalogs::catalog_for(framework) {
        Some(catalog) => Arc::new(DocumentAdapter::new(catalog)),
        None => Arc::new(BundleAdapter::new()),
    }
}
