//! Framework-native intermediate records
//!
//! Adapters emit these before any schema validation. Kinds are still raw
//! tags here; the normalizer decides whether they are allowed for the
//! framework.

use crate::graph::{Citation, NodeKind, Properties, Relation};
use std::fmt;
use thiserror::Error;

/// Reference to a unit inside the same framework.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitRef {
    pub kind: String,
    pub external_id: String,
}

impl UnitRef {
    pub fn new(kind: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            external_id: external_id.into(),
        }
    }

    pub fn of(kind: NodeKind, external_id: impl Into<String>) -> Self {
        Self::new(kind.as_str(), external_id)
    }
}

impl fmt::Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.external_id)
    }
}

/// A unit extracted from a source: becomes a node.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    pub unit: UnitRef,
    pub name: String,
    pub description: String,
    pub properties: Properties,
    pub citation: Option<Citation>,
}

/// A relationship stated by the source: becomes an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub relation: Relation,
    pub source: UnitRef,
    pub target: UnitRef,
    pub confidence: f64,
    pub evidence: Option<String>,
}

impl LinkRecord {
    /// A link stated directly by the source, confidence 1.0.
    pub fn asserted(relation: Relation, source: UnitRef, target: UnitRef) -> Self {
        Self {
            relation,
            source,
            target,
            confidence: 1.0,
            evidence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntermediateRecord {
    Unit(UnitRecord),
    Link(LinkRecord),
}

/// A unit the adapter could not extract. Never fatal to the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("source is not readable as {expected}: {detail}")]
    Unreadable { expected: &'static str, detail: String },

    #[error("{kind} heading without identifier at {location}: {line:?}")]
    MissingIdentifier {
        kind: NodeKind,
        location: String,
        line: String,
    },

    #[error("object {object_id}: {detail}")]
    MalformedObject { object_id: String, detail: String },

    #[error("relationship {object_id} references {endpoint}, which is not in the bundle")]
    DanglingReference { object_id: String, endpoint: String },
}

/// One step of an adapter's lazy output.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Record(IntermediateRecord),
    Skipped(ParseError),
}

impl From<UnitRecord> for AdapterEvent {
    fn from(unit: UnitRecord) -> Self {
        Self::Record(IntermediateRecord::Unit(unit))
    }
}

impl From<LinkRecord> for AdapterEvent {
    fn from(link: LinkRecord) -> Self {
        Self::Record(IntermediateRecord::Link(link))
    }
}

impl From<ParseError> for AdapterEvent {
    fn from(error: ParseError) -> Self {
        Self::Skipped(error)
    }
}
