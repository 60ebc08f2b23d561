//! Schema normalizer: intermediate records to canonical nodes and edges
//!
//! Validates required fields, assigns identity keys deterministically from
//! `(framework, kind, external_id)` and bounds free text so store payloads
//! stay small.

use crate::adapter::{IntermediateRecord, LinkRecord, UnitRecord, UnitRef};
use crate::graph::{
    Citation, Edge, Framework, Node, NodeKey, NodeKind, Properties, PropertyValue, EXCERPT_LIMIT,
};
use thiserror::Error;

/// Maximum length (in characters) of a node description.
pub const DESCRIPTION_LIMIT: usize = 4000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{kind} unit has an empty external id")]
    EmptyExternalId { kind: String },

    #[error("unknown node kind {0:?}")]
    UnknownKind(String),

    #[error("{kind} is not a node kind of {framework}")]
    KindNotAllowed { framework: Framework, kind: NodeKind },

    #[error("{0} has an empty name")]
    EmptyName(NodeKey),

    #[error("{0} comes from a document but carries no citation")]
    MissingCitation(NodeKey),

    #[error("{relation} {from} -> {to}: confidence {confidence} outside [0, 1]")]
    ConfidenceOutOfRange {
        relation: String,
        from: NodeKey,
        to: NodeKey,
        confidence: f64,
    },

    #[error("{relation} {from} -> {to}: inferred edge without evidence")]
    MissingEvidence {
        relation: String,
        from: NodeKey,
        to: NodeKey,
    },
}

/// A validated record, ready for the upsert gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum Canonical {
    Node(Node),
    Edge(Edge),
}

/// Cut `text` to at most `limit` characters, never splitting a character.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes records for one framework.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    framework: Framework,
}

impl Normalizer {
    pub fn new(framework: Framework) -> Self {
        Self { framework }
    }

    pub fn framework(&self) -> Framework {
        self.framework
    }

    pub fn normalize(&self, record: IntermediateRecord) -> Result<Canonical, ValidationError> {
        match record {
            IntermediateRecord::Unit(unit) => self.node(unit).map(Canonical::Node),
            IntermediateRecord::Link(link) => self.edge(link).map(Canonical::Edge),
        }
    }

    /// The identity key a unit reference resolves to in this framework.
    pub fn key(&self, unit: &UnitRef) -> Result<NodeKey, ValidationError> {
        let external_id = unit.external_id.trim();
        if external_id.is_empty() {
            return Err(ValidationError::EmptyExternalId {
                kind: unit.kind.clone(),
            });
        }
        let kind: NodeKind = unit
            .kind
            .parse()
            .map_err(|_| ValidationError::UnknownKind(unit.kind.clone()))?;
        if !self.framework.allows(kind) {
            return Err(ValidationError::KindNotAllowed {
                framework: self.framework,
                kind,
            });
        }
        Ok(NodeKey::new(self.framework, kind, external_id))
    }

    fn node(&self, unit: UnitRecord) -> Result<Node, ValidationError> {
        let key = self.key(&unit.unit)?;

        let name = collapse_whitespace(&unit.name);
        if name.is_empty() {
            return Err(ValidationError::EmptyName(key));
        }

        let citation = unit.citation.and_then(|c| {
            let document_id = c.document_id.trim().to_string();
            let location = c.location.trim().to_string();
            if document_id.is_empty() || location.is_empty() {
                return None;
            }
            let excerpt = truncate_chars(&collapse_whitespace(&c.excerpt), EXCERPT_LIMIT);
            Some(Citation::new(document_id, location, excerpt))
        });
        if citation.is_none() && self.framework.is_document_based() {
            return Err(ValidationError::MissingCitation(key));
        }

        let mut node = Node::new(key, name)
            .with_description(truncate_chars(unit.description.trim(), DESCRIPTION_LIMIT));
        node.properties = clean_properties(unit.properties);
        node.citation = citation;
        Ok(node)
    }

    fn edge(&self, link: LinkRecord) -> Result<Edge, ValidationError> {
        let source = self.key(&link.source)?;
        let target = self.key(&link.target)?;

        if !link.confidence.is_finite() || !(0.0..=1.0).contains(&link.confidence) {
            return Err(ValidationError::ConfidenceOutOfRange {
                relation: link.relation.to_string(),
                from: source,
                to: target,
                confidence: link.confidence,
            });
        }

        let evidence = link
            .evidence
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        if link.confidence < 1.0 && evidence.is_none() {
            return Err(ValidationError::MissingEvidence {
                relation: link.relation.to_string(),
                from: source,
                to: target,
            });
        }

        Ok(Edge {
            relation: link.relation,
            source,
            target,
            confidence: link.confidence,
            evidence,
        })
    }
}

/// Trim text values and drop empty strings and lists.
fn clean_properties(mut properties: Properties) -> Properties {
    properties.retain(|_, value| match value {
        PropertyValue::Text(text) => {
            *text = text.trim().to_string();
            !text.is_empty()
        }
        PropertyValue::List(items) => {
            items.iter_mut().for_each(|item| *item = item.trim().to_string());
            items.retain(|item| !item.is_empty());
            !items.is_empty()
        }
        PropertyValue::Number(n) => n.is_finite(),
        PropertyValue::Flag(_) => true,
    });
    properties
}
