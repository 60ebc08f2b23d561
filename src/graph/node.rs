//! Node representation in the knowledge graph

use super::framework::{Framework, NodeKind, UnknownTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Maximum length (in characters) of a citation excerpt.
pub const EXCERPT_LIMIT: usize = 500;

/// Identity key of a node: `(framework, kind, external_id)`.
///
/// Serializes as its string form `FRAMEWORK/Kind/external_id`, which is also
/// the primary key in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub framework: Framework,
    pub kind: NodeKind,
    pub external_id: String,
}

impl NodeKey {
    pub fn new(framework: Framework, kind: NodeKind, external_id: impl Into<String>) -> Self {
        Self {
            framework,
            kind,
            external_id: external_id.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.framework, self.kind, self.external_id)
    }
}

impl FromStr for NodeKey {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        let (Some(framework), Some(kind), Some(external_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(UnknownTag {
                vocabulary: "node key",
                value: s.to_string(),
            });
        };
        Ok(Self::new(framework.parse()?, kind.parse()?, external_id))
    }
}

impl Serialize for NodeKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Typed property values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    Flag(bool),
    List(Vec<String>),
}

impl PropertyValue {
    /// Text content of this value, for matching and search.
    pub fn text_fragments(&self) -> Vec<&str> {
        match self {
            Self::Text(s) => vec![s.as_str()],
            Self::List(items) => items.iter().map(String::as_str).collect(),
            Self::Number(_) | Self::Flag(_) => Vec::new(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// Framework-specific node attributes, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(PropertyValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }

    pub fn retain(&mut self, mut f: impl FnMut(&str, &mut PropertyValue) -> bool) {
        self.0.retain(|k, v| f(k, v));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Provenance of a node: where in which source document it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub document_id: String,
    /// Page number, section number, or bundle object path
    pub location: String,
    /// Bounded-length snippet of the source text
    pub excerpt: String,
}

impl Citation {
    pub fn new(
        document_id: impl Into<String>,
        location: impl Into<String>,
        excerpt: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            location: location.into(),
            excerpt: excerpt.into(),
        }
    }
}

/// A node in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Identity key
    pub key: NodeKey,
    pub name: String,
    pub description: String,
    /// Framework-specific properties
    pub properties: Properties,
    /// Source attribution (required for document-based frameworks)
    pub citation: Option<Citation>,
}

impl Node {
    pub fn new(key: NodeKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            description: String::new(),
            properties: Properties::new(),
            citation: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a property to the node
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key, value);
        self
    }

    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citation = Some(citation);
        self
    }

    pub fn framework(&self) -> Framework {
        self.key.framework
    }

    pub fn kind(&self) -> NodeKind {
        self.key.kind
    }

    pub fn external_id(&self) -> &str {
        &self.key.external_id
    }
}
