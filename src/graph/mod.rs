//! Canonical graph schema

mod edge;
mod framework;
mod node;


pub use edge::{Edge, EdgeKey};
pub use framework::{Framework, NodeKind, Relation, UnknownTag};
pub use node::{Citation, Node, NodeKey, Properties, PropertyValue, EXCERPT_LIMIT};
