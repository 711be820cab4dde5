//! ArchiMate models as plain markdown
//!
//! Every architecture element is a markdown file whose YAML front matter
//! declares its ID, name, type, layer and outgoing relationships. This crate
//! loads such a tree into a queryable registry, audits element IDs against
//! the canonical `{layer}-{type}-{###}-{slug}` format, and migrates or
//! renumbers IDs while keeping every reference intact.

pub mod domain;
pub use domain::{Config, Element, ElementType, Layer, Registry, Relationship, RelationshipType};

/// Filesystem storage of element files.
pub mod storage;
pub use storage::Directory;

pub mod audit;
pub mod check;
pub mod export;
pub mod fixup;
pub mod migration;
