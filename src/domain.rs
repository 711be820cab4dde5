//! Domain models for ArchiMate repositories.
//!
//! This module contains the fixed ArchiMate vocabulary, the element model,
//! the ID codec, the in-memory registry and configuration.

/// Layers, element types and relationship types.
pub mod archimate;
pub use archimate::{ElementType, Layer, RelationshipType};

mod config;
pub use config::{CONFIG_FILE, Config};

/// Elements and their relationships.
pub mod element;
pub use element::{Element, Relationship};

/// Canonical and legacy element IDs.
pub mod id;
pub use id::{CanonicalId, IdViolation, LegacyId};

/// The in-memory element graph.
pub mod registry;
pub use registry::{DanglingReference, DuplicateId, IncomingEdge, Registry};
