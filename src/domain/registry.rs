//! The in-memory element graph.
//!
//! A [`Registry`] is built once per run from the element files on disk. It
//! owns every element keyed by ID and keeps a reverse index from relationship
//! targets to the edges that point at them, so that "what points here" is as
//! cheap as "what does this point to".

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::domain::element::{Element, Relationship};

/// An edge seen from its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEdge {
    /// The element that owns the relationship.
    pub source: String,
    /// The canonical relationship type, or the declared one if unrecognised.
    pub kind: String,
    /// Optional free text.
    pub description: Option<String>,
}

/// A relationship whose target is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DanglingReference {
    /// The element that owns the relationship.
    pub source: String,
    /// The missing target ID.
    pub target: String,
    /// The relationship type.
    pub kind: String,
}

/// A later file that replaced an earlier one with the same ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateId {
    /// The shared ID.
    pub id: String,
    /// The file whose element was discarded.
    pub replaced: PathBuf,
    /// The file whose element was kept.
    pub kept: PathBuf,
}

/// All elements of a model, indexed for graph queries.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    elements: HashMap<String, Element>,
    sources: HashMap<String, PathBuf>,
    order: Vec<String>,
    incoming: HashMap<String, Vec<IncomingEdge>>,
    duplicates: Vec<DuplicateId>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry with space for `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: HashMap::with_capacity(capacity),
            sources: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
            incoming: HashMap::with_capacity(capacity),
            duplicates: Vec::new(),
        }
    }

    /// Inserts an element loaded from `source`.
    ///
    /// If an element with the same ID is already present it is replaced
    /// (last write wins): its edges are withdrawn from the reverse index, it
    /// keeps its position in load order, and the collision is returned and
    /// recorded.
    pub fn insert(&mut self, element: Element, source: PathBuf) -> Option<DuplicateId> {
        let id = element.id.clone();

        let duplicate = if self.elements.contains_key(&id) {
            self.withdraw_edges(&id);
            let replaced = self.sources.get(&id).cloned().unwrap_or_default();
            tracing::warn!(
                "duplicate ID '{id}': {} replaces {}",
                source.display(),
                replaced.display()
            );
            let duplicate = DuplicateId {
                id: id.clone(),
                replaced,
                kept: source.clone(),
            };
            self.duplicates.push(duplicate.clone());
            Some(duplicate)
        } else {
            self.order.push(id.clone());
            None
        };

        for relationship in &element.relationships {
            self.incoming
                .entry(relationship.target.clone())
                .or_default()
                .push(IncomingEdge {
                    source: id.clone(),
                    kind: relationship.type_name().to_string(),
                    description: relationship.description.clone(),
                });
        }

        self.sources.insert(id.clone(), source);
        self.elements.insert(id, element);

        duplicate
    }

    fn withdraw_edges(&mut self, source: &str) {
        for edges in self.incoming.values_mut() {
            edges.retain(|edge| edge.source != source);
        }
        self.incoming.retain(|_, edges| !edges.is_empty());
    }

    /// Looks up an element by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Whether an element with this ID is present.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    /// The file an element was loaded from.
    #[must_use]
    pub fn source(&self, id: &str) -> Option<&Path> {
        self.sources.get(id).map(PathBuf::as_path)
    }

    /// The edges pointing at `id`, in load order.
    ///
    /// `id` need not be a known element; dangling targets have incoming
    /// edges too.
    #[must_use]
    pub fn incoming(&self, id: &str) -> &[IncomingEdge] {
        self.incoming.get(id).map_or(&[], Vec::as_slice)
    }

    /// The relationships owned by `id`, in declaration order.
    #[must_use]
    pub fn outgoing(&self, id: &str) -> &[Relationship] {
        self.elements
            .get(id)
            .map_or(&[], |element| element.relationships.as_slice())
    }

    /// All elements, in load order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.order.iter().filter_map(|id| self.elements.get(id))
    }

    /// The IDs of the elements declaring `layer`, in load order.
    #[must_use]
    pub fn elements_by_layer(&self, layer: &str) -> Vec<&str> {
        self.elements()
            .filter(|element| element.layer == layer)
            .map(|element| element.id.as_str())
            .collect()
    }

    /// Every relationship whose target is not a known element, sorted by
    /// source then target.
    #[must_use]
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut dangling: Vec<_> = self
            .elements()
            .flat_map(|element| {
                element
                    .relationships
                    .iter()
                    .filter(|relationship| !self.contains(&relationship.target))
                    .map(|relationship| DanglingReference {
                        source: element.id.clone(),
                        target: relationship.target.clone(),
                        kind: relationship.type_name().to_string(),
                    })
            })
            .collect();
        dangling.sort();
        dangling
    }

    /// The ID collisions seen while loading, in the order they occurred.
    #[must_use]
    pub fn duplicates(&self) -> &[DuplicateId] {
        &self.duplicates
    }

    /// The number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the registry holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
