//! Diagram and model exchange generation.
//!
//! A [`View`] selects the elements and relationships to draw from a
//! [`Registry`]; the renderers turn a view into Mermaid or PlantUML text.
//! The Model Exchange renderer always covers the whole registry.

mod exchange;
mod mermaid;
mod plantuml;

use std::collections::HashSet;

pub use exchange::Exchange;
pub use mermaid::Mermaid;
use petgraph::{Direction, graphmap::DiGraphMap};
pub use plantuml::PlantUml;

use crate::domain::{DanglingReference, Element, Layer, Registry, Relationship};

/// Which part of the model a diagram shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every element, grouped by layer.
    Full,
    /// The elements of one layer and whatever they connect to.
    Layer(Layer),
    /// An element and its neighbourhood.
    Context {
        /// The focal element.
        id: String,
        /// How many relationship hops to follow, in either direction.
        depth: usize,
    },
}

impl Scope {
    /// The output file name without extension.
    #[must_use]
    pub fn file_stem(&self) -> String {
        match self {
            Self::Full => "full-architecture".to_string(),
            Self::Layer(layer) => format!("{layer}-layer"),
            Self::Context { id, .. } => format!("{id}-context"),
        }
    }
}

/// Why a view could not be built.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExportError {
    /// The focal element does not exist.
    #[error("element not found: {0}")]
    UnknownElement(String),
    /// The layer has no elements.
    #[error("no elements found for layer: {0}")]
    EmptyLayer(Layer),
}

/// A relationship between two known elements.
#[derive(Debug, Clone, Copy)]
pub struct Edge<'a> {
    /// The element declaring the relationship.
    pub source: &'a Element,
    /// The element it points at.
    pub target: &'a Element,
    /// The relationship itself.
    pub relationship: &'a Relationship,
}

/// The elements and edges a diagram draws.
#[derive(Debug)]
pub struct View<'a> {
    /// The diagram title.
    pub title: String,
    /// The elements, in load order.
    pub elements: Vec<&'a Element>,
    /// The relationships between them, in declaration order.
    pub edges: Vec<Edge<'a>>,
    /// The element a context diagram is centred on.
    pub focus: Option<&'a str>,
    /// Relationships left out because their target does not exist.
    pub dangling: Vec<DanglingReference>,
}

impl<'a> View<'a> {
    /// Selects the part of `registry` that `scope` covers.
    ///
    /// # Errors
    ///
    /// Returns an error if a context's focal element is unknown, or a layer
    /// has no elements.
    pub fn new(registry: &'a Registry, scope: &Scope) -> Result<Self, ExportError> {
        let (title, members, focus): (_, HashSet<&str>, _) = match scope {
            Scope::Full => (
                "Enterprise Architecture".to_string(),
                registry.elements().map(|e| e.id.as_str()).collect(),
                None,
            ),
            Scope::Layer(layer) => {
                let own = registry.elements_by_layer(layer.name());
                if own.is_empty() {
                    return Err(ExportError::EmptyLayer(*layer));
                }
                let graph = graph(registry);
                let mut members: HashSet<&str> = own.iter().copied().collect();
                for &id in &own {
                    members.extend(neighbours(&graph, id));
                }
                (format!("{} Layer Architecture", layer.title()), members, None)
            }
            Scope::Context { id, depth } => {
                let element = registry
                    .get(id)
                    .ok_or_else(|| ExportError::UnknownElement(id.clone()))?;
                let members = neighbourhood(&graph(registry), &element.id, *depth);
                (
                    format!("Context: {}", element.name),
                    members,
                    Some(element.id.as_str()),
                )
            }
        };

        // Layer views draw edges touching the layer; the others draw edges
        // within the selection.
        let draws = |source: &str, target: &str| match scope {
            Scope::Layer(layer) => [source, target]
                .iter()
                .any(|id| registry.get(id).is_some_and(|e| e.layer == layer.name())),
            _ => members.contains(source) && members.contains(target),
        };

        let elements: Vec<&Element> = registry
            .elements()
            .filter(|element| members.contains(element.id.as_str()))
            .collect();

        let mut edges = Vec::new();
        for &source in &elements {
            for relationship in &source.relationships {
                let Some(target) = registry.get(&relationship.target) else {
                    continue;
                };
                if draws(&source.id, &target.id) {
                    edges.push(Edge {
                        source,
                        target,
                        relationship,
                    });
                }
            }
        }

        let dangling: Vec<_> = registry
            .dangling_references()
            .into_iter()
            .filter(|reference| members.contains(reference.source.as_str()))
            .collect();
        for reference in &dangling {
            tracing::warn!(
                "Skipping {} relationship from {} to missing element {}",
                reference.kind,
                reference.source,
                reference.target
            );
        }

        Ok(Self {
            title,
            elements,
            edges,
            focus,
            dangling,
        })
    }

    /// The elements grouped by layer, in diagram order. Elements with an
    /// unrecognised layer come last, under `None`.
    #[must_use]
    pub fn by_layer(&self) -> Vec<(Option<Layer>, Vec<&'a Element>)> {
        let mut groups: Vec<(Option<Layer>, Vec<&'a Element>)> = Layer::ALL
            .into_iter()
            .map(Some)
            .chain([None])
            .map(|layer| {
                let members = self
                    .elements
                    .iter()
                    .copied()
                    .filter(|element| element.layer() == layer)
                    .collect();
                (layer, members)
            })
            .collect();
        groups.retain(|(_, members)| !members.is_empty());
        groups
    }
}

/// The relationship graph between known elements.
fn graph(registry: &Registry) -> DiGraphMap<&str, ()> {
    let mut graph = DiGraphMap::new();
    for element in registry.elements() {
        graph.add_node(element.id.as_str());
        for relationship in &element.relationships {
            if let Some(target) = registry.get(&relationship.target) {
                graph.add_edge(element.id.as_str(), target.id.as_str(), ());
            }
        }
    }
    graph
}

fn neighbours<'g>(graph: &DiGraphMap<&'g str, ()>, id: &'g str) -> Vec<&'g str> {
    if !graph.contains_node(id) {
        return Vec::new();
    }
    graph
        .neighbors_directed(id, Direction::Outgoing)
        .chain(graph.neighbors_directed(id, Direction::Incoming))
        .collect()
}

/// Every element within `depth` hops of `start`, following edges either way.
fn neighbourhood<'g>(graph: &DiGraphMap<&'g str, ()>, start: &'g str, depth: usize) -> HashSet<&'g str> {
    let mut seen = HashSet::from([start]);
    let mut frontier = vec![start];
    for _ in 0..depth {
        let mut next = Vec::new();
        for id in frontier {
            for neighbour in neighbours(graph, id) {
                if seen.insert(neighbour) {
                    next.push(neighbour);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    seen
}

/// Replaces characters diagram languages treat as syntax in identifiers.
fn sanitize_id(id: &str) -> String {
    id.replace(['-', '.'], "_")
}
