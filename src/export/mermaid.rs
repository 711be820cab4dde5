use std::fmt;

use crate::{
    domain::{Element, RelationshipType, archimate::Shape},
    export::{View, sanitize_id},
};

/// Renders a [`View`] as a Mermaid flowchart.
#[derive(Debug)]
pub struct Mermaid<'v, 'a>(pub &'v View<'a>);

impl fmt::Display for Mermaid<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.0;
        let groups = view.by_layer();

        writeln!(f, "graph TD")?;
        writeln!(f)?;
        writeln!(f, "%% {}", view.title)?;

        for (layer, elements) in &groups {
            match layer {
                Some(layer) => writeln!(f, "\n%% {} Layer", layer.title())?,
                None => writeln!(f, "\n%% Other Elements")?,
            }
            for element in elements {
                writeln!(f, "    {}", node(element))?;
            }
        }

        writeln!(f, "\n%% Relationships")?;
        for edge in &view.edges {
            let arrow = edge
                .relationship
                .kind
                .map_or("-->", RelationshipType::mermaid_arrow);
            let source = sanitize_id(&edge.source.id);
            let target = sanitize_id(&edge.target.id);
            match edge.relationship.description.as_deref().filter(|d| !d.is_empty()) {
                Some(description) => {
                    writeln!(f, "    {source} {arrow}|{}| {target}", escape_label(description))?;
                }
                None => writeln!(f, "    {source} {arrow} {target}")?,
            }
        }

        if !view.edges.is_empty() {
            writeln!(f, "\n%% Relationship Styling")?;
            for (index, edge) in view.edges.iter().enumerate() {
                let style = edge
                    .relationship
                    .kind
                    .unwrap_or(RelationshipType::Flow)
                    .mermaid_style();
                writeln!(f, "linkStyle {index} {style}")?;
            }
        }

        writeln!(f, "\n%% Styling")?;
        for (layer, elements) in &groups {
            let Some(layer) = layer else { continue };
            let members: Vec<_> = elements.iter().map(|e| sanitize_id(&e.id)).collect();
            writeln!(
                f,
                "classDef {layer}Style fill:{},stroke:#333,stroke-width:2px",
                layer.colour()
            )?;
            writeln!(f, "class {} {layer}Style", members.join(","))?;
        }

        if let Some(focus) = view.focus {
            writeln!(f, "style {} stroke:#1f6feb,stroke-width:4px", sanitize_id(focus))?;
        }

        Ok(())
    }
}

fn node(element: &Element) -> String {
    let id = sanitize_id(&element.id);
    let name = escape_label(&element.name);
    let shape = element.element_type().map_or(Shape::Rect, |t| t.shape);
    match shape {
        Shape::Rect => format!("{id}[\"{name}\"]"),
        Shape::Rounded => format!("{id}(\"{name}\")"),
        Shape::Stadium => format!("{id}([\"{name}\"])"),
        Shape::Cylinder => format!("{id}[(\"{name}\")]"),
        Shape::Circle => format!("{id}((\"{name}\"))"),
        Shape::Hexagon => format!("{id}{{{{\"{name}\"}}}}"),
        Shape::Trapezoid => format!("{id}[/\"{name}\"/]"),
        Shape::Subroutine => format!("{id}[[\"{name}\"]]"),
    }
}

/// Mermaid labels cannot contain raw quotes or pipes.
fn escape_label(text: &str) -> String {
    text.replace('"', "#quot;").replace('|', "#124;")
}
