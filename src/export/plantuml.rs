use std::fmt;

use crate::{
    domain::{Element, RelationshipType},
    export::{View, sanitize_id},
};

const UNLAYERED_COLOUR: &str = "#FFFFFF";
const FOCUS_COLOUR: &str = "#lightblue";

/// Renders a [`View`] as a PlantUML component diagram.
#[derive(Debug)]
pub struct PlantUml<'v, 'a>(pub &'v View<'a>);

impl fmt::Display for PlantUml<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.0;

        writeln!(f, "@startuml")?;
        writeln!(f)?;
        writeln!(f, "title {}", view.title)?;
        writeln!(f)?;
        writeln!(f, "' Styling")?;
        writeln!(f, "skinparam componentStyle rectangle")?;
        writeln!(f, "skinparam backgroundColor white")?;
        writeln!(f, "skinparam shadowing false")?;

        for (layer, elements) in view.by_layer() {
            match layer {
                Some(layer) => writeln!(f, "\n' {} Layer", layer.title())?,
                None => writeln!(f, "\n' Other Elements")?,
            }
            for element in elements {
                let colour = if view.focus == Some(element.id.as_str()) {
                    FOCUS_COLOUR
                } else {
                    layer.map_or(UNLAYERED_COLOUR, |l| l.colour())
                };
                writeln!(f, "{}", component(element, colour))?;
            }
        }

        writeln!(f, "\n' Relationships")?;
        for edge in &view.edges {
            let arrow = edge
                .relationship
                .kind
                .map_or("--", RelationshipType::plantuml_arrow);
            let source = sanitize_id(&edge.source.id);
            let target = sanitize_id(&edge.target.id);
            match edge.relationship.description.as_deref().filter(|d| !d.is_empty()) {
                Some(description) => writeln!(f, "{source} {arrow} {target} : {description}")?,
                None => writeln!(f, "{source} {arrow} {target}")?,
            }
        }

        writeln!(f, "\n@enduml")
    }
}

fn component(element: &Element, colour: &str) -> String {
    format!(
        "component \"{}\" as {} {colour}",
        element.name.replace('"', "'"),
        sanitize_id(&element.id)
    )
}
