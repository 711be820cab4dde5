use std::path::PathBuf;

use archimd::{Directory, Element, Registry};
use clap::Parser;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Display an element with its relationships")]
pub struct Show {
    /// The ID of the element to display
    id: String,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,

    /// Include the markdown body
    #[arg(long)]
    with_content: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

impl Show {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load_all();
        let registry = directory.registry();

        let Some(element) = registry.get(&self.id) else {
            eprintln!("Element {} not found", self.id);
            std::process::exit(1);
        };

        match self.output {
            OutputFormat::Pretty => self.output_pretty(registry, element),
            OutputFormat::Json => self.output_json(registry, element)?,
        }

        Ok(())
    }

    fn output_pretty(&self, registry: &Registry, element: &Element) {
        println!("# {}", element.id);
        println!("{}\n", element.name);

        println!("{}", "Metadata".dim());
        println!("  Type:      {}", element.element_type);
        println!("  Layer:     {}", element.layer);
        if let Some(path) = registry.source(&element.id) {
            println!("  Path:      {}", path.display());
        }

        if !element.properties.is_empty() {
            println!("\n{}", "Properties".dim());
            for (key, value) in &element.properties {
                println!("  {key}: {value}");
            }
        }

        if !element.tags.is_empty() {
            println!("\n{}", "Tags".dim());
            for tag in &element.tags {
                println!("  • {tag}");
            }
        }

        if !element.relationships.is_empty() {
            println!("\n{}", "Outgoing".dim());
            for relationship in &element.relationships {
                let target = match registry.get(&relationship.target) {
                    Some(target) => format!("{} ({})", relationship.target, target.name),
                    None => format!("{} (missing)", relationship.target).warning(),
                };
                let description = relationship
                    .description
                    .as_deref()
                    .map(|d| format!(" - {d}"))
                    .unwrap_or_default();
                println!("  • {} → {target}{description}", relationship.type_name());
            }
        }

        let mut incoming = registry.incoming(&element.id).to_vec();
        if !incoming.is_empty() {
            incoming.sort_by(|a, b| a.source.cmp(&b.source));
            println!("\n{}", "Incoming".dim());
            for edge in &incoming {
                println!("  • {} ← {}", edge.kind, edge.source);
            }
        }

        if self.with_content {
            println!("\n{}", "Content".dim());
            println!("{}", element.documentation.trim_end());
        }
    }

    fn output_json(&self, registry: &Registry, element: &Element) -> anyhow::Result<()> {
        use serde_json::json;

        let outgoing: Vec<_> = element
            .relationships
            .iter()
            .map(|relationship| {
                json!({
                    "type": relationship.type_name(),
                    "target": relationship.target,
                    "description": relationship.description,
                    "resolved": registry.contains(&relationship.target),
                })
            })
            .collect();

        let mut incoming = registry.incoming(&element.id).to_vec();
        incoming.sort_by(|a, b| a.source.cmp(&b.source));
        let incoming: Vec<_> = incoming
            .iter()
            .map(|edge| {
                json!({
                    "type": edge.kind,
                    "source": edge.source,
                    "description": edge.description,
                })
            })
            .collect();

        let mut output = json!({
            "id": element.id,
            "name": element.name,
            "type": element.element_type,
            "layer": element.layer,
            "path": registry.source(&element.id),
            "properties": element.properties,
            "tags": element.tags,
            "outgoing": outgoing,
            "incoming": incoming,
        });
        if self.with_content {
            output["content"] = json!(element.documentation);
        }

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
