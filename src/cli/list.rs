use std::path::PathBuf;

use archimd::{Directory, Element, Layer};
use clap::{Parser, ValueEnum};
use tracing::instrument;

use super::terminal::{Colorize, is_narrow};

/// Command arguments for `archimd list`.
#[derive(Debug, Parser)]
#[command(about = "List elements grouped by layer")]
pub struct List {
    /// Only list elements of this layer.
    #[arg(long)]
    layer: Option<Layer>,

    /// Output format (default: table).
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl List {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load_all();
        let registry = directory.registry();

        let mut groups: Vec<(String, Vec<&Element>)> = Vec::new();
        for element in registry.elements() {
            if self.layer.is_some_and(|layer| element.layer != layer.name()) {
                continue;
            }
            match groups.iter_mut().find(|(layer, _)| *layer == element.layer) {
                Some((_, members)) => members.push(element),
                None => groups.push((element.layer.clone(), vec![element])),
            }
        }
        // Known layers in diagram order, anything else alphabetically after.
        groups.sort_by_key(|(layer, _)| {
            let position = layer
                .parse::<Layer>()
                .ok()
                .and_then(|known| Layer::ALL.iter().position(|&l| l == known));
            (position.unwrap_or(Layer::ALL.len()), layer.clone())
        });
        for (_, members) in &mut groups {
            members.sort_by(|a, b| a.id.cmp(&b.id));
        }

        match self.output {
            OutputFormat::Table => output_table(&groups),
            OutputFormat::Json => output_json(&groups)?,
        }

        Ok(())
    }
}

fn output_table(groups: &[(String, Vec<&Element>)]) {
    if groups.is_empty() {
        println!("{}", "No elements found".dim());
        return;
    }

    let narrow = is_narrow();
    for (layer, members) in groups {
        println!("{}", format!("{} ({})", layer.to_uppercase(), members.len()).info());
        for element in members {
            if narrow {
                println!("  {}", element.id);
            } else {
                println!("  • {}: {}", element.id, element.name);
            }
        }
        println!();
    }
}

fn output_json(groups: &[(String, Vec<&Element>)]) -> anyhow::Result<()> {
    use serde_json::json;

    let layers: serde_json::Map<String, serde_json::Value> = groups
        .iter()
        .map(|(layer, members)| {
            let elements: Vec<_> = members
                .iter()
                .map(|element| {
                    json!({
                        "id": element.id,
                        "name": element.name,
                        "type": element.element_type,
                    })
                })
                .collect();
            (layer.clone(), json!(elements))
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&layers)?);
    Ok(())
}
