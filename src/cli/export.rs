use std::{fs, path::PathBuf};

use anyhow::Context;
use archimd::{
    Directory, Layer,
    export::{Exchange, Mermaid, PlantUml, Scope, View},
};
use clap::{Args, Parser, Subcommand};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Generate diagrams or a model exchange file")]
pub struct Export {
    #[command(subcommand)]
    format: Format,
}

#[derive(Debug, Subcommand)]
enum Format {
    /// Write a Mermaid flowchart (`.mmd`)
    Mermaid(Diagram),

    /// Write a PlantUML diagram (`.puml`)
    Plantuml(Diagram),

    /// Write an ArchiMate Model Exchange file covering every element
    Exchange {
        /// Output file (defaults to `model-exchange.archimate` in the output directory)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

/// Which part of the model to draw. Without options the whole model is drawn.
#[derive(Debug, Args)]
struct Diagram {
    /// Draw a single layer
    #[arg(long, conflicts_with = "element")]
    layer: Option<Layer>,

    /// Draw the neighbourhood of one element
    #[arg(long, value_name = "ID")]
    element: Option<String>,

    /// How many relationship hops to follow around `--element`
    #[arg(long, default_value_t = 1, requires = "element")]
    depth: usize,
}

impl Diagram {
    fn scope(&self) -> Scope {
        match (&self.layer, &self.element) {
            (Some(layer), _) => Scope::Layer(*layer),
            (None, Some(id)) => Scope::Context {
                id: id.clone(),
                depth: self.depth,
            },
            (None, None) => Scope::Full,
        }
    }
}

impl Export {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load_all();
        let registry = directory.registry();
        let output_dir = directory.root().join(&directory.config().output_dir);

        for failure in directory.failures() {
            eprintln!(
                "{}",
                format!("⚠ Skipping {}: {}", failure.path.display(), failure.error).warning()
            );
        }

        let (path, content, dangling) = match self.format {
            Format::Mermaid(diagram) => {
                let scope = diagram.scope();
                let view = View::new(registry, &scope)?;
                let path = output_dir.join(format!("{}.mmd", scope.file_stem()));
                (path, Mermaid(&view).to_string(), view.dangling.len())
            }
            Format::Plantuml(diagram) => {
                let scope = diagram.scope();
                let view = View::new(registry, &scope)?;
                let path = output_dir.join(format!("{}.puml", scope.file_stem()));
                (path, PlantUml(&view).to_string(), view.dangling.len())
            }
            Format::Exchange { out } => {
                if registry.is_empty() {
                    anyhow::bail!("No elements found in {}", directory.elements_dir().display());
                }
                let exchange = Exchange(registry);
                println!(
                    "Exporting {} element(s) and {} relationship(s)",
                    registry.len(),
                    exchange.relationship_count()
                );
                let path = out.unwrap_or_else(|| output_dir.join("model-exchange.archimate"));
                let dangling = registry.dangling_references().len();
                (path, exchange.to_string(), dangling)
            }
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;

        if dangling > 0 {
            eprintln!(
                "{}",
                format!("⚠ Skipped {dangling} relationship(s) to missing elements").warning()
            );
        }
        println!("{}", format!("✓ Wrote {}", path.display()).success());

        Ok(())
    }
}
