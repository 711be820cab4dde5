use std::path::PathBuf;

use archimd::{Directory, ElementType, Layer};
use clap::Parser;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Create a new element with the next free ID")]
pub struct New {
    /// The layer, e.g. `application`
    layer: Layer,

    /// The element type, e.g. `application-component`
    #[arg(value_name = "TYPE")]
    element_type: String,

    /// The element name
    name: String,

    /// Tags to attach (can be given multiple times)
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,
}

impl New {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let Some(element_type) = ElementType::by_name(&self.element_type) else {
            let known: Vec<_> = self.layer.element_types().map(|t| t.name).collect();
            anyhow::bail!(
                "Unknown element type '{}'. Types in the {} layer: {}",
                self.element_type,
                self.layer,
                known.join(", ")
            );
        };

        let mut directory = Directory::new(root).load_all();
        let record = directory.add_element(self.layer, element_type, &self.name, &self.tags)?;

        println!(
            "{} {}",
            "Created".success(),
            record.element.id.info()
        );
        println!("  {}", record.path.display().to_string().dim());

        Ok(())
    }
}
