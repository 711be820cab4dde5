use std::path::{Path, PathBuf};

mod audit;
mod check;
mod export;
mod list;
mod migrate;
mod new;
mod show;
mod terminal;

use audit::Audit;
use check::{Check, FixRelationships};
use clap::ArgAction;
use export::Export;
use list::List;
use migrate::{Fix, Migrate, Renumber};
use new::New;
use show::Show;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global=true)]
    verbose: u8,

    /// The path to the root of the architecture repository
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::Audit(Audit::default()))
            .run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Audit element IDs and file names (default)
    ///
    /// Reports IDs that do not follow the canonical
    /// `{layer}-{type}-{###}-{slug}` format, files not named after their ID,
    /// and how many other elements reference each offending ID.
    Audit(Audit),

    /// Check element files against the ArchiMate vocabulary
    Check(Check),

    /// Convert legacy `{layer}-{type}-{slug}-{###}` IDs to the canonical form
    Migrate(Migrate),

    /// Resolve duplicate sequence numbers
    Renumber(Renumber),

    /// Apply the audit's suggested IDs and file names
    Fix(Fix),

    /// Rewrite aliased relationship types to their canonical names
    FixRelationships(FixRelationships),

    /// Create a new element
    New(New),

    /// List elements by layer
    List(List),

    /// Show an element and its relationships
    Show(Show),

    /// Generate diagrams or a model exchange file
    Export(Export),
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Audit(command) => command.run(root)?,
            Self::Check(command) => command.run(root)?,
            Self::Migrate(command) => command.run(root)?,
            Self::Renumber(command) => command.run(root)?,
            Self::Fix(command) => command.run(root)?,
            Self::FixRelationships(command) => command.run(root)?,
            Self::New(command) => command.run(root)?,
            Self::List(command) => command.run(root)?,
            Self::Show(command) => command.run(root)?,
            Self::Export(command) => command.run(root)?,
        }
        Ok(())
    }
}

/// A path for display, relative to `base` where possible.
fn relative<'a>(path: &'a Path, base: &Path) -> &'a Path {
    path.strip_prefix(base).unwrap_or(path)
}
