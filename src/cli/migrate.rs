use std::path::PathBuf;

use archimd::{
    Directory,
    migration::{Migration, Outcome, Plan, Strategy},
};
use clap::{Args, Parser};
use dialoguer::Confirm;
use tracing::instrument;

use super::terminal::Colorize;

/// Options shared by every command that rewrites IDs.
#[derive(Debug, Args)]
struct Apply {
    /// Show the plan without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,

    /// Where to write the backup (defaults to the configured backup directory)
    #[arg(long, value_name = "DIR")]
    backup_dir: Option<PathBuf>,
}

#[derive(Debug, Parser)]
#[command(about = "Convert legacy IDs to the canonical format")]
pub struct Migrate {
    #[command(flatten)]
    apply: Apply,
}

impl Migrate {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        self.apply.run(root, Strategy::Legacy)
    }
}

#[derive(Debug, Parser)]
#[command(about = "Resolve duplicate sequence numbers within each layer and type")]
pub struct Renumber {
    /// Also close gaps, so every group is numbered from 001 without holes
    #[arg(long)]
    compact: bool,

    #[command(flatten)]
    apply: Apply,
}

impl Renumber {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        self.apply.run(root, Strategy::Renumber {
            compact: self.compact,
        })
    }
}

#[derive(Debug, Parser)]
#[command(about = "Apply the audit's suggested IDs and file names")]
pub struct Fix {
    #[command(flatten)]
    apply: Apply,
}

impl Fix {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        self.apply.run(root, Strategy::Compliance)
    }
}

impl Apply {
    fn run(self, root: PathBuf, strategy: Strategy) -> anyhow::Result<()> {
        let directory = Directory::new(root).load_all();
        if !directory.elements_dir().is_dir() {
            anyhow::bail!(
                "Elements directory not found: {}",
                directory.elements_dir().display()
            );
        }
        for failure in directory.failures() {
            eprintln!(
                "{}",
                format!("⚠ Skipping {}: {}", failure.path.display(), failure.error).warning()
            );
        }

        let plan = Plan::new(&directory, strategy)?;
        print!("{plan}");

        if plan.is_empty() {
            return Ok(());
        }

        if self.dry_run {
            println!("\n{}", "Dry run: no files were changed".dim());
            return Ok(());
        }

        if !self.yes {
            let proceed = Confirm::new()
                .with_prompt("Apply these changes?")
                .default(false)
                .interact()?;
            if !proceed {
                println!("Cancelled");
                std::process::exit(130);
            }
        }

        let backup_root = self
            .backup_dir
            .unwrap_or_else(|| plan.root().join(&plan.config().backup_dir));

        match Migration::new(&plan, backup_root).run() {
            Ok(outcome) => report(&outcome),
            Err(error) => {
                if let Some(backup) = &error.backup {
                    eprintln!(
                        "{}",
                        format!("The previous state is in {}", backup.display()).warning()
                    );
                }
                Err(error.into())
            }
        }
    }
}

fn report(outcome: &Outcome) -> anyhow::Result<()> {
    println!();
    println!("{}", format!("✓ Backup written to {}", outcome.backup.display()).success());
    println!("{}", format!("✓ Updated {} ID(s)", outcome.ids_updated).success());
    println!(
        "{}",
        format!("✓ Updated {} reference(s)", outcome.references_updated).success()
    );
    println!("{}", format!("✓ Renamed {} file(s)", outcome.files_renamed).success());

    let verification = &outcome.verification;
    if verification.is_clean() {
        println!("{}", "✓ Verification passed".success());
        return Ok(());
    }

    println!("\n{}", "Verification found remaining issues:".warning());
    for (id, violation) in &verification.invalid {
        println!("  {id}: {violation}");
    }
    for conflict in &verification.conflicts {
        println!(
            "  {}-{:03} is used by {}",
            conflict.group,
            conflict.sequence,
            conflict.ids.join(", ")
        );
    }
    if verification.failures > 0 {
        println!("  {} file(s) failed to load", verification.failures);
    }
    std::process::exit(2);
}
