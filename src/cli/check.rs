use std::path::PathBuf;

use archimd::{
    Directory,
    check::{self, Severity},
    fixup,
};
use clap::Parser;
use tracing::instrument;

use super::{relative, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Check element files against the ArchiMate vocabulary")]
pub struct Check {
    /// Only report errors
    #[arg(long, short)]
    quiet: bool,
}

impl Check {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load_all();
        let base = directory.elements_dir();
        let report = check::check(&directory);

        let mut current = None;
        for finding in &report.findings {
            let severity = finding.issue.severity();
            if self.quiet && severity == Severity::Warning {
                continue;
            }
            if current != Some(&finding.path) {
                println!("\n{}", relative(&finding.path, &base).display());
                current = Some(&finding.path);
            }
            match severity {
                Severity::Error => println!("  {} {}", "error:".error(), finding.issue),
                Severity::Warning => println!("  {} {}", "warning:".warning(), finding.issue),
            }
        }

        let errors = report.with_severity(Severity::Error).count();
        let warnings = report.with_severity(Severity::Warning).count();
        let summary = format!(
            "Checked {} file(s): {errors} error(s), {warnings} warning(s)",
            report.files
        );
        if errors > 0 {
            println!("\n{}", summary.error());
            std::process::exit(2);
        }
        println!("\n{}", summary.success());

        Ok(())
    }
}

#[derive(Debug, Parser)]
#[command(about = "Rewrite aliased relationship types to their canonical names")]
pub struct FixRelationships {
    /// Show what would change without writing anything
    #[arg(long)]
    dry_run: bool,
}

impl FixRelationships {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load_all();
        let base = directory.elements_dir();

        let fixes = fixup::normalize_relationship_types(&directory, self.dry_run)?;

        for fix in &fixes {
            println!(
                "  {}: {} → {}",
                relative(&fix.path, &base).display(),
                fix.from,
                fix.to.to_string().info()
            );
        }

        let mut files: Vec<_> = fixes.iter().map(|fix| &fix.path).collect();
        files.dedup();
        let verb = if self.dry_run { "Would fix" } else { "Fixed" };
        println!(
            "{}",
            format!(
                "{verb} {} relationship type(s) in {} file(s)",
                fixes.len(),
                files.len()
            )
            .success()
        );

        Ok(())
    }
}
