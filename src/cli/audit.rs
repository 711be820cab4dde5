use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use archimd::{
    Directory,
    audit::{self, AuditEntry, AuditReport, REFERENCE_PREVIEW},
};
use clap::Parser;
use tracing::instrument;

use super::{
    relative,
    terminal::{Colorize, rule},
};

#[derive(Debug, Default, Parser)]
#[command(about = "Audit element IDs and file names against the naming standard")]
pub struct Audit {
    /// Also write a markdown report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Audit {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load_all();
        let elements_dir = directory.elements_dir();
        if !elements_dir.is_dir() {
            anyhow::bail!("Elements directory not found: {}", elements_dir.display());
        }

        let report = audit::audit(&directory);

        match self.output {
            OutputFormat::Table => print!("{}", Table(&report, &elements_dir)),
            OutputFormat::Json => output_json(&report, &elements_dir)?,
        }

        if let Some(path) = &self.report {
            fs::write(path, Markdown(&report, &elements_dir).to_string())
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if matches!(self.output, OutputFormat::Table) {
                println!("\nDetailed report saved to: {}", path.display());
            }
        }

        if !report.is_clean() {
            std::process::exit(2);
        }

        Ok(())
    }
}

fn total(report: &AuditReport) -> usize {
    report.entries.len() + report.errors.len()
}

fn suggestion(entry: &AuditEntry) -> String {
    match &entry.suggestion {
        Some(Ok(id)) => id.to_string(),
        Some(Err(error)) => format!("none ({error})"),
        None => entry.id.clone(),
    }
}

fn id_issue(entry: &AuditEntry) -> String {
    entry
        .id_check
        .as_ref()
        .err()
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// The console report.
struct Table<'a>(&'a AuditReport, &'a Path);

impl fmt::Display for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(report, base) = *self;
        let heavy = rule('=');
        let light = rule('-');

        writeln!(f, "\n{heavy}")?;
        writeln!(f, "ELEMENT ID NAMING STANDARD AUDIT REPORT")?;
        writeln!(f, "{heavy}")?;

        writeln!(f, "\nTotal files scanned: {}", total(report))?;
        writeln!(f, "{}", format!("✓ Compliant: {}", report.compliant().count()).success())?;
        let ids = report.non_compliant_ids().count();
        let filenames = report.non_compliant_filenames().count();
        let line = format!("✗ Non-compliant IDs: {ids}");
        writeln!(f, "{}", if ids == 0 { line } else { line.error() })?;
        let line = format!("✗ Non-compliant filenames: {filenames}");
        writeln!(f, "{}", if filenames == 0 { line } else { line.error() })?;
        writeln!(f, "{}", format!("⚠ Errors: {}", report.errors.len()).warning())?;

        if !report.errors.is_empty() {
            writeln!(f, "\n{light}\nERRORS\n{light}")?;
            for (path, error) in &report.errors {
                writeln!(f, "\n{}", relative(path, base).display())?;
                writeln!(f, "  Error: {error}")?;
            }
        }

        if ids > 0 {
            writeln!(f, "\n{light}\nNON-COMPLIANT IDs\n{light}")?;
            for entry in report.non_compliant_ids() {
                writeln!(f, "\n{}", relative(&entry.path, base).display())?;
                writeln!(f, "  Current ID: {}", entry.id)?;
                writeln!(f, "  Issue: {}", id_issue(entry))?;
                writeln!(f, "  Suggested: {}", suggestion(entry).info())?;
                if entry.reference_count > 0 {
                    writeln!(
                        f,
                        "  {}",
                        format!("⚠ Referenced by {} file(s):", entry.reference_count).warning()
                    )?;
                    for reference in &entry.references {
                        writeln!(f, "    - {}", relative(&reference.path, base).display())?;
                    }
                    if entry.reference_count > REFERENCE_PREVIEW {
                        writeln!(f, "    ... and {} more", entry.reference_count - REFERENCE_PREVIEW)?;
                    }
                }
            }
        }

        let filename_only: Vec<_> = report
            .non_compliant_filenames()
            .filter(|entry| entry.id_compliant())
            .collect();
        if !filename_only.is_empty() {
            writeln!(f, "\n{light}\nNON-COMPLIANT FILENAMES\n{light}")?;
            for entry in filename_only {
                writeln!(f, "\n{}", relative(&entry.path, base).display())?;
                writeln!(f, "  Current: {}", file_name(&entry.path))?;
                writeln!(f, "  Suggested: {}", format!("{}.md", entry.id).info())?;
            }
        }

        if !report.duplicates.is_empty() {
            writeln!(f, "\n{light}\nDUPLICATE IDs\n{light}")?;
            for duplicate in &report.duplicates {
                writeln!(f, "\n{}", duplicate.id)?;
                writeln!(f, "  Kept: {}", relative(&duplicate.kept, base).display())?;
                writeln!(f, "  Replaced: {}", relative(&duplicate.replaced, base).display())?;
            }
        }

        if !report.dangling.is_empty() {
            writeln!(f, "\n{light}\nDANGLING REFERENCES\n{light}\n")?;
            for reference in &report.dangling {
                writeln!(
                    f,
                    "  {} --{}--> {}",
                    reference.source,
                    reference.kind,
                    reference.target.warning()
                )?;
            }
        }

        writeln!(f, "\n{heavy}")?;
        writeln!(f, "END OF REPORT")?;
        writeln!(f, "{heavy}")
    }
}

/// The report written with `--report`.
struct Markdown<'a>(&'a AuditReport, &'a Path);

impl fmt::Display for Markdown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(report, base) = *self;

        writeln!(f, "# Element ID Naming Standard Audit Report\n")?;
        writeln!(f, "**Total files scanned:** {}\n", total(report))?;
        writeln!(f, "- ✓ Compliant: {}", report.compliant().count())?;
        writeln!(f, "- ✗ Non-compliant IDs: {}", report.non_compliant_ids().count())?;
        writeln!(
            f,
            "- ✗ Non-compliant filenames: {}",
            report.non_compliant_filenames().count()
        )?;
        writeln!(f, "- ⚠ Errors: {}\n", report.errors.len())?;

        if report.non_compliant_ids().next().is_some() {
            writeln!(f, "## Non-Compliant IDs\n")?;
            for entry in report.non_compliant_ids() {
                writeln!(f, "### {}\n", relative(&entry.path, base).display())?;
                writeln!(f, "- **Current ID:** `{}`", entry.id)?;
                writeln!(f, "- **Issue:** {}", id_issue(entry))?;
                writeln!(f, "- **Suggested:** `{}`", suggestion(entry))?;
                writeln!(f, "- **Element Name:** {}", entry.name)?;
                writeln!(f, "- **Layer:** {}", entry.layer)?;
                writeln!(f, "- **Type:** {}", entry.element_type)?;
                if entry.reference_count > 0 {
                    writeln!(f, "- **Referenced by:** {} file(s)", entry.reference_count)?;
                    for reference in &entry.references {
                        writeln!(
                            f,
                            "  - {} ({})",
                            relative(&reference.path, base).display(),
                            reference.kind
                        )?;
                    }
                    if entry.reference_count > REFERENCE_PREVIEW {
                        writeln!(f, "  - ... and {} more", entry.reference_count - REFERENCE_PREVIEW)?;
                    }
                }
                writeln!(f)?;
            }
        }

        let filename_only: Vec<_> = report
            .non_compliant_filenames()
            .filter(|entry| entry.id_compliant())
            .collect();
        if !filename_only.is_empty() {
            writeln!(f, "## Non-Compliant Filenames\n")?;
            for entry in filename_only {
                writeln!(f, "### {}\n", relative(&entry.path, base).display())?;
                writeln!(f, "- **Current:** `{}`", file_name(&entry.path))?;
                writeln!(f, "- **Suggested:** `{}.md`", entry.id)?;
                writeln!(f, "- **ID:** `{}`\n", entry.id)?;
            }
        }

        if !report.errors.is_empty() {
            writeln!(f, "## Errors\n")?;
            for (path, error) in &report.errors {
                writeln!(f, "### {}\n", relative(path, base).display())?;
                writeln!(f, "- **Error:** {error}\n")?;
            }
        }

        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn output_json(report: &AuditReport, base: &Path) -> anyhow::Result<()> {
    use serde_json::json;

    let entries: Vec<_> = report
        .entries
        .iter()
        .filter(|entry| !entry.is_compliant())
        .map(|entry| {
            json!({
                "file": relative(&entry.path, base),
                "id": entry.id,
                "name": entry.name,
                "layer": entry.layer,
                "type": entry.element_type,
                "id_compliant": entry.id_compliant(),
                "id_issue": entry.id_check.as_ref().err().map(ToString::to_string),
                "filename_compliant": entry.filename_compliant(),
                "suggested_id": entry.suggested_id().map(ToString::to_string),
                "referenced_by": entry.reference_count,
            })
        })
        .collect();

    let errors: Vec<_> = report
        .errors
        .iter()
        .map(|(path, error)| json!({ "file": relative(path, base), "error": error }))
        .collect();

    let dangling: Vec<_> = report
        .dangling
        .iter()
        .map(|reference| {
            json!({
                "source": reference.source,
                "target": reference.target,
                "type": reference.kind,
            })
        })
        .collect();

    let output = json!({
        "status": if report.is_clean() { "compliant" } else { "issues_found" },
        "summary": {
            "total_files": total(report),
            "compliant": report.compliant().count(),
            "non_compliant_ids": report.non_compliant_ids().count(),
            "non_compliant_filenames": report.non_compliant_filenames().count(),
            "errors": report.errors.len(),
        },
        "non_compliant": entries,
        "errors": errors,
        "duplicates": report.duplicates.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
        "dangling_references": dangling,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
