//! Rewrites relationship types declared with an alias or in the wrong case.

use std::{fmt, path::PathBuf};

use nonempty::NonEmpty;
use serde_yaml::{Mapping, Value};

use crate::{
    domain::RelationshipType,
    storage::{Directory, Loaded, WriteError, write_document},
};

/// One relationship type that was (or would be) rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFix {
    /// The element file.
    pub path: PathBuf,
    /// The declared value.
    pub from: String,
    /// The canonical name.
    pub to: RelationshipType,
}

/// Files that could not be rewritten.
#[derive(Debug, thiserror::Error)]
pub struct FixupError {
    /// The fixes that were written before and after the failures.
    pub applied: Vec<TypeFix>,
    failures: NonEmpty<(PathBuf, WriteError)>,
}

impl FixupError {
    /// The files that failed, with the reason.
    #[must_use]
    pub const fn failures(&self) -> &NonEmpty<(PathBuf, WriteError)> {
        &self.failures
    }
}

impl fmt::Display for FixupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_DISPLAY: usize = 5;

        write!(f, "failed to rewrite relationship types: ")?;

        let total = self.failures.len();
        let displayed: Vec<String> = self
            .failures
            .iter()
            .take(MAX_DISPLAY)
            .map(|(path, _)| path.display().to_string())
            .collect();
        write!(f, "{}", displayed.join(", "))?;

        if total > MAX_DISPLAY {
            write!(f, "... (and {} more)", total - MAX_DISPLAY)?;
        }
        Ok(())
    }
}

/// Rewrites every aliased relationship type to its canonical name.
///
/// With `dry_run`, nothing is written and the returned fixes describe what
/// would change. Unknown types are left as they are.
///
/// # Errors
///
/// Every file is attempted; if any could not be written the error lists
/// them alongside the fixes that did land.
pub fn normalize_relationship_types(
    directory: &Directory<Loaded>,
    dry_run: bool,
) -> Result<Vec<TypeFix>, FixupError> {
    let mut applied = Vec::new();
    let mut failures = Vec::new();

    for record in directory.records() {
        let mut document = record.document.clone();
        let fixes = normalize_front_matter(&mut document.front_matter);
        if fixes.is_empty() {
            continue;
        }

        let fixes = fixes.into_iter().map(|(from, to)| TypeFix {
            path: record.path.clone(),
            from,
            to,
        });

        if dry_run {
            applied.extend(fixes);
            continue;
        }

        match write_document(&record.path, &document) {
            Ok(()) => {
                tracing::debug!("Normalised relationship types in {}", record.path.display());
                applied.extend(fixes);
            }
            Err(error) => failures.push((record.path.clone(), error)),
        }
    }

    match NonEmpty::from_vec(failures) {
        None => Ok(applied),
        Some(failures) => Err(FixupError { applied, failures }),
    }
}

fn normalize_front_matter(front_matter: &mut Mapping) -> Vec<(String, RelationshipType)> {
    let Some(relationships) = front_matter
        .get_mut("relationships")
        .and_then(Value::as_sequence_mut)
    else {
        return Vec::new();
    };

    let mut fixes = Vec::new();
    for relationship in relationships.iter_mut().filter_map(Value::as_mapping_mut) {
        let Some(declared) = relationship.get("type").and_then(Value::as_str) else {
            continue;
        };
        let Some(canonical) = RelationshipType::normalize(declared) else {
            continue;
        };
        if declared == canonical.name() {
            continue;
        }
        fixes.push((declared.to_string(), canonical));
        relationship.insert("type".into(), canonical.name().into());
    }
    fixes
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const ELEMENT: &str = "---\nid: app-comp-001-portal\nname: Portal\ntype: application-component\nlayer: application\nrelationships:\n- type: realizationOf\n  target: app-serv-001-login\n- type: Serving\n  target: app-serv-002-search\n- type: flow\n  target: app-serv-003-report\n- type: mystery\n  target: app-serv-004-other\n---\n\nbody stays\n";

    fn setup() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("elements/app-comp-001-portal.md");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, ELEMENT).unwrap();
        (tmp, path)
    }

    #[test]
    fn aliases_and_case_variants_are_rewritten() {
        let (tmp, path) = setup();
        let directory = Directory::new(tmp.path().to_path_buf()).load_all();

        let fixes = normalize_relationship_types(&directory, false).unwrap();

        let summary: Vec<_> = fixes.iter().map(|f| (f.from.as_str(), f.to)).collect();
        assert_eq!(
            summary,
            vec![
                ("realizationOf", RelationshipType::Realization),
                ("Serving", RelationshipType::Serving),
            ]
        );
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("type: realization\n"));
        assert!(text.contains("type: serving\n"));
        assert!(text.contains("type: mystery\n"));
        assert!(text.ends_with("---\n\nbody stays\n"));
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let (tmp, path) = setup();
        let directory = Directory::new(tmp.path().to_path_buf()).load_all();

        let fixes = normalize_relationship_types(&directory, true).unwrap();

        assert_eq!(fixes.len(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), ELEMENT);
    }

    #[test]
    fn clean_files_are_not_touched() {
        let (tmp, _) = setup();
        let directory = Directory::new(tmp.path().to_path_buf()).load_all();
        normalize_relationship_types(&directory, false).unwrap();

        let directory = directory.reload();
        assert!(normalize_relationship_types(&directory, false).unwrap().is_empty());
    }
}
