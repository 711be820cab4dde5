//! ID and filename compliance.
//!
//! The auditor never mutates anything. It checks every element's ID against
//! the canonical format and its file name against its ID, suggests a
//! corrected ID for anything that fails, and measures how many other
//! elements would be affected by the correction.

use std::path::PathBuf;

use crate::{
    domain::{
        DanglingReference, DuplicateId, Element, Registry,
        id::{self, CanonicalId, DeriveError, IdViolation},
    },
    storage::{Directory, Loaded},
};

/// How many referencing elements a report entry lists by name.
pub const REFERENCE_PREVIEW: usize = 3;

/// The file name does not match the ID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Should be '{expected}'")]
pub struct FilenameMismatch {
    /// The file name the element should have.
    pub expected: String,
}

/// An element that points at an audited one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The referencing element.
    pub source: String,
    /// The file it was loaded from.
    pub path: PathBuf,
    /// The relationship type.
    pub kind: String,
}

/// The audit result for one element.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// The file the element was loaded from.
    pub path: PathBuf,
    /// The current ID.
    pub id: String,
    /// The element name.
    pub name: String,
    /// The declared layer.
    pub layer: String,
    /// The declared element type.
    pub element_type: String,
    /// The ID check.
    pub id_check: Result<CanonicalId, IdViolation>,
    /// The filename check.
    pub filename_check: Result<(), FilenameMismatch>,
    /// A corrected ID, present when either check failed.
    pub suggestion: Option<Result<CanonicalId, DeriveError>>,
    /// How many other elements reference this ID.
    pub reference_count: usize,
    /// The first few of those, sorted by source ID.
    pub references: Vec<Reference>,
}

impl AuditEntry {
    /// Whether the ID passed validation.
    #[must_use]
    pub const fn id_compliant(&self) -> bool {
        self.id_check.is_ok()
    }

    /// Whether the file name matches the ID.
    #[must_use]
    pub const fn filename_compliant(&self) -> bool {
        self.filename_check.is_ok()
    }

    /// Whether both checks passed.
    #[must_use]
    pub const fn is_compliant(&self) -> bool {
        self.id_compliant() && self.filename_compliant()
    }

    /// The suggested ID, if one could be derived.
    #[must_use]
    pub fn suggested_id(&self) -> Option<&CanonicalId> {
        self.suggestion.as_ref().and_then(|s| s.as_ref().ok())
    }
}

/// The outcome of auditing a repository.
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    /// One entry per element, sorted by path.
    pub entries: Vec<AuditEntry>,
    /// Files that could not be loaded, with the reason.
    pub errors: Vec<(PathBuf, String)>,
    /// Relationships pointing at unknown elements.
    pub dangling: Vec<DanglingReference>,
    /// IDs declared by more than one file.
    pub duplicates: Vec<DuplicateId>,
}

impl AuditReport {
    /// Elements that passed both checks.
    pub fn compliant(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|entry| entry.is_compliant())
    }

    /// Elements whose ID failed validation.
    pub fn non_compliant_ids(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|entry| !entry.id_compliant())
    }

    /// Elements whose file name does not match their ID.
    pub fn non_compliant_filenames(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|entry| !entry.filename_compliant())
    }

    /// Whether every element is compliant and every file loaded.
    ///
    /// Dangling references are warnings and do not count.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
            && self.duplicates.is_empty()
            && self.entries.iter().all(AuditEntry::is_compliant)
    }
}

/// Audits every element of a loaded directory.
#[must_use]
pub fn audit(directory: &Directory<Loaded>) -> AuditReport {
    let registry = directory.registry();

    let mut entries: Vec<_> = registry
        .elements()
        .map(|element| {
            let path = registry
                .source(&element.id)
                .map(PathBuf::from)
                .unwrap_or_default();
            audit_element(registry, element, path)
        })
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    let mut errors: Vec<_> = directory
        .failures()
        .iter()
        .map(|failure| (failure.path.clone(), failure.error.to_string()))
        .collect();
    errors.sort();

    let dangling = registry.dangling_references();
    for reference in &dangling {
        tracing::warn!(
            "{} has a {} relationship to unknown element {}",
            reference.source,
            reference.kind,
            reference.target
        );
    }

    AuditReport {
        entries,
        errors,
        dangling,
        duplicates: registry.duplicates().to_vec(),
    }
}

fn audit_element(registry: &Registry, element: &Element, path: PathBuf) -> AuditEntry {
    let id_check = id::validate(Some(&element.id), Some(&element.layer));

    let expected = format!("{}.md", element.id);
    let filename_check = if path.file_name().and_then(|n| n.to_str()) == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(FilenameMismatch { expected })
    };

    let suggestion = (id_check.is_err() || filename_check.is_err()).then(|| {
        id::derive(
            &element.name,
            &element.layer,
            &element.element_type,
            Some(&element.id),
            true,
        )
    });

    let mut references: Vec<_> = registry
        .incoming(&element.id)
        .iter()
        .filter(|edge| edge.source != element.id)
        .map(|edge| Reference {
            source: edge.source.clone(),
            path: registry
                .source(&edge.source)
                .map(PathBuf::from)
                .unwrap_or_default(),
            kind: edge.kind.clone(),
        })
        .collect();
    references.sort_by(|a, b| a.source.cmp(&b.source));
    let reference_count = references.len();
    references.truncate(REFERENCE_PREVIEW);

    AuditEntry {
        path,
        id: element.id.clone(),
        name: element.name.clone(),
        layer: element.layer.clone(),
        element_type: element.element_type.clone(),
        id_check,
        filename_check,
        suggestion,
        reference_count,
        references,
    }
}
