//! Per-file schema checks.
//!
//! Where the auditor looks only at IDs and file names, the checker looks at
//! everything else an element file declares: its layer and type against the
//! vocabulary, its relationship entries, and the shape of its body.

use std::path::PathBuf;

use serde_yaml::Value;

use crate::{
    domain::{
        ElementType, Layer, RelationshipType,
        id::{self, IdViolation},
    },
    storage::{Directory, Loaded, Record},
};

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The file is wrong.
    Error,
    /// The file is suspicious.
    Warning,
}

/// Something wrong with an element file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Issue {
    /// The file could not be loaded at all.
    #[error("{0}")]
    Unloadable(String),
    /// The ID is not canonical.
    #[error("invalid ID: {0}")]
    Id(IdViolation),
    /// The layer is not one of the seven.
    #[error("unknown layer '{0}'")]
    UnknownLayer(String),
    /// The element type is not in the vocabulary.
    #[error("unknown element type '{0}'")]
    UnknownType(String),
    /// The element type belongs to another layer.
    #[error("element type '{element_type}' belongs to the {expected} layer, not {layer}")]
    TypeNotInLayer {
        /// The declared type.
        element_type: String,
        /// The declared layer.
        layer: String,
        /// The layer the type belongs to.
        expected: Layer,
    },
    /// A relationship entry has no target.
    #[error("relationship {index} has no target")]
    MissingTarget {
        /// Position in the `relationships` list, from 1.
        index: usize,
    },
    /// A relationship type outside the vocabulary.
    #[error("unknown relationship type '{kind}' to {target}")]
    UnknownRelationshipType {
        /// The declared type.
        kind: String,
        /// The relationship target.
        target: String,
    },
    /// A relationship to an element that does not exist.
    #[error("{kind} relationship to unknown element {target}")]
    DanglingTarget {
        /// The relationship type.
        kind: String,
        /// The missing element.
        target: String,
    },
    /// The body is blank.
    #[error("no documentation")]
    EmptyBody,
    /// The body has no markdown heading.
    #[error("documentation has no heading")]
    NoHeading,
}

impl Issue {
    /// How serious the issue is.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::DanglingTarget { .. } | Self::EmptyBody | Self::NoHeading => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// An issue in a specific file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// The element file.
    pub path: PathBuf,
    /// What is wrong.
    pub issue: Issue,
}

/// All findings for a directory, sorted by path.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// The files checked, including those that failed to load.
    pub files: usize,
    /// What was found.
    pub findings: Vec<Finding>,
}

impl CheckReport {
    /// Findings of the given severity.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(move |finding| finding.issue.severity() == severity)
    }

    /// Whether any finding is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.with_severity(Severity::Error).next().is_some()
    }
}

/// Checks every element file of a loaded directory.
#[must_use]
pub fn check(directory: &Directory<Loaded>) -> CheckReport {
    let registry = directory.registry();

    let mut findings: Vec<Finding> = directory
        .failures()
        .iter()
        .map(|failure| Finding {
            path: failure.path.clone(),
            issue: Issue::Unloadable(failure.error.to_string()),
        })
        .collect();

    for record in directory.records() {
        findings.extend(
            check_record(record, |target| registry.contains(target))
                .into_iter()
                .map(|issue| Finding {
                    path: record.path.clone(),
                    issue,
                }),
        );
    }

    findings.sort_by(|a, b| a.path.cmp(&b.path));

    CheckReport {
        files: directory.records().len() + directory.failures().len(),
        findings,
    }
}

fn check_record(record: &Record, exists: impl Fn(&str) -> bool) -> Vec<Issue> {
    let element = &record.element;
    let mut issues = Vec::new();

    if let Err(violation) = id::validate(Some(&element.id), Some(&element.layer)) {
        issues.push(Issue::Id(violation));
    }

    let layer = element.layer();
    if layer.is_none() {
        issues.push(Issue::UnknownLayer(element.layer.clone()));
    }
    match (ElementType::by_name(&element.element_type), layer) {
        (None, _) => issues.push(Issue::UnknownType(element.element_type.clone())),
        (Some(element_type), Some(layer)) if element_type.layer != layer => {
            issues.push(Issue::TypeNotInLayer {
                element_type: element.element_type.clone(),
                layer: element.layer.clone(),
                expected: element_type.layer,
            });
        }
        _ => {}
    }

    // The parsed element drops entries without a target, so look at the raw list.
    let raw = record
        .document
        .front_matter
        .get("relationships")
        .and_then(Value::as_sequence)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for (index, entry) in (1..).zip(raw) {
        let target = entry.get("target").and_then(Value::as_str).unwrap_or_default();
        if target.is_empty() {
            issues.push(Issue::MissingTarget { index });
            continue;
        }
        let kind = entry
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(RelationshipType::Association.name());
        if RelationshipType::normalize(kind).is_none() {
            issues.push(Issue::UnknownRelationshipType {
                kind: kind.to_string(),
                target: target.to_string(),
            });
        }
        if !exists(target) {
            issues.push(Issue::DanglingTarget {
                kind: kind.to_string(),
                target: target.to_string(),
            });
        }
    }

    let body = element.documentation.trim();
    if body.is_empty() {
        issues.push(Issue::EmptyBody);
    } else if !body.lines().any(|line| line.starts_with('#')) {
        issues.push(Issue::NoHeading);
    }

    issues
}
