use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    path::{Path, PathBuf},
};

use serde_yaml::Value;

use crate::{
    audit,
    domain::{
        Config,
        id::{CanonicalId, DeriveError, LegacyId, MAX_SEQUENCE},
    },
    storage::{Directory, Loaded, Record},
};

/// Which corrections a plan makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Convert legacy `layer-type-slug-###` IDs to the canonical form, then
    /// resolve any duplicate sequence numbers that leaves behind.
    Legacy,
    /// Resolve duplicate sequence numbers within each `(layer, type)` group.
    Renumber {
        /// Also close gaps, so every group is numbered `1..N`.
        compact: bool,
    },
    /// Apply the auditor's suggestions and fix mismatched file names.
    Compliance,
}

impl Strategy {
    /// A short name, used for backup directories and plan headers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Legacy => "migration",
            Self::Renumber { .. } => "renumber",
            Self::Compliance => "fix",
        }
    }
}

/// One element's ID change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdChange {
    /// The element file.
    pub path: PathBuf,
    /// The current ID.
    pub old: String,
    /// The ID it will have.
    pub new: String,
}

/// A file move within its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRename {
    /// The current path.
    pub from: PathBuf,
    /// The new path.
    pub to: PathBuf,
}

/// Relationship targets a file will have rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceUpdate {
    /// The file holding the relationships.
    pub path: PathBuf,
    /// How many targets change.
    pub count: usize,
}

/// A correction the planner declined to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// The element file.
    pub path: PathBuf,
    /// The element's current ID.
    pub id: String,
    /// Why it was left alone.
    pub reason: SkipReason,
}

/// Why a correction was declined.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    /// The new ID is already taken.
    #[error("'{0}' is already in use")]
    Collision(String),
    /// The destination file already exists.
    #[error("{} already exists", .0.display())]
    DestinationExists(PathBuf),
    /// No canonical ID could be derived.
    #[error("no suggestion: {0}")]
    Underivable(DeriveError),
    /// The derived ID is the current one, which is still invalid.
    #[error("no valid correction: the type does not belong to the declared layer")]
    NoCorrection,
}

/// Errors that prevent a plan from being built.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    /// A group has more elements than three digit sequence numbers allow.
    #[error("group '{group}' has {count} elements, more than {MAX_SEQUENCE} sequence numbers")]
    SequenceOverflow {
        /// The `layer-type` group.
        group: String,
        /// How many elements it holds.
        count: usize,
    },
}

/// Every change a migration will make, computed before anything is touched.
///
/// The same plan renders identically whether it is previewed or executed.
#[derive(Debug, Clone)]
pub struct Plan {
    strategy: Strategy,
    root: PathBuf,
    config: Config,
    files: Vec<PathBuf>,
    changes: Vec<IdChange>,
    mapping: BTreeMap<String, String>,
    renames: Vec<FileRename>,
    reference_updates: Vec<ReferenceUpdate>,
    skipped: Vec<Skipped>,
}

impl Plan {
    /// Plans a migration of a loaded directory.
    ///
    /// # Errors
    ///
    /// Returns an error if a group would need a sequence number above 999.
    pub fn new(directory: &Directory<Loaded>, strategy: Strategy) -> Result<Self, PlanError> {
        let records = directory.records();

        let (proposed, mut extra_renames, mut skipped) = match strategy {
            Strategy::Legacy => (plan_legacy(records)?, Vec::new(), Vec::new()),
            Strategy::Renumber { compact } => (plan_renumber(records, compact)?, Vec::new(), Vec::new()),
            Strategy::Compliance => plan_compliance(directory),
        };

        let (changes, declined) = resolve_collisions(records, proposed, &extra_renames);
        skipped.extend(declined);

        let mut renames: Vec<_> = changes
            .iter()
            .map(|change| FileRename {
                from: change.path.clone(),
                to: destination(change),
            })
            .filter(|rename| rename.from != rename.to)
            .collect();
        renames.append(&mut extra_renames);
        renames.sort_by(|a, b| a.from.cmp(&b.from));

        // An ID held by several files cannot say which one a reference meant.
        let mut holders: HashMap<&str, usize> = HashMap::new();
        for record in records {
            *holders.entry(record.element.id.as_str()).or_default() += 1;
        }
        let mapping: BTreeMap<String, String> = changes
            .iter()
            .filter(|change| holders.get(change.old.as_str()) == Some(&1))
            .map(|change| (change.old.clone(), change.new.clone()))
            .collect();

        let reference_updates = records
            .iter()
            .filter_map(|record| {
                let count = record
                    .element
                    .relationships
                    .iter()
                    .filter(|relationship| mapping.contains_key(&relationship.target))
                    .count();
                (count > 0).then(|| ReferenceUpdate {
                    path: record.path.clone(),
                    count,
                })
            })
            .collect();

        Ok(Self {
            strategy,
            root: directory.root().to_path_buf(),
            config: directory.config().clone(),
            files: records.iter().map(|record| record.path.clone()).collect(),
            changes,
            mapping,
            renames,
            reference_updates,
            skipped,
        })
    }

    /// The strategy this plan was built with.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configuration the plan was built with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The directory holding the element files.
    #[must_use]
    pub fn elements_dir(&self) -> PathBuf {
        self.root.join(&self.config.elements_dir)
    }

    /// Every element file, each of which may hold references to rewrite.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// The ID changes, in scan order.
    #[must_use]
    pub fn changes(&self) -> &[IdChange] {
        &self.changes
    }

    /// The retired IDs and their replacements.
    ///
    /// Every changed ID is retired unless several files declared it, in which
    /// case references to it are left alone. References are rewritten in one
    /// substitution, so an ID that is both retired and reassigned (`002`
    /// becoming `003` while `001` becomes `002`) resolves correctly.
    #[must_use]
    pub const fn mapping(&self) -> &BTreeMap<String, String> {
        &self.mapping
    }

    /// The file renames, sorted by current path.
    #[must_use]
    pub fn renames(&self) -> &[FileRename] {
        &self.renames
    }

    /// The files whose relationship targets will change.
    #[must_use]
    pub fn reference_updates(&self) -> &[ReferenceUpdate] {
        &self.reference_updates
    }

    /// The corrections that were declined.
    #[must_use]
    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    /// Whether applying the plan would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.renames.is_empty()
    }

    /// The retired IDs as a YAML mapping of old to new, in scan order.
    #[must_use]
    pub fn mapping_document(&self) -> serde_yaml::Mapping {
        self.changes
            .iter()
            .filter(|change| self.mapping.contains_key(&change.old))
            .map(|change| {
                (
                    Value::String(change.old.clone()),
                    Value::String(change.new.clone()),
                )
            })
            .collect()
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(self.elements_dir()).unwrap_or(path)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.strategy.label();
        if self.is_empty() {
            writeln!(f, "{label}: nothing to change")?;
        } else {
            let references: usize = self.reference_updates.iter().map(|r| r.count).sum();
            writeln!(
                f,
                "{label}: {} ID change(s), {references} reference(s) in {} file(s), {} rename(s)",
                self.changes.len(),
                self.reference_updates.len(),
                self.renames.len()
            )?;
        }

        if !self.changes.is_empty() {
            writeln!(f, "\nID changes:")?;
            for change in &self.changes {
                writeln!(
                    f,
                    "  {} -> {}  ({})",
                    change.old,
                    change.new,
                    self.relative(&change.path).display()
                )?;
            }
        }

        if !self.reference_updates.is_empty() {
            writeln!(f, "\nReference updates:")?;
            for update in &self.reference_updates {
                writeln!(
                    f,
                    "  {}: {} reference(s)",
                    self.relative(&update.path).display(),
                    update.count
                )?;
            }
        }

        if !self.renames.is_empty() {
            writeln!(f, "\nFile renames:")?;
            for rename in &self.renames {
                writeln!(
                    f,
                    "  {} -> {}",
                    self.relative(&rename.from).display(),
                    self.relative(&rename.to).display()
                )?;
            }
        }

        if !self.skipped.is_empty() {
            writeln!(f, "\nSkipped:")?;
            for skipped in &self.skipped {
                writeln!(
                    f,
                    "  {} ({}): {}",
                    skipped.id,
                    self.relative(&skipped.path).display(),
                    skipped.reason
                )?;
            }
        }

        Ok(())
    }
}

/// An element taking part in renumbering.
struct Candidate<'a> {
    index: usize,
    id: CanonicalId,
    name: &'a str,
    path: &'a Path,
}

/// Reassigns sequence numbers within each `(layer, type)` group.
///
/// A group is reassigned if it holds a repeated sequence number, or, when
/// `compact` is set, if its numbers are not exactly `1..N`. Members are
/// ordered by current sequence, then name, then path, and numbered from 1.
fn renumber_groups(
    candidates: Vec<Candidate<'_>>,
    compact: bool,
) -> Result<HashMap<usize, CanonicalId>, PlanError> {
    let mut groups: BTreeMap<(String, String), Vec<Candidate<'_>>> = BTreeMap::new();
    for candidate in candidates {
        let (layer, kind) = candidate.id.group();
        groups
            .entry((layer.to_string(), kind.to_string()))
            .or_default()
            .push(candidate);
    }

    let mut renumbered = HashMap::new();
    for ((layer, kind), mut members) in groups {
        let mut sequences: Vec<u16> = members.iter().map(|m| m.id.sequence()).collect();
        sequences.sort_unstable();
        let has_duplicates = sequences.windows(2).any(|pair| pair[0] == pair[1]);
        let is_dense = sequences
            .iter()
            .zip(1..)
            .all(|(&sequence, expected)| sequence == expected);

        if !has_duplicates && (!compact || is_dense) {
            continue;
        }

        let group = format!("{layer}-{kind}");
        if members.len() > usize::from(MAX_SEQUENCE) {
            return Err(PlanError::SequenceOverflow {
                group,
                count: members.len(),
            });
        }

        members.sort_by(|a, b| {
            (a.id.sequence(), a.name, a.path).cmp(&(b.id.sequence(), b.name, b.path))
        });
        tracing::debug!("Renumbering {group}: {} elements", members.len());

        for (sequence, member) in (1..).zip(members) {
            let id = member.id.with_sequence(sequence).map_err(|_| PlanError::SequenceOverflow {
                group: group.clone(),
                count: usize::from(sequence),
            })?;
            renumbered.insert(member.index, id);
        }
    }

    Ok(renumbered)
}

fn plan_renumber(records: &[Record], compact: bool) -> Result<Vec<IdChange>, PlanError> {
    let candidates = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            Some(Candidate {
                index,
                id: CanonicalId::parse(&record.element.id)?,
                name: &record.element.name,
                path: &record.path,
            })
        })
        .collect();

    let renumbered = renumber_groups(candidates, compact)?;
    Ok(changes_from(records, |index| renumbered.get(&index).cloned()))
}

fn plan_legacy(records: &[Record]) -> Result<Vec<IdChange>, PlanError> {
    let converted: Vec<Option<CanonicalId>> = records
        .iter()
        .map(|record| LegacyId::parse(&record.element.id).map(|legacy| legacy.to_canonical()))
        .collect();

    let candidates = records
        .iter()
        .zip(&converted)
        .enumerate()
        .filter_map(|(index, (record, converted))| {
            let id = converted
                .clone()
                .or_else(|| CanonicalId::parse(&record.element.id))?;
            Some(Candidate {
                index,
                id,
                name: &record.element.name,
                path: &record.path,
            })
        })
        .collect();

    let renumbered = renumber_groups(candidates, false)?;
    Ok(changes_from(records, |index| {
        renumbered
            .get(&index)
            .cloned()
            .or_else(|| converted[index].clone())
    }))
}

fn changes_from(
    records: &[Record],
    new_id: impl Fn(usize) -> Option<CanonicalId>,
) -> Vec<IdChange> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let new = new_id(index)?.to_string();
            (new != record.element.id).then(|| IdChange {
                path: record.path.clone(),
                old: record.element.id.clone(),
                new,
            })
        })
        .collect()
}

fn plan_compliance(directory: &Directory<Loaded>) -> (Vec<IdChange>, Vec<FileRename>, Vec<Skipped>) {
    let report = audit::audit(directory);
    let mut changes = Vec::new();
    let mut renames = Vec::new();
    let mut skipped = Vec::new();

    for entry in &report.entries {
        if !entry.id_compliant() {
            match &entry.suggestion {
                Some(Ok(suggested)) if suggested.to_string() != entry.id => {
                    changes.push(IdChange {
                        path: entry.path.clone(),
                        old: entry.id.clone(),
                        new: suggested.to_string(),
                    });
                }
                Some(Ok(_)) => skipped.push(Skipped {
                    path: entry.path.clone(),
                    id: entry.id.clone(),
                    reason: SkipReason::NoCorrection,
                }),
                Some(Err(error)) => skipped.push(Skipped {
                    path: entry.path.clone(),
                    id: entry.id.clone(),
                    reason: SkipReason::Underivable(error.clone()),
                }),
                None => {}
            }
        } else if !entry.filename_compliant() {
            let to = entry.path.with_file_name(format!("{}.md", entry.id));
            if to.exists() {
                skipped.push(Skipped {
                    path: entry.path.clone(),
                    id: entry.id.clone(),
                    reason: SkipReason::DestinationExists(to),
                });
            } else {
                renames.push(FileRename {
                    from: entry.path.clone(),
                    to,
                });
            }
        }
    }

    (changes, renames, skipped)
}

fn destination(change: &IdChange) -> PathBuf {
    change.path.with_file_name(format!("{}.md", change.new))
}

/// Drops changes whose new ID is held by another element or claimed by an
/// earlier change, and changes whose new file name is taken by a file that
/// is not itself being moved.
///
/// Declining a change keeps its element on the old ID and file, which may in
/// turn block a change accepted earlier, so this repeats until stable.
fn resolve_collisions(
    records: &[Record],
    mut accepted: Vec<IdChange>,
    renames: &[FileRename],
) -> (Vec<IdChange>, Vec<Skipped>) {
    let mut skipped = Vec::new();

    loop {
        let moving: HashSet<PathBuf> = accepted
            .iter()
            .map(|change| change.path.clone())
            .chain(renames.iter().map(|rename| rename.from.clone()))
            .collect();
        let mut taken: HashSet<String> = records
            .iter()
            .filter(|record| !moving.contains(&record.path))
            .map(|record| record.element.id.clone())
            .collect();

        let mut keep = Vec::with_capacity(accepted.len());
        let mut rejected = Vec::new();
        for change in accepted {
            let to = destination(&change);
            if !taken.insert(change.new.clone()) {
                let reason = SkipReason::Collision(change.new.clone());
                rejected.push((change, reason));
            } else if to != change.path && to.exists() && !moving.contains(&to) {
                rejected.push((change, SkipReason::DestinationExists(to)));
            } else {
                keep.push(change);
            }
        }

        accepted = keep;
        if rejected.is_empty() {
            break;
        }
        for (change, reason) in rejected {
            tracing::debug!("Skipping {} -> {}: {reason}", change.old, change.new);
            skipped.push(Skipped {
                path: change.path,
                id: change.old,
                reason,
            });
        }
    }

    (accepted, skipped)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, file: &str, id: &str, name: &str, targets: &[&str]) {
        write_typed(root, file, id, name, "application-component", targets);
    }

    fn write_typed(root: &Path, file: &str, id: &str, name: &str, element_type: &str, targets: &[&str]) {
        let path = root.join("elements").join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut text = format!(
            "---\nid: {id}\nname: {name}\ntype: {element_type}\nlayer: application\nrelationships:\n"
        );
        for target in targets {
            text.push_str(&format!("  - type: flow\n    target: {target}\n"));
        }
        text.push_str("---\n");
        fs::write(path, text).unwrap();
    }

    fn load(tmp: &TempDir) -> Directory<Loaded> {
        Directory::new(tmp.path().to_path_buf()).load_all()
    }

    fn change_pairs(plan: &Plan) -> Vec<(&str, &str)> {
        plan.changes()
            .iter()
            .map(|c| (c.old.as_str(), c.new.as_str()))
            .collect()
    }

    #[test]
    fn duplicate_sequences_are_renumbered_by_name() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app-comp-010-y.md", "app-comp-010-y", "Y", &[]);
        write(tmp.path(), "app-comp-010-x.md", "app-comp-010-x", "X", &[]);

        let plan = Plan::new(&load(&tmp), Strategy::Renumber { compact: false }).unwrap();

        let mut pairs = change_pairs(&plan);
        pairs.sort_unstable();
        assert_eq!(
            pairs,
            vec![
                ("app-comp-010-x", "app-comp-001-x"),
                ("app-comp-010-y", "app-comp-002-y")
            ]
        );
        assert_eq!(plan.renames().len(), 2);
    }

    #[test]
    fn renumbering_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app-comp-001-a.md", "app-comp-001-a", "A", &[]);
        write(tmp.path(), "app-comp-002-b.md", "app-comp-002-b", "B", &[]);
        write(tmp.path(), "app-comp-007-c.md", "app-comp-007-c", "C", &[]);

        let plan = Plan::new(&load(&tmp), Strategy::Renumber { compact: false }).unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.to_string(), "renumber: nothing to change\n");
    }

    #[test]
    fn compact_closes_gaps() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app-comp-001-a.md", "app-comp-001-a", "A", &[]);
        write(tmp.path(), "app-comp-007-c.md", "app-comp-007-c", "C", &[]);

        let plan = Plan::new(&load(&tmp), Strategy::Renumber { compact: true }).unwrap();

        assert_eq!(change_pairs(&plan), vec![("app-comp-007-c", "app-comp-002-c")]);
    }

    #[test]
    fn groups_are_scoped_by_layer_and_type() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app-comp-001-a.md", "app-comp-001-a", "A", &[]);
        write(tmp.path(), "app-srvc-001-a.md", "app-srvc-001-a", "A", &[]);

        let plan = Plan::new(&load(&tmp), Strategy::Renumber { compact: false }).unwrap();

        assert!(plan.is_empty());
    }

    #[test]
    fn legacy_ids_convert_positionally() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "app-comp-customer-portal-001.md",
            "app-comp-customer-portal-001",
            "Portal",
            &[],
        );
        write(tmp.path(), "app-comp-002-b.md", "app-comp-002-b", "B", &["app-comp-customer-portal-001"]);

        let plan = Plan::new(&load(&tmp), Strategy::Legacy).unwrap();

        assert_eq!(
            change_pairs(&plan),
            vec![("app-comp-customer-portal-001", "app-comp-001-customer-portal")]
        );
        assert_eq!(
            plan.mapping().get("app-comp-customer-portal-001").map(String::as_str),
            Some("app-comp-001-customer-portal")
        );
        assert_eq!(plan.reference_updates().len(), 1);
        assert_eq!(plan.reference_updates()[0].count, 1);
    }

    #[test]
    fn legacy_conversion_resolves_the_duplicates_it_creates() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.md", "app-comp-portal-001", "Portal", &[]);
        write(tmp.path(), "b.md", "app-comp-001-billing", "Billing", &[]);

        let plan = Plan::new(&load(&tmp), Strategy::Legacy).unwrap();

        assert_eq!(
            change_pairs(&plan),
            vec![("app-comp-portal-001", "app-comp-002-portal")]
        );
    }

    #[test]
    fn ids_matching_both_grammars_are_canonical() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app-comp-001-top-100.md", "app-comp-001-top-100", "Top 100", &[]);

        let plan = Plan::new(&load(&tmp), Strategy::Legacy).unwrap();

        assert!(plan.is_empty());
    }

    #[test]
    fn collisions_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app-comp-001-portal.md", "app-comp-001-portal", "Portal", &[]);
        write(tmp.path(), "portal.md", "app-comp-portal-001", "Portal", &[]);

        let directory = load(&tmp);
        let plan = Plan::new(&directory, Strategy::Compliance).unwrap();

        assert!(plan.changes().is_empty());
        assert_eq!(plan.skipped().len(), 1);
        assert_eq!(
            plan.skipped()[0].reason,
            SkipReason::Collision("app-comp-001-portal".to_string())
        );
    }

    #[test]
    fn compliance_renames_mismatched_files() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "application/portal.md", "app-comp-001-portal", "Portal", &[]);

        let plan = Plan::new(&load(&tmp), Strategy::Compliance).unwrap();

        assert!(plan.changes().is_empty());
        assert_eq!(plan.renames().len(), 1);
        assert_eq!(
            plan.renames()[0].to,
            tmp.path().join("elements/application/app-comp-001-portal.md")
        );
        assert!(plan.to_string().contains("application/portal.md -> application/app-comp-001-portal.md"));
    }

    #[test]
    fn compliance_applies_suggestions() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "x.md", "APP-Portal", "Customer Portal", &[]);

        let plan = Plan::new(&load(&tmp), Strategy::Compliance).unwrap();

        assert_eq!(change_pairs(&plan), vec![("APP-Portal", "app-comp-001-customer-portal")]);
        assert_eq!(plan.renames()[0].to, tmp.path().join("elements/app-comp-001-customer-portal.md"));
    }

    #[test]
    fn ambiguous_old_ids_are_not_remapped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.md", "app-comp-001-x", "A", &[]);
        write(tmp.path(), "b.md", "app-comp-001-x", "B", &[]);
        write(tmp.path(), "c.md", "app-comp-002-c", "C", &["app-comp-001-x"]);

        let plan = Plan::new(&load(&tmp), Strategy::Renumber { compact: false }).unwrap();

        assert_eq!(
            change_pairs(&plan),
            vec![
                ("app-comp-001-x", "app-comp-002-x"),
                ("app-comp-002-c", "app-comp-003-c")
            ]
        );
        assert!(!plan.mapping().contains_key("app-comp-001-x"));
        assert!(plan.mapping().contains_key("app-comp-002-c"));
        assert!(plan.reference_updates().is_empty());
        assert_eq!(plan.mapping_document().len(), 1);
    }

    #[test]
    fn reassigned_ids_are_still_remapped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app-comp-001-x.md", "app-comp-001-x", "B", &[]);
        write(tmp.path(), "app-comp-001-y.md", "app-comp-001-y", "A", &[]);
        write(tmp.path(), "app-comp-002-x.md", "app-comp-002-x", "C", &[]);
        write(tmp.path(), "app-srvc-001-o.md", "app-srvc-001-o", "O", &["app-comp-002-x"]);

        let plan = Plan::new(&load(&tmp), Strategy::Renumber { compact: false }).unwrap();

        assert_eq!(
            change_pairs(&plan),
            vec![
                ("app-comp-001-x", "app-comp-002-x"),
                ("app-comp-002-x", "app-comp-003-x")
            ]
        );
        assert_eq!(
            plan.mapping().get("app-comp-002-x").map(String::as_str),
            Some("app-comp-003-x")
        );
        assert_eq!(plan.mapping().len(), 2);
        assert_eq!(plan.reference_updates().len(), 1);
        assert_eq!(plan.renames().len(), 2);
        assert!(plan.skipped().is_empty());
    }

    #[test]
    fn uncorrectable_ids_are_listed_as_skipped() {
        let tmp = TempDir::new().unwrap();
        write_typed(tmp.path(), "app-node-001-x.md", "app-node-001-x", "X", "node", &[]);

        let plan = Plan::new(&load(&tmp), Strategy::Compliance).unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.skipped().len(), 1);
        assert_eq!(plan.skipped()[0].reason, SkipReason::NoCorrection);
        assert!(plan.to_string().contains("Skipped:\n  app-node-001-x (app-node-001-x.md): no valid correction"));
    }

    #[test]
    fn occupied_destinations_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "x.md", "APP-Portal", "Customer Portal", &[]);
        fs::write(tmp.path().join("elements/app-comp-001-customer-portal.md"), "not an element").unwrap();

        let plan = Plan::new(&load(&tmp), Strategy::Compliance).unwrap();

        assert!(plan.changes().is_empty());
        assert!(plan.renames().is_empty());
        assert_eq!(
            plan.skipped()[0].reason,
            SkipReason::DestinationExists(tmp.path().join("elements/app-comp-001-customer-portal.md"))
        );
    }

    #[test]
    fn preview_output_is_stable() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app-comp-010-y.md", "app-comp-010-y", "Y", &[]);
        write(tmp.path(), "app-comp-010-x.md", "app-comp-010-x", "X", &["app-comp-010-y"]);

        let first = Plan::new(&load(&tmp), Strategy::Renumber { compact: false }).unwrap().to_string();
        let second = Plan::new(&load(&tmp), Strategy::Renumber { compact: false }).unwrap().to_string();

        assert_eq!(first, second);
        assert_eq!(
            first,
            "renumber: 2 ID change(s), 1 reference(s) in 1 file(s), 2 rename(s)\n\
             \nID changes:\n\
             \x20 app-comp-010-x -> app-comp-001-x  (app-comp-010-x.md)\n\
             \x20 app-comp-010-y -> app-comp-002-y  (app-comp-010-y.md)\n\
             \nReference updates:\n\
             \x20 app-comp-010-x.md: 1 reference(s)\n\
             \nFile renames:\n\
             \x20 app-comp-010-x.md -> app-comp-001-x.md\n\
             \x20 app-comp-010-y.md -> app-comp-002-y.md\n"
        );
    }
}
