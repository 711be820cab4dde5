use std::{
    collections::{BTreeMap, HashSet},
    fmt, fs, io,
    path::{Path, PathBuf},
};

use serde_yaml::{Mapping, Value};

use crate::{
    domain::id::{self, CanonicalId, IdViolation},
    migration::{Plan, backup},
    storage::{Directory, Loaded, LoadError, WriteError, read_document, write_document},
};

/// The key an element's previous ID is recorded under, in `properties`.
pub const LEGACY_ID_PROPERTY: &str = "legacy-id";

/// How far a migration got.
///
/// Stages are reached in declaration order. A failed run reports the last
/// stage it completed; nothing is rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// The plan is complete; nothing has been touched.
    Planned,
    /// The element tree and ID mapping have been snapshotted.
    BackedUp,
    /// Every changed element carries its new ID.
    IdsUpdated,
    /// Every reference to a retired ID has been rewritten.
    ReferencesUpdated,
    /// Every file has its new name.
    FilesRenamed,
    /// The tree has been reloaded and checked.
    Verified,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Planned => "planned",
            Self::BackedUp => "backed up",
            Self::IdsUpdated => "IDs updated",
            Self::ReferencesUpdated => "references updated",
            Self::FilesRenamed => "files renamed",
            Self::Verified => "verified",
        })
    }
}

/// A failed step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The snapshot could not be written.
    #[error("failed to back up {}: {source}", path.display())]
    Backup {
        /// The path being written.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The ID mapping could not be serialised.
    #[error("failed to serialise the ID mapping: {0}")]
    Mapping(#[from] serde_yaml::Error),
    /// An element file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The element file.
        path: PathBuf,
        /// The underlying error.
        source: LoadError,
    },
    /// An element file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// The element file.
        path: PathBuf,
        /// The underlying error.
        source: WriteError,
    },
    /// The file changed since the plan was made.
    #[error("{} no longer declares ID '{expected}'", path.display())]
    Stale {
        /// The element file.
        path: PathBuf,
        /// The ID the plan expected.
        expected: String,
    },
    /// `properties` exists but is not a mapping.
    #[error("{}: 'properties' is not a mapping", .0.display())]
    Properties(PathBuf),
    /// A rename would overwrite another file.
    #[error("cannot rename {} to {}: destination exists", from.display(), to.display())]
    DestinationExists {
        /// The current path.
        from: PathBuf,
        /// The occupied destination.
        to: PathBuf,
    },
    /// A rename failed.
    #[error("failed to rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        /// The current path.
        from: PathBuf,
        /// The destination.
        to: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
}

/// A migration that stopped part way.
#[derive(Debug, thiserror::Error)]
#[error("migration stopped at stage '{completed}' while moving to '{attempted}': {source}")]
pub struct MigrationError {
    /// The last stage that completed.
    pub completed: Stage,
    /// The stage that failed.
    pub attempted: Stage,
    /// Where the snapshot was written, if it was.
    pub backup: Option<PathBuf>,
    /// What went wrong.
    #[source]
    pub source: StepError,
}

/// Repeated sequence numbers found during verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceConflict {
    /// The `layer-type` group.
    pub group: String,
    /// The repeated sequence number.
    pub sequence: u16,
    /// The IDs that share it.
    pub ids: Vec<String>,
}

/// What a reload of the tree found.
#[derive(Debug, Clone, Default)]
pub struct Verification {
    /// IDs that still fail validation.
    pub invalid: Vec<(String, IdViolation)>,
    /// Groups that still repeat a sequence number.
    pub conflicts: Vec<SequenceConflict>,
    /// Files that no longer load.
    pub failures: usize,
}

impl Verification {
    /// Whether the reloaded tree is fully consistent.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty() && self.conflicts.is_empty() && self.failures == 0
    }
}

/// Checks a loaded tree for invalid IDs and repeated sequence numbers.
#[must_use]
pub fn verify(directory: &Directory<Loaded>) -> Verification {
    let mut invalid = Vec::new();
    let mut groups: BTreeMap<(String, u16), Vec<String>> = BTreeMap::new();

    for record in directory.records() {
        let element = &record.element;
        if let Err(violation) = id::validate(Some(&element.id), Some(&element.layer)) {
            invalid.push((element.id.clone(), violation));
        }
        if let Some(parsed) = CanonicalId::parse(&element.id) {
            let (layer, kind) = parsed.group();
            groups
                .entry((format!("{layer}-{kind}"), parsed.sequence()))
                .or_default()
                .push(element.id.clone());
        }
    }

    let conflicts = groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((group, sequence), ids)| SequenceConflict {
            group,
            sequence,
            ids,
        })
        .collect();

    Verification {
        invalid,
        conflicts,
        failures: directory.failures().len(),
    }
}

/// A completed migration.
#[derive(Debug)]
pub struct Outcome {
    /// Where the snapshot was written.
    pub backup: PathBuf,
    /// How many element IDs changed.
    pub ids_updated: usize,
    /// How many relationship targets changed.
    pub references_updated: usize,
    /// How many files were renamed.
    pub files_renamed: usize,
    /// What the final reload found.
    pub verification: Verification,
}

/// Executes a [`Plan`], one stage at a time.
#[derive(Debug)]
pub struct Migration<'a> {
    plan: &'a Plan,
    backup_root: PathBuf,
    stage: Stage,
    backup: Option<PathBuf>,
}

impl<'a> Migration<'a> {
    /// Prepares to execute `plan`, snapshotting into `backup_root`.
    #[must_use]
    pub const fn new(plan: &'a Plan, backup_root: PathBuf) -> Self {
        Self {
            plan,
            backup_root,
            stage: Stage::Planned,
            backup: None,
        }
    }

    /// The last stage completed.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs every stage in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the failed step, with the last stage that completed. Files
    /// already modified stay modified; the snapshot is the recovery path.
    pub fn run(mut self) -> Result<Outcome, MigrationError> {
        let backup = self.advance(Stage::BackedUp, |m| backup::create(m.plan, &m.backup_root))?;
        self.backup = Some(backup.clone());

        let ids_updated = self.advance(Stage::IdsUpdated, |m| m.apply_ids())?;
        let references_updated = self.advance(Stage::ReferencesUpdated, |m| m.apply_references())?;
        let files_renamed = self.advance(Stage::FilesRenamed, |m| m.rename_files())?;

        let verification = self.advance(Stage::Verified, |m| {
            let directory = Directory::new(m.plan.root().to_path_buf())
                .with_config(m.plan.config().clone())
                .load_all();
            Ok(verify(&directory))
        })?;

        if !verification.is_clean() {
            tracing::warn!(
                "verification found {} invalid ID(s) and {} sequence conflict(s)",
                verification.invalid.len(),
                verification.conflicts.len()
            );
        }

        Ok(Outcome {
            backup,
            ids_updated,
            references_updated,
            files_renamed,
            verification,
        })
    }

    fn advance<T>(
        &mut self,
        next: Stage,
        step: impl FnOnce(&Self) -> Result<T, StepError>,
    ) -> Result<T, MigrationError> {
        match step(self) {
            Ok(value) => {
                tracing::info!("Migration stage: {next}");
                self.stage = next;
                Ok(value)
            }
            Err(source) => Err(MigrationError {
                completed: self.stage,
                attempted: next,
                backup: self.backup.clone(),
                source,
            }),
        }
    }

    fn apply_ids(&self) -> Result<usize, StepError> {
        for change in self.plan.changes() {
            let path = &change.path;
            let mut document = read(path)?;

            if document.get_str("id") != Some(change.old.as_str()) {
                return Err(StepError::Stale {
                    path: path.clone(),
                    expected: change.old.clone(),
                });
            }

            document
                .front_matter
                .insert("id".into(), change.new.as_str().into());
            record_legacy_id(&mut document.front_matter, &change.old)
                .ok_or_else(|| StepError::Properties(path.clone()))?;

            write(path, &document)?;
            tracing::debug!("{}: {} -> {}", path.display(), change.old, change.new);
        }
        Ok(self.plan.changes().len())
    }

    fn apply_references(&self) -> Result<usize, StepError> {
        let mapping = self.plan.mapping();
        if mapping.is_empty() {
            return Ok(0);
        }

        let mut total = 0;
        for path in self.plan.files() {
            let mut document = read(path)?;
            let updated = rewrite_targets(&mut document.front_matter, mapping);
            if updated > 0 {
                write(path, &document)?;
                tracing::debug!("{}: {updated} reference(s) updated", path.display());
                total += updated;
            }
        }
        Ok(total)
    }

    /// Moves every planned file.
    ///
    /// Sources are first moved to hidden staging names beside them, then to
    /// their destinations, so a file may move onto a name another planned
    /// rename is vacating. Any other occupied destination fails the step
    /// before a file is moved.
    fn rename_files(&self) -> Result<usize, StepError> {
        let renames: Vec<_> = self
            .plan
            .renames()
            .iter()
            .filter(|rename| rename.from != rename.to)
            .collect();
        let sources: HashSet<&Path> = renames.iter().map(|rename| rename.from.as_path()).collect();

        if let Some(blocked) = renames
            .iter()
            .find(|rename| rename.to.exists() && !sources.contains(rename.to.as_path()))
        {
            return Err(StepError::DestinationExists {
                from: blocked.from.clone(),
                to: blocked.to.clone(),
            });
        }

        let mut staged = Vec::with_capacity(renames.len());
        for rename in &renames {
            let staging = staging_path(&rename.from);
            move_file(&rename.from, &staging)?;
            staged.push((staging, &rename.to));
        }
        for (staging, to) in &staged {
            move_file(staging, to)?;
        }

        Ok(staged.len())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.renaming"))
}

fn move_file(from: &Path, to: &Path) -> Result<(), StepError> {
    fs::rename(from, to).map_err(|source| StepError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

fn read(path: &Path) -> Result<crate::storage::Document, StepError> {
    read_document(path).map_err(|source| StepError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, document: &crate::storage::Document) -> Result<(), StepError> {
    write_document(path, document).map_err(|source| StepError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Adds `legacy-id` to `properties` unless one is already recorded.
///
/// Returns `None` if `properties` exists but is not a mapping.
fn record_legacy_id(front_matter: &mut Mapping, old: &str) -> Option<()> {
    let properties = front_matter
        .entry("properties".into())
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if properties.is_null() {
        *properties = Value::Mapping(Mapping::new());
    }
    let properties = properties.as_mapping_mut()?;
    if !properties.contains_key(LEGACY_ID_PROPERTY) {
        properties.insert(LEGACY_ID_PROPERTY.into(), old.into());
    }
    Some(())
}

/// Rewrites relationship targets found in `mapping`, returning how many
/// changed.
fn rewrite_targets(front_matter: &mut Mapping, mapping: &BTreeMap<String, String>) -> usize {
    let Some(relationships) = front_matter
        .get_mut("relationships")
        .and_then(Value::as_sequence_mut)
    else {
        return 0;
    };

    let mut updated = 0;
    for relationship in relationships.iter_mut().filter_map(Value::as_mapping_mut) {
        let Some(new) = relationship
            .get("target")
            .and_then(Value::as_str)
            .and_then(|target| mapping.get(target))
        else {
            continue;
        };
        relationship.insert("target".into(), new.as_str().into());
        updated += 1;
    }
    updated
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{audit, migration::Strategy};

    fn write_element(root: &Path, file: &str, id: &str, name: &str, extra: &str) -> PathBuf {
        write_in_layer(root, file, id, name, ("application-component", "application"), extra)
    }

    fn write_in_layer(
        root: &Path,
        file: &str,
        id: &str,
        name: &str,
        (element_type, layer): (&str, &str),
        extra: &str,
    ) -> PathBuf {
        let path = root.join("elements").join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            format!(
                "---\nid: {id}\nname: {name}\ntype: {element_type}\nlayer: {layer}\n{extra}---\n\n# {name}\n\nKeep   this *exactly*.\n"
            ),
        )
        .unwrap();
        path
    }

    fn run(tmp: &TempDir, strategy: Strategy) -> Outcome {
        let directory = Directory::new(tmp.path().to_path_buf()).load_all();
        let plan = Plan::new(&directory, strategy).unwrap();
        Migration::new(&plan, tmp.path().join("backups")).run().unwrap()
    }

    #[test]
    fn renumbering_rewrites_ids_references_and_file_names() {
        let tmp = TempDir::new().unwrap();
        write_element(tmp.path(), "app/app-comp-010-x.md", "app-comp-010-x", "X", "");
        write_element(tmp.path(), "app/app-comp-010-y.md", "app-comp-010-y", "Y", "");
        write_in_layer(
            tmp.path(),
            "bus/bus-proc-001-order.md",
            "bus-proc-001-order",
            "Order",
            ("business-process", "business"),
            "relationships:\n- type: serving\n  target: app-comp-010-y\n  description: keeps\n- type: flow\n  target: app-comp-999-ghost\n",
        );

        let outcome = run(&tmp, Strategy::Renumber { compact: false });

        assert_eq!(outcome.ids_updated, 2);
        assert_eq!(outcome.references_updated, 1);
        assert_eq!(outcome.files_renamed, 2);
        assert!(outcome.verification.is_clean());
        assert!(outcome.backup.join("elements/app/app-comp-010-x.md").exists());

        let elements = tmp.path().join("elements");
        assert!(!elements.join("app/app-comp-010-y.md").exists());
        let renamed = fs::read_to_string(elements.join("app/app-comp-002-y.md")).unwrap();
        assert!(renamed.contains("id: app-comp-002-y\n"));
        assert!(renamed.contains("legacy-id: app-comp-010-y"));
        assert!(renamed.ends_with("---\n\n# Y\n\nKeep   this *exactly*.\n"));

        let referencing = fs::read_to_string(elements.join("bus/bus-proc-001-order.md")).unwrap();
        assert!(referencing.contains("target: app-comp-002-y"));
        assert!(referencing.contains("description: keeps"));
        assert!(referencing.contains("target: app-comp-999-ghost"));
        assert!(!referencing.contains("app-comp-010-y"));
    }

    #[test]
    fn renumbering_follows_chains_of_reassigned_ids() {
        let tmp = TempDir::new().unwrap();
        write_element(tmp.path(), "app/app-comp-001-x.md", "app-comp-001-x", "B", "");
        write_element(tmp.path(), "app/app-comp-001-y.md", "app-comp-001-y", "A", "");
        write_element(tmp.path(), "app/app-comp-002-x.md", "app-comp-002-x", "C", "");
        write_in_layer(
            tmp.path(),
            "bus/bus-proc-001-o.md",
            "bus-proc-001-o",
            "O",
            ("business-process", "business"),
            "relationships:\n- type: serving\n  target: app-comp-002-x\n",
        );

        let outcome = run(&tmp, Strategy::Renumber { compact: false });

        assert_eq!(outcome.ids_updated, 2);
        assert_eq!(outcome.references_updated, 1);
        assert_eq!(outcome.files_renamed, 2);
        assert!(outcome.verification.is_clean());

        let directory = Directory::new(tmp.path().to_path_buf()).load_all();
        let registry = directory.registry();
        assert_eq!(registry.get("app-comp-002-x").unwrap().name, "B");
        assert_eq!(registry.get("app-comp-003-x").unwrap().name, "C");
        assert_eq!(registry.outgoing("bus-proc-001-o")[0].target, "app-comp-003-x");

        let report = audit::audit(&directory);
        assert_eq!(report.non_compliant_filenames().count(), 0);
        let leftovers = fs::read_dir(tmp.path().join("elements/app"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with('.'))
            .count();
        assert_eq!(leftovers, 0);

        let mapping = fs::read_to_string(outcome.backup.join(crate::migration::MAPPING_FILE)).unwrap();
        assert_eq!(
            mapping,
            "app-comp-001-x: app-comp-002-x\napp-comp-002-x: app-comp-003-x\n"
        );
    }

    #[test]
    fn legacy_migration_leaves_a_compliant_tree() {
        let tmp = TempDir::new().unwrap();
        write_element(tmp.path(), "a.md", "app-comp-customer-portal-001", "Customer Portal", "");
        write_element(
            tmp.path(),
            "b.md",
            "app-comp-billing-engine-002",
            "Billing Engine",
            "relationships:\n- type: serving\n  target: app-comp-customer-portal-001\n",
        );

        let outcome = run(&tmp, Strategy::Legacy);

        assert!(outcome.verification.is_clean());
        let directory = Directory::new(tmp.path().to_path_buf()).load_all();
        let report = audit::audit(&directory);
        assert_eq!(report.non_compliant_ids().count(), 0);
        assert_eq!(report.non_compliant_filenames().count(), 0);
        assert!(directory.registry().dangling_references().is_empty());
        assert_eq!(
            directory.registry().incoming("app-comp-001-customer-portal")[0].source,
            "app-comp-002-billing-engine"
        );
    }

    #[test]
    fn existing_legacy_id_property_is_kept() {
        let tmp = TempDir::new().unwrap();
        write_element(
            tmp.path(),
            "a.md",
            "app-comp-portal-001",
            "Portal",
            "properties:\n  owner: web\n  legacy-id: APP-PORTAL\n",
        );

        run(&tmp, Strategy::Legacy);

        let text = fs::read_to_string(tmp.path().join("elements/app-comp-001-portal.md")).unwrap();
        assert!(text.contains("legacy-id: APP-PORTAL"));
        assert!(text.contains("owner: web"));
    }

    #[test]
    fn second_renumbering_changes_nothing() {
        let tmp = TempDir::new().unwrap();
        write_element(tmp.path(), "app-comp-003-a.md", "app-comp-003-a", "A", "");
        write_element(tmp.path(), "app-comp-003-b.md", "app-comp-003-b", "B", "");

        run(&tmp, Strategy::Renumber { compact: false });
        let directory = Directory::new(tmp.path().to_path_buf()).load_all();
        let plan = Plan::new(&directory, Strategy::Renumber { compact: false }).unwrap();

        assert!(plan.is_empty());
        assert!(plan.mapping().is_empty());
    }

    #[test]
    fn failure_reports_the_last_completed_stage() {
        let tmp = TempDir::new().unwrap();
        write_element(tmp.path(), "app-comp-portal-001.md", "app-comp-portal-001", "Portal", "");
        let directory = Directory::new(tmp.path().to_path_buf()).load_all();
        let plan = Plan::new(&directory, Strategy::Legacy).unwrap();

        // Occupy the rename destination after planning.
        fs::write(tmp.path().join("elements/app-comp-001-portal.md"), "squatter").unwrap();

        let error = Migration::new(&plan, tmp.path().join("backups"))
            .run()
            .unwrap_err();

        assert_eq!(error.completed, Stage::ReferencesUpdated);
        assert_eq!(error.attempted, Stage::FilesRenamed);
        assert!(matches!(error.source, StepError::DestinationExists { .. }));
        assert!(error.backup.is_some());
        let original = fs::read_to_string(tmp.path().join("elements/app-comp-portal-001.md")).unwrap();
        assert!(original.contains("id: app-comp-001-portal"));
    }

    #[test]
    fn stale_plan_stops_before_any_id_is_written() {
        let tmp = TempDir::new().unwrap();
        let path = write_element(tmp.path(), "app-comp-portal-001.md", "app-comp-portal-001", "Portal", "");
        let directory = Directory::new(tmp.path().to_path_buf()).load_all();
        let plan = Plan::new(&directory, Strategy::Legacy).unwrap();

        write_element(tmp.path(), "app-comp-portal-001.md", "app-comp-other-001", "Portal", "");

        let error = Migration::new(&plan, tmp.path().join("backups"))
            .run()
            .unwrap_err();

        assert_eq!(error.completed, Stage::BackedUp);
        assert!(matches!(error.source, StepError::Stale { .. }));
        assert!(fs::read_to_string(path).unwrap().contains("id: app-comp-other-001"));
    }

    #[test]
    fn verify_reports_conflicts() {
        let tmp = TempDir::new().unwrap();
        write_element(tmp.path(), "a.md", "app-comp-001-a", "A", "");
        write_element(tmp.path(), "b.md", "app-comp-001-b", "B", "");
        write_element(tmp.path(), "c.md", "bad", "C", "");

        let verification = verify(&Directory::new(tmp.path().to_path_buf()).load_all());

        assert_eq!(verification.invalid.len(), 1);
        assert_eq!(
            verification.conflicts,
            vec![SequenceConflict {
                group: "app-comp".to_string(),
                sequence: 1,
                ids: vec!["app-comp-001-a".to_string(), "app-comp-001-b".to_string()],
            }]
        );
        assert!(!verification.is_clean());
    }

    #[test]
    fn legacy_id_is_added_to_missing_or_empty_properties() {
        let mut front_matter = Mapping::new();
        record_legacy_id(&mut front_matter, "old").unwrap();
        assert_eq!(
            front_matter["properties"][LEGACY_ID_PROPERTY].as_str(),
            Some("old")
        );

        let mut front_matter = Mapping::new();
        front_matter.insert("properties".into(), Value::Null);
        record_legacy_id(&mut front_matter, "old").unwrap();
        assert!(front_matter["properties"].is_mapping());

        let mut front_matter = Mapping::new();
        front_matter.insert("properties".into(), "scalar".into());
        assert!(record_legacy_id(&mut front_matter, "old").is_none());
    }
}
