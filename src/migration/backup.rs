use std::{
    fs,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::migration::{Plan, StepError};

/// The file the ID mapping is written to inside a backup.
pub const MAPPING_FILE: &str = "id_mapping.yaml";

/// Snapshots the element tree and the plan's ID mapping.
///
/// The snapshot goes to `{backup_root}/{label}_{YYYYmmdd_HHMMSS}/`, with a
/// numeric suffix if that directory already exists. Returns the snapshot
/// directory.
pub(super) fn create(plan: &Plan, backup_root: &Path) -> Result<PathBuf, StepError> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let base = format!("{}_{timestamp}", plan.strategy().label());

    let mut destination = backup_root.join(&base);
    let mut suffix = 1;
    while destination.exists() {
        destination = backup_root.join(format!("{base}_{suffix}"));
        suffix += 1;
    }

    let elements = destination.join("elements");
    copy_tree(&plan.elements_dir(), &elements)?;

    let mapping = serde_yaml::to_string(&plan.mapping_document())?;
    let mapping_path = destination.join(MAPPING_FILE);
    fs::write(&mapping_path, mapping).map_err(|source| StepError::Backup {
        path: mapping_path,
        source,
    })?;

    tracing::info!("Backed up {} to {}", plan.elements_dir().display(), destination.display());

    Ok(destination)
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), StepError> {
    fs::create_dir_all(to).map_err(|source| StepError::Backup {
        path: to.to_path_buf(),
        source,
    })?;

    if !from.exists() {
        return Ok(());
    }

    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| StepError::Backup {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| from.to_path_buf()),
            source: e.into(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);

        let result = if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
        } else {
            fs::copy(entry.path(), &target).map(|_| ())
        };
        result.map_err(|source| StepError::Backup {
            path: target,
            source,
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{migration::Strategy, storage::Directory};

    #[test]
    fn snapshot_contains_tree_and_mapping() {
        let tmp = TempDir::new().unwrap();
        let elements = tmp.path().join("elements/application");
        fs::create_dir_all(&elements).unwrap();
        fs::write(
            elements.join("app-comp-portal-001.md"),
            "---\nid: app-comp-portal-001\nname: Portal\ntype: application-component\nlayer: application\n---\nbody\n",
        )
        .unwrap();
        let directory = Directory::new(tmp.path().to_path_buf()).load_all();
        let plan = Plan::new(&directory, Strategy::Legacy).unwrap();

        let backup_root = tmp.path().join("backups");
        let first = create(&plan, &backup_root).unwrap();
        let second = create(&plan, &backup_root).unwrap();

        assert_ne!(first, second);
        assert!(
            first
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("migration_")
        );
        assert_eq!(
            fs::read_to_string(first.join("elements/application/app-comp-portal-001.md")).unwrap(),
            fs::read_to_string(elements.join("app-comp-portal-001.md")).unwrap()
        );
        let mapping = fs::read_to_string(first.join(MAPPING_FILE)).unwrap();
        assert_eq!(mapping, "app-comp-portal-001: app-comp-001-portal\n");
    }
}
