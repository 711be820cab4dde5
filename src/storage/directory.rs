//! A filesystem backed store of elements
//!
//! The [`Directory`] scans a repository's element tree and builds the
//! filesystem agnostic [`Registry`] from it. Files that cannot be loaded are
//! recorded and skipped; one bad file never aborts the scan.

use std::{
    ffi::OsStr,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde_yaml::{Mapping, Value};
use walkdir::{DirEntry, WalkDir};

use crate::{
    domain::{
        Config, ElementType, Layer, Registry,
        id::{CanonicalId, DeriveError, LegacyId, Slug, SlugDefect},
    },
    storage::{Document, LoadError, Record},
};

/// A directory that has been scanned.
#[derive(Debug)]
pub struct Loaded {
    config: Config,
    registry: Registry,
    records: Vec<Record>,
    failures: Vec<LoadFailure>,
}

/// A directory that has not been scanned yet.
#[derive(Debug)]
pub struct Unloaded {
    config: Config,
}

/// A file that could not be loaded.
#[derive(Debug)]
pub struct LoadFailure {
    /// The offending file.
    pub path: PathBuf,
    /// Why it was skipped.
    pub error: LoadError,
}

/// A filesystem backed store of elements.
#[derive(Debug)]
pub struct Directory<S> {
    /// The repository root. Element files live under the configured
    /// `elements_dir` beneath it.
    root: PathBuf,
    state: S,
}

impl<S> Directory<S> {
    /// The repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Directory<Unloaded> {
    /// Opens a repository, reading `archimd.toml` from its root if present.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        let config = Config::load_or_default(&root);
        Self {
            root,
            state: Unloaded { config },
        }
    }

    /// Replaces the configuration read from disk.
    #[must_use]
    pub fn with_config(self, config: Config) -> Self {
        Self {
            root: self.root,
            state: Unloaded { config },
        }
    }

    /// The directory element files are read from.
    #[must_use]
    pub fn elements_dir(&self) -> PathBuf {
        self.root.join(&self.state.config.elements_dir)
    }

    /// Loads every element file.
    ///
    /// Files are visited in file-name order, hidden entries are skipped.
    /// Files that cannot be read, have malformed front matter, or lack a
    /// mandatory field are recorded as failures. A repeated ID replaces the
    /// earlier element, unless `strict_duplicates` is set, in which case the
    /// later file is recorded as a failure instead.
    #[must_use]
    pub fn load_all(self) -> Directory<Loaded> {
        let elements_dir = self.elements_dir();
        let config = self.state.config;
        let paths = collect_markdown_paths(&elements_dir);

        let mut registry = Registry::with_capacity(paths.len());
        let mut records = Vec::with_capacity(paths.len());
        let mut failures = Vec::new();

        for path in paths {
            let record = match Record::read(&path) {
                Ok(record) => record,
                Err(error) => {
                    tracing::debug!("Skipping {}: {error}", path.display());
                    failures.push(LoadFailure { path, error });
                    continue;
                }
            };

            if config.strict_duplicates {
                if let Some(first) = registry.source(&record.element.id) {
                    let error = LoadError::DuplicateId {
                        id: record.element.id.clone(),
                        first: first.to_path_buf(),
                    };
                    tracing::warn!("Skipping {}: {error}", path.display());
                    failures.push(LoadFailure { path, error });
                    continue;
                }
            }

            registry.insert(record.element.clone(), path);
            records.push(record);
        }

        tracing::debug!(
            "Loaded {} elements from {} ({} failures)",
            registry.len(),
            elements_dir.display(),
            failures.len()
        );

        Directory {
            root: self.root,
            state: Loaded {
                config,
                registry,
                records,
                failures,
            },
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn collect_markdown_paths(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension() == Some(OsStr::new("md")))
        .map(DirEntry::into_path)
        .collect()
}

impl Directory<Loaded> {
    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.state.config
    }

    /// The directory element files were read from.
    #[must_use]
    pub fn elements_dir(&self) -> PathBuf {
        self.root.join(&self.state.config.elements_dir)
    }

    /// The element graph.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.state.registry
    }

    /// Every file that loaded, in scan order.
    ///
    /// Unlike the registry this includes files whose ID was later redeclared.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.state.records
    }

    /// Every file that was skipped, in scan order.
    #[must_use]
    pub fn failures(&self) -> &[LoadFailure] {
        &self.state.failures
    }

    /// Scans the directory again with the same configuration.
    #[must_use]
    pub fn reload(&self) -> Self {
        Directory::new(self.root.clone())
            .with_config(self.state.config.clone())
            .load_all()
    }

    /// The sequence number a new element of this layer and type would get:
    /// one more than the highest in use, or `1` for an empty group.
    ///
    /// Legacy IDs count towards the highest number in use.
    #[must_use]
    pub fn next_sequence(&self, layer: Layer, element_type: &ElementType) -> u32 {
        self.state
            .records
            .iter()
            .filter_map(|record| {
                CanonicalId::parse(&record.element.id)
                    .or_else(|| LegacyId::parse(&record.element.id).map(|l| l.to_canonical()))
            })
            .filter(|id| id.group() == (layer.code(), element_type.code))
            .map(|id| u32::from(id.sequence()))
            .max()
            .map_or(1, |max| max + 1)
    }

    /// Creates a new element file.
    ///
    /// The element is given the next free sequence number of its
    /// `(layer, type)` group and written to `{elements_dir}/{layer}/{id}.md`.
    ///
    /// # Errors
    ///
    /// This method can fail if:
    ///
    /// - the element type does not belong to `layer`
    /// - the name yields no usable ID fragment
    /// - the group has run out of sequence numbers
    /// - a file already exists at the target path
    /// - the file cannot be written
    pub fn add_element(
        &mut self,
        layer: Layer,
        element_type: &ElementType,
        name: &str,
        tags: &[String],
    ) -> Result<Record, AddElementError> {
        if element_type.layer != layer {
            return Err(AddElementError::TypeNotInLayer {
                element_type: element_type.name,
                layer,
            });
        }

        let sequence = self.next_sequence(layer, element_type);
        let sequence = u16::try_from(sequence)
            .map_err(|_| AddElementError::Id(DeriveError::SequenceOverflow(sequence)))?;
        let slug = Slug::from_name(name).map_err(AddElementError::Name)?;
        let id = CanonicalId::new(layer, element_type, sequence, &slug)?;

        let path = self
            .elements_dir()
            .join(layer.name())
            .join(format!("{id}.md"));

        let mut front_matter = Mapping::new();
        front_matter.insert("id".into(), id.to_string().into());
        front_matter.insert("name".into(), name.into());
        front_matter.insert("type".into(), element_type.name.into());
        front_matter.insert("layer".into(), layer.name().into());
        front_matter.insert("properties".into(), Value::Mapping(Mapping::new()));
        if !tags.is_empty() {
            front_matter.insert(
                "tags".into(),
                Value::Sequence(tags.iter().map(|tag| tag.as_str().into()).collect()),
            );
        }
        front_matter.insert("relationships".into(), Value::Sequence(Vec::new()));

        let document = Document {
            front_matter,
            body: format!("\n# {name}\n"),
        };
        let content = document.render()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => AddElementError::AlreadyExists(path.clone()),
                _ => AddElementError::Io(e),
            })?;
        file.write_all(content.as_bytes())?;

        let record = Record::read(&path)?;
        self.state
            .registry
            .insert(record.element.clone(), path.clone());
        self.state.records.push(record.clone());

        tracing::info!("Added element: {id}");

        Ok(record)
    }
}

/// Errors that can occur when creating an element.
#[derive(Debug, thiserror::Error)]
pub enum AddElementError {
    /// The element type belongs to another layer.
    #[error("element type '{element_type}' does not belong to layer '{layer}'")]
    TypeNotInLayer {
        /// The requested type.
        element_type: &'static str,
        /// The requested layer.
        layer: Layer,
    },
    /// The name has no characters usable in an ID.
    #[error("cannot derive an ID from the element name: {0}")]
    Name(SlugDefect),
    /// The ID could not be assembled.
    #[error(transparent)]
    Id(#[from] DeriveError),
    /// The target file already exists.
    #[error("refusing to overwrite {}", .0.display())]
    AlreadyExists(PathBuf),
    /// The front matter could not be rendered.
    #[error("failed to render front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The new file could not be read back.
    #[error("failed to read back new element: {0}")]
    Load(#[from] LoadError),
    /// An I/O error occurred.
    #[error("failed to write element: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join("elements").join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn element(id: &str, name: &str, targets: &[&str]) -> String {
        let mut text = format!(
            "---\nid: {id}\nname: {name}\ntype: application-component\nlayer: application\n"
        );
        if !targets.is_empty() {
            text.push_str("relationships:\n");
            for target in targets {
                text.push_str(&format!("  - type: serving\n    target: {target}\n"));
            }
        }
        text.push_str("---\n# body\n");
        text
    }

    #[test]
    fn load_all_reads_nested_files_and_records_failures() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "application/app-comp-001-a.md", &element("app-comp-001-a", "A", &["app-comp-002-b"]));
        write(tmp.path(), "application/sub/app-comp-002-b.md", &element("app-comp-002-b", "B", &[]));
        write(tmp.path(), "application/broken.md", "no front matter");
        write(tmp.path(), "application/nameless.md", "---\nid: x\n---\n");
        write(tmp.path(), "application/notes.txt", "ignored");
        write(tmp.path(), ".hidden/app-comp-003-c.md", &element("app-comp-003-c", "C", &[]));

        let directory = Directory::new(tmp.path().to_path_buf()).load_all();

        assert_eq!(directory.registry().len(), 2);
        assert_eq!(directory.records().len(), 2);
        assert_eq!(directory.failures().len(), 2);
        assert_eq!(directory.registry().incoming("app-comp-002-b")[0].source, "app-comp-001-a");
        assert!(directory.registry().get("app-comp-003-c").is_none());
    }

    #[test]
    fn missing_elements_dir_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let directory = Directory::new(tmp.path().to_path_buf()).load_all();
        assert!(directory.registry().is_empty());
        assert!(directory.failures().is_empty());
    }

    #[test]
    fn duplicate_ids_last_write_wins_in_file_name_order() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.md", &element("app-comp-001-x", "First", &[]));
        write(tmp.path(), "b.md", &element("app-comp-001-x", "Second", &[]));

        let directory = Directory::new(tmp.path().to_path_buf()).load_all();

        assert_eq!(directory.registry().get("app-comp-001-x").unwrap().name, "Second");
        assert_eq!(directory.registry().duplicates().len(), 1);
        assert_eq!(directory.records().len(), 2);
        assert!(directory.failures().is_empty());
    }

    #[test]
    fn strict_duplicates_keep_the_first_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("archimd.toml"), "_version = \"1\"\nstrict_duplicates = true\n").unwrap();
        write(tmp.path(), "a.md", &element("app-comp-001-x", "First", &[]));
        write(tmp.path(), "b.md", &element("app-comp-001-x", "Second", &[]));

        let directory = Directory::new(tmp.path().to_path_buf()).load_all();

        assert_eq!(directory.registry().get("app-comp-001-x").unwrap().name, "First");
        assert!(directory.registry().duplicates().is_empty());
        assert!(matches!(
            directory.failures()[0].error,
            LoadError::DuplicateId { .. }
        ));
    }

    #[test]
    fn add_element_allocates_the_next_sequence() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "application/app-comp-004-a.md", &element("app-comp-004-a", "A", &[]));
        write(tmp.path(), "application/b.md", &element("app-comp-b-007", "B", &[]));
        let mut directory = Directory::new(tmp.path().to_path_buf()).load_all();

        let component = ElementType::by_name("application-component").unwrap();
        let record = directory
            .add_element(Layer::Application, component, "Customer Portal", &["web".to_string()])
            .unwrap();

        assert_eq!(record.element.id, "app-comp-008-customer-portal");
        assert_eq!(record.element.tags, vec!["web"]);
        assert_eq!(
            record.path,
            tmp.path().join("elements/application/app-comp-008-customer-portal.md")
        );
        assert!(directory.registry().contains("app-comp-008-customer-portal"));
    }

    #[test]
    fn add_element_starts_groups_at_one() {
        let tmp = TempDir::new().unwrap();
        let mut directory = Directory::new(tmp.path().to_path_buf()).load_all();
        let goal = ElementType::by_name("goal").unwrap();

        let record = directory
            .add_element(Layer::Motivation, goal, "Reduce Churn", &[])
            .unwrap();

        assert_eq!(record.element.id, "mot-goal-001-reduce-churn");
        let reloaded = directory.reload();
        assert!(reloaded.registry().contains("mot-goal-001-reduce-churn"));
    }

    #[test]
    fn add_element_rejects_type_from_other_layer() {
        let tmp = TempDir::new().unwrap();
        let mut directory = Directory::new(tmp.path().to_path_buf()).load_all();
        let node = ElementType::by_name("node").unwrap();

        let error = directory
            .add_element(Layer::Application, node, "Server", &[])
            .unwrap_err();

        assert!(matches!(error, AddElementError::TypeNotInLayer { .. }));
    }

    #[test]
    fn add_element_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let goal = ElementType::by_name("goal").unwrap();
        let path = tmp.path().join("elements/motivation/mot-goal-001-grow.md");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not an element").unwrap();
        let mut directory = Directory::new(tmp.path().to_path_buf()).load_all();

        let error = directory
            .add_element(Layer::Motivation, goal, "Grow", &[])
            .unwrap_err();

        assert!(matches!(error, AddElementError::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "not an element");
    }
}
