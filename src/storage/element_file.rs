use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{
    domain::element::{Element, FieldError},
    storage::front_matter::{Document, ParseError},
};

/// An element file that parsed successfully.
#[derive(Debug, Clone)]
pub struct Record {
    /// Where the file lives.
    pub path: PathBuf,
    /// The raw document, for rewriting.
    pub document: Document,
    /// The element it declares.
    pub element: Element,
}

impl Record {
    /// Reads and interprets one element file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has no well-formed front
    /// matter, or lacks a mandatory field.
    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let document = read_document(path)?;
        let element = Element::from_front_matter(&document.front_matter, &document.body)?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
            element,
        })
    }

    /// The file name without its `.md` extension.
    #[must_use]
    pub fn file_stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
    }
}

/// Reads and splits a document.
///
/// # Errors
///
/// Returns an error if the file cannot be read or split.
pub fn read_document(path: &Path) -> Result<Document, LoadError> {
    let text = fs::read_to_string(path)?;
    Ok(Document::parse(&text)?)
}

/// Writes a document by replacing the file with a fully written sibling.
///
/// A reader never observes a half-written file: the new content is written to
/// a hidden temporary file in the same directory, then renamed over `path`.
///
/// # Errors
///
/// Returns an error if the document cannot be rendered, or the temporary file
/// cannot be written or renamed.
pub fn write_document(path: &Path, document: &Document) -> Result<(), WriteError> {
    let content = document.render()?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let temporary = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&temporary, content)?;
    if let Err(e) = fs::rename(&temporary, path) {
        let _ = fs::remove_file(&temporary);
        return Err(e.into());
    }
    Ok(())
}

/// Errors that can occur when loading an element file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// An I/O error occurred.
    #[error("failed to read file: {0}")]
    Io(#[from] io::Error),
    /// The file has no well-formed front matter.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The front matter does not describe an element.
    #[error(transparent)]
    Fields(#[from] FieldError),
    /// Another file already declared this ID and duplicates are not allowed.
    #[error("duplicate ID '{id}', first declared in {}", first.display())]
    DuplicateId {
        /// The repeated ID.
        id: String,
        /// The file that declared it first.
        first: PathBuf,
    },
}

/// Errors that can occur when writing an element file.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// An I/O error occurred.
    #[error("failed to write file: {0}")]
    Io(#[from] io::Error),
    /// The front matter could not be rendered.
    #[error("failed to render front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn read_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app-comp-001-portal.md");
        fs::write(
            &path,
            "---\nid: app-comp-001-portal\nname: Portal\ntype: application-component\nlayer: application\n---\n# Portal\n",
        )
        .unwrap();

        let record = Record::read(&path).unwrap();

        assert_eq!(record.element.id, "app-comp-001-portal");
        assert_eq!(record.file_stem(), "app-comp-001-portal");
        assert_eq!(record.document.body, "# Portal\n");
    }

    #[test]
    fn missing_field_is_a_load_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.md");
        fs::write(&path, "---\nid: x\n---\n").unwrap();

        let error = Record::read(&path).unwrap_err();

        assert!(matches!(
            error,
            LoadError::Fields(FieldError::MissingField("name"))
        ));
    }

    #[test]
    fn missing_file() {
        let tmp = TempDir::new().unwrap();
        let error = Record::read(&tmp.path().join("absent.md")).unwrap_err();
        assert!(matches!(error, LoadError::Io(_)));
    }

    #[test]
    fn write_replaces_content_and_leaves_no_temporary_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.md");
        fs::write(&path, "---\nid: old\n---\nbody text\n").unwrap();

        let mut document = read_document(&path).unwrap();
        document.front_matter.insert("id".into(), "new".into());
        write_document(&path, &document).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "---\nid: new\n---\nbody text\n"
        );
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
