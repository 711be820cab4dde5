//! Filesystem storage for element files.

pub mod directory;
mod element_file;
/// Splitting documents into front matter and body.
pub mod front_matter;

pub use directory::{Directory, LoadFailure, Loaded, Unloaded};
pub use element_file::{LoadError, Record, WriteError, read_document, write_document};
pub use front_matter::{Document, ParseError};
