use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The name of the configuration file at the repository root.
pub const CONFIG_FILE: &str = "archimd.toml";

/// Configuration for an architecture repository.
///
/// All paths are relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Where element files live.
    pub elements_dir: PathBuf,

    /// Where migrations write their snapshots.
    pub backup_dir: PathBuf,

    /// Where exporters write diagrams and exchange files.
    pub output_dir: PathBuf,

    /// Whether a repeated ID is a load failure.
    ///
    /// When `false` (default) the later file replaces the earlier one and the
    /// collision is reported by the auditor. When `true` the later file is
    /// rejected and the earlier element is kept.
    pub strict_duplicates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            elements_dir: default_elements_dir(),
            backup_dir: default_backup_dir(),
            output_dir: default_output_dir(),
            strict_duplicates: false,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Loads `archimd.toml` from a repository root, falling back to the
    /// defaults if it is absent or invalid.
    #[must_use]
    pub fn load_or_default(root: &Path) -> Self {
        Self::load(&root.join(CONFIG_FILE)).unwrap_or_else(|e| {
            tracing::debug!("Using default configuration: {e}");
            Self::default()
        })
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }
}

fn default_elements_dir() -> PathBuf {
    PathBuf::from("elements")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// The serialized versions of the configuration.
///
/// This allows the on-disk format to change without breaking existing
/// repositories.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_elements_dir")]
        elements_dir: PathBuf,

        #[serde(default = "default_backup_dir")]
        backup_dir: PathBuf,

        #[serde(default = "default_output_dir")]
        output_dir: PathBuf,

        #[serde(default)]
        strict_duplicates: bool,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                elements_dir,
                backup_dir,
                output_dir,
                strict_duplicates,
            } => Self {
                elements_dir,
                backup_dir,
                output_dir,
                strict_duplicates,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            elements_dir: config.elements_dir,
            backup_dir: config.backup_dir,
            output_dir: config.output_dir,
            strict_duplicates: config.strict_duplicates,
        }
    }
}
