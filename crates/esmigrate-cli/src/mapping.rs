//! Loading the mappings of the new index.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::info;

/// Mapping file used when neither `--mapping` nor `--mapping_file_path` is given.
pub const DEFAULT_MAPPING_FILE: &str = "mapping.json";

/// Mapping loading errors.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The mapping file does not exist.
    #[error("mapping file {} not found", .0.display())]
    FileNotFound(PathBuf),

    /// The mapping file could not be read.
    #[error("failed to read mapping file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The mappings are not valid JSON.
    #[error("invalid mapping JSON in {origin}: {source}")]
    InvalidJson {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// The mapping file has no `<alias>.mappings` entry.
    #[error("no mappings for alias {alias} in {}", path.display())]
    MissingEntry { alias: String, path: PathBuf },
}

/// Where the mappings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingSource {
    /// Inline JSON, used verbatim.
    Inline(String),
    /// A file keyed by alias.
    File(PathBuf),
    /// [`DEFAULT_MAPPING_FILE`] in the working directory.
    Default,
}

/// Load the mappings for `alias`.
pub fn load_mappings(source: &MappingSource, alias: &str) -> Result<Value, MappingError> {
    match source {
        MappingSource::Inline(json) => {
            serde_json::from_str(json).map_err(|source| MappingError::InvalidJson {
                origin: "--mapping".to_string(),
                source,
            })
        }
        MappingSource::File(path) => mappings_from_file(path, alias),
        MappingSource::Default => mappings_from_file(Path::new(DEFAULT_MAPPING_FILE), alias),
    }
}

/// Read `{"<alias>": {"mappings": ...}}` from `path` and return the entry for `alias`.
pub fn mappings_from_file(path: &Path, alias: &str) -> Result<Value, MappingError> {
    if !path.exists() {
        return Err(MappingError::FileNotFound(path.to_path_buf()));
    }
    info!(path = %path.display(), "reading mapping file");

    let contents = fs::read_to_string(path).map_err(|source| MappingError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value =
        serde_json::from_str(&contents).map_err(|source| MappingError::InvalidJson {
            origin: path.display().to_string(),
            source,
        })?;

    mappings_for_alias(&document, alias).ok_or_else(|| MappingError::MissingEntry {
        alias: alias.to_string(),
        path: path.to_path_buf(),
    })
}

fn mappings_for_alias(document: &Value, alias: &str) -> Option<Value> {
    document
        .get(alias)?
        .get("mappings")
        .filter(|mappings| !mappings.is_null())
        .cloned()
}
