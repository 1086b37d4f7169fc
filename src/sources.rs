//! # Sources
//! Static source configuration, loaded once per run from a JSON array.
//!
//! This is the only fatal input of a run: an unreadable or invalid file must
//! stop the pipeline before any feed is fetched.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One configured news source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: String,
    /// Feed address.
    pub rss: String,
    /// Static authority prior; strictly positive.
    pub base_authority: f64,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SourceConfigError {
    #[error("reading source config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing source config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("source config {0} lists no sources")]
    Empty(PathBuf),
    #[error("duplicate source id `{0}`")]
    DuplicateId(String),
    #[error("source `{id}` has invalid base_authority {value}")]
    InvalidAuthority { id: String, value: f64 },
}

/// Load and validate the source list from `path`.
pub fn load_sources(path: &Path) -> Result<Vec<Source>, SourceConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SourceConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let sources: Vec<Source> =
        serde_json::from_str(&raw).map_err(|source| SourceConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if sources.is_empty() {
        return Err(SourceConfigError::Empty(path.to_path_buf()));
    }
    validate(&sources)?;
    Ok(sources)
}

fn validate(sources: &[Source]) -> Result<(), SourceConfigError> {
    let mut seen = HashSet::new();
    for s in sources {
        if !seen.insert(s.id.as_str()) {
            return Err(SourceConfigError::DuplicateId(s.id.clone()));
        }
        if !(s.base_authority.is_finite() && s.base_authority > 0.0) {
            return Err(SourceConfigError::InvalidAuthority {
                id: s.id.clone(),
                value: s.base_authority,
            });
        }
    }
    Ok(())
}
