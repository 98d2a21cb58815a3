//! Local version marker lookup.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::version::{VersionMarker, parse_marker};
use crate::error::VersionError;

/// Where the marker lives inside a tree, and what it is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerLocation {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    pub name: String,
}

/// Source of the version marker in the local working copy.
pub trait VersionSource {
    fn local_version(&self) -> Result<VersionMarker, VersionError>;
}

/// Reads the marker straight from disk on every call.
#[derive(Debug, Clone)]
pub struct LocalVersionSource {
    root: PathBuf,
    location: MarkerLocation,
}

impl LocalVersionSource {
    pub fn new(root: impl Into<PathBuf>, location: MarkerLocation) -> Self {
        Self {
            root: root.into(),
            location,
        }
    }

    pub fn marker_path(&self) -> PathBuf {
        self.root.join(&self.location.path)
    }
}

impl VersionSource for LocalVersionSource {
    fn local_version(&self) -> Result<VersionMarker, VersionError> {
        let path = self.marker_path();
        let source = read_marker_file(&path)?;
        let marker = parse_marker(&source, &self.location.name)
            .map_err(|err| VersionError::from_local_parse(path.clone(), err))?;
        debug!(path = %path.display(), %marker, "read local version");
        Ok(marker)
    }
}

fn read_marker_file(path: &Path) -> Result<String, VersionError> {
    match fs::read_to_string(path) {
        Ok(source) => Ok(source),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(VersionError::NotFound {
            path: path.to_path_buf(),
            what: "version file".to_string(),
        }),
        Err(err) if err.kind() == ErrorKind::InvalidData => Err(VersionError::Format {
            path: path.to_path_buf(),
            detail: "file is not valid UTF-8".to_string(),
        }),
        Err(err) => Err(VersionError::Io {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}
