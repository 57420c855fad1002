//! Policy and data sources
//!
//! Reads Rego modules and JSON/YAML data documents from disk. Explicit paths
//! are loaded as given; [`PolicySources::discover`] walks directories and
//! keeps only recognized extensions.

use prego_core::PregoError;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading sources
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source not readable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("data file {path} is not valid {format}: {message}")]
    Undecodable {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
    #[error("data file {0} must contain an object at the top level")]
    NotAnObject(PathBuf),
}

impl From<SourceError> for PregoError {
    fn from(err: SourceError) -> Self {
        PregoError::Config(err.to_string())
    }
}

/// What a file contributes to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Rego,
    Json,
    Yaml,
}

impl SourceKind {
    /// Kind implied by the file extension, if it is one we load.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "rego" => Some(Self::Rego),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// A Rego module and the name it is registered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyModule {
    pub path: String,
    pub source: String,
}

/// Everything the engine is built from: modules plus one merged data document
#[derive(Debug, Clone)]
pub struct PolicySources {
    modules: Vec<PolicyModule>,
    data: Map<String, Value>,
}

impl Default for PolicySources {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicySources {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            data: Map::new(),
        }
    }

    /// Loads explicit `--policy` and `--data` paths. Policy paths are always
    /// Rego; data paths are decoded by extension (JSON when unknown), except
    /// `.rego` files which are added as modules.
    pub fn load<P, D>(policy_paths: &[P], data_paths: &[D]) -> Result<Self, SourceError>
    where
        P: AsRef<Path>,
        D: AsRef<Path>,
    {
        let mut sources = Self::new();
        for path in policy_paths {
            sources.load_file(path.as_ref(), SourceKind::Rego)?;
        }
        for path in data_paths {
            let path = path.as_ref();
            let kind = SourceKind::from_path(path).unwrap_or(SourceKind::Json);
            sources.load_file(path, kind)?;
        }
        Ok(sources)
    }

    /// Loads files and directories, recursing into directories in sorted
    /// order and skipping files with unrecognized extensions.
    pub fn discover<P: AsRef<Path>>(paths: &[P]) -> Result<Self, SourceError> {
        let mut files = Vec::new();
        let mut visited = HashSet::new();
        for path in paths {
            collect_files(path.as_ref(), &mut files, &mut visited)?;
        }

        let mut sources = Self::new();
        for path in files {
            match SourceKind::from_path(&path) {
                Some(kind) => sources.load_file(&path, kind)?,
                None => debug!(path = %path.display(), "skipping unrecognized file"),
            }
        }
        Ok(sources)
    }

    pub fn add_module(&mut self, path: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.modules.push(PolicyModule {
            path: path.into(),
            source: source.into(),
        });
        self
    }

    /// Deep-merges `document` into the data tree; later scalars win.
    pub fn add_data(&mut self, document: Map<String, Value>) -> &mut Self {
        merge(&mut self.data, document);
        self
    }

    pub fn modules(&self) -> &[PolicyModule] {
        &self.modules
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.data.is_empty()
    }

    fn load_file(&mut self, path: &Path, kind: SourceKind) -> Result<(), SourceError> {
        let content = std::fs::read_to_string(path).map_err(|source| SourceError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), ?kind, "loaded source");

        match kind {
            SourceKind::Rego => {
                self.add_module(path.display().to_string(), content);
            }
            SourceKind::Json => {
                let value: Value =
                    serde_json::from_str(&content).map_err(|e| SourceError::Undecodable {
                        path: path.to_path_buf(),
                        format: "JSON",
                        message: e.to_string(),
                    })?;
                self.add_data(into_object(path, value)?);
            }
            SourceKind::Yaml => {
                let value: Value =
                    serde_yaml::from_str(&content).map_err(|e| SourceError::Undecodable {
                        path: path.to_path_buf(),
                        format: "YAML",
                        message: e.to_string(),
                    })?;
                self.add_data(into_object(path, value)?);
            }
        }
        Ok(())
    }
}

fn into_object(path: &Path, value: Value) -> Result<Map<String, Value>, SourceError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(SourceError::NotAnObject(path.to_path_buf())),
    }
}

/// Directories are keyed by their canonical path in `visited`, so a symlink
/// back into the tree is walked once.
fn collect_files(
    path: &Path,
    out: &mut Vec<PathBuf>,
    visited: &mut HashSet<PathBuf>,
) -> Result<(), SourceError> {
    let unreadable = |source| SourceError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    if !path.is_dir() {
        if !path.exists() {
            return Err(unreadable(std::io::Error::from(
                std::io::ErrorKind::NotFound,
            )));
        }
        out.push(path.to_path_buf());
        return Ok(());
    }

    let canonical = path.canonicalize().map_err(unreadable)?;
    if !visited.insert(canonical) {
        debug!(path = %path.display(), "directory already walked, skipping");
        return Ok(());
    }

    let mut entries = std::fs::read_dir(path)
        .map_err(unreadable)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(unreadable)?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            collect_files(&entry, out, visited)?;
        } else if SourceKind::from_path(&entry).is_some() {
            out.push(entry);
        }
    }
    Ok(())
}

fn merge(into: &mut Map<String, Value>, from: Map<String, Value>) {
    for (key, value) in from {
        match (into.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge(existing, incoming),
            (Some(slot), value) => *slot = value,
            (None, value) => {
                into.insert(key, value);
            }
        }
    }
}
