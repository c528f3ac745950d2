//! Package manifest records and the sources they are fetched from.

use crate::package::error::ManifestError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// One installable package as declared by the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    /// Resource paths relative to the package root, in load order.
    pub files: Vec<String>,
    /// Package root below the resource root.
    #[serde(rename = "_path")]
    pub path: String,
    /// Mime patterns the package can open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimes: Option<Vec<String>>,
    /// Remaining manifest keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageMetadata {
    pub fn new(name: impl Into<String>, path: impl Into<String>, files: &[&str]) -> Self {
        Self {
            name: name.into(),
            files: files.iter().map(|file| file.to_string()).collect(),
            path: path.into(),
            mimes: None,
            extra: Map::new(),
        }
    }

    pub fn with_mimes(mut self, mimes: &[&str]) -> Self {
        self.mimes = Some(mimes.iter().map(|mime| mime.to_string()).collect());
        self
    }

    /// `{root}/{_path}/{file}` for every declared file.
    pub fn resource_urls(&self, root: &str) -> Vec<String> {
        self.files
            .iter()
            .map(|file| format!("{root}/{}/{file}", self.path))
            .collect()
    }
}

/// Parses a JSON manifest document.
pub fn parse_manifest(raw: &str) -> Result<Vec<PackageMetadata>, ManifestError> {
    Ok(serde_json::from_str(raw)?)
}

/// Where the manifest comes from.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Human-readable location for logs.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<PackageMetadata>, ManifestError>;
}

/// Manifest stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileManifestSource {
    path: PathBuf,
}

impl FileManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ManifestSource for FileManifestSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<PackageMetadata>, ManifestError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ManifestError::Io {
                path: self.path.clone(),
                source,
            })?;
        parse_manifest(&raw)
    }
}

/// Manifest held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticManifestSource {
    packages: Vec<PackageMetadata>,
}

impl StaticManifestSource {
    pub fn new(packages: Vec<PackageMetadata>) -> Self {
        Self { packages }
    }
}

#[async_trait]
impl ManifestSource for StaticManifestSource {
    fn describe(&self) -> String {
        format!("static({} packages)", self.packages.len())
    }

    async fn fetch(&self) -> Result<Vec<PackageMetadata>, ManifestError> {
        Ok(self.packages.clone())
    }
}
