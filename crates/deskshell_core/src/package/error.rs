use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type PackageResult<T> = Result<T, PackageError>;

#[derive(Debug)]
pub enum PackageError {
    /// The name is absent from the manifest.
    MetadataNotFound(String),
    /// One or more resource URLs failed to load.
    LoadFailed { name: String, urls: Vec<String> },
    /// Resources loaded but the package never registered a launcher.
    RuntimeNotFound(String),
    Manifest(ManifestError),
}

impl Display for PackageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MetadataNotFound(name) => {
                write!(f, "package metadata not found for {name}; is it in the manifest?")
            }
            Self::LoadFailed { name, urls } => {
                write!(f, "package loading {name} failed: {}", urls.join(", "))
            }
            Self::RuntimeNotFound(name) => write!(f, "package runtime {name} not found"),
            Self::Manifest(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PackageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Manifest(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ManifestError> for PackageError {
    fn from(value: ManifestError) -> Self {
        Self::Manifest(value)
    }
}

#[derive(Debug)]
pub enum ManifestError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Timeout {
        after_ms: u64,
    },
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read manifest `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid manifest: {err}"),
            Self::Timeout { after_ms } => write!(f, "manifest fetch timed out after {after_ms}ms"),
        }
    }
}

impl Error for ManifestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Timeout { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ManifestError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug)]
pub enum ResourceError {
    NotFound(String),
    Io {
        url: String,
        source: std::io::Error,
    },
    Timeout {
        url: String,
        after_ms: u64,
    },
    /// The loader refused the URL, e.g. it escapes the resource root.
    Rejected {
        url: String,
        reason: String,
    },
}

impl Display for ResourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(url) => write!(f, "resource not found: {url}"),
            Self::Io { url, source } => write!(f, "failed to load resource {url}: {source}"),
            Self::Timeout { url, after_ms } => {
                write!(f, "resource {url} did not load within {after_ms}ms")
            }
            Self::Rejected { url, reason } => write!(f, "resource {url} rejected: {reason}"),
        }
    }
}

impl Error for ResourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
