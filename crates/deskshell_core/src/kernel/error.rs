//! Kernel error taxonomy.

use crate::kernel::provider::ProviderError;
use crate::package::PackageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug)]
pub enum CoreError {
    /// No registry entry carries this name.
    ServiceNotFound(String),
    /// The entry exists but produced a value of another type.
    ServiceTypeMismatch {
        name: String,
        expected: &'static str,
    },
    /// A service factory rejected its arguments or failed to build.
    Service { name: String, message: String },
    Package(PackageError),
    /// A provider failed to tear down; remaining cleanup was skipped.
    ProviderDestroy {
        provider: String,
        source: ProviderError,
    },
}

impl CoreError {
    pub fn service(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServiceNotFound(name) => write!(f, "provider '{name}' not found"),
            Self::ServiceTypeMismatch { name, expected } => {
                write!(f, "service '{name}' is not a {expected}")
            }
            Self::Service { name, message } => write!(f, "service '{name}' failed: {message}"),
            Self::Package(err) => write!(f, "{err}"),
            Self::ProviderDestroy { provider, source } => {
                write!(f, "provider '{provider}' failed to destroy: {source}")
            }
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Package(err) => Some(err),
            Self::ProviderDestroy { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<PackageError> for CoreError {
    fn from(value: PackageError) -> Self {
        Self::Package(value)
    }
}
