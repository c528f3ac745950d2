//! Resource loading for package preload.
//!
//! A loaded script may carry a `PackageModule`. Executing the module is how a
//! package binds its launcher to its manifest name, through a
//! `PackageRegistrar` handed to it by the package manager.

use crate::package::error::{PackageResult, ResourceError};
use crate::package::launcher::PackageLauncher;
use crate::package::manager::PackageManager;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Script,
    Style,
}

impl ResourceKind {
    /// URLs ending in `.js` are scripts; everything else is a style.
    pub fn of(url: &str) -> Self {
        if url.ends_with(".js") {
            Self::Script
        } else {
            Self::Style
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Style => "style",
        }
    }
}

/// Code shipped by a package script.
pub trait PackageModule: Send + Sync {
    /// Runs once each time the script is injected.
    fn execute(&self, registrar: &PackageRegistrar<'_>) -> PackageResult<()>;
}

pub struct FnModule<F>(F);

/// Wraps a closure as a `PackageModule`.
pub fn module_fn<F>(f: F) -> FnModule<F>
where
    F: Fn(&PackageRegistrar<'_>) -> PackageResult<()> + Send + Sync,
{
    FnModule(f)
}

impl<F> PackageModule for FnModule<F>
where
    F: Fn(&PackageRegistrar<'_>) -> PackageResult<()> + Send + Sync,
{
    fn execute(&self, registrar: &PackageRegistrar<'_>) -> PackageResult<()> {
        (self.0)(registrar)
    }
}

/// Registration surface exposed to executing package modules.
pub struct PackageRegistrar<'a> {
    manager: &'a PackageManager,
    url: &'a str,
}

impl<'a> PackageRegistrar<'a> {
    pub(crate) fn new(manager: &'a PackageManager, url: &'a str) -> Self {
        Self { manager, url }
    }

    /// URL of the script being executed.
    pub fn url(&self) -> &str {
        self.url
    }

    pub fn register<L>(&self, name: &str, launcher: L) -> PackageResult<()>
    where
        L: PackageLauncher + 'static,
    {
        self.manager.register(name, launcher)
    }
}

/// What a loader produced for one URL.
pub enum LoadedResource {
    Style,
    /// `None` for scripts with no module behind them.
    Script(Option<Arc<dyn PackageModule>>),
}

/// Injects resources into the running shell.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn load(&self, kind: ResourceKind, url: &str) -> Result<LoadedResource, ResourceError>;
}

/// URLs that were injected successfully, in first-load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedResourceSet {
    urls: Vec<String>,
}

impl LoadedResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|loaded| loaded == url)
    }

    /// Returns `false` when `url` was already present.
    pub fn insert(&mut self, url: &str) -> bool {
        if self.contains(url) {
            return false;
        }
        self.urls.push(url.to_string());
        true
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Script URL to module table.
#[derive(Default, Clone)]
pub struct ModuleCatalog {
    modules: HashMap<String, Arc<dyn PackageModule>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<M>(&mut self, url: impl Into<String>, module: M)
    where
        M: PackageModule + 'static,
    {
        self.modules.insert(url.into(), Arc::new(module));
    }

    pub fn get(&self, url: &str) -> Option<Arc<dyn PackageModule>> {
        self.modules.get(url).cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Serves resources from a directory on disk.
///
/// Scripts resolve to the module registered for their URL in the catalog.
pub struct DirResourceLoader {
    root: PathBuf,
    modules: ModuleCatalog,
}

impl DirResourceLoader {
    pub fn new(root: impl Into<PathBuf>, modules: ModuleCatalog) -> Self {
        Self {
            root: root.into(),
            modules,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, ResourceError> {
        let relative = Path::new(url);
        let escapes = relative
            .components()
            .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ResourceError::Rejected {
                url: url.to_string(),
                reason: "path escapes the resource root".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ResourceLoader for DirResourceLoader {
    async fn load(&self, kind: ResourceKind, url: &str) -> Result<LoadedResource, ResourceError> {
        let path = self.resolve(url)?;
        let meta = tokio::fs::metadata(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ResourceError::NotFound(url.to_string())
            } else {
                ResourceError::Io {
                    url: url.to_string(),
                    source,
                }
            }
        })?;
        if !meta.is_file() {
            return Err(ResourceError::NotFound(url.to_string()));
        }

        Ok(match kind {
            ResourceKind::Style => LoadedResource::Style,
            ResourceKind::Script => LoadedResource::Script(self.modules.get(url)),
        })
    }
}

#[derive(Clone)]
enum MemoryEntry {
    Present(Option<Arc<dyn PackageModule>>),
    Failing(String),
}

/// In-memory resource table that records every load attempt.
#[derive(Default)]
pub struct MemoryResourceLoader {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    attempts: Mutex<Vec<String>>,
}

impl MemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `url` with nothing to execute.
    pub fn insert(&self, url: impl Into<String>) {
        self.entries
            .lock()
            .insert(url.into(), MemoryEntry::Present(None));
    }

    pub fn insert_module<M>(&self, url: impl Into<String>, module: M)
    where
        M: PackageModule + 'static,
    {
        self.entries
            .lock()
            .insert(url.into(), MemoryEntry::Present(Some(Arc::new(module))));
    }

    /// Makes every load of `url` fail with `reason`.
    pub fn insert_failure(&self, url: impl Into<String>, reason: impl Into<String>) {
        self.entries
            .lock()
            .insert(url.into(), MemoryEntry::Failing(reason.into()));
    }

    /// Every load attempt, in order, including failures.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    pub fn attempts_for(&self, url: &str) -> usize {
        self.attempts
            .lock()
            .iter()
            .filter(|attempt| attempt.as_str() == url)
            .count()
    }
}

#[async_trait]
impl ResourceLoader for MemoryResourceLoader {
    async fn load(&self, kind: ResourceKind, url: &str) -> Result<LoadedResource, ResourceError> {
        self.attempts.lock().push(url.to_string());
        let entry = self.entries.lock().get(url).cloned();
        match entry {
            None => Err(ResourceError::NotFound(url.to_string())),
            Some(MemoryEntry::Failing(reason)) => Err(ResourceError::Rejected {
                url: url.to_string(),
                reason,
            }),
            Some(MemoryEntry::Present(module)) => Ok(match kind {
                ResourceKind::Style => LoadedResource::Style,
                ResourceKind::Script => LoadedResource::Script(module),
            }),
        }
    }
}
