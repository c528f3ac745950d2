//! Package manager: manifest, preload and launch.
//!
//! # Invariants
//! - `preload` handles its URLs strictly one after another.
//! - A URL enters the loaded set only after it loaded successfully.
//! - `launch` never calls a launcher when any package file failed to load.
//! - `destroy` keeps the loaded set; injected resources stay injected.

use crate::kernel::application::Application;
use crate::kernel::events::CoreEvent;
use crate::kernel::Core;
use crate::package::error::{ManifestError, PackageError, PackageResult, ResourceError};
use crate::package::launcher::{LaunchArgs, LaunchOptions, LaunchService, PackageLauncher};
use crate::package::manifest::{ManifestSource, PackageMetadata};
use crate::package::mime;
use crate::package::resource::{
    LoadedResource, LoadedResourceSet, PackageRegistrar, ResourceKind, ResourceLoader,
};
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;

/// Launcher registered for a manifest entry.
#[derive(Clone)]
pub struct PackageRuntime {
    pub metadata: PackageMetadata,
    pub launcher: Arc<dyn PackageLauncher>,
}

pub struct PackageManager {
    source: Arc<dyn ManifestSource>,
    loader: Arc<dyn ResourceLoader>,
    metadata: RwLock<Vec<PackageMetadata>>,
    packages: Mutex<Vec<PackageRuntime>>,
    loaded: Mutex<LoadedResourceSet>,
}

impl PackageManager {
    pub fn new(source: Arc<dyn ManifestSource>, loader: Arc<dyn ResourceLoader>) -> Self {
        Self {
            source,
            loader,
            metadata: RwLock::new(Vec::new()),
            packages: Mutex::new(Vec::new()),
            loaded: Mutex::new(LoadedResourceSet::new()),
        }
    }

    /// Fetches the manifest, replacing any metadata loaded before.
    pub async fn init(&self, core: &Core) -> PackageResult<()> {
        let deadline = core.configuration().timeouts.manifest_fetch();
        let started_at = Instant::now();
        info!(
            "event=manifest_fetch module=package status=start source={}",
            self.source.describe()
        );

        let packages = match tokio::time::timeout(deadline, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(ManifestError::Timeout {
                after_ms: deadline.as_millis() as u64,
            }),
        }
        .map_err(|err| {
            warn!(
                "event=manifest_fetch module=package status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            PackageError::from(err)
        })?;

        info!(
            "event=manifest_fetch module=package status=ok packages={} duration_ms={}",
            packages.len(),
            started_at.elapsed().as_millis()
        );
        *self.metadata.write() = packages;
        Ok(())
    }

    /// Loads `urls` in order and returns the ones that failed.
    ///
    /// Cached URLs are skipped unless `force` is set. Scripts that carry a
    /// module are executed right after they load.
    pub async fn preload(&self, core: &Core, urls: &[String], force: bool) -> Vec<String> {
        let deadline = core.configuration().timeouts.resource_load();
        let mut failed = Vec::new();

        for url in urls {
            let cached = self.loaded.lock().contains(url);
            if cached && !force {
                continue;
            }

            let kind = ResourceKind::of(url);
            debug!(
                "event=preload module=package status=start url={} kind={}",
                url,
                kind.as_str()
            );
            let loaded = match tokio::time::timeout(deadline, self.loader.load(kind, url)).await {
                Ok(result) => result,
                Err(_) => Err(ResourceError::Timeout {
                    url: url.clone(),
                    after_ms: deadline.as_millis() as u64,
                }),
            };

            match loaded {
                Ok(resource) => {
                    if !cached {
                        self.loaded.lock().insert(url);
                    }
                    if let LoadedResource::Script(Some(module)) = resource {
                        let registrar = PackageRegistrar::new(self, url);
                        if let Err(err) = module.execute(&registrar) {
                            warn!(
                                "event=module_execute module=package status=error url={} error={}",
                                url, err
                            );
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        "event=preload module=package status=error url={} error={}",
                        url, err
                    );
                    failed.push(url.clone());
                }
            }
        }

        failed
    }

    /// Preloads a package and runs its registered launcher.
    ///
    /// A launcher error is logged and yields `Ok(None)`; a launched
    /// application is added to the kernel's roster.
    ///
    /// # Errors
    /// - `MetadataNotFound` before anything is loaded.
    /// - `LoadFailed` with the failing URLs.
    /// - `RuntimeNotFound` when no module registered a launcher for `name`.
    pub async fn launch(
        &self,
        core: &Core,
        name: &str,
        args: LaunchArgs,
        options: LaunchOptions,
    ) -> PackageResult<Option<Arc<dyn Application>>> {
        let metadata = self
            .find_metadata(name)
            .ok_or_else(|| PackageError::MetadataNotFound(name.to_string()))?;

        core.events().emit(&CoreEvent::ApplicationCreate {
            name: name.to_string(),
            args: args.clone(),
            options: options.clone(),
        });

        let root = core.configuration().resource_root;
        let failed = self
            .preload(core, &metadata.resource_urls(&root), false)
            .await;
        if !failed.is_empty() {
            return Err(self.fail_launch(
                core,
                name,
                PackageError::LoadFailed {
                    name: name.to_string(),
                    urls: failed,
                },
            ));
        }

        let Some(runtime) = self.runtime(name) else {
            return Err(self.fail_launch(
                core,
                name,
                PackageError::RuntimeNotFound(name.to_string()),
            ));
        };

        let application = match runtime
            .launcher
            .launch(core, &args, &options, &runtime.metadata)
            .await
        {
            Ok(app) => {
                let id = core.applications().insert(app.clone());
                info!(
                    "event=launch module=package status=ok package={} id={}",
                    name, id
                );
                Some(app)
            }
            Err(err) => {
                warn!(
                    "event=launch module=package status=error package={} error={}",
                    name, err
                );
                None
            }
        };

        core.events().emit(&CoreEvent::ApplicationCreated {
            name: name.to_string(),
            application: application.clone(),
        });
        Ok(application)
    }

    fn fail_launch(&self, core: &Core, name: &str, err: PackageError) -> PackageError {
        warn!(
            "event=launch module=package status=error package={} error={}",
            name, err
        );
        core.events().emit(&CoreEvent::ApplicationCreated {
            name: name.to_string(),
            application: None,
        });
        err
    }

    /// Binds a launcher to a manifest entry.
    ///
    /// # Errors
    /// - `MetadataNotFound` when `name` is not in the manifest.
    pub fn register<L>(&self, name: &str, launcher: L) -> PackageResult<()>
    where
        L: PackageLauncher + 'static,
    {
        let metadata = self
            .find_metadata(name)
            .ok_or_else(|| PackageError::MetadataNotFound(name.to_string()))?;
        info!("event=package_register module=package status=ok package={}", name);
        self.packages.lock().push(PackageRuntime {
            metadata,
            launcher: Arc::new(launcher),
        });
        Ok(())
    }

    pub fn destroy(&self) {
        self.packages.lock().clear();
        self.metadata.write().clear();
    }

    pub fn metadata(&self) -> Vec<PackageMetadata> {
        self.metadata.read().clone()
    }

    pub fn find_metadata(&self, name: &str) -> Option<PackageMetadata> {
        self.metadata
            .read()
            .iter()
            .find(|package| package.name == name)
            .cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.packages
            .lock()
            .iter()
            .any(|runtime| runtime.metadata.name == name)
    }

    pub fn is_loaded(&self, url: &str) -> bool {
        self.loaded.lock().contains(url)
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().urls().to_vec()
    }

    /// Packages able to open `mime`, in manifest order.
    pub fn compatible_packages(&self, mime_type: &str) -> Vec<String> {
        mime::compatible_packages(&self.metadata.read(), mime_type)
    }

    fn runtime(&self, name: &str) -> Option<PackageRuntime> {
        self.packages
            .lock()
            .iter()
            .find(|runtime| runtime.metadata.name == name)
            .cloned()
    }
}

#[async_trait]
impl LaunchService for PackageManager {
    async fn launch_package(
        &self,
        core: &Core,
        name: &str,
        args: LaunchArgs,
        options: LaunchOptions,
    ) -> PackageResult<Option<Arc<dyn Application>>> {
        self.launch(core, name, args, options).await
    }
}
