//! Service provider that installs the package manager into the kernel.

use crate::kernel::provider::{ProviderError, ServiceProvider};
use crate::kernel::registry::ServiceValue;
use crate::kernel::{Core, PACKAGES_SERVICE, PACKAGE_SERVICE};
use crate::package::launcher::{LaunchService, PendingLaunch};
use crate::package::manager::PackageManager;
use crate::package::manifest::ManifestSource;
use crate::package::resource::ResourceLoader;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Registers `deskshell/packages` and `deskshell/package`, then loads the
/// manifest.
pub struct PackageServiceProvider {
    manager: Arc<PackageManager>,
}

impl PackageServiceProvider {
    pub fn new(source: Arc<dyn ManifestSource>, loader: Arc<dyn ResourceLoader>) -> Self {
        Self {
            manager: Arc::new(PackageManager::new(source, loader)),
        }
    }

    /// Constructor suitable for `Core::register`.
    pub fn constructor(
        source: Arc<dyn ManifestSource>,
        loader: Arc<dyn ResourceLoader>,
    ) -> impl FnOnce(&Core, Option<&Value>) -> Result<Arc<dyn ServiceProvider>, ProviderError> {
        move |_core, _args| {
            let provider: Arc<dyn ServiceProvider> = Arc::new(Self::new(source, loader));
            Ok(provider)
        }
    }

    pub fn manager(&self) -> Arc<PackageManager> {
        self.manager.clone()
    }
}

#[async_trait]
impl ServiceProvider for PackageServiceProvider {
    fn name(&self) -> &str {
        "packages"
    }

    async fn init(&self, core: &Core) -> Result<(), ProviderError> {
        let manager = self.manager.clone();
        core.singleton(PACKAGES_SERVICE, move |_core, _args| {
            let value: ServiceValue = manager.clone();
            Ok(value)
        });

        let service: Arc<dyn LaunchService> = self.manager.clone();
        core.instance(PACKAGE_SERVICE, move |_core, args| {
            let pending = PendingLaunch::from_make_args(service.clone(), args)?;
            let value: ServiceValue = Arc::new(pending);
            Ok(value)
        });

        self.manager.init(core).await?;
        Ok(())
    }

    fn destroy(&self) -> Result<(), ProviderError> {
        self.manager.destroy();
        Ok(())
    }
}
