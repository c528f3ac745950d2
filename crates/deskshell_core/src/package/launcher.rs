//! Launch contracts between the kernel, the package manager and packages.

use crate::kernel::application::{Application, ApplicationError};
use crate::kernel::error::{CoreError, CoreResult};
use crate::kernel::Core;
use crate::package::error::PackageResult;
use crate::package::manifest::PackageMetadata;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Arguments handed to a launching application.
pub type LaunchArgs = Map<String, Value>;
/// Options controlling how an application is launched.
pub type LaunchOptions = Map<String, Value>;

/// Builds an application for one package. Registered by the package itself.
#[async_trait]
pub trait PackageLauncher: Send + Sync {
    async fn launch(
        &self,
        core: &Core,
        args: &LaunchArgs,
        options: &LaunchOptions,
        metadata: &PackageMetadata,
    ) -> Result<Arc<dyn Application>, ApplicationError>;
}

pub struct FnLauncher<F>(F);

/// Wraps a synchronous closure as a `PackageLauncher`.
pub fn launcher_fn<F>(f: F) -> FnLauncher<F>
where
    F: Fn(
            &Core,
            &LaunchArgs,
            &LaunchOptions,
            &PackageMetadata,
        ) -> Result<Arc<dyn Application>, ApplicationError>
        + Send
        + Sync,
{
    FnLauncher(f)
}

#[async_trait]
impl<F> PackageLauncher for FnLauncher<F>
where
    F: Fn(
            &Core,
            &LaunchArgs,
            &LaunchOptions,
            &PackageMetadata,
        ) -> Result<Arc<dyn Application>, ApplicationError>
        + Send
        + Sync,
{
    async fn launch(
        &self,
        core: &Core,
        args: &LaunchArgs,
        options: &LaunchOptions,
        metadata: &PackageMetadata,
    ) -> Result<Arc<dyn Application>, ApplicationError> {
        (self.0)(core, args, options, metadata)
    }
}

/// Launches packages by name; what `deskshell/package` resolves to.
#[async_trait]
pub trait LaunchService: Send + Sync {
    async fn launch_package(
        &self,
        core: &Core,
        name: &str,
        args: LaunchArgs,
        options: LaunchOptions,
    ) -> PackageResult<Option<Arc<dyn Application>>>;
}

/// A launch request bound to its service, produced by `deskshell/package`.
pub struct PendingLaunch {
    service: Arc<dyn LaunchService>,
    name: String,
    args: LaunchArgs,
    options: LaunchOptions,
}

impl PendingLaunch {
    /// Builds a request from `make` arguments `[name, args?, options?]`.
    pub fn from_make_args(
        service: Arc<dyn LaunchService>,
        make_args: &[Value],
    ) -> CoreResult<Self> {
        let name = make_args
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CoreError::service(
                    crate::kernel::PACKAGE_SERVICE,
                    "first argument must be a package name",
                )
            })?;
        Ok(Self {
            service,
            name: name.to_string(),
            args: object_arg(make_args.get(1)),
            options: object_arg(make_args.get(2)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn launch(&self, core: &Core) -> PackageResult<Option<Arc<dyn Application>>> {
        self.service
            .launch_package(core, &self.name, self.args.clone(), self.options.clone())
            .await
    }
}

fn object_arg(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}
