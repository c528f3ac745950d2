//! Bootstrap kernel for the deskshell web desktop.
//! Wires service providers, opens the server connection and launches
//! packages declared by the manifest.

pub mod config;
pub mod kernel;
pub mod logging;
pub mod package;

pub use config::{
    merge_config, ConfigOverrides, ConnectionConfig, CoreConfig, PageLocation, TimeoutConfig,
};
pub use kernel::application::{Application, ApplicationError, ApplicationRoster};
pub use kernel::connection::{
    Connection, ConnectionListener, LoopbackTransport, Transport, TransportError,
};
pub use kernel::error::{CoreError, CoreResult};
pub use kernel::events::{CoreEvent, EventBus, SubscriptionId};
pub use kernel::provider::{
    BootPhase, BootReport, ProviderError, ProviderOptions, ProviderOutcome, ServiceProvider,
};
pub use kernel::registry::{ServiceFactory, ServiceValue};
pub use kernel::{
    Core, LoginHandler, OpenOutcome, VfsFile, NOTIFICATION_SERVICE, PACKAGES_SERVICE,
    PACKAGE_SERVICE,
};
pub use logging::{init_logging, logging_status, LogLevel};
pub use package::{
    launcher_fn, module_fn, DirResourceLoader, FileManifestSource, LaunchArgs, LaunchOptions,
    ManifestError, MemoryResourceLoader, ModuleCatalog, PackageError, PackageManager,
    PackageMetadata, PackageRegistrar, PackageServiceProvider, ResourceError,
    StaticManifestSource,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
