//! Package manifest, resource preloading and application launch.
//!
//! # Responsibility
//! - Load the manifest that declares every installable package.
//! - Preload package resources sequentially, injecting each URL once.
//! - Bind package names to launchers registered by the packages' own
//!   modules, and launch them on request.
//!
//! # Invariants
//! - A runtime can only be registered for a name present in the manifest.
//! - Only successfully loaded URLs enter the loaded-resource set.

mod error;
pub mod launcher;
pub mod manager;
pub mod manifest;
pub mod mime;
pub mod provider;
pub mod resource;

pub use error::{ManifestError, PackageError, PackageResult, ResourceError};
pub use launcher::{
    launcher_fn, LaunchArgs, LaunchOptions, LaunchService, PackageLauncher, PendingLaunch,
};
pub use manager::{PackageManager, PackageRuntime};
pub use manifest::{
    parse_manifest, FileManifestSource, ManifestSource, PackageMetadata, StaticManifestSource,
};
pub use provider::PackageServiceProvider;
pub use resource::{
    module_fn, DirResourceLoader, LoadedResource, LoadedResourceSet, MemoryResourceLoader,
    ModuleCatalog, PackageModule, PackageRegistrar, ResourceKind, ResourceLoader,
};
