//! Shell kernel: provider lifecycle, service registry and server connection.
//!
//! # Responsibility
//! - Construct providers and boot them in two ordered phases.
//! - Resolve named services through the instance/singleton registry.
//! - Own the single server connection and the live application roster.
//!
//! # Invariants
//! - Provider phases run sequentially in registration order.
//! - A singleton factory runs at most once until `Core::destroy` drops
//!   the cached values.
//! - `Core::destroy` is idempotent and keeps registry entries.

pub mod application;
pub mod connection;
mod host;
pub mod error;
pub mod events;
pub mod provider;
pub mod registry;

pub use self::host::{Core, LoginHandler, OpenOutcome, VfsFile};

/// Registry name of the package manager service.
pub const PACKAGES_SERVICE: &str = "deskshell/packages";
/// Registry name of the launch service used by `Core::run`.
pub const PACKAGE_SERVICE: &str = "deskshell/package";
/// Registry name of the user notification service.
pub const NOTIFICATION_SERVICE: &str = "deskshell/notification";
