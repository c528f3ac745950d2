//! Named service registry with instance and singleton makers.
//!
//! # Invariants
//! - Lookup is first-match by insertion order; later duplicates are
//!   unreachable.
//! - A singleton factory runs at most once per cached name, even when
//!   callers race. Failed factory calls are not cached.

use crate::kernel::error::{CoreError, CoreResult};
use crate::kernel::Core;
use log::debug;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Type-erased service produced by a registry factory.
pub type ServiceValue = Arc<dyn Any + Send + Sync>;

/// Factory invoked by `Core::make` with the caller's arguments.
pub type ServiceFactory = Arc<dyn Fn(&Core, &[Value]) -> CoreResult<ServiceValue> + Send + Sync>;

struct RegistryEntry {
    name: String,
    singleton: bool,
    make: ServiceFactory,
}

#[derive(Default)]
pub struct ServiceRegistry {
    entries: RwLock<Vec<RegistryEntry>>,
    instances: Mutex<HashMap<String, Arc<OnceCell<ServiceValue>>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, singleton: bool, make: ServiceFactory) {
        let name = name.into();
        debug!(
            "event=service_register module=registry name={} singleton={}",
            name,
            singleton
        );
        self.entries.write().push(RegistryEntry {
            name,
            singleton,
            make,
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().iter().any(|entry| entry.name == name)
    }

    /// Number of registry entries, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of singleton values currently cached.
    pub fn cached_instances(&self) -> usize {
        self.instances
            .lock()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    pub fn clear_instances(&self) {
        self.instances.lock().clear();
    }

    pub fn make(&self, core: &Core, name: &str, args: &[Value]) -> CoreResult<ServiceValue> {
        let (singleton, make) = self
            .entries
            .read()
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| (entry.singleton, entry.make.clone()))
            .ok_or_else(|| CoreError::ServiceNotFound(name.to_string()))?;

        if !singleton {
            return make(core, args);
        }

        // The cell is taken out of the map so a factory may resolve other
        // services without holding the cache lock.
        let cell = self
            .instances
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_try_init(|| make(core, args)).cloned()
    }
}
