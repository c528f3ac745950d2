//! Live application roster.

use log::debug;
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Application instance produced by a package launcher.
pub trait Application: Send + Sync {
    fn name(&self) -> &str;

    /// Tears the application down. Called at most once by the roster.
    fn destroy(&self);
}

/// Failure reported by a package launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationError {
    message: String,
}

impl ApplicationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ApplicationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "application failed: {}", self.message)
    }
}

impl Error for ApplicationError {}

/// Applications currently alive in the shell, in launch order.
#[derive(Default)]
pub struct ApplicationRoster {
    entries: Mutex<Vec<(Uuid, Arc<dyn Application>)>>,
}

impl ApplicationRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, application: Arc<dyn Application>) -> Uuid {
        let id = Uuid::new_v4();
        self.entries.lock().push((id, application));
        id
    }

    /// Removes one application without destroying it.
    pub fn remove(&self, id: Uuid) -> Option<Arc<dyn Application>> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|(existing, _)| *existing == id)?;
        Some(entries.remove(index).1)
    }

    pub fn applications(&self) -> Vec<Arc<dyn Application>> {
        self.entries
            .lock()
            .iter()
            .map(|(_, app)| app.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Empties the roster and destroys every application in launch order.
    pub fn destroy_all(&self) -> usize {
        let drained: Vec<_> = std::mem::take(&mut *self.entries.lock());
        for (id, app) in &drained {
            debug!(
                "event=app_destroy module=application id={} name={}",
                id,
                app.name()
            );
            app.destroy();
        }
        drained.len()
    }
}
