//! In-process event bus for kernel lifecycle and package launch events.

use crate::kernel::application::Application;
use crate::package::{LaunchArgs, LaunchOptions};
use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Events emitted by the kernel and the package manager.
#[derive(Clone)]
pub enum CoreEvent {
    Start,
    Destroy,
    ApplicationCreate {
        name: String,
        args: LaunchArgs,
        options: LaunchOptions,
    },
    /// `application` is `None` when loading or launching failed.
    ApplicationCreated {
        name: String,
        application: Option<Arc<dyn Application>>,
    },
}

impl CoreEvent {
    /// Stable event name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "deskshell/core:start",
            Self::Destroy => "deskshell/core:destroy",
            Self::ApplicationCreate { .. } => "deskshell/application:create",
            Self::ApplicationCreated { .. } => "deskshell/application:created",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&CoreEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(SubscriptionId, Handler)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&CoreEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().push((id, Arc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Delivers `event` to every subscriber and returns how many were called.
    ///
    /// Handlers run outside the subscriber lock, so they may subscribe or
    /// emit themselves.
    pub fn emit(&self, event: &CoreEvent) -> usize {
        let handlers: Vec<Handler> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        debug!(
            "event=emit module=events name={} subscribers={}",
            event.name(),
            handlers.len()
        );
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}
