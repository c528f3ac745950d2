#![allow(dead_code)]

use async_trait::async_trait;
use deskshell_core::{
    Application, Core, CoreEvent, LoopbackTransport, PageLocation, ProviderError,
    ServiceProvider,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn new_core() -> (Arc<Core>, Arc<LoopbackTransport>) {
    let transport = Arc::new(LoopbackTransport::new());
    let core = Core::new(PageLocation::localhost(), transport.clone());
    (core, transport)
}

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

#[derive(Clone, Copy, Default)]
pub enum InitBehavior {
    #[default]
    Succeed,
    Fail,
    Hang,
    Panic,
}

pub struct RecordingProvider {
    pub name: String,
    pub journal: Journal,
    pub init: InitBehavior,
    pub fail_destroy: bool,
    pub args: Option<Value>,
}

impl RecordingProvider {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            journal: journal.clone(),
            init: InitBehavior::Succeed,
            fail_destroy: false,
            args: None,
        }
    }

    pub fn with_init(mut self, init: InitBehavior) -> Self {
        self.init = init;
        self
    }

    pub fn failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }

    /// Constructor closure for `Core::register`.
    pub fn into_constructor(
        self,
    ) -> impl FnOnce(&Core, Option<&Value>) -> Result<Arc<dyn ServiceProvider>, ProviderError>
    {
        move |_core, args| {
            let mut provider = self;
            provider.args = args.cloned();
            let provider: Arc<dyn ServiceProvider> = Arc::new(provider);
            Ok(provider)
        }
    }
}

#[async_trait]
impl ServiceProvider for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self, _core: &Core) -> Result<(), ProviderError> {
        self.journal.lock().push(format!("init {}", self.name));
        match self.init {
            InitBehavior::Succeed => Ok(()),
            InitBehavior::Fail => Err(ProviderError::failed(format!("{} refused", self.name))),
            InitBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            InitBehavior::Panic => panic!("{} exploded", self.name),
        }
    }

    fn start(&self, _core: &Core) {
        self.journal.lock().push(format!("start {}", self.name));
    }

    fn destroy(&self) -> Result<(), ProviderError> {
        self.journal.lock().push(format!("destroy {}", self.name));
        if self.fail_destroy {
            return Err(ProviderError::failed("teardown failed"));
        }
        Ok(())
    }
}

pub struct TestApp {
    pub name: String,
    pub destroyed: Arc<AtomicUsize>,
}

impl TestApp {
    pub fn boxed(name: &str) -> Arc<dyn Application> {
        Arc::new(Self {
            name: name.to_string(),
            destroyed: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn tracked(name: &str, destroyed: &Arc<AtomicUsize>) -> Arc<dyn Application> {
        Arc::new(Self {
            name: name.to_string(),
            destroyed: destroyed.clone(),
        })
    }
}

impl Application for TestApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every event as `name` or `name:<package>:<ok|failed>`.
pub fn record_events(core: &Core) -> Journal {
    let events = journal();
    let sink = events.clone();
    core.events().subscribe(move |event| {
        let entry = match event {
            CoreEvent::ApplicationCreate { name, .. } => format!("{}:{name}", event.name()),
            CoreEvent::ApplicationCreated { name, application } => format!(
                "{}:{name}:{}",
                event.name(),
                if application.is_some() { "ok" } else { "failed" }
            ),
            other => other.name().to_string(),
        };
        sink.lock().push(entry);
    });
    events
}
