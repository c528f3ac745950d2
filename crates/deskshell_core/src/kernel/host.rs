use crate::config::{merge_config, ConfigOverrides, CoreConfig, PageLocation};
use crate::kernel::application::{Application, ApplicationRoster};
use crate::kernel::connection::{Connection, ConnectionListener, Transport};
use crate::kernel::error::{CoreError, CoreResult};
use crate::kernel::events::{CoreEvent, EventBus};
use crate::kernel::provider::{
    run_phase, BootPhase, BootReport, ProviderEntry, ProviderError, ProviderOptions,
    ServiceProvider,
};
use crate::kernel::registry::{ServiceRegistry, ServiceValue};
use crate::kernel::{NOTIFICATION_SERVICE, PACKAGES_SERVICE, PACKAGE_SERVICE};
use crate::package::{LaunchArgs, LaunchOptions, PackageManager, PendingLaunch};
use log::{error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Login flow started by `Core::login`.
pub trait LoginHandler {
    fn init(&self);
}

/// File handed to `Core::open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VfsFile {
    pub path: String,
    pub mime: String,
}

impl VfsFile {
    pub fn new(path: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime: mime.into(),
        }
    }

    fn to_value(&self) -> Value {
        json!({ "path": self.path, "mime": self.mime })
    }
}

/// Result of `Core::open`.
pub enum OpenOutcome {
    /// A compatible package was launched; `None` if its launcher failed.
    Launched {
        package: String,
        application: Option<Arc<dyn Application>>,
    },
    NoCompatiblePackage,
}

impl OpenOutcome {
    pub fn is_launched(&self) -> bool {
        matches!(self, Self::Launched { .. })
    }
}

/// The shell kernel.
///
/// Always handled through `Arc<Core>`; providers, factories and launchers
/// receive `&Core` for the duration of a call.
pub struct Core {
    self_ref: Weak<Core>,
    location: PageLocation,
    configuration: RwLock<CoreConfig>,
    providers: Mutex<Vec<ProviderEntry>>,
    registry: ServiceRegistry,
    events: EventBus,
    applications: ApplicationRoster,
    transport: Arc<dyn Transport>,
    connection: Mutex<Option<Box<dyn Connection>>>,
    destroyed: AtomicBool,
}

impl Core {
    pub fn new(location: PageLocation, transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            configuration: RwLock::new(CoreConfig::defaults_for(&location)),
            location,
            providers: Mutex::new(Vec::new()),
            registry: ServiceRegistry::new(),
            events: EventBus::new(),
            applications: ApplicationRoster::new(),
            transport,
            connection: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Replaces the configuration with `overrides` shallow-merged over the
    /// page-derived defaults.
    pub fn configure(&self, overrides: ConfigOverrides) {
        let merged = merge_config(&self.location, overrides);
        info!(
            "event=configure module=kernel status=ok ws={}",
            merged.ws.uri()
        );
        *self.configuration.write() = merged;
    }

    pub fn configuration(&self) -> CoreConfig {
        self.configuration.read().clone()
    }

    pub fn location(&self) -> &PageLocation {
        &self.location
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn applications(&self) -> &ApplicationRoster {
        &self.applications
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Names of the constructed providers in registration order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .lock()
            .iter()
            .map(|entry| entry.provider.name().to_string())
            .collect()
    }

    /// URI of the current connection, if one was opened.
    pub fn connection_uri(&self) -> Option<String> {
        self.connection
            .lock()
            .as_ref()
            .map(|conn| conn.uri().to_string())
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .is_some_and(|conn| conn.is_open())
    }

    /// Constructs a provider and appends it to the provider list.
    ///
    /// A failing constructor is logged and the provider is left out.
    pub fn register<F>(&self, constructor: F, options: ProviderOptions)
    where
        F: FnOnce(&Core, Option<&Value>) -> Result<Arc<dyn ServiceProvider>, ProviderError>,
    {
        match constructor(self, options.args.as_ref()) {
            Ok(provider) => {
                info!(
                    "event=provider_register module=kernel status=ok provider={} before={}",
                    provider.name(),
                    options.before
                );
                self.providers
                    .lock()
                    .push(ProviderEntry { options, provider });
            }
            Err(err) => {
                error!(
                    "event=provider_register module=kernel status=error before={} error={}",
                    options.before, err
                );
            }
        }
    }

    /// Runs the `before` provider phase.
    pub async fn boot(&self) -> BootReport {
        info!("event=boot module=kernel status=start");
        self.run_providers(BootPhase::Before).await
    }

    /// Runs the remaining providers, then opens the server connection.
    pub async fn start(&self) -> BootReport {
        self.events.emit(&CoreEvent::Start);

        let report = self.run_providers(BootPhase::Main).await;
        if report.completed {
            self.create_connection();
        } else {
            warn!("event=start module=kernel status=aborted connection=skipped");
        }
        report
    }

    async fn run_providers(&self, phase: BootPhase) -> BootReport {
        let providers: Vec<Arc<dyn ServiceProvider>> = self
            .providers
            .lock()
            .iter()
            .filter(|entry| phase.includes(&entry.options))
            .map(|entry| entry.provider.clone())
            .collect();
        let deadline = self.configuration.read().timeouts.provider_init();
        run_phase(self, phase, providers, deadline).await
    }

    /// Opens the server connection described by the `ws` configuration.
    ///
    /// Returns `false` when the transport refused.
    pub fn create_connection(&self) -> bool {
        let uri = self.configuration.read().ws.uri();
        info!("event=connection module=kernel status=start uri={}", uri);

        let listener = Arc::new(CoreConnectionListener {
            core: self.self_ref.clone(),
        });
        match self.transport.connect(&uri, listener) {
            Ok(conn) => {
                *self.connection.lock() = Some(conn);
                true
            }
            Err(err) => {
                error!(
                    "event=connection module=kernel status=error uri={} error={}",
                    uri, err
                );
                false
            }
        }
    }

    /// Registers a maker that builds a fresh value on every `make`.
    pub fn instance<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Core, &[Value]) -> CoreResult<ServiceValue> + Send + Sync + 'static,
    {
        self.registry.register(name, false, Arc::new(factory));
    }

    /// Registers a maker whose first result is cached and reused.
    pub fn singleton<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Core, &[Value]) -> CoreResult<ServiceValue> + Send + Sync + 'static,
    {
        self.registry.register(name, true, Arc::new(factory));
    }

    /// Resolves a named service.
    ///
    /// # Errors
    /// - `ServiceNotFound` when nothing is registered under `name`.
    /// - Whatever the factory returns.
    pub fn make(&self, name: &str, args: &[Value]) -> CoreResult<ServiceValue> {
        self.registry.make(self, name, args)
    }

    /// `make` followed by a downcast to `T`.
    pub fn make_as<T>(&self, name: &str, args: &[Value]) -> CoreResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.make(name, args)?
            .downcast::<T>()
            .map_err(|_| CoreError::ServiceTypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn login<F, L>(&self, constructor: F, options: Value)
    where
        F: FnOnce(&Core, Value) -> L,
        L: LoginHandler,
    {
        info!("event=login module=kernel status=requested");
        let handler = constructor(self, options);
        handler.init();
    }

    /// Launches a package through the `deskshell/package` service.
    pub async fn run(
        &self,
        name: &str,
        args: LaunchArgs,
        options: LaunchOptions,
    ) -> CoreResult<Option<Arc<dyn Application>>> {
        info!("event=run module=kernel status=start package={}", name);
        let pending = self.make_as::<PendingLaunch>(
            PACKAGE_SERVICE,
            &[json!(name), Value::Object(args), Value::Object(options)],
        )?;
        Ok(pending.launch(self).await?)
    }

    /// Launches the first package whose mime patterns accept `file.mime`.
    pub async fn open(&self, file: &VfsFile, options: LaunchOptions) -> CoreResult<OpenOutcome> {
        let packages = self.make_as::<PackageManager>(PACKAGES_SERVICE, &[])?;
        let Some(package) = packages.compatible_packages(&file.mime).into_iter().next() else {
            info!(
                "event=open module=kernel status=no_match mime={}",
                file.mime
            );
            return Ok(OpenOutcome::NoCompatiblePackage);
        };

        let mut args = LaunchArgs::new();
        args.insert("file".to_string(), file.to_value());
        let application = self.run(&package, args, options).await?;
        Ok(OpenOutcome::Launched {
            package,
            application,
        })
    }

    /// Tears the kernel down. Only the first call has any effect.
    ///
    /// # Errors
    /// - `ProviderDestroy` for the first provider whose `destroy` fails;
    ///   providers after it are not destroyed and nothing is cleared.
    pub fn destroy(&self) -> CoreResult<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.events.emit(&CoreEvent::Destroy);
        let applications = self.applications.destroy_all();

        let providers: Vec<Arc<dyn ServiceProvider>> = self
            .providers
            .lock()
            .iter()
            .map(|entry| entry.provider.clone())
            .collect();
        for provider in providers {
            if let Err(source) = provider.destroy() {
                error!(
                    "event=destroy module=kernel status=error provider={} error={}",
                    provider.name(),
                    source
                );
                return Err(CoreError::ProviderDestroy {
                    provider: provider.name().to_string(),
                    source,
                });
            }
        }

        self.providers.lock().clear();
        self.registry.clear_instances();
        info!(
            "event=destroy module=kernel status=ok applications={}",
            applications
        );
        Ok(())
    }
}

struct CoreConnectionListener {
    core: Weak<Core>,
}

impl ConnectionListener for CoreConnectionListener {
    fn on_open(&self, uri: &str) {
        info!("event=connection module=kernel status=open uri={}", uri);
    }

    fn on_close(&self, uri: &str, reason: &str) {
        warn!(
            "event=connection module=kernel status=closed uri={} reason={}",
            uri, reason
        );
        let Some(core) = self.core.upgrade() else {
            return;
        };
        let notice = json!({
            "title": "Connection lost",
            "message": "The server connection was lost...",
        });
        if let Err(err) = core.make(NOTIFICATION_SERVICE, &[notice]) {
            warn!(
                "event=notify module=kernel status=error reason=connection_lost error={}",
                err
            );
        }
    }
}
