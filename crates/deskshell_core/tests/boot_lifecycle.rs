mod common;

use common::{journal, new_core, record_events, InitBehavior, RecordingProvider, TestApp};
use deskshell_core::{
    ConfigOverrides, ConnectionConfig, Core, CoreError, LoginHandler, LoopbackTransport,
    PageLocation, ProviderError, ProviderOptions, ServiceProvider, ServiceValue, TimeoutConfig,
    NOTIFICATION_SERVICE,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn boot_runs_only_before_providers_in_order_and_soft_fails() {
    let (core, transport) = new_core();
    let log = journal();
    core.register(
        RecordingProvider::new("auth", &log).into_constructor(),
        ProviderOptions::before(),
    );
    core.register(
        RecordingProvider::new("vfs", &log)
            .with_init(InitBehavior::Fail)
            .into_constructor(),
        ProviderOptions::before(),
    );
    core.register(
        RecordingProvider::new("desktop", &log).into_constructor(),
        ProviderOptions::default(),
    );
    core.register(
        RecordingProvider::new("settings", &log).into_constructor(),
        ProviderOptions::before(),
    );

    let report = core.boot().await;

    assert!(report.completed);
    assert_eq!(report.outcomes.len(), 3);
    let failed: Vec<_> = report.failures().map(|o| o.provider.as_str()).collect();
    assert_eq!(failed, vec!["vfs"]);
    assert_eq!(
        log.lock().clone(),
        vec![
            "init auth",
            "init vfs",
            "init settings",
            "start auth",
            "start vfs",
            "start settings",
        ]
    );
    assert!(transport.connected_uris().is_empty());
}

#[tokio::test]
async fn start_runs_remaining_providers_then_connects() {
    let (core, transport) = new_core();
    let log = journal();
    let events = record_events(&core);
    core.register(
        RecordingProvider::new("early", &log).into_constructor(),
        ProviderOptions::before(),
    );
    core.register(
        RecordingProvider::new("late", &log).into_constructor(),
        ProviderOptions::default(),
    );

    core.boot().await;
    let report = core.start().await;

    assert!(report.is_clean());
    assert_eq!(
        log.lock().clone(),
        vec!["init early", "start early", "init late", "start late"]
    );
    assert_eq!(events.lock().clone(), vec!["deskshell/core:start"]);
    assert_eq!(transport.connected_uris(), vec!["ws://localhost:8000/"]);
    assert!(core.is_connected());
}

#[tokio::test]
async fn panicking_init_aborts_phase_and_skips_connection() {
    let (core, transport) = new_core();
    let log = journal();
    core.register(
        RecordingProvider::new("first", &log).into_constructor(),
        ProviderOptions::default(),
    );
    core.register(
        RecordingProvider::new("broken", &log)
            .with_init(InitBehavior::Panic)
            .into_constructor(),
        ProviderOptions::default(),
    );
    core.register(
        RecordingProvider::new("never", &log).into_constructor(),
        ProviderOptions::default(),
    );

    let report = core.start().await;

    assert!(!report.completed);
    assert!(report
        .abort_reason
        .as_deref()
        .is_some_and(|reason| reason.contains("broken")));
    assert_eq!(log.lock().clone(), vec!["init first", "init broken"]);
    assert!(transport.connected_uris().is_empty());
    assert!(core.connection_uri().is_none());
}

#[tokio::test(start_paused = true)]
async fn hung_init_times_out_and_boot_continues() {
    let (core, _) = new_core();
    core.configure(ConfigOverrides {
        timeouts: Some(TimeoutConfig {
            provider_init_ms: 50,
            ..TimeoutConfig::default()
        }),
        ..ConfigOverrides::default()
    });
    let log = journal();
    core.register(
        RecordingProvider::new("stuck", &log)
            .with_init(InitBehavior::Hang)
            .into_constructor(),
        ProviderOptions::before(),
    );
    core.register(
        RecordingProvider::new("next", &log).into_constructor(),
        ProviderOptions::before(),
    );

    let report = core.boot().await;

    assert!(report.completed);
    let stuck = &report.outcomes[0];
    assert!(matches!(
        stuck.result,
        Err(ProviderError::Timeout { after_ms: 50, .. })
    ));
    assert!(report.outcomes[1].result.is_ok());
    assert_eq!(
        log.lock().clone(),
        vec!["init stuck", "init next", "start stuck", "start next"]
    );
}

#[test]
fn failing_constructor_is_omitted_silently() {
    let (core, _) = new_core();
    let log = journal();
    core.register(
        |_core: &Core, _args: Option<&Value>| -> Result<Arc<dyn ServiceProvider>, ProviderError> {
            Err(ProviderError::failed("missing dependency"))
        },
        ProviderOptions::default(),
    );
    core.register(
        RecordingProvider::new("ok", &log).into_constructor(),
        ProviderOptions::default(),
    );

    assert_eq!(core.provider_names(), vec!["ok"]);
}

#[test]
fn constructor_receives_option_args() {
    let (core, _) = new_core();
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let log = journal();
    let provider = RecordingProvider::new("themed", &log);
    core.register(
        move |core: &Core, args: Option<&Value>| {
            *sink.lock() = args.cloned();
            (provider.into_constructor())(core, args)
        },
        ProviderOptions::default().with_args(json!({ "theme": "dark" })),
    );

    assert_eq!(seen.lock().clone(), Some(json!({ "theme": "dark" })));
}

#[tokio::test]
async fn destroy_is_idempotent_and_keeps_registry_entries() {
    let (core, _) = new_core();
    let log = journal();
    let events = record_events(&core);
    core.register(
        RecordingProvider::new("a", &log).into_constructor(),
        ProviderOptions::before(),
    );
    core.register(
        RecordingProvider::new("b", &log).into_constructor(),
        ProviderOptions::before(),
    );
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    core.singleton("clock", move |_core, _args| {
        counter.fetch_add(1, Ordering::SeqCst);
        let value: ServiceValue = Arc::new(0_u64);
        Ok(value)
    });
    core.boot().await;
    core.make("clock", &[]).expect("clock");

    let destroyed = Arc::new(AtomicUsize::new(0));
    core.applications()
        .insert(TestApp::tracked("editor", &destroyed));

    core.destroy().expect("first destroy");
    core.destroy().expect("second destroy is a no-op");

    assert!(core.is_destroyed());
    assert!(core.provider_names().is_empty());
    assert_eq!(core.registry().cached_instances(), 0);
    assert!(core.registry().contains("clock"));
    assert!(core.applications().is_empty());
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(events.lock().clone(), vec!["deskshell/core:destroy"]);
    let destroys: Vec<_> = log
        .lock()
        .iter()
        .filter(|entry| entry.starts_with("destroy"))
        .cloned()
        .collect();
    assert_eq!(destroys, vec!["destroy a", "destroy b"]);

    core.make("clock", &[]).expect("clock after destroy");
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn failing_provider_destroy_aborts_remaining_cleanup() {
    let (core, _) = new_core();
    let log = journal();
    core.register(
        RecordingProvider::new("stubborn", &log)
            .failing_destroy()
            .into_constructor(),
        ProviderOptions::default(),
    );
    core.register(
        RecordingProvider::new("after", &log).into_constructor(),
        ProviderOptions::default(),
    );

    let err = core.destroy().expect_err("destroy must fail");
    assert!(matches!(err, CoreError::ProviderDestroy { ref provider, .. } if provider == "stubborn"));
    assert_eq!(log.lock().clone(), vec!["destroy stubborn"]);
    assert_eq!(core.provider_names().len(), 2);

    core.destroy().expect("later destroy is a no-op");
    assert_eq!(log.lock().len(), 1);
}

#[tokio::test]
async fn boot_after_destroy_aborts() {
    let (core, _) = new_core();
    let log = journal();
    core.register(
        RecordingProvider::new("late", &log).into_constructor(),
        ProviderOptions::before(),
    );
    core.destroy().expect("destroy");

    let report = core.boot().await;
    assert!(!report.completed);
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn start_after_destroy_opens_no_connection() {
    let (core, transport) = new_core();
    core.destroy().expect("destroy");

    let report = core.start().await;

    assert!(!report.completed);
    assert_eq!(report.abort_reason.as_deref(), Some("kernel already destroyed"));
    assert!(transport.connected_uris().is_empty());
    assert!(!core.is_connected());
}

#[tokio::test]
async fn lost_connection_raises_notification() {
    let (core, transport) = new_core();
    let notices = Arc::new(Mutex::new(Vec::<Value>::new()));
    let sink = notices.clone();
    core.instance(NOTIFICATION_SERVICE, move |_core, args| {
        sink.lock().extend(args.iter().cloned());
        let value: ServiceValue = Arc::new(());
        Ok(value)
    });

    core.start().await;
    assert_eq!(transport.sever_all("server restart"), 1);

    let notices = notices.lock().clone();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["title"], json!("Connection lost"));
    assert!(!core.is_connected());
    assert_eq!(core.connection_uri().as_deref(), Some("ws://localhost:8000/"));
}

#[tokio::test]
async fn lost_connection_without_notification_service_is_tolerated() {
    let (core, transport) = new_core();
    core.start().await;
    assert_eq!(transport.sever_all("gone"), 1);
    assert!(!core.is_connected());
}

#[tokio::test]
async fn refused_connection_leaves_kernel_disconnected() {
    let transport = Arc::new(LoopbackTransport::refusing("offline"));
    let core = Core::new(PageLocation::localhost(), transport.clone());

    let report = core.start().await;

    assert!(report.completed);
    assert!(!core.is_connected());
    assert!(core.connection_uri().is_none());
}

#[tokio::test]
async fn configured_ws_block_drives_connection_uri() {
    let transport = Arc::new(LoopbackTransport::new());
    let location = PageLocation::new("https", "desk.example", Some(8443)).with_path("/shell");
    let core = Core::new(location, transport.clone());
    assert_eq!(core.configuration().ws.uri(), "wss://desk.example:8443/shell");

    core.configure(ConfigOverrides {
        ws: Some(ConnectionConfig {
            protocol: "ws".to_string(),
            hostname: "relay.internal".to_string(),
            port: Some(9000),
            path: "/socket".to_string(),
        }),
        ..ConfigOverrides::default()
    });
    core.start().await;

    assert_eq!(
        transport.connected_uris(),
        vec!["ws://relay.internal:9000/socket"]
    );
}

struct RecordingLogin {
    inits: Arc<AtomicUsize>,
    options: Value,
}

impl LoginHandler for RecordingLogin {
    fn init(&self) {
        assert_eq!(self.options["remember"], json!(true));
        self.inits.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn login_constructs_and_initializes_handler() {
    let (core, _) = new_core();
    let inits = Arc::new(AtomicUsize::new(0));
    let counter = inits.clone();

    core.login(
        move |_core, options| RecordingLogin {
            inits: counter,
            options,
        },
        json!({ "remember": true }),
    );

    assert_eq!(inits.load(Ordering::SeqCst), 1);
}
