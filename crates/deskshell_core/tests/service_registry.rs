mod common;

use common::new_core;
use deskshell_core::{Core, CoreError, CoreResult, ServiceValue};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn counting_factory(
    calls: &Arc<AtomicUsize>,
) -> impl Fn(&Core, &[Value]) -> CoreResult<ServiceValue> + Send + Sync + 'static {
    let calls = calls.clone();
    move |_core, args| {
        calls.fetch_add(1, Ordering::SeqCst);
        let first = args.first().cloned().unwrap_or(Value::Null);
        let value: ServiceValue = Arc::new(first);
        Ok(value)
    }
}

#[test]
fn singleton_is_built_once_and_ignores_later_args() {
    let (core, _) = new_core();
    let calls = Arc::new(AtomicUsize::new(0));
    core.singleton("settings", counting_factory(&calls));

    let first = core
        .make_as::<Value>("settings", &[json!("initial")])
        .expect("first make");
    let second = core
        .make_as::<Value>("settings", &[json!("ignored")])
        .expect("second make");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(*second, json!("initial"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(core.registry().cached_instances(), 1);
}

#[test]
fn instance_factory_runs_on_every_make() {
    let (core, _) = new_core();
    let calls = Arc::new(AtomicUsize::new(0));
    core.instance("dialog", counting_factory(&calls));

    let a = core.make_as::<Value>("dialog", &[json!(1)]).expect("make a");
    let b = core.make_as::<Value>("dialog", &[json!(2)]).expect("make b");

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!((*a).clone(), json!(1));
    assert_eq!((*b).clone(), json!(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(core.registry().cached_instances(), 0);
}

#[test]
fn unknown_service_is_not_found() {
    let (core, _) = new_core();
    let err = core.make("missing", &[]).err().expect("missing service");
    assert!(matches!(err, CoreError::ServiceNotFound(ref name) if name == "missing"));
    assert_eq!(err.to_string(), "provider 'missing' not found");
}

#[test]
fn first_registration_shadows_later_duplicates() {
    let (core, _) = new_core();
    core.instance("theme", |_core, _args| {
        let value: ServiceValue = Arc::new("light");
        Ok(value)
    });
    core.instance("theme", |_core, _args| {
        let value: ServiceValue = Arc::new("dark");
        Ok(value)
    });

    let theme = core.make_as::<&'static str>("theme", &[]).expect("theme");
    assert_eq!(*theme, "light");
    assert_eq!(core.registry().len(), 2);
}

#[test]
fn downcast_to_wrong_type_is_reported() {
    let (core, _) = new_core();
    core.instance("count", |_core, _args| {
        let value: ServiceValue = Arc::new(42_u32);
        Ok(value)
    });

    let err = core.make_as::<String>("count", &[]).err().expect("mismatch");
    assert!(matches!(err, CoreError::ServiceTypeMismatch { .. }));
}

#[test]
fn failed_singleton_is_retried_on_next_make() {
    let (core, _) = new_core();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    core.singleton("flaky", move |_core, _args| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(CoreError::service("flaky", "not ready"));
        }
        let value: ServiceValue = Arc::new(7_i64);
        Ok(value)
    });

    assert!(core.make("flaky", &[]).is_err());
    assert_eq!(*core.make_as::<i64>("flaky", &[]).expect("second try"), 7);
    assert_eq!(*core.make_as::<i64>("flaky", &[]).expect("cached"), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn factories_may_resolve_other_services() {
    let (core, _) = new_core();
    core.singleton("base", |_core, _args| {
        let value: ServiceValue = Arc::new(10_i64);
        Ok(value)
    });
    core.singleton("derived", |core, _args| {
        let base = core.make_as::<i64>("base", &[])?;
        let value: ServiceValue = Arc::new(*base * 2);
        Ok(value)
    });

    assert_eq!(*core.make_as::<i64>("derived", &[]).expect("derived"), 20);
}

#[test]
fn racing_makes_build_singleton_once() {
    let (core, _) = new_core();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    core.singleton("slow", move |_core, _args| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        let value: ServiceValue = Arc::new(());
        Ok(value)
    });

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| core.make("slow", &[]).expect("make under race"));
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
