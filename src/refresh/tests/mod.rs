//! Scheduler and cycle tests against in-memory sources.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use crate::{
    dispatch::Dispatcher,
    refresh::{RefreshError, RefreshScheduler, refresh_from},
    settings::RefreshSettings,
    snapshot_store::{Op, RefreshEngine},
    sources::{MemorySource, Source, SourceError},
};

fn manual() -> RefreshSettings {
    RefreshSettings {
        interval_ms: 0,
        watch: false,
        ..RefreshSettings::default()
    }
}

fn text(value: &str) -> String {
    value.to_string()
}

struct FlakySource {
    inner: MemorySource,
    failing: AtomicBool,
}

impl Source for FlakySource {
    type Value = String;

    fn name(&self) -> &str {
        "flaky"
    }

    fn read(&self) -> Result<HashMap<String, String>, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Parse {
                location: "flaky".to_string(),
                details: "unavailable".to_string(),
            });
        }
        self.inner.read()
    }
}

struct PanickingSource {
    inner: MemorySource,
    panic_next: AtomicBool,
}

impl Source for PanickingSource {
    type Value = String;

    fn name(&self) -> &str {
        "panicking"
    }

    fn read(&self) -> Result<HashMap<String, String>, SourceError> {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("source blew up");
        }
        self.inner.read()
    }
}

#[test]
fn failed_read_leaves_store_untouched() {
    let source = FlakySource {
        inner: MemorySource::new("memory"),
        failing: AtomicBool::new(false),
    };
    source.inner.set("a", text("1"));

    let mut engine = RefreshEngine::new();
    let view = engine.reader().unwrap();
    refresh_from(&mut engine, &source).unwrap();

    source.inner.set("a", text("2"));
    source.failing.store(true, Ordering::SeqCst);

    assert!(matches!(
        refresh_from(&mut engine, &source),
        Err(RefreshError::Source(_))
    ));
    assert_eq!(view.get("a"), Some(text("1")));
    assert_eq!(engine.snapshot().generation(), 1);
    assert_eq!(engine.staging_mut().unwrap().get("a"), Some(&text("1")));

    source.failing.store(false, Ordering::SeqCst);
    let changes = refresh_from(&mut engine, &source).unwrap();
    assert_eq!(changes.ops(), &[Op::update("a", text("2"))]);
}

#[tokio::test]
async fn startup_cycle_publishes_and_dispatches() {
    let source = Arc::new(MemorySource::new("memory"));
    source.set("server.port", text("8080"));
    let dispatcher = Dispatcher::new();
    let mut all = dispatcher.subscribe("*").await.unwrap();

    let handle = RefreshScheduler::new(RefreshEngine::new(), Arc::clone(&source), dispatcher)
        .with_settings(manual())
        .spawn()
        .unwrap();

    let notification = all.recv().await.unwrap();
    assert_eq!(notification.generation, 1);
    assert_eq!(notification.op, Op::update("server.port", text("8080")));
    assert_eq!(handle.reader().unwrap().get("server.port"), Some(text("8080")));

    handle.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn refresh_now_returns_published_changes() {
    let source = Arc::new(MemorySource::new("memory"));
    source.set("a", text("1"));
    source.set("b", text("2"));

    let dispatcher = Dispatcher::new();
    let mut changes_b = dispatcher.subscribe("b").await.unwrap();

    let handle = RefreshScheduler::new(RefreshEngine::new(), Arc::clone(&source), dispatcher)
        .with_settings(manual())
        .spawn()
        .unwrap();
    let view = handle.reader().unwrap();

    let startup = changes_b.recv().await.unwrap();
    assert_eq!(startup.generation, 1);
    assert_eq!(startup.op, Op::update("b", text("2")));
    assert!(handle.refresh_now().await.unwrap().is_empty());

    source.remove("a");
    source.set("c", text("3"));
    let changes = handle.refresh_now().await.unwrap();

    assert_eq!(
        changes.ops(),
        &[Op::delete("a", text("1")), Op::update("c", text("3"))]
    );
    assert_eq!(view.get("a"), None);
    assert_eq!(view.get("c"), Some(text("3")));

    let unchanged = handle.refresh_now().await.unwrap();
    assert!(unchanged.is_empty());
    assert!(changes_b.try_recv().is_err());

    handle.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn failed_cycle_is_reported_and_scheduler_keeps_running() {
    let source = Arc::new(FlakySource {
        inner: MemorySource::new("memory"),
        failing: AtomicBool::new(false),
    });
    source.inner.set("a", text("1"));

    let handle = RefreshScheduler::new(RefreshEngine::new(), Arc::clone(&source), Dispatcher::new())
        .with_settings(manual())
        .spawn()
        .unwrap();
    let view = handle.reader().unwrap();
    handle.refresh_now().await.unwrap();

    source.failing.store(true, Ordering::SeqCst);
    assert!(matches!(
        handle.refresh_now().await,
        Err(RefreshError::Source(_))
    ));
    assert_eq!(view.get("a"), Some(text("1")));

    source.failing.store(false, Ordering::SeqCst);
    source.inner.set("a", text("2"));
    let changes = handle.refresh_now().await.unwrap();
    assert_eq!(changes.ops(), &[Op::update("a", text("2"))]);

    handle.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn panicking_cycle_keeps_scheduler_running() {
    let source = Arc::new(PanickingSource {
        inner: MemorySource::new("memory"),
        panic_next: AtomicBool::new(false),
    });
    source.inner.set("a", text("1"));

    let handle = RefreshScheduler::new(RefreshEngine::new(), Arc::clone(&source), Dispatcher::new())
        .with_settings(manual())
        .spawn()
        .unwrap();
    let view = handle.reader().unwrap();
    handle.refresh_now().await.unwrap();

    source.inner.set("a", text("2"));
    source.panic_next.store(true, Ordering::SeqCst);
    match handle.refresh_now().await {
        Err(RefreshError::CyclePanicked { details }) => assert_eq!(details, "source blew up"),
        other => panic!("expected a panicked cycle, got {other:?}"),
    }
    assert_eq!(view.get("a"), Some(text("1")));

    let changes = handle.refresh_now().await.unwrap();
    assert_eq!(changes.ops(), &[Op::update("a", text("2"))]);
    assert_eq!(view.get("a"), Some(text("2")));

    handle.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn interval_triggers_cycles() {
    let source = Arc::new(MemorySource::new("memory"));
    let dispatcher = Dispatcher::new();
    let mut key = dispatcher.subscribe("key").await.unwrap();

    let settings = RefreshSettings {
        interval_ms: 20,
        watch: false,
        ..RefreshSettings::default()
    };
    let handle = RefreshScheduler::new(RefreshEngine::new(), Arc::clone(&source), dispatcher)
        .with_settings(settings)
        .spawn()
        .unwrap();

    source.set("key", text("value"));
    let notification = tokio::time::timeout(Duration::from_secs(5), key.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(notification.op, Op::update("key", text("value")));
    handle.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn dropped_handle_stops_scheduler() {
    let source = Arc::new(MemorySource::<u32>::new("memory"));
    let handle = RefreshScheduler::new(RefreshEngine::new(), source, Dispatcher::new())
        .with_settings(manual())
        .spawn()
        .unwrap();
    let readers = handle.readers();

    drop(handle);

    let view = readers.register().unwrap();
    assert!(view.is_empty());
}
