//! Completion Delivery Tests
//!
//! Tests for outcome delivery through queued records:
//! - Exactly one observer runs, exactly once, whatever the outcome
//! - Observers never run inside the registering call
//! - Overlapping calls on one record are serialized in call order

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recordflow::adapter::{BoxError, TaskFn};
use recordflow::schema::{AttributeDef, Attrs, SchemaDef};
use recordflow::{Completion, ConstructOptions, Kind, Model, RecordError};
use serde_json::{json, Value};
use tokio::sync::mpsc;

// =============================================================================
// Helper Functions
// =============================================================================

fn attrs(value: Value) -> Attrs {
    value.as_object().cloned().unwrap()
}

/// Validators on `a` and `b` that finish after `a_ms` / `b_ms`
fn racing_kind(a_ms: u64, b_ms: u64) -> Kind {
    let delayed = |ms: u64| {
        TaskFn::future(move |v: Value| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, BoxError>(v.as_i64().is_some_and(|n| n > 0))
        })
    };
    Kind::define(
        "race",
        SchemaDef::new()
            .attribute("a", AttributeDef::new().validator(delayed(a_ms)))
            .attribute("b", AttributeDef::new().validator(delayed(b_ms))),
    )
    .build()
}

/// Registers both observers and counts how many times each fires
async fn observe(completion: &Completion<Attrs>) -> (usize, usize) {
    let values = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (counter, signal) = (Arc::clone(&values), tx.clone());
    completion
        .on_value(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = signal.send(());
        })
        .on_error({
            let counter = Arc::clone(&errors);
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            }
        });

    rx.recv().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    (values.load(Ordering::SeqCst), errors.load(Ordering::SeqCst))
}

// =============================================================================
// At-Most-Once Delivery
// =============================================================================

#[tokio::test]
async fn test_success_reaches_only_value_observer() {
    let kind = racing_kind(10, 1);
    let (model, constructed) = Model::new(&kind, Attrs::new(), ConstructOptions::default());
    constructed.await.unwrap();

    let completion = model.set(attrs(json!({"a": 1, "b": 2})));
    assert_eq!(observe(&completion).await, (1, 0));
}

#[tokio::test]
async fn test_both_failing_keys_report_once() {
    for (a_ms, b_ms) in [(1, 20), (20, 1), (5, 5)] {
        let kind = racing_kind(a_ms, b_ms);
        let (model, constructed) = Model::new(&kind, Attrs::new(), ConstructOptions::default());
        constructed.await.unwrap();

        let completion = model.set(attrs(json!({"a": -1, "b": -2})));
        assert_eq!(observe(&completion).await, (0, 1));
    }
}

#[tokio::test]
async fn test_late_observer_is_not_called_inline() {
    let kind = racing_kind(1, 1);
    let (model, constructed) = Model::new(&kind, Attrs::new(), ConstructOptions::default());
    constructed.await.unwrap();

    let completion = model.set(attrs(json!({"a": 1})));
    let settled = completion.clone();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !settled.is_settled() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    completion.on_value(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_awaiting_after_observer_took_outcome() {
    let kind = racing_kind(1, 1);
    let (model, constructed) = Model::new(&kind, Attrs::new(), ConstructOptions::default());
    constructed.await.unwrap();

    let completion = model.set(attrs(json!({"b": 3})));
    let (tx, mut rx) = mpsc::unbounded_channel();
    completion.on_value(move |committed| {
        let _ = tx.send(committed);
    });

    assert_eq!(rx.recv().await.unwrap()["b"], json!(3));
    assert!(matches!(completion.await, Err(RecordError::AlreadyDelivered)));
}

// =============================================================================
// Single-Flight Queue
// =============================================================================

#[tokio::test]
async fn test_overlapping_sets_are_serialized() {
    let kind = racing_kind(15, 1);
    let (model, _) = Model::new(&kind, attrs(json!({"a": 1})), ConstructOptions::default());

    let first = model.set(attrs(json!({"a": 2})));
    let failing = model.set(attrs(json!({"a": -9})));
    let last = model.set(attrs(json!({"b": 5})));

    assert_eq!(first.await.unwrap()["a"], json!(2));
    assert_eq!(failing.await.unwrap_err().key(), Some("a"));

    let committed = last.await.unwrap();
    assert_eq!(committed["a"], json!(1));
    assert_eq!(committed["b"], json!(5));
    assert_eq!(model.changed_keys().await, vec!["a", "b", "id"]);
}

#[tokio::test]
async fn test_queued_save_sees_preceding_set() {
    let store = recordflow::MemoryStore::new();
    let kind = Kind::define(
        "queued",
        SchemaDef::new().attribute("title", AttributeDef::new().default_value(json!(""))),
    )
    .persistence(store.clone())
    .build();
    let (model, _) = Model::new(&kind, Attrs::new(), ConstructOptions::default());

    let _ = model.set(attrs(json!({"title": "draft"})));
    let saved = model.save().await.unwrap();

    let id = saved["id"].clone();
    assert_eq!(store.get(&id).unwrap()["title"], json!("draft"));
    assert!(!model.is_new().await);
}
