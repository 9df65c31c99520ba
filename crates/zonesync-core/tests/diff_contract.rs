//! Contract Test: Diff Correctness & Pruning
//!
//! Constraints verified:
//! - Only keys whose content differs are touched
//! - Deletion happens only with `prune_extraneous`
//! - Each operation carries the full desired array for its key
//! - At most one operation per key, and never two concurrent calls on a key

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use zonesync_core::{
    plan, Operation, OperationKind, Reconciler, ReconcileOptions, Record, RecordKey, RecordSet,
};

#[test]
fn create_only_what_is_missing() {
    let live = desired(vec![a("www", "1.2.3.4")]);
    let want = desired(vec![a("www", "1.2.3.4"), a("api", "5.6.7.8")]);

    let ops = plan(&want, &live, &ReconcileOptions::default());
    assert_eq!(
        ops,
        vec![Operation::Create {
            key: RecordKey::new("api", "A"),
            records: vec![a("api", "5.6.7.8")],
        }]
    );
}

#[test]
fn prune_only_when_asked() {
    let live = desired(vec![a("www", "1.2.3.4")]);
    let want = RecordSet::new();

    assert!(plan(&want, &live, &ReconcileOptions::default()).is_empty());

    let pruning = ReconcileOptions {
        prune_extraneous: true,
        ..ReconcileOptions::default()
    };
    assert_eq!(
        plan(&want, &live, &pruning),
        vec![Operation::Delete {
            key: RecordKey::new("www", "A")
        }]
    );
}

#[tokio::test]
async fn reconcile_applies_exactly_the_plan() {
    let provider = Arc::new(MockDnsProvider::new(vec![
        a("www", "1.2.3.4"),
        a("old", "9.9.9.9"),
        Record::new("mail", "A", "10.0.0.1", 3600),
    ]));
    let (reconciler, _events) = Reconciler::new(provider.clone(), 64);

    let want = desired(vec![
        a("www", "1.2.3.4"),
        a("api", "5.6.7.8"),
        Record::new("mail", "A", "10.0.0.1", 600),
    ]);
    let options = ReconcileOptions {
        prune_extraneous: true,
        ..ReconcileOptions::default()
    };

    let result = reconciler.reconcile("example.com", &want, &options).await.unwrap();

    let kinds: Vec<(String, OperationKind)> = result
        .planned
        .iter()
        .map(|op| (op.key().name.clone(), op.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("api".to_string(), OperationKind::Create),
            ("mail".to_string(), OperationKind::Replace),
            ("old".to_string(), OperationKind::Delete),
        ]
    );

    let mut touched = provider.mutated_keys();
    touched.sort();
    assert_eq!(
        touched,
        vec![
            RecordKey::new("api", "A"),
            RecordKey::new("mail", "A"),
            RecordKey::new("old", "A"),
        ]
    );
    assert_eq!(provider.zone(), want);
}

#[tokio::test(start_paused = true)]
async fn pool_is_bounded_and_keys_never_overlap() {
    let provider = Arc::new(MockDnsProvider::new(vec![]).with_latency(Duration::from_millis(100)));
    let (reconciler, _events) = Reconciler::new(provider.clone(), 64);

    let want = desired((0..12).map(|i| a(&format!("host{}", i), "1.2.3.4")).collect());
    let options = ReconcileOptions {
        parallelism: 3,
        ..ReconcileOptions::default()
    };

    let result = reconciler.reconcile("example.com", &want, &options).await.unwrap();

    assert_eq!(result.succeeded.len(), 12);
    assert_eq!(provider.mutation_call_count(), 12);
    assert_eq!(provider.max_in_flight(), 3);
    assert_eq!(provider.overlapping_key_count(), 0);
}
