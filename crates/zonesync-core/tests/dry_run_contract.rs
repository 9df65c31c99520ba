//! Contract Test: Dry Run
//!
//! Constraints verified:
//! - A dry run fetches live state exactly once and never mutates
//! - The reported plan equals what a real run would apply

mod common;

use common::*;
use std::sync::Arc;
use zonesync_core::{Reconciler, ReconcileOptions, SyncEvent};

#[tokio::test]
async fn dry_run_plans_without_mutating() {
    let provider = Arc::new(MockDnsProvider::new(vec![
        a("www", "1.2.3.4"),
        a("stale", "9.9.9.9"),
    ]));
    let (reconciler, mut events) = Reconciler::new(provider.clone(), 64);

    let want = desired(vec![a("www", "1.2.3.5"), a("api", "5.6.7.8")]);
    let dry = ReconcileOptions {
        prune_extraneous: true,
        dry_run: true,
        ..ReconcileOptions::default()
    };

    let preview = reconciler.reconcile("example.com", &want, &dry).await.unwrap();

    assert!(preview.dry_run);
    assert_eq!(preview.planned.len(), 3);
    assert!(preview.succeeded.is_empty());
    assert!(preview.failed.is_empty());
    assert!(preview.skipped.is_empty());
    assert_eq!(provider.list_call_count(), 1);
    assert_eq!(provider.mutation_call_count(), 0);

    let mut saw_outcome = false;
    while let Ok(event) = events.try_recv() {
        if matches!(
            event,
            SyncEvent::OperationSucceeded { .. } | SyncEvent::OperationFailed { .. }
        ) {
            saw_outcome = true;
        }
    }
    assert!(!saw_outcome, "dry run reported an applied operation");

    let real = ReconcileOptions {
        dry_run: false,
        ..dry
    };
    let applied = reconciler.reconcile("example.com", &want, &real).await.unwrap();
    assert_eq!(applied.planned, preview.planned);
    assert_eq!(applied.succeeded.len(), 3);
}
