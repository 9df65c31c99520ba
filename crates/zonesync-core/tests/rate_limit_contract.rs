//! Contract Test: Request Rate Bound
//!
//! Constraints verified:
//! - Calls through one profile never exceed the bucket's burst plus its
//!   refill rate in any one-second window, whatever the parallelism
//! - A saturated blocking limiter delays work instead of failing it
//! - A non-blocking limiter fails work with `RateLimitExhausted`

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use zonesync_core::{
    ErrorKind, RateLimitConfig, Reconciler, ReconcileOptions, RecordKey, TransportConfig,
};

#[tokio::test(start_paused = true)]
async fn bulk_creates_respect_the_bucket() {
    let api = FakeApi::new(vec![]);
    let limits = RateLimitConfig {
        capacity: 5,
        refill_per_sec: 5,
        blocking: true,
    };
    let provider = Arc::new(ApiProvider::new(api.clone(), limits, TransportConfig::default()));
    let (reconciler, _events) = Reconciler::new(provider, 64);

    let want = desired((0..20).map(|i| a(&format!("host{:02}", i), "1.2.3.4")).collect());
    let options = ReconcileOptions {
        parallelism: 10,
        ..ReconcileOptions::default()
    };

    let started = Instant::now();
    let result = reconciler.reconcile("example.com", &want, &options).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.succeeded.len(), 20);
    assert!(result.failed.is_empty());

    // 21 calls (list + 20 creates): 5 from the burst, 16 at 5/s
    assert_eq!(api.call_count(), 21);
    assert!(
        elapsed >= Duration::from_secs(3),
        "finished too fast: {:?}",
        elapsed
    );

    let mut times = api.call_times();
    times.sort();
    for (i, start) in times.iter().enumerate() {
        let window_end = *start + Duration::from_secs(1);
        let in_window = times[i..].iter().take_while(|t| **t < window_end).count();
        assert!(
            in_window <= 10,
            "{} calls within one second starting at call {}",
            in_window,
            i
        );
    }
}

#[tokio::test(start_paused = true)]
async fn non_blocking_limiter_fails_fast() {
    let api = FakeApi::new(vec![]);
    let limits = RateLimitConfig {
        capacity: 1,
        refill_per_sec: 1,
        blocking: false,
    };
    let provider = Arc::new(ApiProvider::new(api.clone(), limits, TransportConfig::default()));
    let (reconciler, _events) = Reconciler::new(provider, 64);

    let want = desired(vec![a("www", "1.2.3.4")]);
    let result = reconciler
        .reconcile("example.com", &want, &ReconcileOptions::default())
        .await
        .unwrap();

    // The list call took the only token
    assert_eq!(api.call_count(), 1);
    let failure = result.failure_for(&RecordKey::new("www", "A")).unwrap();
    assert_eq!(failure.reason.kind, ErrorKind::RateLimitExhausted);
}
