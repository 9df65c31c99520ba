//! Bulk reconciliation engine
//!
//! The Reconciler makes a domain's live record sets match a desired state:
//!
//! ```text
//!  desired ──► validate ──► fetch live ──► plan ──► dispatch ──► BulkResult
//!                 │                          │          │
//!                 ▼                          ▼          ▼
//!           failed up front          dry run stops   worker pool
//!           (or strict abort)        here            (parallelism)
//! ```
//!
//! ## Dispatch
//!
//! A fixed pool of `parallelism` workers pulls operations from a shared
//! cursor over the (read-only) plan and sends outcomes back on a channel.
//! Each operation is taken by exactly one worker, and the plan holds at
//! most one operation per key, so no key ever sees two concurrent calls.
//!
//! One operation's failure never affects its siblings. Scheduling of new
//! operations stops (in-flight ones finish) when:
//!
//! - an authentication failure is seen
//! - any failure is seen and `stop_on_first_error` is set
//! - the caller's cancellation token fires
//! - `deadline_secs` has passed
//!
//! Operations never started are reported as skipped. An operation whose
//! worker panicked mid-call is reported as failed, since the change may
//! already have reached the provider.
//!
//! ## Backups
//!
//! With `backup_path` set, a non-dry run writes a [`ZoneSnapshot`] of the
//! fetched live state before the first mutation. A failed write aborts the
//! run with nothing applied.

pub mod plan;
pub mod result;
pub mod snapshot;

pub use plan::{plan, Operation, OperationKind};
pub use result::{BulkResult, FailedKey, HaltReason};
pub use snapshot::ZoneSnapshot;

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ReconcileOptions;
use crate::error::{Error, FailureReason, Result};
use crate::record::{DesiredState, RecordKey, RecordSet};
use crate::traits::DnsProvider;
use crate::validator;

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Progress events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Reconciliation started
    Started {
        domain: String,
        desired_keys: usize,
    },

    /// Live state fetched
    LiveStateFetched {
        domain: String,
        live_keys: usize,
    },

    /// Live state written to the backup path
    BackupWritten {
        path: PathBuf,
        records: usize,
    },

    /// Plan computed
    Planned {
        creates: usize,
        replaces: usize,
        deletes: usize,
        invalid: usize,
    },

    /// An operation succeeded
    OperationSucceeded {
        key: RecordKey,
        kind: OperationKind,
    },

    /// An operation failed
    OperationFailed {
        key: RecordKey,
        kind: OperationKind,
        reason: FailureReason,
    },

    /// Dispatch stopped scheduling new operations
    Halted {
        reason: HaltReason,
    },

    /// Reconciliation finished
    Finished {
        succeeded: usize,
        failed: usize,
        skipped: usize,
    },
}

/// Bulk synchronization engine
///
/// Holds no state between calls; one Reconciler can serve many
/// reconciliations, sequentially or concurrently.
pub struct Reconciler {
    provider: Arc<dyn DnsProvider>,
    event_tx: mpsc::Sender<SyncEvent>,
}

impl Reconciler {
    /// Create a reconciler
    ///
    /// Returns the reconciler and the receiving end of its event channel.
    /// When the channel is full, new events are dropped with a warning.
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        event_capacity: usize,
    ) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (tx, rx) = mpsc::channel(event_capacity.max(1));
        (
            Self {
                provider,
                event_tx: tx,
            },
            rx,
        )
    }

    /// Reconcile `domain` towards `desired`
    pub async fn reconcile(
        &self,
        domain: &str,
        desired: &DesiredState,
        options: &ReconcileOptions,
    ) -> Result<BulkResult> {
        self.reconcile_with_cancel(domain, desired, options, CancellationToken::new())
            .await
    }

    /// Reconcile with a caller-supplied cancellation signal
    ///
    /// Once `cancel` fires no new operation is scheduled; operations already
    /// in flight run to completion before this returns.
    ///
    /// # Errors
    ///
    /// - `InvalidDesiredState` in strict mode when validation fails
    ///   (before any network call)
    /// - whatever the live-state fetch failed with; nothing is applied
    ///   without a live baseline
    /// - `Cancelled` when `cancel` fired before the live state was fetched
    pub async fn reconcile_with_cancel(
        &self,
        domain: &str,
        desired: &DesiredState,
        options: &ReconcileOptions,
        cancel: CancellationToken,
    ) -> Result<BulkResult> {
        options.validate()?;
        let started = Instant::now();
        let mut result = BulkResult::new(domain, options.dry_run, chrono::Utc::now());

        info!(
            "Reconciling {} ({} desired record set(s), provider {})",
            domain,
            desired.len(),
            self.provider.provider_name()
        );
        self.emit_event(SyncEvent::Started {
            domain: domain.to_string(),
            desired_keys: desired.len(),
        });

        // 1. Validate
        for record in desired.records() {
            for warning in validator::warnings(record) {
                warn!("{}: {}", record.key(), warning.message);
            }
        }
        let invalid = validator::validate_set(desired).err().unwrap_or_default();
        if !invalid.is_empty() {
            for entry in &invalid {
                warn!("Invalid record set {}: {}", entry.key, entry.error);
            }
            if options.strict {
                error!(
                    "Rejecting desired state for {}: {} invalid record set(s)",
                    domain,
                    invalid.len()
                );
                return Err(Error::InvalidDesiredState { failures: invalid });
            }
        }
        let excluded: BTreeSet<RecordKey> = invalid.iter().map(|e| e.key.clone()).collect();
        let mut valid = RecordSet::new();
        for (key, records) in desired.iter() {
            if !excluded.contains(key) {
                valid.insert(key.clone(), records.to_vec());
            }
        }
        result.failed.extend(invalid.iter().map(|entry| FailedKey {
            key: entry.key.clone(),
            operation: None,
            reason: FailureReason::from(&entry.error),
        }));

        // 2. Fetch live state
        if cancel.is_cancelled() {
            return Err(Error::Cancelled(format!(
                "reconciliation of {} cancelled before live state fetch",
                domain
            )));
        }
        let fetched = match self.provider.list_records(domain).await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to fetch live records for {}: {}", domain, e);
                return Err(e);
            }
        };
        let live = RecordSet::from_records(fetched.iter().cloned());
        debug!("Fetched {} live record set(s) for {}", live.len(), domain);
        self.emit_event(SyncEvent::LiveStateFetched {
            domain: domain.to_string(),
            live_keys: live.len(),
        });
        result.live = fetched;

        // 3. Plan
        let ops = plan::diff(&valid, &live, options.prune_extraneous, &excluded);
        let count = |kind: OperationKind| ops.iter().filter(|op| op.kind() == kind).count();
        self.emit_event(SyncEvent::Planned {
            creates: count(OperationKind::Create),
            replaces: count(OperationKind::Replace),
            deletes: count(OperationKind::Delete),
            invalid: excluded.len(),
        });
        info!(
            "Planned {} operation(s) for {} ({} create, {} replace, {} delete)",
            ops.len(),
            domain,
            count(OperationKind::Create),
            count(OperationKind::Replace),
            count(OperationKind::Delete)
        );
        result.planned = ops;

        // 4. Back up
        if !options.dry_run
            && let Some(path) = &options.backup_path
        {
            let snapshot = ZoneSnapshot::new(domain, result.live.clone());
            if let Err(e) = snapshot.write(path).await {
                error!("Not applying changes to {}: backup failed: {}", domain, e);
                return Err(e);
            }
            info!(
                "Backed up {} live record(s) of {} to {}",
                snapshot.records.len(),
                domain,
                path.display()
            );
            self.emit_event(SyncEvent::BackupWritten {
                path: path.clone(),
                records: snapshot.records.len(),
            });
        }

        // 5. Dispatch
        if options.dry_run {
            for op in &result.planned {
                info!("[dry run] would {}", op);
            }
        } else if !result.planned.is_empty() {
            self.dispatch(domain, options, cancel, started, &mut result)
                .await;
        }

        result.finished_at = chrono::Utc::now();
        self.emit_event(SyncEvent::Finished {
            succeeded: result.succeeded.len(),
            failed: result.failed.len(),
            skipped: result.skipped.len(),
        });
        info!("{}", result.summary());

        Ok(result)
    }

    /// Fetch the live zone of `domain` without planning or applying anything
    pub async fn export(&self, domain: &str) -> Result<ZoneSnapshot> {
        let records = self.provider.list_records(domain).await?;
        info!("Exported {} live record(s) of {}", records.len(), domain);
        Ok(ZoneSnapshot::new(domain, records))
    }

    async fn dispatch(
        &self,
        domain: &str,
        options: &ReconcileOptions,
        cancel: CancellationToken,
        started: Instant,
        result: &mut BulkResult,
    ) {
        let ops: Arc<Vec<Operation>> = Arc::new(result.planned.clone());
        let cursor = Arc::new(AtomicUsize::new(0));
        let halt: Arc<OnceLock<HaltReason>> = Arc::new(OnceLock::new());
        let deadline = options.deadline().map(|d| started + d);
        let (tx, mut rx) = mpsc::unbounded_channel::<Progress>();

        let workers = options.parallelism.min(ops.len());
        debug!("Dispatching {} operation(s) on {} worker(s)", ops.len(), workers);

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let worker = Worker {
                id: worker,
                provider: Arc::clone(&self.provider),
                domain: domain.to_string(),
                ops: Arc::clone(&ops),
                cursor: Arc::clone(&cursor),
                halt: Arc::clone(&halt),
                cancel: cancel.clone(),
                deadline,
                stop_on_first_error: options.stop_on_first_error,
                results: tx.clone(),
            };
            pool.spawn(worker.run());
        }
        drop(tx);

        let mut started: HashSet<usize> = HashSet::with_capacity(ops.len());
        let mut done: HashSet<usize> = HashSet::with_capacity(ops.len());
        while let Some(progress) = rx.recv().await {
            let (index, outcome) = match progress {
                Progress::Started(index) => {
                    started.insert(index);
                    continue;
                }
                Progress::Finished(index, outcome) => (index, outcome),
            };
            done.insert(index);
            let op = &ops[index];
            let key = op.key().clone();
            match outcome {
                Ok(()) => {
                    info!("{} {} succeeded", op.kind(), key);
                    self.emit_event(SyncEvent::OperationSucceeded {
                        key: key.clone(),
                        kind: op.kind(),
                    });
                    result.succeeded.push(key);
                }
                Err(e) => {
                    warn!("{} {} failed: {}", op.kind(), key, e);
                    let reason = FailureReason::from(&e);
                    self.emit_event(SyncEvent::OperationFailed {
                        key: key.clone(),
                        kind: op.kind(),
                        reason: reason.clone(),
                    });
                    result.failed.push(FailedKey {
                        key,
                        operation: Some(op.kind()),
                        reason,
                    });
                }
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!("Reconciler worker panicked: {}", e);
            }
        }

        // Started but never finished: the worker died mid-call
        let mut abandoned: Vec<usize> = started.difference(&done).copied().collect();
        abandoned.sort_unstable();
        for index in abandoned {
            let op = &ops[index];
            let key = op.key().clone();
            let reason = FailureReason::from(&Error::Other(format!(
                "worker panicked while applying {}",
                op.kind()
            )));
            error!("{} {} outcome unknown: {}", op.kind(), key, reason);
            self.emit_event(SyncEvent::OperationFailed {
                key: key.clone(),
                kind: op.kind(),
                reason: reason.clone(),
            });
            result.failed.push(FailedKey {
                key,
                operation: Some(op.kind()),
                reason,
            });
            done.insert(index);
        }

        result.skipped = ops
            .iter()
            .enumerate()
            .filter(|(i, _)| !done.contains(i))
            .map(|(_, op)| op.key().clone())
            .collect();

        if let Some(reason) = halt.get().copied() {
            warn!(
                "Dispatch for {} halted ({}), {} operation(s) skipped",
                domain,
                reason,
                result.skipped.len()
            );
            result.halted = Some(reason);
            self.emit_event(SyncEvent::Halted { reason });
        }
    }

    /// Emit a reconciler event
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing the event channel capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// One member of the dispatch pool
struct Worker {
    id: usize,
    provider: Arc<dyn DnsProvider>,
    domain: String,
    ops: Arc<Vec<Operation>>,
    cursor: Arc<AtomicUsize>,
    halt: Arc<OnceLock<HaltReason>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    stop_on_first_error: bool,
    results: mpsc::UnboundedSender<Progress>,
}

/// Worker to dispatcher messages
enum Progress {
    /// The operation is about to reach the provider
    Started(usize),
    /// The operation's outcome
    Finished(usize, Result<()>),
}

impl Worker {
    async fn run(self) {
        loop {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(op) = self.ops.get(index) else {
                break;
            };

            // A claimed but unstarted operation is reported as skipped
            if self.halt.get().is_some() {
                break;
            }
            if self.cancel.is_cancelled() {
                let _ = self.halt.set(HaltReason::Cancelled);
                break;
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                let _ = self.halt.set(HaltReason::DeadlineExceeded);
                break;
            }

            debug!("worker {} applying {}", self.id, op);
            if self.results.send(Progress::Started(index)).is_err() {
                break;
            }
            let outcome = apply(self.provider.as_ref(), &self.domain, op).await;

            if let Err(e) = &outcome {
                if e.is_fatal() {
                    let _ = self.halt.set(HaltReason::Authentication);
                } else if self.stop_on_first_error {
                    let _ = self.halt.set(HaltReason::FirstError);
                }
            }

            if self.results.send(Progress::Finished(index, outcome)).is_err() {
                break;
            }
        }
    }
}

async fn apply(provider: &dyn DnsProvider, domain: &str, op: &Operation) -> Result<()> {
    match op {
        Operation::Create { key, records } => provider.create_record_set(domain, key, records).await,
        Operation::Replace { key, records } => {
            provider.replace_record_set(domain, key, records).await
        }
        Operation::Delete { key } => provider.delete_record_set(domain, key).await,
    }
}
