//! Aggregated outcome of one reconciliation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::plan::{Operation, OperationKind};
use crate::error::FailureReason;
use crate::record::{Record, RecordKey};

/// Why dispatch stopped scheduling new operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// Credentials were rejected; every later call would fail too
    Authentication,
    /// A failure was seen and `stop_on_first_error` was set
    FirstError,
    /// The caller cancelled
    Cancelled,
    /// The scheduling deadline passed
    DeadlineExceeded,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HaltReason::Authentication => "authentication failed",
            HaltReason::FirstError => "stopped on first error",
            HaltReason::Cancelled => "cancelled",
            HaltReason::DeadlineExceeded => "deadline exceeded",
        })
    }
}

/// A key that could not be brought to its desired state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedKey {
    /// Offending key
    pub key: RecordKey,
    /// Operation attempted; `None` when the key was rejected by validation
    pub operation: Option<OperationKind>,
    /// Structured reason
    pub reason: FailureReason,
}

/// Result of [`Reconciler::reconcile`](super::Reconciler::reconcile)
///
/// `succeeded` and `failed` are in completion order, which varies between
/// runs; compare them as sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResult {
    /// Domain reconciled
    pub domain: String,
    /// Keys whose operation succeeded
    pub succeeded: Vec<RecordKey>,
    /// Keys that failed validation or whose operation failed
    pub failed: Vec<FailedKey>,
    /// Every computed operation, applied or not
    pub planned: Vec<Operation>,
    /// Live records as fetched before planning, in provider order
    #[serde(default)]
    pub live: Vec<Record>,
    /// Planned keys never scheduled because dispatch halted
    pub skipped: Vec<RecordKey>,
    /// Set when dispatch stopped early
    pub halted: Option<HaltReason>,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Start of the reconciliation
    pub started_at: DateTime<Utc>,
    /// End of the reconciliation
    pub finished_at: DateTime<Utc>,
}

impl BulkResult {
    pub(crate) fn new(domain: impl Into<String>, dry_run: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            domain: domain.into(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            planned: Vec::new(),
            live: Vec::new(),
            skipped: Vec::new(),
            halted: None,
            dry_run,
            started_at,
            finished_at: started_at,
        }
    }

    /// True when nothing failed and nothing was skipped
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && self.halted.is_none()
    }

    /// Whether any key failed
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Failed keys without their reasons
    pub fn failed_keys(&self) -> Vec<&RecordKey> {
        self.failed.iter().map(|f| &f.key).collect()
    }

    /// Failure recorded for `key`
    pub fn failure_for(&self, key: &RecordKey) -> Option<&FailedKey> {
        self.failed.iter().find(|f| &f.key == key)
    }

    /// Wall-clock duration
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// One-line description
    pub fn summary(&self) -> String {
        let count = |kind: OperationKind| self.planned.iter().filter(|op| op.kind() == kind).count();
        let mut out = format!(
            "{}{}: {} planned ({} create, {} replace, {} delete), {} succeeded, {} failed, {} skipped",
            if self.dry_run { "[dry run] " } else { "" },
            self.domain,
            self.planned.len(),
            count(OperationKind::Create),
            count(OperationKind::Replace),
            count(OperationKind::Delete),
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len(),
        );
        if let Some(reason) = self.halted {
            out.push_str(&format!(" (halted: {})", reason));
        }
        out
    }
}

impl fmt::Display for BulkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        if self.dry_run {
            for op in &self.planned {
                writeln!(f, "  would {}", op)?;
            }
        }
        for failure in &self.failed {
            match failure.operation {
                Some(kind) => writeln!(f, "  {} {} failed: {}", kind, failure.key, failure.reason)?,
                None => writeln!(f, "  {} rejected: {}", failure.key, failure.reason)?,
            }
        }
        for key in &self.skipped {
            writeln!(f, "  {} skipped", key)?;
        }
        Ok(())
    }
}
