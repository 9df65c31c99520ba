//! Diffing desired against live state
//!
//! The diff yields at most one [`Operation`] per key, so no two operations
//! of one reconciliation ever touch the same record set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::ReconcileOptions;
use crate::record::{same_content, DesiredState, LiveState, Record, RecordKey};

/// One provider call that moves a key towards its desired content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Key is desired but absent live
    Create {
        /// Target key
        key: RecordKey,
        /// Full desired array
        records: Vec<Record>,
    },
    /// Key exists live with different content
    Replace {
        /// Target key
        key: RecordKey,
        /// Full desired array
        records: Vec<Record>,
    },
    /// Key exists live but is not desired (pruning only)
    Delete {
        /// Target key
        key: RecordKey,
    },
}

/// Kind of an [`Operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Create
    Create,
    /// Replace
    Replace,
    /// Delete
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Create => "create",
            OperationKind::Replace => "replace",
            OperationKind::Delete => "delete",
        })
    }
}

impl Operation {
    /// Key the operation targets
    pub fn key(&self) -> &RecordKey {
        match self {
            Operation::Create { key, .. }
            | Operation::Replace { key, .. }
            | Operation::Delete { key } => key,
        }
    }

    /// Operation kind
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create { .. } => OperationKind::Create,
            Operation::Replace { .. } => OperationKind::Replace,
            Operation::Delete { .. } => OperationKind::Delete,
        }
    }

    /// Records sent with the operation (none for deletes)
    pub fn records(&self) -> Option<&[Record]> {
        match self {
            Operation::Create { records, .. } | Operation::Replace { records, .. } => {
                Some(records)
            }
            Operation::Delete { .. } => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.records() {
            Some(records) => {
                let data: Vec<&str> = records.iter().map(|r| r.data.as_str()).collect();
                write!(f, "{} {} [{}]", self.kind(), self.key(), data.join(", "))
            }
            None => write!(f, "{} {}", self.kind(), self.key()),
        }
    }
}

/// Compute the operations that make `live` match `desired`
///
/// Pure; operations come out in key order. `desired` is taken as-is, so
/// callers should drop invalid keys first (the reconciler does).
pub fn plan(desired: &DesiredState, live: &LiveState, options: &ReconcileOptions) -> Vec<Operation> {
    diff(desired, live, options.prune_extraneous, &BTreeSet::new())
}

/// [`plan`] with a set of keys that must never be deleted
pub(crate) fn diff(
    desired: &DesiredState,
    live: &LiveState,
    prune: bool,
    protected: &BTreeSet<RecordKey>,
) -> Vec<Operation> {
    let mut ops = Vec::new();

    for (key, records) in desired.iter() {
        match live.get(key) {
            None => ops.push(Operation::Create {
                key: key.clone(),
                records: records.to_vec(),
            }),
            Some(current) if !same_content(records, current) => ops.push(Operation::Replace {
                key: key.clone(),
                records: records.to_vec(),
            }),
            Some(_) => {}
        }
    }

    if prune {
        for key in live.keys() {
            if desired.contains_key(key) || protected.contains(key) {
                continue;
            }
            // Never delete what this crate cannot manage (SOA, PTR, ...)
            if !key.record_type.is_supported() {
                continue;
            }
            ops.push(Operation::Delete { key: key.clone() });
        }
    }

    ops.sort_by(|a, b| a.key().cmp(b.key()));
    ops
}
