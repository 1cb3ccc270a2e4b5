//! Transition history tracking.
//!
//! Every committed transition is recorded so a driver can inspect the exact
//! sequence of states a machine passed through. The history is bounded: once
//! the limit is reached the oldest records are dropped.

use crate::machine::MachineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of records kept when no explicit limit is configured.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Record of a single committed transition.
///
/// # Example
///
/// ```rust
/// use stackwise::core::TransitionRecord;
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     from: "UNINITIALIZED".to_string(),
///     to: "Start".to_string(),
///     step: 0,
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.to, "Start");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Key of the state being left
    pub from: String,
    /// Key of the state being entered
    pub to: String,
    /// Number of invocations the machine had performed when this was committed
    pub step: u64,
    /// When the transition was committed
    pub timestamp: DateTime<Utc>,
}

/// Bounded, ordered history of committed transitions.
///
/// # Example
///
/// ```rust
/// use stackwise::core::{TransitionHistory, TransitionRecord};
/// use chrono::Utc;
///
/// let mut history = TransitionHistory::with_limit(2);
/// for (from, to) in [("A", "B"), ("B", "C"), ("C", "D")] {
///     history.record(TransitionRecord {
///         from: from.to_string(),
///         to: to.to_string(),
///         step: 0,
///         timestamp: Utc::now(),
///     });
/// }
///
/// assert_eq!(history.path(), vec!["C", "D"]);
/// assert_eq!(history.dropped(), 1);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionHistory {
    records: VecDeque<TransitionRecord>,
    limit: usize,
    dropped: u64,
}

impl Default for TransitionHistory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl TransitionHistory {
    /// Create a history that keeps at most `limit` records.
    ///
    /// A limit of zero disables recording.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            limit,
            dropped: 0,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Append a record, evicting the oldest one if the limit is reached.
    pub fn record(&mut self, record: TransitionRecord) {
        if self.limit == 0 {
            self.dropped += 1;
            return;
        }
        if self.records.len() == self.limit {
            self.records.pop_front();
            self.dropped += 1;
        }
        self.records.push_back(record);
    }

    /// Records in commit order, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records evicted or skipped because of the limit.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Keys of the entered states, in order.
    pub fn path(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.to.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.dropped = 0;
    }

    /// Export the retained records as JSON.
    pub fn to_json(&self) -> Result<String, MachineError> {
        Ok(serde_json::to_string(&self.records)?)
    }
}
