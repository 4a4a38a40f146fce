//! Token accounting across completion round trips.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use super::client::Completion;
use crate::models::Turn;

/// Token counts for one round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// True when the backend reported nothing and the counts were estimated.
    pub estimated: bool,
}

/// Summed usage over every recorded round trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub calls: usize,
    pub estimated_calls: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Append-only, thread-safe usage ledger.
///
/// Shared between classifiers (and threads) through an `Arc`; records are
/// never removed.
#[derive(Debug, Default)]
pub struct UsageAccumulator {
    records: Mutex<Vec<UsageRecord>>,
}

impl UsageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: UsageRecord) {
        self.lock().push(record);
    }

    /// Records a completion, estimating counts from text when the backend
    /// reported none.
    pub fn record_completion(&self, turns: &[Turn], completion: &Completion) {
        let record = match completion.usage {
            Some(usage) => UsageRecord {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                estimated: false,
            },
            None => UsageRecord {
                prompt_tokens: turns.iter().map(|t| estimate_tokens(&t.content)).sum(),
                completion_tokens: estimate_tokens(&completion.text),
                estimated: true,
            },
        };
        self.record(record);
    }

    /// Snapshot of all records in insertion order.
    pub fn records(&self) -> Vec<UsageRecord> {
        self.lock().clone()
    }

    pub fn totals(&self) -> UsageTotals {
        self.lock()
            .iter()
            .fold(UsageTotals::default(), |mut totals, record| {
                totals.calls += 1;
                totals.prompt_tokens += record.prompt_tokens;
                totals.completion_tokens += record.completion_tokens;
                if record.estimated {
                    totals.estimated_calls += 1;
                }
                totals
            })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UsageRecord>> {
        // A panic while holding the lock cannot leave a half-written Vec push.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}
