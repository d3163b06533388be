//! Establishment and hour-of-day filtering of the raw transaction log

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{RfmError, RfmResult};
use crate::transaction::Transaction;

/// Inclusive hour-of-day window, validated to `0 <= lo <= hi <= 23`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HourRange {
    lo: u8,
    hi: u8,
}

impl HourRange {
    pub fn new(lo: i32, hi: i32) -> RfmResult<Self> {
        if !(0..=23).contains(&lo) || !(0..=23).contains(&hi) || lo > hi {
            return Err(RfmError::InvalidFilterRange { lo, hi });
        }
        Ok(Self {
            lo: lo as u8,
            hi: hi as u8,
        })
    }

    pub fn full_day() -> Self {
        Self { lo: 0, hi: 23 }
    }

    pub fn lo(&self) -> u8 {
        self.lo
    }

    pub fn hi(&self) -> u8 {
        self.hi
    }

    /// A missing hour never matches.
    pub fn contains(&self, hour: Option<u8>) -> bool {
        hour.is_some_and(|h| self.lo <= h && h <= self.hi)
    }

    pub fn hours(&self) -> impl Iterator<Item = u8> {
        self.lo..=self.hi
    }
}

impl std::fmt::Display for HourRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.lo, self.hi)
    }
}

/// Keep the transactions whose establishment is selected and whose hour falls
/// inside `hour_range`.
///
/// An empty establishment set selects nothing. The input is left untouched.
pub fn filter(
    transactions: &[Transaction],
    establishments: &BTreeSet<String>,
    hour_range: HourRange,
) -> Vec<Transaction> {
    let filtered: Vec<Transaction> = transactions
        .iter()
        .filter(|t| establishments.contains(&t.establishment) && hour_range.contains(t.hour_of_day))
        .cloned()
        .collect();

    debug!(
        input = transactions.len(),
        kept = filtered.len(),
        establishments = establishments.len(),
        hours = %hour_range,
        "filtered transactions"
    );

    filtered
}

/// Sorted set of establishment labels present in `transactions`
pub fn distinct_establishments(transactions: &[Transaction]) -> BTreeSet<String> {
    transactions
        .iter()
        .map(|t| t.establishment.clone())
        .collect()
}
