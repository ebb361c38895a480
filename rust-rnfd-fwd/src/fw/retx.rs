//! Exponential retransmission suppression.
//!
//! A retransmitted Interest is forwarded again only after the suppression
//! interval has passed since the last upstream transmission; the interval
//! doubles on every forwarded retransmission up to a ceiling.

use crate::tables::pit::{OutRecord, PitEntry};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionResult {
    /// No upstream has seen this Interest yet.
    New,
    /// A retransmission inside the suppression window.
    Suppress,
    /// A retransmission that should be forwarded.
    Forward,
}

#[derive(Debug, Clone, Copy)]
pub struct RetxSuppression {
    pub initial: Duration,
    pub multiplier: u32,
    pub max: Duration,
}

impl Default for RetxSuppression {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(10),
            multiplier: 2,
            max: Duration::from_millis(250),
        }
    }
}

impl RetxSuppression {
    /// Decision against the whole entry, using the entry-level interval.
    pub fn decide_per_pit_entry(&self, entry: &mut PitEntry, now: Instant) -> SuppressionResult {
        let Some(last_outgoing) = entry.out_records.iter().map(|r| r.last_renewed).max() else {
            return SuppressionResult::New;
        };
        if now < last_outgoing + entry.suppression_interval {
            return SuppressionResult::Suppress;
        }
        entry.suppression_interval =
            (entry.suppression_interval * self.multiplier).min(self.max);
        SuppressionResult::Forward
    }

    /// Decision against one upstream, using the out-record interval.
    pub fn decide_per_upstream(
        &self,
        entry: &PitEntry,
        face: rust_rnfd_common::FaceId,
        now: Instant,
    ) -> SuppressionResult {
        match entry.out_record(face) {
            None => SuppressionResult::New,
            Some(record) if now < record.last_renewed + record.suppression_interval => {
                SuppressionResult::Suppress
            }
            Some(_) => SuppressionResult::Forward,
        }
    }

    pub fn increment_interval_for_out_record(&self, record: &mut OutRecord) {
        record.suppression_interval = (record.suppression_interval * self.multiplier).min(self.max);
    }
}
