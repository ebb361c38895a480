//! Single-threaded timer queue.
//!
//! The forwarder schedules PIT expiry and periodic Dead-Nonce-List purges
//! here; the daemon loop sleeps until [`Scheduler::next_deadline`] and then
//! drains [`Scheduler::pop_due`]. Cancellation is by epoch: a stale
//! `PitExpiry` whose epoch no longer matches the entry is ignored by the
//! forwarder, so rescheduling an expiry atomically supersedes the previous
//! schedule.

use crate::tables::pit::PitEntryId;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimerEvent {
    PitExpiry { entry: PitEntryId, epoch: u64 },
    DnlPurge,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Scheduled {
    at: Instant,
    seq: u64,
    event: TimerEvent,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<Scheduled>>,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: Instant, event: TimerEvent) {
        self.seq += 1;
        self.heap.push(Reverse(Scheduled {
            at,
            seq: self.seq,
            event,
        }));
    }

    /// The instant of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(s)| s.at)
    }

    /// Removes and returns every event due at or before `now`, in firing
    /// order.
    pub fn pop_due(&mut self, now: Instant) -> Vec<TimerEvent> {
        let mut due = Vec::new();
        while let Some(Reverse(s)) = self.heap.peek() {
            if s.at > now {
                break;
            }
            due.push(self.heap.pop().unwrap().0.event);
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
