//! The Content Store: a bounded in-memory Data cache.
//!
//! Entries are keyed by the full Data name in a `BTreeMap`, so a
//! CanBePrefix lookup is a range scan from the requested prefix. Eviction
//! is insertion-order FIFO; smarter admission policies are out of scope.

use log::trace;
use rust_rnfd_common::packet::{Data, Interest};
use rust_rnfd_common::Name;
use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

pub const DEFAULT_CS_CAPACITY: usize = 65536;

#[derive(Debug)]
struct CsRecord {
    data: Data,
    fresh_until: Instant,
    unsolicited: bool,
}

#[derive(Debug)]
pub struct Cs {
    entries: BTreeMap<Name, CsRecord>,
    queue: VecDeque<Name>,
    capacity: usize,
}

impl Cs {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            queue: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Caches `data`, stamping its freshness deadline. A re-inserted name
    /// refreshes the existing record in place.
    pub fn insert(&mut self, data: Data, unsolicited: bool, now: Instant) {
        let mut record_data = data;
        record_data.tags = Default::default();
        let name = record_data.name.clone();
        let fresh_until = now + record_data.freshness_period;

        if self
            .entries
            .insert(
                name.clone(),
                CsRecord {
                    data: record_data,
                    fresh_until,
                    unsolicited,
                },
            )
            .is_none()
        {
            self.queue.push_back(name);
            if self.entries.len() > self.capacity {
                if let Some(victim) = self.queue.pop_front() {
                    trace!("cs evict name={}", victim);
                    self.entries.remove(&victim);
                }
            }
        }
    }

    /// Looks up a match for `interest`: exact name, or the first name under
    /// it when CanBePrefix is set. MustBeFresh rejects stale records.
    pub fn find(&self, interest: &Interest, now: Instant) -> Option<&Data> {
        let matches_freshness =
            |record: &CsRecord| !interest.must_be_fresh || record.fresh_until > now;

        if interest.can_be_prefix {
            self.entries
                .range(interest.name.clone()..)
                .take_while(|(name, _)| is_plain_prefix(&interest.name, name))
                .find(|(_, record)| matches_freshness(record))
                .map(|(_, record)| &record.data)
        } else {
            self.entries
                .get(&interest.name)
                .filter(|record| matches_freshness(record))
                .map(|record| &record.data)
        }
    }

    /// Removes every record under `prefix`; returns how many went away.
    pub fn erase_prefix(&mut self, prefix: &Name) -> usize {
        let victims: Vec<Name> = self
            .entries
            .range(prefix.clone()..)
            .take_while(|(name, _)| is_plain_prefix(prefix, name))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &victims {
            self.entries.remove(name);
        }
        self.queue.retain(|n| !victims.contains(n));
        victims.len()
    }

    /// How many cached records arrived unsolicited.
    pub fn unsolicited_count(&self) -> usize {
        self.entries.values().filter(|r| r.unsolicited).count()
    }
}

/// Component-wise prefix test without reflexive stripping; CS names are
/// matched exactly as published.
fn is_plain_prefix(prefix: &Name, name: &Name) -> bool {
    prefix.len() <= name.len()
        && prefix
            .components()
            .zip(name.components())
            .all(|(a, b)| a == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn data(uri: &str, freshness_ms: u64) -> Data {
        Data::new(name(uri), "payload")
            .with_freshness_period(Duration::from_millis(freshness_ms))
    }

    #[test]
    fn exact_match_and_prefix_match() {
        let mut cs = Cs::new(16);
        let now = Instant::now();
        cs.insert(data("/a/b/1", 1000), false, now);

        let exact = Interest::new(name("/a/b/1"));
        assert!(cs.find(&exact, now).is_some());

        let wrong = Interest::new(name("/a/b"));
        assert!(cs.find(&wrong, now).is_none());

        let prefix = Interest::new(name("/a/b")).with_can_be_prefix(true);
        assert_eq!(cs.find(&prefix, now).unwrap().name, name("/a/b/1"));

        // a sibling prefix does not match
        let sibling = Interest::new(name("/a/c")).with_can_be_prefix(true);
        assert!(cs.find(&sibling, now).is_none());
    }

    #[test]
    fn must_be_fresh_rejects_stale_records() {
        let mut cs = Cs::new(16);
        let now = Instant::now();
        cs.insert(data("/a/1", 100), false, now);

        let later = now + Duration::from_millis(200);
        let fresh = Interest::new(name("/a/1")).with_must_be_fresh(true);
        assert!(cs.find(&fresh, now).is_some());
        assert!(cs.find(&fresh, later).is_none());

        // without MustBeFresh the stale record still answers
        let stale_ok = Interest::new(name("/a/1"));
        assert!(cs.find(&stale_ok, later).is_some());
    }

    #[test]
    fn eviction_is_fifo() {
        let mut cs = Cs::new(2);
        let now = Instant::now();
        cs.insert(data("/a/1", 0), false, now);
        cs.insert(data("/a/2", 0), false, now);
        cs.insert(data("/a/3", 0), false, now);

        assert_eq!(cs.len(), 2);
        assert!(cs.find(&Interest::new(name("/a/1")), now).is_none());
        assert!(cs.find(&Interest::new(name("/a/3")), now).is_some());
    }

    #[test]
    fn erase_prefix_counts_victims() {
        let mut cs = Cs::new(16);
        let now = Instant::now();
        cs.insert(data("/a/1", 0), false, now);
        cs.insert(data("/a/2", 0), false, now);
        cs.insert(data("/b/1", 0), false, now);

        assert_eq!(cs.erase_prefix(&name("/a")), 2);
        assert_eq!(cs.len(), 1);
    }
}
