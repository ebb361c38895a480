//! The Pending Interest Table.
//!
//! Entries are keyed by Name plus selectors (`can_be_prefix`,
//! `must_be_fresh`) and owned by the table; the NameTree node for the
//! entry's stripped name lists the entry ids, which is what makes the
//! reflexive-aware Data match a prefix walk.

use crate::tables::name_tree::{NameTree, NodeId};
use log::trace;
use rust_rnfd_common::packet::{Data, Interest, NackReason};
use rust_rnfd_common::types::FaceId;
use rust_rnfd_common::Name;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PitEntryId(pub u64);

impl fmt::Display for PitEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pit{}", self.0)
    }
}

/// Where a duplicate Nonce was found, as a bitmask.
pub const DUPLICATE_NONCE_NONE: u8 = 0;
/// An in-record on the same face has the Nonce.
pub const DUPLICATE_NONCE_IN_SAME: u8 = 1 << 0;
/// An in-record on a different face has the Nonce.
pub const DUPLICATE_NONCE_IN_OTHER: u8 = 1 << 1;
/// An out-record has the Nonce.
pub const DUPLICATE_NONCE_OUT: u8 = 1 << 2;

#[derive(Debug, Clone)]
pub struct InRecord {
    pub face: FaceId,
    pub last_nonce: u32,
    pub interest: Interest,
    pub expiry: Instant,
}

#[derive(Debug, Clone)]
pub struct OutRecord {
    pub face: FaceId,
    pub last_nonce: u32,
    pub interest: Interest,
    pub expiry: Instant,
    pub incoming_nack: Option<NackReason>,
    pub last_renewed: Instant,
    /// Per-upstream retransmission-suppression interval.
    pub suppression_interval: Duration,
}

#[derive(Debug)]
pub struct PitEntry {
    pub id: PitEntryId,
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    /// The Interest that created the entry (refreshed on retransmission).
    pub interest: Interest,
    pub in_records: Vec<InRecord>,
    pub out_records: Vec<OutRecord>,
    pub is_satisfied: bool,
    pub data_freshness_period: Duration,
    /// Bumped on every expiry reschedule; stale timer pops are ignored.
    pub expiry_epoch: u64,
    /// Per-entry retransmission-suppression interval.
    pub suppression_interval: Duration,
    pub(crate) node: NodeId,
}

impl PitEntry {
    pub fn has_in_records(&self) -> bool {
        !self.in_records.is_empty()
    }

    pub fn in_record(&self, face: FaceId) -> Option<&InRecord> {
        self.in_records.iter().find(|r| r.face == face)
    }

    pub fn out_record(&self, face: FaceId) -> Option<&OutRecord> {
        self.out_records.iter().find(|r| r.face == face)
    }

    pub fn out_record_mut(&mut self, face: FaceId) -> Option<&mut OutRecord> {
        self.out_records.iter_mut().find(|r| r.face == face)
    }

    /// Inserts an in-record for `face`, or refreshes the existing one.
    pub fn insert_or_update_in_record(&mut self, face: FaceId, interest: &Interest, expiry: Instant) {
        self.interest = interest.clone();
        match self.in_records.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.last_nonce = interest.nonce;
                record.interest = interest.clone();
                record.expiry = expiry;
            }
            None => self.in_records.push(InRecord {
                face,
                last_nonce: interest.nonce,
                interest: interest.clone(),
                expiry,
            }),
        }
    }

    /// Inserts an out-record for `face`, or renews the existing one.
    pub fn insert_or_update_out_record(
        &mut self,
        face: FaceId,
        interest: &Interest,
        expiry: Instant,
        now: Instant,
        initial_suppression: Duration,
    ) {
        match self.out_records.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.last_nonce = interest.nonce;
                record.interest = interest.clone();
                record.expiry = expiry;
                record.incoming_nack = None;
                record.last_renewed = now;
            }
            None => self.out_records.push(OutRecord {
                face,
                last_nonce: interest.nonce,
                interest: interest.clone(),
                expiry,
                incoming_nack: None,
                last_renewed: now,
                suppression_interval: initial_suppression,
            }),
        }
    }

    pub fn delete_in_record(&mut self, face: FaceId) {
        self.in_records.retain(|r| r.face != face);
    }

    pub fn delete_out_record(&mut self, face: FaceId) {
        self.out_records.retain(|r| r.face != face);
    }

    pub fn clear_in_records(&mut self) {
        self.in_records.clear();
    }

    /// The latest in-record expiry, which is what the PIT expiry timer
    /// tracks.
    pub fn last_in_expiry(&self) -> Option<Instant> {
        self.in_records.iter().map(|r| r.expiry).max()
    }

    /// True while some upstream may still answer: an unexpired out-record
    /// that has not been NACKed.
    pub fn has_pending_out_records(&self, now: Instant) -> bool {
        self.out_records
            .iter()
            .any(|r| r.incoming_nack.is_none() && r.expiry > now)
    }

    fn matches_interest(&self, interest: &Interest) -> bool {
        self.name == interest.name
            && self.can_be_prefix == interest.can_be_prefix
            && self.must_be_fresh == interest.must_be_fresh
    }
}

/// Classifies a duplicate Nonce against `entry`, relative to `face`.
pub fn find_duplicate_nonce(entry: &PitEntry, nonce: u32, face: FaceId) -> u8 {
    let mut dnw = DUPLICATE_NONCE_NONE;
    for record in &entry.in_records {
        if record.last_nonce == nonce {
            dnw |= if record.face == face {
                DUPLICATE_NONCE_IN_SAME
            } else {
                DUPLICATE_NONCE_IN_OTHER
            };
        }
    }
    for record in &entry.out_records {
        if record.last_nonce == nonce {
            dnw |= DUPLICATE_NONCE_OUT;
        }
    }
    dnw
}

#[derive(Debug, Default)]
pub struct Pit {
    entries: HashMap<PitEntryId, PitEntry>,
    next_id: u64,
}

impl Pit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: PitEntryId) -> Option<&PitEntry> {
        self.entries.get(&id)
    }

    pub fn entry_mut(&mut self, id: PitEntryId) -> Option<&mut PitEntry> {
        self.entries.get_mut(&id)
    }

    /// Finds or creates the entry for `interest`'s Name+selectors.
    pub fn insert(
        &mut self,
        tree: &mut NameTree,
        interest: &Interest,
        initial_suppression: Duration,
    ) -> (PitEntryId, bool) {
        if let Some(id) = self.find(tree, interest) {
            return (id, false);
        }

        let node = tree.find_or_insert(&interest.name);
        self.next_id += 1;
        let id = PitEntryId(self.next_id);
        trace!("{} insert name={}", id, interest.name);
        self.entries.insert(
            id,
            PitEntry {
                id,
                name: interest.name.clone(),
                can_be_prefix: interest.can_be_prefix,
                must_be_fresh: interest.must_be_fresh,
                interest: interest.clone(),
                in_records: Vec::new(),
                out_records: Vec::new(),
                is_satisfied: false,
                data_freshness_period: Duration::ZERO,
                expiry_epoch: 0,
                suppression_interval: initial_suppression,
                node,
            },
        );
        tree.node_mut(node).pit_entries.push(id);
        (id, true)
    }

    /// Finds an existing entry with the same Name+selectors, never inserts.
    pub fn find(&self, tree: &NameTree, interest: &Interest) -> Option<PitEntryId> {
        let node = tree.find(&interest.name)?;
        tree.node(node)
            .pit_entries
            .iter()
            .copied()
            .find(|id| self.entries[id].matches_interest(interest))
    }

    /// Finds the first entry whose Name equals `name`, regardless of
    /// selectors. Token-tagged flows must keep Names unique modulo
    /// selectors; with two selector-variants of one Name the choice is
    /// arbitrary.
    pub fn find_based_on_name(&self, tree: &NameTree, name: &Name) -> Option<PitEntryId> {
        let node = tree.find(name)?;
        let mut matches = tree
            .node(node)
            .pit_entries
            .iter()
            .copied()
            .filter(|id| &self.entries[id].name == name);
        let found = matches.next();
        debug_assert!(
            matches.next().is_none(),
            "multiple PIT entries for token-tagged name {}",
            name
        );
        found
    }

    /// Every entry whose Name is a reflexive-aware prefix of the Data's
    /// Name.
    pub fn find_all_data_matches(&self, tree: &NameTree, data: &Data) -> Vec<PitEntryId> {
        let mut matches = Vec::new();
        for node in tree.prefixes_of(&data.name) {
            matches.extend(tree.node(node).pit_entries.iter().copied());
        }
        matches
    }

    /// Removes the entry, unlinking it from its NameTree node.
    pub fn erase(&mut self, tree: &mut NameTree, id: PitEntryId) -> Option<PitEntry> {
        let entry = self.entries.remove(&id)?;
        let node = entry.node;
        tree.node_mut(node).pit_entries.retain(|&e| e != id);
        tree.prune_if_empty(node);
        Some(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PitEntry> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<PitEntryId> {
        self.entries.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const SUPPRESSION: Duration = Duration::from_millis(10);

    fn interest(uri: &str) -> Interest {
        Interest::new(Name::from_uri(uri).unwrap())
    }

    #[test]
    fn insert_is_idempotent_per_key() {
        let mut tree = NameTree::new();
        let mut pit = Pit::new();
        let i = interest("/a/b").with_nonce(1);

        let (id1, new1) = pit.insert(&mut tree, &i, SUPPRESSION);
        let (id2, new2) = pit.insert(&mut tree, &i, SUPPRESSION);
        assert!(new1);
        assert!(!new2);
        assert_eq!(id1, id2);

        // different selectors make a different entry
        let (id3, new3) = pit.insert(&mut tree, &i.clone().with_must_be_fresh(true), SUPPRESSION);
        assert!(new3);
        assert_ne!(id1, id3);
        assert_eq!(pit.len(), 2);
    }

    #[test]
    fn find_never_inserts() {
        let tree = NameTree::new();
        let pit = Pit::new();
        assert!(pit.find(&tree, &interest("/a")).is_none());
        assert_eq!(pit.len(), 0);
    }

    #[test]
    fn duplicate_nonce_classification() {
        let mut tree = NameTree::new();
        let mut pit = Pit::new();
        let now = Instant::now();
        let i = interest("/a").with_nonce(7);
        let (id, _) = pit.insert(&mut tree, &i, SUPPRESSION);

        let entry = pit.entry_mut(id).unwrap();
        entry.insert_or_update_in_record(FaceId(300), &i, now + Duration::from_secs(4));
        entry.insert_or_update_out_record(FaceId(301), &i, now + Duration::from_secs(4), now, SUPPRESSION);

        let entry = pit.entry(id).unwrap();
        assert_eq!(
            find_duplicate_nonce(entry, 7, FaceId(300)),
            DUPLICATE_NONCE_IN_SAME | DUPLICATE_NONCE_OUT
        );
        assert_eq!(
            find_duplicate_nonce(entry, 7, FaceId(999)),
            DUPLICATE_NONCE_IN_OTHER | DUPLICATE_NONCE_OUT
        );
        assert_eq!(find_duplicate_nonce(entry, 8, FaceId(300)), DUPLICATE_NONCE_NONE);
    }

    #[test]
    fn records_are_unique_per_face() {
        let mut tree = NameTree::new();
        let mut pit = Pit::new();
        let now = Instant::now();
        let i = interest("/a").with_nonce(1);
        let (id, _) = pit.insert(&mut tree, &i, SUPPRESSION);
        let entry = pit.entry_mut(id).unwrap();

        entry.insert_or_update_in_record(FaceId(300), &i, now);
        entry.insert_or_update_in_record(FaceId(300), &i.clone().with_nonce(2), now + Duration::from_secs(1));
        assert_eq!(entry.in_records.len(), 1);
        assert_eq!(entry.in_records[0].last_nonce, 2);

        entry.insert_or_update_out_record(FaceId(301), &i, now, now, SUPPRESSION);
        entry.out_record_mut(FaceId(301)).unwrap().incoming_nack = Some(NackReason::NoRoute);
        entry.insert_or_update_out_record(FaceId(301), &i.clone().with_nonce(3), now, now, SUPPRESSION);
        assert_eq!(entry.out_records.len(), 1);
        // renewal clears the recorded NACK
        assert!(entry.out_records[0].incoming_nack.is_none());
    }

    #[test]
    fn data_match_is_reflexive_aware() {
        let mut tree = NameTree::new();
        let mut pit = Pit::new();

        let original = Interest::new(Name::from_uri_reflexive("/example/testApp/1234").unwrap());
        let (original_id, _) = pit.insert(&mut tree, &original, SUPPRESSION);

        let data = Data::new(Name::from_uri("/example/testApp/data/1").unwrap(), "x");
        assert_eq!(pit.find_all_data_matches(&tree, &data), vec![original_id]);

        let unrelated = Data::new(Name::from_uri("/example/other").unwrap(), "x");
        assert!(pit.find_all_data_matches(&tree, &unrelated).is_empty());
    }

    #[test]
    fn find_based_on_name_ignores_selectors() {
        let mut tree = NameTree::new();
        let mut pit = Pit::new();
        let i = interest("/a/b").with_must_be_fresh(true);
        let (id, _) = pit.insert(&mut tree, &i, SUPPRESSION);

        let found = pit.find_based_on_name(&tree, &Name::from_uri("/a/b").unwrap());
        assert_eq!(found, Some(id));
        assert!(pit.find_based_on_name(&tree, &Name::from_uri("/a").unwrap()).is_none());
    }

    #[test]
    fn erase_prunes_the_tree() {
        let mut tree = NameTree::new();
        let mut pit = Pit::new();
        let (id, _) = pit.insert(&mut tree, &interest("/a/b/c"), SUPPRESSION);
        assert!(tree.find(&Name::from_uri("/a/b/c").unwrap()).is_some());

        pit.erase(&mut tree, id);
        assert!(tree.find(&Name::from_uri("/a/b/c").unwrap()).is_none());
        assert!(pit.is_empty());
    }
}
