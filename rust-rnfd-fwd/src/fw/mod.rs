//! The forwarding pipelines.
//!
//! All pipelines run to completion on the daemon's single event loop; the
//! only suspension points are face I/O and the timer scheduler. Reflexive
//! Interests from producers take the `on_sending_ri` pipeline, which routes
//! them by the PIT-assist token index instead of the FIB and rewrites the
//! per-hop PitToken back to the label the original consumer assigned.

pub mod best_route;
pub mod multicast;
pub mod retx;
pub mod strategy;

use crate::face::{Face, FaceTable, FACEID_CONTENT_STORE};
use crate::scheduler::{Scheduler, TimerEvent};
use crate::tables::cs::Cs;
use crate::tables::dead_nonce_list::DeadNonceList;
use crate::tables::fib::{Fib, NextHop};
use crate::tables::name_tree::NameTree;
use crate::tables::pit::{
    self, Pit, PitEntry, PitEntryId, DUPLICATE_NONCE_IN_SAME, DUPLICATE_NONCE_NONE,
};
use crate::tables::pit_assist::PitAssist;
use best_route::BestRouteStrategy;
use log::{debug, trace, warn};
use multicast::MulticastStrategy;
use retx::RetxSuppression;
use rust_rnfd_common::metrics::ForwarderMetrics;
use rust_rnfd_common::packet::{Data, Interest, Nack, NackReason, Packet};
use rust_rnfd_common::types::{FaceId, FaceScope, LinkType};
use rust_rnfd_common::{Error, Name, NamingContext};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strategy::{Strategy, StrategyChoice, StrategyRegistry};
use tokio::sync::mpsc;

/// What to do with Data no PIT entry asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnsolicitedDataPolicy {
    #[default]
    DropAll,
    CacheAll,
}

/// Runtime options for the forwarder core.
#[derive(Debug, Clone)]
pub struct ForwarderOptions {
    /// Attached to Interests that carry no HopLimit; 0 disables.
    pub default_hop_limit: u8,
    /// Keep a PIT entry for producer-originated reflexive Interests.
    /// Without it, reflexive Data has no match and is unsolicited.
    pub ri_pit_entry: bool,
    pub cs_capacity: usize,
    pub dead_nonce_lifetime: Duration,
    pub unsolicited_policy: UnsolicitedDataPolicy,
}

impl Default for ForwarderOptions {
    fn default() -> Self {
        Self {
            default_hop_limit: 0,
            ri_pit_entry: true,
            cs_capacity: crate::tables::cs::DEFAULT_CS_CAPACITY,
            dead_nonce_lifetime: crate::tables::dead_nonce_list::DEFAULT_DNL_LIFETIME,
            unsolicited_policy: UnsolicitedDataPolicy::DropAll,
        }
    }
}

pub struct Forwarder {
    options: ForwarderOptions,
    naming: NamingContext,
    pub faces: FaceTable,
    name_tree: NameTree,
    pub pit: Pit,
    pub pit_assist: PitAssist,
    pub fib: Fib,
    pub cs: Cs,
    dnl: DeadNonceList,
    strategy_choice: StrategyChoice,
    registry: StrategyRegistry,
    scheduler: Scheduler,
    suppression: RetxSuppression,
    pub metrics: Arc<ForwarderMetrics>,
    /// Prefixes this forwarder serves as producer region; a matching
    /// ForwardingHint is stripped on ingress.
    pub network_regions: Vec<Name>,
    localhost_prefix: Name,
}

impl Forwarder {
    pub fn new(options: ForwarderOptions) -> Self {
        let mut registry = StrategyRegistry::new();
        registry.register(
            BestRouteStrategy::strategy_base_name(),
            BestRouteStrategy::factory,
        );
        registry.register(
            MulticastStrategy::strategy_base_name(),
            MulticastStrategy::factory,
        );
        let default_strategy = registry
            .create(&BestRouteStrategy::strategy_name())
            .expect("default strategy must instantiate");

        let mut scheduler = Scheduler::new();
        scheduler.schedule(Instant::now() + options.dead_nonce_lifetime, TimerEvent::DnlPurge);

        Self {
            naming: NamingContext::default(),
            faces: FaceTable::new(),
            name_tree: NameTree::new(),
            pit: Pit::new(),
            pit_assist: PitAssist::new(),
            fib: Fib::new(),
            cs: Cs::new(options.cs_capacity),
            dnl: DeadNonceList::new(options.dead_nonce_lifetime, crate::tables::dead_nonce_list::DEFAULT_DNL_CAPACITY),
            strategy_choice: StrategyChoice::new(default_strategy),
            registry,
            scheduler,
            suppression: RetxSuppression::default(),
            metrics: Arc::new(ForwarderMetrics::new()),
            network_regions: Vec::new(),
            localhost_prefix: Name::from_uri("/localhost").expect("static"),
            options,
        }
    }

    pub fn options(&self) -> &ForwarderOptions {
        &self.options
    }

    pub fn naming(&self) -> &NamingContext {
        &self.naming
    }

    /* ------------------------------------------------------------ *
     * Faces and routes
     * ------------------------------------------------------------ */

    pub fn add_face(
        &mut self,
        uri: String,
        scope: FaceScope,
        link_type: LinkType,
        tx: mpsc::UnboundedSender<Packet>,
    ) -> FaceId {
        self.faces.add(uri, scope, link_type, tx)
    }

    /// Removes a face and cleans every table reference to it: FIB nexthops
    /// go away, in/out-records are deleted, and PIT entries left with no
    /// records are erased.
    pub fn remove_face(&mut self, id: FaceId) {
        if self.faces.remove(id).is_none() {
            return;
        }
        self.fib.remove_face(&mut self.name_tree, id);

        for pit_id in self.pit.ids() {
            let Some(entry) = self.pit.entry_mut(pit_id) else {
                continue;
            };
            entry.delete_in_record(id);
            entry.delete_out_record(id);
            if entry.in_records.is_empty() && entry.out_records.is_empty() {
                let name = entry.name.clone();
                self.pit.erase(&mut self.name_tree, pit_id);
                if self.pit.find_based_on_name(&self.name_tree, &name).is_none() {
                    self.pit_assist.erase_name(&name);
                }
            }
        }
        self.metrics.pit_size.set(self.pit.len() as u64);
    }

    pub fn register_route(&mut self, prefix: &Name, face: FaceId, cost: u64) {
        let is_new = self
            .fib
            .add_or_update_nexthop(&mut self.name_tree, prefix, face, cost);
        if is_new {
            self.on_new_next_hop(prefix, NextHop { face, cost });
        }
    }

    pub fn unregister_route(&mut self, prefix: &Name, face: FaceId) -> bool {
        self.fib.remove_nexthop(&mut self.name_tree, prefix, face)
    }

    pub fn set_strategy(&mut self, prefix: &Name, instance_name: &Name) -> Result<(), Error> {
        let strategy = self.registry.create(instance_name)?;
        self.strategy_choice.set(prefix, strategy);
        Ok(())
    }

    pub fn unset_strategy(&mut self, prefix: &Name) -> bool {
        self.strategy_choice.unset(prefix)
    }

    pub fn strategy_entries(&self) -> Vec<(Name, Name)> {
        self.strategy_choice.entries()
    }

    pub fn registered_strategies(&self) -> Vec<Name> {
        self.registry.registered_names()
    }

    /* ------------------------------------------------------------ *
     * Entry points
     * ------------------------------------------------------------ */

    pub fn handle_packet(&mut self, ingress: FaceId, packet: Packet) {
        if let Some(face) = self.faces.get(ingress) {
            face.counters.n_in_packets.increment();
        } else {
            return;
        }
        match packet {
            Packet::Interest(interest) => self.on_incoming_interest(ingress, interest),
            Packet::Data(data) => self.on_incoming_data(ingress, data),
            Packet::Nack(nack) => self.on_incoming_nack(ingress, nack),
        }
    }

    /// The earliest pending timer, for the daemon's sleep.
    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Fires every timer due at `now`.
    pub fn poll_timers(&mut self, now: Instant) {
        for event in self.scheduler.pop_due(now) {
            match event {
                TimerEvent::PitExpiry { entry, epoch } => {
                    let live = self
                        .pit
                        .entry(entry)
                        .is_some_and(|e| e.expiry_epoch == epoch);
                    if live {
                        self.on_interest_finalize(entry, now);
                    }
                }
                TimerEvent::DnlPurge => {
                    self.dnl.purge(now);
                    self.scheduler
                        .schedule(now + self.dnl.lifetime(), TimerEvent::DnlPurge);
                }
            }
        }
    }

    /* ------------------------------------------------------------ *
     * Incoming Interest pipeline
     * ------------------------------------------------------------ */

    fn on_incoming_interest(&mut self, ingress: FaceId, mut interest: Interest) {
        let now = Instant::now();
        interest.tags.incoming_face = Some(ingress);
        self.metrics.n_in_interests.increment();
        debug!(
            "onIncomingInterest in={} interest={} pit-token={}",
            ingress,
            interest,
            interest.tags.pit_token.unwrap_or(0)
        );

        let face = self.faces.get(ingress).expect("checked in handle_packet");
        let (face_scope, face_link_type) = (face.scope(), face.link_type());

        // drop if HopLimit zero, decrement otherwise (if present)
        if let Some(hop_limit) = interest.hop_limit {
            if hop_limit == 0 {
                face.counters.n_in_hop_limit_zero.increment();
                return;
            }
            interest.hop_limit = Some(hop_limit - 1);
        }

        // /localhost scope control
        if face_scope == FaceScope::NonLocal && self.localhost_prefix.is_prefix_of(&interest.name)
        {
            debug!(
                "onIncomingInterest in={} interest={} violates /localhost",
                ingress, interest.name
            );
            return;
        }

        // detect duplicate Nonce with Dead Nonce List
        if self.dnl.has(&interest.name, interest.nonce, now) {
            self.on_interest_loop(ingress, interest);
            return;
        }

        // strip forwarding hint when the Interest reached the producer region
        if !interest.forwarding_hint.is_empty() && self.is_in_producer_region(&interest.forwarding_hint) {
            debug!(
                "onIncomingInterest in={} interest={} reaching-producer-region",
                ingress, interest.name
            );
            interest.forwarding_hint.clear();
        }

        // the producer's reflexive Interest takes its own pipeline
        if interest.is_reflexive_from_producer_with(&self.naming) {
            let pit_entry = self.options.ri_pit_entry.then(|| {
                let (id, _) = self
                    .pit
                    .insert(&mut self.name_tree, &interest, self.suppression.initial);
                id
            });
            self.metrics.pit_size.set(self.pit.len() as u64);
            self.on_sending_ri(ingress, interest, pit_entry);
            return;
        }

        // PIT insert
        let (pit_id, _is_new) = self
            .pit
            .insert(&mut self.name_tree, &interest, self.suppression.initial);
        self.metrics.pit_size.set(self.pit.len() as u64);

        // PIT-assist row for reflexive Interests
        if interest.is_reflexive() && !self.pit_assist.has_name(&interest.name) {
            let prev_token = interest.tags.pit_token.unwrap_or(0);
            match self.pit_assist.create_name(interest.name.clone(), prev_token) {
                Ok(token) => {
                    debug!("onIncomingInterest generated pit-token={} for {}", token, interest.name)
                }
                Err(e) => {
                    warn!("onIncomingInterest token generation failed: {}", e);
                    return;
                }
            }
        }

        // detect duplicate Nonce in PIT entry
        let (has_duplicate, is_pending) = {
            let entry = self.pit.entry(pit_id).expect("just inserted");
            let dnw = pit::find_duplicate_nonce(entry, interest.nonce, ingress);
            let mut has_duplicate = dnw != DUPLICATE_NONCE_NONE;
            if face_link_type == LinkType::PointToPoint {
                // for p2p face: duplicate Nonce from same incoming face is not a loop
                has_duplicate = has_duplicate && (dnw & DUPLICATE_NONCE_IN_SAME) == 0;
            }
            (has_duplicate, entry.has_in_records())
        };
        if has_duplicate {
            self.on_interest_loop(ingress, interest);
            return;
        }

        // is pending?
        if !is_pending {
            if let Some(data) = self.cs.find(&interest, now).cloned() {
                self.on_content_store_hit(ingress, interest, pit_id, data);
            } else {
                self.on_content_store_miss(ingress, interest, pit_id);
            }
        } else {
            self.on_content_store_miss(ingress, interest, pit_id);
        }
    }

    /// Interest loop pipeline: silent drop on shared media, NACK(DUPLICATE)
    /// on point-to-point, without creating an in-record.
    fn on_interest_loop(&mut self, ingress: FaceId, interest: Interest) {
        let Some(face) = self.faces.get(ingress) else {
            return;
        };
        if face.link_type() != LinkType::PointToPoint {
            debug!("onInterestLoop in={} interest={} drop", ingress, interest);
            return;
        }

        debug!("onInterestLoop in={} interest={} nack", ingress, interest);
        face.send(Packet::Nack(Nack::new(interest, NackReason::Duplicate)));
        self.metrics.n_out_nacks.increment();
    }

    /* ------------------------------------------------------------ *
     * Reflexive Interest from producer
     * ------------------------------------------------------------ */

    /// Routes a producer-originated reflexive Interest back toward the
    /// original consumer by the token index, rewriting the PitToken from
    /// the token this forwarder generated to the token the consumer's hop
    /// assigned.
    fn on_sending_ri(&mut self, ingress: FaceId, mut interest: Interest, pit_entry: Option<PitEntryId>) {
        debug!("onSendingRI in={} interest={}", ingress, interest);

        let token = interest.tags.pit_token.unwrap_or(0);
        if token == 0 {
            debug!("onSendingRI reflexive interest without pit-token");
            self.send_nack_direct(ingress, interest, NackReason::None);
            return;
        }

        let Some(original_name) = self.pit_assist.token_to_name(token).cloned() else {
            debug!("onSendingRI no original name for pit-token={}, nack NO_ROUTE", token);
            self.send_nack_direct(ingress, interest, NackReason::NoRoute);
            return;
        };

        let Some(original_entry) = self.pit.find_based_on_name(&self.name_tree, &original_name)
        else {
            // the token index said the context exists; a missing PIT entry
            // is an invariant violation
            warn!("onSendingRI no PIT entry for original name {}", original_name);
            return;
        };

        let Some(prev_token) = self.pit_assist.name_to_prev_token(&original_name) else {
            warn!("onSendingRI no prev pit-token for original name {}", original_name);
            return;
        };

        // restore the token the previous hop (the consumer side) assigned
        interest.tags.pit_token = Some(prev_token);
        trace!(
            "onSendingRI token rewrite {} -> {} original={}",
            token,
            prev_token,
            original_name
        );

        // from here on, treat like a normal Interest
        if self.options.default_hop_limit > 0 && interest.hop_limit.is_none() {
            interest.hop_limit = Some(self.options.default_hop_limit);
        }

        if let Some(pit_id) = pit_entry {
            let now = Instant::now();
            let expiry = now + interest.lifetime;
            let entry = self.pit.entry_mut(pit_id).expect("inserted by caller");
            entry.insert_or_update_in_record(ingress, &interest, expiry);
            let last_expiry = entry.last_in_expiry().unwrap_or(expiry);
            self.set_expiry_timer(pit_id, last_expiry.saturating_duration_since(now));
        }

        // dispatch to the strategy of the RI's own name, but hand it the
        // *original* exchange's PIT entry: its in-records name the
        // consumer-facing egress
        let strategy = self.strategy_choice.find_effective(&interest.name);
        strategy.after_receive_interest(self, interest, ingress, original_entry);
    }

    /* ------------------------------------------------------------ *
     * Content Store pipelines
     * ------------------------------------------------------------ */

    fn on_content_store_miss(&mut self, ingress: FaceId, mut interest: Interest, pit_id: PitEntryId) {
        debug!("onContentStoreMiss interest={}", interest);
        self.metrics.n_cs_misses.increment();
        let now = Instant::now();

        // attach HopLimit if configured and not present
        if self.options.default_hop_limit > 0 && interest.hop_limit.is_none() {
            interest.hop_limit = Some(self.options.default_hop_limit);
        }

        // insert in-record and track the latest in-record expiry
        let expiry = now + interest.lifetime;
        let entry = self.pit.entry_mut(pit_id).expect("caller holds a live id");
        entry.insert_or_update_in_record(ingress, &interest, expiry);
        let last_expiry = entry.last_in_expiry().unwrap_or(expiry);
        self.set_expiry_timer(pit_id, last_expiry.saturating_duration_since(now));

        // a privileged app may pin the next hop, bypassing scope checks
        if let Some(next_hop) = interest.tags.next_hop_face {
            if self.faces.get(next_hop).is_some() {
                debug!("onContentStoreMiss interest={} nexthop-faceid={}", interest.name, next_hop);
                self.on_outgoing_interest(interest, next_hop, pit_id);
            }
            return;
        }

        // a reflexive Interest leaves carrying the downstream token
        if interest.is_reflexive() {
            if let Some(token) = self.pit_assist.name_to_token(&interest.name) {
                interest.tags.pit_token = Some(token);
            }
        }

        let strategy = self.strategy_choice.find_effective(&interest.name);
        strategy.after_receive_interest(self, interest, ingress, pit_id);
    }

    fn on_content_store_hit(
        &mut self,
        ingress: FaceId,
        interest: Interest,
        pit_id: PitEntryId,
        mut data: Data,
    ) {
        debug!("onContentStoreHit interest={}", interest);
        self.metrics.n_cs_hits.increment();

        data.tags.incoming_face = Some(FACEID_CONTENT_STORE);
        data.tags.pit_token = interest.tags.pit_token;

        let freshness = data.freshness_period;
        if let Some(entry) = self.pit.entry_mut(pit_id) {
            entry.is_satisfied = true;
            entry.data_freshness_period = freshness;
        }
        self.set_expiry_timer(pit_id, Duration::ZERO);

        let strategy = self.strategy_choice.find_effective(&interest.name);
        strategy.after_content_store_hit(self, &data, ingress, pit_id);
    }

    /* ------------------------------------------------------------ *
     * Outgoing Interest pipeline
     * ------------------------------------------------------------ */

    /// Sends `interest` on `egress`, recording the out-record. For a
    /// producer-reflexive Interest the PitToken is rewritten to the
    /// original exchange's prev-token and the out-record lands on the RI's
    /// own PIT entry; for a plain reflexive Interest the forwarder's
    /// downstream token is attached.
    pub(crate) fn on_outgoing_interest(
        &mut self,
        mut interest: Interest,
        egress: FaceId,
        pit_id: PitEntryId,
    ) -> bool {
        let now = Instant::now();
        let Some(face) = self.faces.get(egress) else {
            return false;
        };

        // drop if HopLimit == 0 but sending on a non-local face
        if interest.hop_limit == Some(0) && face.scope() == FaceScope::NonLocal {
            debug!(
                "onOutgoingInterest out={} interest={} non-local hop-limit=0",
                egress, interest.name
            );
            face.counters.n_out_hop_limit_zero.increment();
            let strategy = self.strategy_choice.find_effective(&interest.name);
            strategy.on_dropped_interest(self, &interest, egress);
            return false;
        }

        let expiry = now + interest.lifetime;

        if interest.is_reflexive_from_producer_with(&self.naming) {
            // `pit_id` is the original exchange's entry; its name keys the
            // prev-token that completes the round-trip labelling
            let original_name = match self.pit.entry(pit_id) {
                Some(entry) => entry.name.clone(),
                None => return false,
            };
            if let Some(prev_token) = self.pit_assist.name_to_prev_token(&original_name) {
                interest.tags.pit_token = Some(prev_token);
            }

            // the out-record belongs to the RI's own entry
            match self.pit.find(&self.name_tree, &interest) {
                Some(ri_entry) => {
                    self.pit
                        .entry_mut(ri_entry)
                        .expect("find returned a live id")
                        .insert_or_update_out_record(
                            egress,
                            &interest,
                            expiry,
                            now,
                            self.suppression.initial,
                        );
                }
                None => debug!(
                    "onOutgoingInterest no PIT entry for reflexive interest from producer {}",
                    interest.name
                ),
            }

            debug!(
                "onOutgoingInterest out={} interest={} pit-token={}",
                egress,
                interest.name,
                interest.tags.pit_token.unwrap_or(0)
            );
            let face = self.faces.get(egress).expect("checked above");
            face.send(Packet::Interest(interest));
            self.metrics.n_out_interests.increment();
            return true;
        }

        // a reflexive Interest leaves bearing the token generated for the
        // downstream hop
        if interest.is_reflexive() {
            if let Some(token) = self.pit_assist.name_to_token(&interest.name) {
                interest.tags.pit_token = Some(token);
            }
        }

        debug!(
            "onOutgoingInterest out={} interest={} pit-token={}",
            egress,
            interest.name,
            interest.tags.pit_token.unwrap_or(0)
        );

        if let Some(entry) = self.pit.entry_mut(pit_id) {
            entry.insert_or_update_out_record(egress, &interest, expiry, now, self.suppression.initial);
        }

        let face = self.faces.get(egress).expect("checked above");
        face.send(Packet::Interest(interest));
        self.metrics.n_out_interests.increment();
        true
    }

    /* ------------------------------------------------------------ *
     * Data pipelines
     * ------------------------------------------------------------ */

    fn on_incoming_data(&mut self, ingress: FaceId, mut data: Data) {
        let now = Instant::now();
        data.tags.incoming_face = Some(ingress);
        self.metrics.n_in_data.increment();
        debug!("onIncomingData in={} data={}", ingress, data.name);

        let face = self.faces.get(ingress).expect("checked in handle_packet");
        if face.scope() == FaceScope::NonLocal && self.localhost_prefix.is_prefix_of(&data.name) {
            debug!("onIncomingData in={} data={} violates /localhost", ingress, data.name);
            return;
        }
        let ingress_link_type = face.link_type();

        let pit_matches = self.pit.find_all_data_matches(&self.name_tree, &data);
        if pit_matches.is_empty() {
            self.on_data_unsolicited(ingress, data);
            return;
        }

        self.cs.insert(data.clone(), false, now);
        self.metrics.cs_size.set(self.cs.len() as u64);

        if pit_matches.len() == 1 {
            let pit_id = pit_matches[0];
            debug!("onIncomingData matching={}", self.pit.entry(pit_id).expect("matched").name);

            self.set_expiry_timer(pit_id, Duration::ZERO);

            let strategy_name = self.pit.entry(pit_id).expect("matched").name.clone();
            let strategy = self.strategy_choice.find_effective(&strategy_name);
            strategy.after_receive_data(self, &data, ingress, pit_id);

            if let Some(entry) = self.pit.entry_mut(pit_id) {
                entry.is_satisfied = true;
                entry.data_freshness_period = data.freshness_period;
            }
            self.insert_dead_nonce_list(pit_id, Some(ingress), now);
            if let Some(entry) = self.pit.entry_mut(pit_id) {
                entry.delete_out_record(ingress);
            }
        } else {
            // remember every pending downstream across the matched entries,
            // along with the token its Interest carried
            let mut pending: Vec<(FaceId, Option<u32>)> = Vec::new();

            for pit_id in pit_matches {
                let Some(entry) = self.pit.entry(pit_id) else {
                    continue;
                };
                debug!("onIncomingData matching={}", entry.name);
                for record in &entry.in_records {
                    if record.expiry > now && !pending.iter().any(|(f, _)| *f == record.face) {
                        pending.push((record.face, record.interest.tags.pit_token));
                    }
                }

                self.set_expiry_timer(pit_id, Duration::ZERO);

                let strategy_name = self.pit.entry(pit_id).expect("matched").name.clone();
                let strategy = self.strategy_choice.find_effective(&strategy_name);
                strategy.before_satisfy_interest(self, &data, ingress, pit_id);

                if let Some(entry) = self.pit.entry_mut(pit_id) {
                    entry.is_satisfied = true;
                    entry.data_freshness_period = data.freshness_period;
                }
                self.insert_dead_nonce_list(pit_id, Some(ingress), now);
                if let Some(entry) = self.pit.entry_mut(pit_id) {
                    entry.clear_in_records();
                    entry.delete_out_record(ingress);
                }
            }

            for (downstream, token) in pending {
                if downstream == ingress && ingress_link_type != LinkType::AdHoc {
                    continue;
                }
                let mut out = data.clone();
                out.tags.pit_token = token;
                self.on_outgoing_data(&out, downstream);
            }
        }
    }

    fn on_data_unsolicited(&mut self, ingress: FaceId, data: Data) {
        self.metrics.n_unsolicited_data.increment();
        debug!(
            "onDataUnsolicited in={} data={} policy={:?}",
            ingress, data.name, self.options.unsolicited_policy
        );
        if self.options.unsolicited_policy == UnsolicitedDataPolicy::CacheAll {
            self.cs.insert(data, true, Instant::now());
            self.metrics.cs_size.set(self.cs.len() as u64);
        }
    }

    pub(crate) fn on_outgoing_data(&mut self, data: &Data, egress: FaceId) -> bool {
        let Some(face) = self.faces.get(egress) else {
            warn!("onOutgoingData out=(invalid) data={}", data.name);
            return false;
        };

        if face.scope() == FaceScope::NonLocal && self.localhost_prefix.is_prefix_of(&data.name) {
            debug!("onOutgoingData out={} data={} violates /localhost", egress, data.name);
            return false;
        }

        debug!("onOutgoingData out={} data={}", egress, data.name);
        face.send(Packet::Data(data.clone()));
        self.metrics.n_out_data.increment();
        true
    }

    /// Sends `data` to every pending downstream of `pit_id` except the
    /// ingress face (unless the link is ad hoc), each copy labelled with
    /// the token that downstream's Interest carried.
    pub(crate) fn send_data_to_all(&mut self, pit_id: PitEntryId, ingress: FaceId, data: &Data) {
        let now = Instant::now();
        let ingress_link_type = self.faces.get(ingress).map(|f| f.link_type());
        let targets: Vec<(FaceId, Option<u32>)> = match self.pit.entry(pit_id) {
            Some(entry) => entry
                .in_records
                .iter()
                .filter(|r| r.expiry > now)
                .filter(|r| r.face != ingress || ingress_link_type == Some(LinkType::AdHoc))
                .map(|r| (r.face, r.interest.tags.pit_token))
                .collect(),
            None => return,
        };

        for (downstream, token) in targets {
            let mut out = data.clone();
            out.tags.pit_token = token;
            self.on_outgoing_data(&out, downstream);
        }
    }

    /* ------------------------------------------------------------ *
     * NACK pipelines
     * ------------------------------------------------------------ */

    fn on_incoming_nack(&mut self, ingress: FaceId, nack: Nack) {
        let now = Instant::now();
        self.metrics.n_in_nacks.increment();

        let face = self.faces.get(ingress).expect("checked in handle_packet");
        if face.link_type() != LinkType::PointToPoint {
            debug!(
                "onIncomingNack in={} nack={}~{} link-type={}",
                ingress,
                nack.interest.name,
                nack.reason,
                face.link_type()
            );
            return;
        }

        let Some(pit_id) = self.pit.find(&self.name_tree, &nack.interest) else {
            debug!("onIncomingNack in={} nack={}~{} no-pit-entry", ingress, nack.interest.name, nack.reason);
            return;
        };

        {
            let entry = self.pit.entry_mut(pit_id).expect("found above");
            let Some(out_record) = entry.out_record_mut(ingress) else {
                debug!("onIncomingNack in={} nack={}~{} no-out-record", ingress, nack.interest.name, nack.reason);
                return;
            };
            if out_record.last_nonce != nack.interest.nonce {
                debug!(
                    "onIncomingNack in={} nack={}~{} nonce-mismatch {}!={}",
                    ingress, nack.interest.name, nack.reason, nack.interest.nonce, out_record.last_nonce
                );
                return;
            }
            out_record.incoming_nack = Some(nack.reason);
        }

        debug!("onIncomingNack in={} nack={}~{}", ingress, nack.interest.name, nack.reason);

        // set PIT expiry timer to now when no out-record is still pending
        if !self.pit.entry(pit_id).expect("found above").has_pending_out_records(now) {
            self.set_expiry_timer(pit_id, Duration::ZERO);
        }

        let strategy_name = self.pit.entry(pit_id).expect("found above").name.clone();
        let strategy = self.strategy_choice.find_effective(&strategy_name);
        strategy.after_receive_nack(self, &nack, ingress, pit_id);
    }

    /// Builds a NACK from the in-record's Interest, erases the in-record,
    /// and sends. Requires a point-to-point egress with an in-record.
    pub(crate) fn on_outgoing_nack(
        &mut self,
        reason: NackReason,
        egress: FaceId,
        pit_id: PitEntryId,
    ) -> bool {
        let Some(face) = self.faces.get(egress) else {
            warn!("onOutgoingNack out=(invalid) reason={}", reason);
            return false;
        };
        if face.link_type() != LinkType::PointToPoint {
            debug!("onOutgoingNack out={} reason={} link-type={}", egress, reason, face.link_type());
            return false;
        }

        let interest = {
            let Some(entry) = self.pit.entry_mut(pit_id) else {
                return false;
            };
            let Some(in_record) = entry.in_record(egress) else {
                debug!("onOutgoingNack out={} reason={} no-in-record", egress, reason);
                return false;
            };
            let interest = in_record.interest.clone();
            entry.delete_in_record(egress);
            interest
        };

        debug!("onOutgoingNack out={} nack={}~{} OK", egress, interest.name, reason);
        let face = self.faces.get(egress).expect("checked above");
        face.send(Packet::Nack(Nack::new(interest, reason)));
        self.metrics.n_out_nacks.increment();
        true
    }

    /// NACK sent straight on a face, outside the outgoing-NACK pipeline;
    /// used where no in-record exists (loop NACKs, RI failures).
    fn send_nack_direct(&mut self, egress: FaceId, interest: Interest, reason: NackReason) {
        if let Some(face) = self.faces.get(egress) {
            face.send(Packet::Nack(Nack::new(interest, reason)));
            self.metrics.n_out_nacks.increment();
        }
    }

    /* ------------------------------------------------------------ *
     * PIT entry lifetime
     * ------------------------------------------------------------ */

    /// Rejects the pending Interest: the entry expires now.
    pub(crate) fn reject_pending_interest(&mut self, pit_id: PitEntryId) {
        self.set_expiry_timer(pit_id, Duration::ZERO);
    }

    /// (Re)schedules the entry's expiry; the previous schedule is
    /// superseded atomically via the epoch.
    fn set_expiry_timer(&mut self, pit_id: PitEntryId, after: Duration) {
        let Some(entry) = self.pit.entry_mut(pit_id) else {
            return;
        };
        entry.expiry_epoch += 1;
        let epoch = entry.expiry_epoch;
        self.scheduler.schedule(
            Instant::now() + after,
            TimerEvent::PitExpiry { entry: pit_id, epoch },
        );
    }

    fn on_interest_finalize(&mut self, pit_id: PitEntryId, now: Instant) {
        let Some(entry) = self.pit.entry(pit_id) else {
            return;
        };
        debug!(
            "onInterestFinalize interest={} {}",
            entry.name,
            if entry.is_satisfied { "satisfied" } else { "unsatisfied" }
        );

        self.insert_dead_nonce_list(pit_id, None, now);

        let entry = self.pit.entry(pit_id).expect("still live");
        if entry.is_satisfied {
            self.metrics.n_satisfied_interests.increment();
        } else {
            self.metrics.n_unsatisfied_interests.increment();
        }

        let name = entry.name.clone();
        self.pit.erase(&mut self.name_tree, pit_id);
        if self.pit.find_based_on_name(&self.name_tree, &name).is_none() {
            self.pit_assist.erase_name(&name);
        }
        self.metrics.pit_size.set(self.pit.len() as u64);
    }

    /// Inserts out-record Nonces into the Dead Nonce List when the entry's
    /// outcome requires it: always for unsatisfied entries, and for
    /// satisfied MustBeFresh entries whose Data was fresher than the DNL
    /// lifetime.
    fn insert_dead_nonce_list(&mut self, pit_id: PitEntryId, upstream: Option<FaceId>, now: Instant) {
        let Some(entry) = self.pit.entry(pit_id) else {
            return;
        };
        let need_dnl = if entry.is_satisfied {
            entry.interest.must_be_fresh && entry.data_freshness_period < self.dnl.lifetime()
        } else {
            true
        };
        if !need_dnl {
            return;
        }

        let additions: Vec<(Name, u32)> = match upstream {
            None => entry
                .out_records
                .iter()
                .map(|r| (entry.name.clone(), r.last_nonce))
                .collect(),
            Some(face) => entry
                .out_record(face)
                .map(|r| (entry.name.clone(), r.last_nonce))
                .into_iter()
                .collect(),
        };
        for (name, nonce) in additions {
            self.dnl.add(&name, nonce, now);
        }
    }

    /* ------------------------------------------------------------ *
     * Strategy support
     * ------------------------------------------------------------ */

    pub(crate) fn is_reflexive_from_producer(&self, interest: &Interest) -> bool {
        interest.is_reflexive_from_producer_with(&self.naming)
    }

    /// The FIB nexthops covering `pit_id`'s name, lowest cost first.
    pub(crate) fn lookup_fib_nexthops(&self, pit_id: PitEntryId) -> Vec<NextHop> {
        let Some(entry) = self.pit.entry(pit_id) else {
            return Vec::new();
        };
        self.fib
            .find_longest_prefix_match(&self.name_tree, &entry.name)
            .map(|fib_entry| fib_entry.nexthops.clone())
            .unwrap_or_default()
    }

    /// Whether `hop` may carry `interest` arriving from `ingress`:
    /// not the downstream itself (unless ad hoc), passing scope rules,
    /// and, when `want_unused`, without an existing out-record.
    pub(crate) fn is_next_hop_eligible(
        &self,
        ingress: FaceId,
        interest: &Interest,
        hop: &NextHop,
        pit_id: PitEntryId,
        want_unused: bool,
        _now: Instant,
    ) -> bool {
        let Some(face) = self.faces.get(hop.face) else {
            return false;
        };
        if hop.face == ingress && face.link_type() != LinkType::AdHoc {
            return false;
        }
        if face.scope() == FaceScope::NonLocal && self.localhost_prefix.is_prefix_of(&interest.name)
        {
            return false;
        }
        if want_unused {
            let used = self
                .pit
                .entry(pit_id)
                .is_some_and(|entry| entry.out_record(hop.face).is_some());
            if used {
                return false;
            }
        }
        true
    }

    fn on_new_next_hop(&mut self, prefix: &Name, next_hop: NextHop) {
        // only PIT entries whose covering FIB entry is this prefix are
        // affected; entries captured by a longer registered prefix are not
        let stripped = prefix.strip_reflexive();
        let affected: Vec<(PitEntryId, Name)> = self
            .pit
            .iter()
            .filter(|entry| {
                prefix.is_prefix_of(&entry.name)
                    && self
                        .fib
                        .find_longest_prefix_match(&self.name_tree, &entry.name)
                        .is_some_and(|fib_entry| fib_entry.prefix == stripped)
            })
            .map(|entry| (entry.id, entry.name.clone()))
            .collect();

        for (pit_id, name) in affected {
            let strategy = self.strategy_choice.find_effective(&name);
            strategy.after_new_next_hop(self, &next_hop, pit_id);
        }
    }

    fn is_in_producer_region(&self, hints: &[Name]) -> bool {
        hints
            .iter()
            .any(|hint| self.network_regions.iter().any(|region| region.is_prefix_of(hint)))
    }

    /* ------------------------------------------------------------ *
     * Read-side helpers for management and tests
     * ------------------------------------------------------------ */

    pub fn pit_find(&self, interest: &Interest) -> Option<&PitEntry> {
        self.pit
            .find(&self.name_tree, interest)
            .and_then(|id| self.pit.entry(id))
    }

    pub fn pit_find_based_on_name(&self, name: &Name) -> Option<&PitEntry> {
        self.pit
            .find_based_on_name(&self.name_tree, name)
            .and_then(|id| self.pit.entry(id))
    }

    pub fn fib_entries(&self) -> Vec<crate::tables::fib::FibEntry> {
        self.fib
            .entries(&self.name_tree)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id)
    }
}
