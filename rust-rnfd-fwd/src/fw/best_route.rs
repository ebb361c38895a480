//! The default best-route strategy.
//!
//! Forwards to the lowest-cost eligible nexthop, with exponential
//! retransmission suppression. A producer-originated reflexive Interest is
//! special: the PIT entry handed in is the *original* exchange's entry, and
//! the egress is that entry's first in-record (the face the original
//! consumer sits on), with no FIB consultation at all.

use crate::fw::retx::{RetxSuppression, SuppressionResult};
use crate::fw::strategy::{self, Strategy};
use crate::fw::Forwarder;
use crate::tables::pit::PitEntryId;
use log::debug;
use rust_rnfd_common::name::NameComponent;
use rust_rnfd_common::packet::{Interest, Nack, NackReason};
use rust_rnfd_common::{Error, FaceId, Name};
use std::rc::Rc;
use std::time::Instant;

pub struct BestRouteStrategy {
    instance_name: Name,
    suppression: RetxSuppression,
}

impl BestRouteStrategy {
    pub const VERSION: u64 = 5;

    pub fn strategy_base_name() -> Name {
        Name::from_uri("/localhost/rnfd/strategy/best-route").unwrap()
    }

    pub fn strategy_name() -> Name {
        Self::strategy_base_name().appending(NameComponent::version(Self::VERSION))
    }

    pub fn factory(instance_name: &Name) -> Result<Rc<dyn Strategy>, Error> {
        let parsed = strategy::parse_instance_name(instance_name);
        let instance_name = strategy::make_instance_name(&parsed, &Self::strategy_name())?;
        Ok(Rc::new(Self {
            instance_name,
            suppression: RetxSuppression::default(),
        }))
    }
}

impl Strategy for BestRouteStrategy {
    fn instance_name(&self) -> &Name {
        &self.instance_name
    }

    fn after_receive_interest(
        &self,
        fw: &mut Forwarder,
        interest: Interest,
        ingress: FaceId,
        pit_entry: PitEntryId,
    ) {
        let now = Instant::now();

        if fw.is_reflexive_from_producer(&interest) {
            // `pit_entry` is the original exchange's entry; its first
            // in-record is the consumer-facing egress. The FIB plays no
            // part in routing the reflexive Interest.
            let out_face = fw
                .pit
                .entry(pit_entry)
                .and_then(|entry| entry.in_records.first())
                .map(|record| record.face);
            match out_face {
                Some(out_face) => {
                    debug!(
                        "best-route reflexive-from-producer in={} to={} interest={}",
                        ingress, out_face, interest.name
                    );
                    fw.on_outgoing_interest(interest, out_face, pit_entry);
                }
                None => {
                    debug!(
                        "best-route reflexive-from-producer in={} interest={} no original downstream",
                        ingress, interest.name
                    );
                    fw.on_outgoing_nack(NackReason::NoRoute, ingress, pit_entry);
                    fw.reject_pending_interest(pit_entry);
                }
            }
            return;
        }

        let suppression = match fw.pit.entry_mut(pit_entry) {
            Some(entry) => self.suppression.decide_per_pit_entry(entry, now),
            None => return,
        };
        if suppression == SuppressionResult::Suppress {
            debug!("best-route in={} interest={} suppressed", ingress, interest.name);
            return;
        }

        let nexthops = fw.lookup_fib_nexthops(pit_entry);

        if suppression == SuppressionResult::New {
            // forward to the lowest-cost nexthop except the downstream
            let chosen = nexthops
                .iter()
                .find(|hop| fw.is_next_hop_eligible(ingress, &interest, hop, pit_entry, false, now));
            match chosen {
                Some(hop) => {
                    debug!("best-route in={} interest={} new to={}", ingress, interest.name, hop.face);
                    fw.on_outgoing_interest(interest, hop.face, pit_entry);
                }
                None => {
                    debug!("best-route in={} interest={} new no-nexthop", ingress, interest.name);
                    fw.on_outgoing_nack(NackReason::NoRoute, ingress, pit_entry);
                    fw.reject_pending_interest(pit_entry);
                }
            }
            return;
        }

        // retransmission: prefer an unused upstream of lowest cost
        if let Some(hop) = nexthops
            .iter()
            .find(|hop| fw.is_next_hop_eligible(ingress, &interest, hop, pit_entry, true, now))
        {
            debug!("best-route in={} interest={} retx unused-to={}", ingress, interest.name, hop.face);
            fw.on_outgoing_interest(interest, hop.face, pit_entry);
            return;
        }

        // else the eligible upstream with the earliest out-record
        let earliest = nexthops
            .iter()
            .filter(|hop| fw.is_next_hop_eligible(ingress, &interest, hop, pit_entry, false, now))
            .min_by_key(|hop| {
                fw.pit
                    .entry(pit_entry)
                    .and_then(|entry| entry.out_record(hop.face))
                    .map(|record| record.last_renewed)
            });
        match earliest {
            Some(hop) => {
                debug!("best-route in={} interest={} retx retry-to={}", ingress, interest.name, hop.face);
                fw.on_outgoing_interest(interest, hop.face, pit_entry);
            }
            None => {
                debug!("best-route in={} interest={} retx no-nexthop", ingress, interest.name);
            }
        }
    }

    fn after_receive_nack(
        &self,
        fw: &mut Forwarder,
        nack: &Nack,
        ingress: FaceId,
        pit_entry: PitEntryId,
    ) {
        strategy::process_nack(fw, nack, ingress, pit_entry);
    }
}
