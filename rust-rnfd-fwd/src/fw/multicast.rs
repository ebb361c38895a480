//! The multicast strategy: forward to every eligible FIB nexthop, with
//! per-upstream retransmission suppression.

use crate::fw::retx::{RetxSuppression, SuppressionResult};
use crate::fw::strategy::{self, Strategy};
use crate::fw::Forwarder;
use crate::tables::fib::NextHop;
use crate::tables::pit::PitEntryId;
use log::debug;
use rust_rnfd_common::name::NameComponent;
use rust_rnfd_common::packet::{Interest, Nack};
use rust_rnfd_common::{Error, FaceId, Name};
use std::rc::Rc;
use std::time::Instant;

pub struct MulticastStrategy {
    instance_name: Name,
    suppression: RetxSuppression,
}

impl MulticastStrategy {
    pub const VERSION: u64 = 4;

    pub fn strategy_base_name() -> Name {
        Name::from_uri("/localhost/rnfd/strategy/multicast").unwrap()
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

impl Strategy for MulticastStrategy {
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
        for hop in fw.lookup_fib_nexthops(pit_entry) {
            let suppress_result = match fw.pit.entry(pit_entry) {
                Some(entry) => self.suppression.decide_per_upstream(entry, hop.face, now),
                None => return,
            };
            if suppress_result == SuppressionResult::Suppress {
                debug!("multicast in={} interest={} to={} suppressed", ingress, interest.name, hop.face);
                continue;
            }
            if !fw.is_next_hop_eligible(ingress, &interest, &hop, pit_entry, false, now) {
                continue;
            }

            debug!("multicast in={} interest={} to={}", ingress, interest.name, hop.face);
            let sent = fw.on_outgoing_interest(interest.clone(), hop.face, pit_entry);
            if sent && suppress_result == SuppressionResult::Forward {
                if let Some(record) = fw
                    .pit
                    .entry_mut(pit_entry)
                    .and_then(|entry| entry.out_record_mut(hop.face))
                {
                    self.suppression.increment_interval_for_out_record(record);
                }
            }
        }
    }

    fn after_new_next_hop(&self, fw: &mut Forwarder, next_hop: &NextHop, pit_entry: PitEntryId) {
        // no suppression check: this upstream is brand new
        let now = Instant::now();
        let Some((interest, in_faces)) = fw.pit.entry(pit_entry).map(|entry| {
            (
                entry.interest.clone(),
                entry.in_records.iter().map(|r| r.face).collect::<Vec<_>>(),
            )
        }) else {
            return;
        };

        // one eligible incoming face record is enough
        for in_face in in_faces {
            if fw.is_next_hop_eligible(in_face, &interest, next_hop, pit_entry, false, now) {
                debug!(
                    "multicast new-nexthop interest={} to={}",
                    interest.name, next_hop.face
                );
                fw.on_outgoing_interest(interest, next_hop.face, pit_entry);
                break;
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
