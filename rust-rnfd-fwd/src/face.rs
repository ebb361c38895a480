//! The face table: the forwarder-side registry of packet endpoints.
//!
//! A `Face` here is the forwarder's handle on a bidirectional endpoint: its
//! scope and link type drive the pipeline scope checks, and its unbounded
//! egress queue decouples pipeline execution from socket writes. The I/O
//! tasks that feed and drain a face live in the transport crate.

use log::debug;
use rust_rnfd_common::metrics::FaceCounters;
use rust_rnfd_common::packet::Packet;
use rust_rnfd_common::types::{FaceId, FaceScope, LinkType};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// The pseudo-face Data satisfied from the Content Store is tagged with.
pub const FACEID_CONTENT_STORE: FaceId = FaceId(254);

/// Ids below this are reserved for pseudo-faces.
const FACEID_RESERVED_MAX: u64 = 255;

#[derive(Debug)]
pub struct Face {
    id: FaceId,
    uri: String,
    scope: FaceScope,
    link_type: LinkType,
    tx: mpsc::UnboundedSender<Packet>,
    pub counters: FaceCounters,
}

impl Face {
    pub fn id(&self) -> FaceId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn scope(&self) -> FaceScope {
        self.scope
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Queues a packet for transmission. Returns false when the face's
    /// writer is gone; the caller treats that like a closed face.
    pub fn send(&self, packet: Packet) -> bool {
        match self.tx.send(packet) {
            Ok(()) => {
                self.counters.n_out_packets.increment();
                true
            }
            Err(_) => {
                debug!("{} send failed, writer gone", self.id);
                false
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct FaceTable {
    faces: BTreeMap<FaceId, Face>,
    next_id: u64,
}

impl FaceTable {
    pub fn new() -> Self {
        Self {
            faces: BTreeMap::new(),
            next_id: FACEID_RESERVED_MAX + 1,
        }
    }

    pub fn add(
        &mut self,
        uri: String,
        scope: FaceScope,
        link_type: LinkType,
        tx: mpsc::UnboundedSender<Packet>,
    ) -> FaceId {
        let id = FaceId(self.next_id);
        self.next_id += 1;
        debug!("{} added uri={} scope={} link-type={}", id, uri, scope, link_type);
        self.faces.insert(
            id,
            Face {
                id,
                uri,
                scope,
                link_type,
                tx,
                counters: FaceCounters::default(),
            },
        );
        id
    }

    pub fn get(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(&id)
    }

    pub fn remove(&mut self, id: FaceId) -> Option<Face> {
        let face = self.faces.remove(&id);
        if face.is_some() {
            debug!("{} removed", id);
        }
        face
    }

    pub fn iter(&self) -> impl Iterator<Item = &Face> {
        self.faces.values()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
