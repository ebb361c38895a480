//! NDN packet types and link-layer framing.
//!
//! `Interest`, `Data`, and `Nack` are the three network-layer packet
//! classes. Each carries a set of hop-local tags that are never part of the
//! network packet itself; the PitToken tag is the one tag that does travel,
//! inside the link-protocol (LP) header as a 4-byte little-endian integer.

use crate::error::Error;
use crate::name::{Name, NamingContext};
use crate::tlv::{self, TlvElement};
use crate::types::FaceId;
use bytes::{Buf, Bytes, BytesMut};
use std::fmt;
use std::time::Duration;

/// Default InterestLifetime when the packet does not carry one.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_millis(4000);

/// Hop-local packet tags. Not wire-encoded by the forwarder, except the
/// PitToken which is re-emitted in the LP header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    /// The face this packet arrived on.
    pub incoming_face: Option<FaceId>,
    /// Privileged override of the next-hop choice.
    pub next_hop_face: Option<FaceId>,
    /// Opaque per-hop token correlating a packet with a PIT entry.
    pub pit_token: Option<u32>,
}

/* ---------------------------------------------------------------- *\
 * Interest
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub nonce: u32,
    pub lifetime: Duration,
    pub hop_limit: Option<u8>,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub forwarding_hint: Vec<Name>,
    pub tags: Tags,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            nonce: rand::random(),
            lifetime: DEFAULT_INTEREST_LIFETIME,
            hop_limit: None,
            can_be_prefix: false,
            must_be_fresh: false,
            forwarding_hint: Vec::new(),
            tags: Tags::default(),
        }
    }

    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }
    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = Some(hop_limit);
        self
    }
    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }
    pub fn with_pit_token(mut self, token: u32) -> Self {
        self.tags.pit_token = Some(token);
        self
    }

    /// True when the name contains a reflexive component.
    pub fn is_reflexive(&self) -> bool {
        self.name.is_reflexive()
    }

    /// True when this Interest is a producer-originated reflexive Interest,
    /// i.e. the name is reflexive and carries the producer-RI sentinel.
    pub fn is_reflexive_from_producer_with(&self, ctx: &NamingContext) -> bool {
        self.name.is_reflexive() && self.name.has_producer_sentinel(ctx)
    }

    /// [`Self::is_reflexive_from_producer_with`] under the default naming
    /// conventions.
    pub fn is_reflexive_from_producer(&self) -> bool {
        self.is_reflexive_from_producer_with(&NamingContext::default())
    }

    pub fn to_wire(&self) -> Bytes {
        let mut inner = BytesMut::new();
        self.name.to_tlv().encode(&mut inner);
        if self.can_be_prefix {
            TlvElement::new(tlv::TLV_CAN_BE_PREFIX, Bytes::new()).encode(&mut inner);
        }
        if self.must_be_fresh {
            TlvElement::new(tlv::TLV_MUST_BE_FRESH, Bytes::new()).encode(&mut inner);
        }
        if !self.forwarding_hint.is_empty() {
            let mut hint = BytesMut::new();
            for delegation in &self.forwarding_hint {
                delegation.to_tlv().encode(&mut hint);
            }
            TlvElement::new(tlv::TLV_FORWARDING_HINT, hint.freeze()).encode(&mut inner);
        }
        TlvElement::new(tlv::TLV_NONCE, Bytes::copy_from_slice(&self.nonce.to_be_bytes()))
            .encode(&mut inner);
        TlvElement::new(
            tlv::TLV_INTEREST_LIFETIME,
            tlv::encode_nonneg_integer(self.lifetime.as_millis() as u64),
        )
        .encode(&mut inner);
        if let Some(hop_limit) = self.hop_limit {
            TlvElement::new(tlv::TLV_HOP_LIMIT, Bytes::copy_from_slice(&[hop_limit]))
                .encode(&mut inner);
        }

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_INTEREST, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::Packet(format!(
                "Expected Interest TLV type {}, got {}",
                tlv::TLV_INTEREST,
                element.tlv_type
            )));
        }

        let mut buf = element.value.clone();
        let name = Name::from_wire(&mut buf)?;

        let mut interest = Interest {
            name,
            nonce: 0,
            lifetime: DEFAULT_INTEREST_LIFETIME,
            hop_limit: None,
            can_be_prefix: false,
            must_be_fresh: false,
            forwarding_hint: Vec::new(),
            tags: Tags::default(),
        };

        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf)?;
            match e.tlv_type {
                tlv::TLV_CAN_BE_PREFIX => interest.can_be_prefix = true,
                tlv::TLV_MUST_BE_FRESH => interest.must_be_fresh = true,
                tlv::TLV_FORWARDING_HINT => {
                    let mut hint = e.value.clone();
                    while hint.has_remaining() {
                        interest.forwarding_hint.push(Name::from_wire(&mut hint)?);
                    }
                }
                tlv::TLV_NONCE => {
                    if e.value.len() != 4 {
                        return Err(Error::Packet("Nonce must be 4 bytes".into()));
                    }
                    interest.nonce =
                        u32::from_be_bytes([e.value[0], e.value[1], e.value[2], e.value[3]]);
                }
                tlv::TLV_INTEREST_LIFETIME => {
                    interest.lifetime = Duration::from_millis(e.as_nonneg_integer()?);
                }
                tlv::TLV_HOP_LIMIT => {
                    if e.value.len() != 1 {
                        return Err(Error::Packet("HopLimit must be 1 byte".into()));
                    }
                    interest.hop_limit = Some(e.value[0]);
                }
                _ => {} // unrecognised non-critical element
            }
        }

        Ok(interest)
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} nonce={}", self.name, self.nonce)
    }
}

/* ---------------------------------------------------------------- *\
 * Data
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub freshness_period: Duration,
    pub content: Bytes,
    /// Opaque signature blob; signing and validation happen elsewhere.
    pub signature: Bytes,
    pub tags: Tags,
}

impl Data {
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            freshness_period: Duration::ZERO,
            content: content.into(),
            signature: Bytes::new(),
            tags: Tags::default(),
        }
    }

    pub fn with_freshness_period(mut self, freshness_period: Duration) -> Self {
        self.freshness_period = freshness_period;
        self
    }

    pub fn with_signature(mut self, signature: impl Into<Bytes>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn to_wire(&self) -> Bytes {
        let mut inner = BytesMut::new();
        self.name.to_tlv().encode(&mut inner);

        let mut meta = BytesMut::new();
        if !self.freshness_period.is_zero() {
            TlvElement::new(
                tlv::TLV_FRESHNESS_PERIOD,
                tlv::encode_nonneg_integer(self.freshness_period.as_millis() as u64),
            )
            .encode(&mut meta);
        }
        TlvElement::new(tlv::TLV_META_INFO, meta.freeze()).encode(&mut inner);
        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(&mut inner);
        TlvElement::new(tlv::TLV_SIGNATURE_VALUE, self.signature.clone()).encode(&mut inner);

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_DATA, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_DATA {
            return Err(Error::Packet(format!(
                "Expected Data TLV type {}, got {}",
                tlv::TLV_DATA,
                element.tlv_type
            )));
        }

        let mut buf = element.value.clone();
        let name = Name::from_wire(&mut buf)?;
        let mut data = Data::new(name, Bytes::new());

        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf)?;
            match e.tlv_type {
                tlv::TLV_META_INFO => {
                    let mut meta = e.value.clone();
                    while meta.has_remaining() {
                        let m = TlvElement::decode(&mut meta)?;
                        if m.tlv_type == tlv::TLV_FRESHNESS_PERIOD {
                            data.freshness_period = Duration::from_millis(m.as_nonneg_integer()?);
                        }
                    }
                }
                tlv::TLV_CONTENT => data.content = e.value.clone(),
                tlv::TLV_SIGNATURE_VALUE => data.signature = e.value.clone(),
                _ => {}
            }
        }

        Ok(data)
    }
}

/* ---------------------------------------------------------------- *\
 * Nack
\* ---------------------------------------------------------------- */

/// Reason carried in a NACK, with the NFD code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    None,
    Congestion,
    Duplicate,
    NoRoute,
}

impl NackReason {
    pub fn code(self) -> u64 {
        match self {
            NackReason::None => 0,
            NackReason::Congestion => 50,
            NackReason::Duplicate => 100,
            NackReason::NoRoute => 150,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            50 => NackReason::Congestion,
            100 => NackReason::Duplicate,
            150 => NackReason::NoRoute,
            _ => NackReason::None,
        }
    }

    /// The less severe of two reasons. `None` (unspecified) is treated as
    /// most severe; among the rest, a lower code is less severe.
    pub fn least_severe(a: Self, b: Self) -> Self {
        match (a, b) {
            (NackReason::None, _) => b,
            (_, NackReason::None) => a,
            _ => {
                if a.code() <= b.code() {
                    a
                } else {
                    b
                }
            }
        }
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NackReason::None => write!(f, "None"),
            NackReason::Congestion => write!(f, "Congestion"),
            NackReason::Duplicate => write!(f, "Duplicate"),
            NackReason::NoRoute => write!(f, "NoRoute"),
        }
    }
}

/// A NACK wraps the Interest being refused plus a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nack {
    pub interest: Interest,
    pub reason: NackReason,
}

impl Nack {
    pub fn new(interest: Interest, reason: NackReason) -> Self {
        Self { interest, reason }
    }
}

/* ---------------------------------------------------------------- *\
 * LP framing
\* ---------------------------------------------------------------- */

/// A link-layer frame: one of the three network packets, possibly wrapped
/// in an LP packet carrying the PitToken and/or the Nack header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
    Nack(Nack),
}

impl Packet {
    pub fn name(&self) -> &Name {
        match self {
            Packet::Interest(i) => &i.name,
            Packet::Data(d) => &d.name,
            Packet::Nack(n) => &n.interest.name,
        }
    }

    fn pit_token(&self) -> Option<u32> {
        match self {
            Packet::Interest(i) => i.tags.pit_token,
            Packet::Data(d) => d.tags.pit_token,
            Packet::Nack(n) => n.interest.tags.pit_token,
        }
    }

    /// Encodes the frame. Packets without LP headers are emitted bare;
    /// a PitToken or a Nack forces the LP wrapper.
    pub fn to_wire(&self) -> Bytes {
        let (fragment, nack_reason) = match self {
            Packet::Interest(i) => (i.to_wire(), None),
            Packet::Data(d) => (d.to_wire(), None),
            Packet::Nack(n) => (n.interest.to_wire(), Some(n.reason)),
        };

        let pit_token = self.pit_token();
        if pit_token.is_none() && nack_reason.is_none() {
            return fragment;
        }

        let mut inner = BytesMut::new();
        if let Some(token) = pit_token {
            // the PitToken travels as a 4-byte little-endian integer
            TlvElement::new(tlv::TLV_LP_PIT_TOKEN, Bytes::copy_from_slice(&token.to_le_bytes()))
                .encode(&mut inner);
        }
        if let Some(reason) = nack_reason {
            let mut nack = BytesMut::new();
            TlvElement::new(tlv::TLV_LP_NACK_REASON, tlv::encode_nonneg_integer(reason.code()))
                .encode(&mut nack);
            TlvElement::new(tlv::TLV_LP_NACK, nack.freeze()).encode(&mut inner);
        }
        TlvElement::new(tlv::TLV_LP_FRAGMENT, fragment).encode(&mut inner);

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_LP_PACKET, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    /// Decodes one frame. The PitToken header, when present, is attached to
    /// the inner packet as a tag.
    pub fn from_wire(wire: &mut impl Buf) -> Result<Self, Error> {
        let element = TlvElement::decode(wire)?;
        match element.tlv_type {
            tlv::TLV_INTEREST => Ok(Packet::Interest(Interest::from_tlv(&element)?)),
            tlv::TLV_DATA => Ok(Packet::Data(Data::from_tlv(&element)?)),
            tlv::TLV_LP_PACKET => {
                let mut pit_token = None;
                let mut nack_reason = None;
                let mut fragment = None;

                let mut buf = element.value.clone();
                while buf.has_remaining() {
                    let e = TlvElement::decode(&mut buf)?;
                    match e.tlv_type {
                        tlv::TLV_LP_PIT_TOKEN => {
                            if e.value.len() != 4 {
                                return Err(Error::Packet("PitToken must be 4 bytes".into()));
                            }
                            pit_token = Some(u32::from_le_bytes([
                                e.value[0], e.value[1], e.value[2], e.value[3],
                            ]));
                        }
                        tlv::TLV_LP_NACK => {
                            let mut nack = e.value.clone();
                            let mut reason = NackReason::None;
                            while nack.has_remaining() {
                                let r = TlvElement::decode(&mut nack)?;
                                if r.tlv_type == tlv::TLV_LP_NACK_REASON {
                                    reason = NackReason::from_code(r.as_nonneg_integer()?);
                                }
                            }
                            nack_reason = Some(reason);
                        }
                        tlv::TLV_LP_FRAGMENT => fragment = Some(e.value.clone()),
                        _ => {}
                    }
                }

                let mut fragment =
                    fragment.ok_or_else(|| Error::Packet("LpPacket without fragment".into()))?;
                let inner = TlvElement::decode(&mut fragment)?;
                match (inner.tlv_type, nack_reason) {
                    (tlv::TLV_INTEREST, Some(reason)) => {
                        let mut interest = Interest::from_tlv(&inner)?;
                        interest.tags.pit_token = pit_token;
                        Ok(Packet::Nack(Nack::new(interest, reason)))
                    }
                    (tlv::TLV_INTEREST, None) => {
                        let mut interest = Interest::from_tlv(&inner)?;
                        interest.tags.pit_token = pit_token;
                        Ok(Packet::Interest(interest))
                    }
                    (tlv::TLV_DATA, None) => {
                        let mut data = Data::from_tlv(&inner)?;
                        data.tags.pit_token = pit_token;
                        Ok(Packet::Data(data))
                    }
                    (t, _) => Err(Error::Packet(format!("unexpected LP fragment type {}", t))),
                }
            }
            t => Err(Error::Packet(format!("unknown packet type {}", t))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::NameComponent;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn interest_wire_round_trip() {
        let interest = Interest::new(name("/test/interest"))
            .with_nonce(42)
            .with_lifetime(Duration::from_millis(2000))
            .with_hop_limit(16)
            .with_can_be_prefix(true)
            .with_must_be_fresh(true);

        let wire = interest.to_wire();
        let parsed = match Packet::from_wire(&mut wire.clone()).unwrap() {
            Packet::Interest(i) => i,
            other => panic!("expected Interest, got {:?}", other),
        };

        assert_eq!(parsed.name, interest.name);
        assert_eq!(parsed.nonce, 42);
        assert_eq!(parsed.lifetime, Duration::from_millis(2000));
        assert_eq!(parsed.hop_limit, Some(16));
        assert!(parsed.can_be_prefix);
        assert!(parsed.must_be_fresh);
    }

    #[test]
    fn pit_token_rides_the_lp_header_little_endian() {
        let interest = Interest::new(name("/a")).with_nonce(1).with_pit_token(0x00000929);
        let wire = interest_frame(&interest);

        // the 4 token bytes appear little-endian in the frame
        let token_bytes = [0x29, 0x09, 0x00, 0x00];
        assert!(wire.as_ref().windows(4).any(|w| w == token_bytes));

        let parsed = match Packet::from_wire(&mut wire.clone()).unwrap() {
            Packet::Interest(i) => i,
            other => panic!("expected Interest, got {:?}", other),
        };
        assert_eq!(parsed.tags.pit_token, Some(0x00000929));
    }

    fn interest_frame(interest: &Interest) -> Bytes {
        Packet::Interest(interest.clone()).to_wire()
    }

    #[test]
    fn data_wire_round_trip() {
        let data = Data::new(name("/test/data"), Bytes::from_static(b"Hello, NDN!"))
            .with_freshness_period(Duration::from_millis(10_000))
            .with_signature(Bytes::from_static(&[0u8; 32]));

        let wire = Packet::Data(data.clone()).to_wire();
        let parsed = match Packet::from_wire(&mut wire.clone()).unwrap() {
            Packet::Data(d) => d,
            other => panic!("expected Data, got {:?}", other),
        };
        assert_eq!(parsed.name, data.name);
        assert_eq!(parsed.content, data.content);
        assert_eq!(parsed.freshness_period, data.freshness_period);
        assert_eq!(parsed.signature, data.signature);
    }

    #[test]
    fn nack_wire_round_trip() {
        let nack = Nack::new(Interest::new(name("/n")).with_nonce(7), NackReason::NoRoute);
        let wire = Packet::Nack(nack.clone()).to_wire();
        let parsed = match Packet::from_wire(&mut wire.clone()).unwrap() {
            Packet::Nack(n) => n,
            other => panic!("expected Nack, got {:?}", other),
        };
        assert_eq!(parsed.reason, NackReason::NoRoute);
        assert_eq!(parsed.interest.name, nack.interest.name);
        assert_eq!(parsed.interest.nonce, 7);
    }

    #[test]
    fn nack_severity_order() {
        use NackReason::*;
        assert_eq!(NackReason::least_severe(Congestion, NoRoute), Congestion);
        assert_eq!(NackReason::least_severe(NoRoute, Duplicate), Duplicate);
        assert_eq!(NackReason::least_severe(None, NoRoute), NoRoute);
        assert_eq!(NackReason::least_severe(None, None), None);
    }

    #[test]
    fn producer_ri_predicate() {
        let ctx = NamingContext::default();
        let ri_name = name("/testApp/reflect").appending(NameComponent::producer_sentinel(&ctx));
        let ri = Interest::new(ri_name);
        assert!(ri.is_reflexive());
        assert!(ri.is_reflexive_from_producer());

        let plain_reflexive = Interest::new(Name::from_uri_reflexive("/example/testApp/1234").unwrap());
        assert!(plain_reflexive.is_reflexive());
        assert!(!plain_reflexive.is_reflexive_from_producer());
    }
}
