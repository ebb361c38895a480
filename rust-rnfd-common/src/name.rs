//! Hierarchical NDN names with reflexive components.
//!
//! A name is an ordered sequence of typed components. One component type,
//! [`REFLEXIVE_COMPONENT`], marks a name as *reflexive*: prefix matching
//! strips reflexive components from both sides before comparing, so a
//! producer-originated reflexive Interest can be paired with the filter the
//! consumer registered. Equality and ordering never strip.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest TLV type usable for a name component.
pub const NAME_COMPONENT_MIN: u64 = 1;
/// Largest TLV type usable for a name component.
pub const NAME_COMPONENT_MAX: u64 = 65535;

/// ImplicitSha256DigestComponent.
pub const IMPLICIT_DIGEST_COMPONENT: u64 = 0x01;
/// ParametersSha256DigestComponent.
pub const PARAMETERS_DIGEST_COMPONENT: u64 = 0x02;
/// GenericNameComponent.
pub const GENERIC_COMPONENT: u64 = 0x08;
/// VersionNameComponent.
pub const VERSION_COMPONENT: u64 = 0x36;
/// ReflexiveNameComponent (TLV-RN).
pub const REFLEXIVE_COMPONENT: u64 = 201;

/// The producer-RI discriminator: a reflexive component whose numeric value
/// is this sentinel marks an Interest as traveling from the producer back
/// toward the consumer. The big-endian bytes spell "9999".
pub const REFLEXIVE_SENTINEL: u64 = 960051513;

/// Marker octet for the marker-based number convention.
const SEGMENT_MARKER: u8 = 0x00;

/// How numeric name components are encoded and recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// `[marker, number...]` inside a generic-style component value.
    Marker,
    /// The bare non-negative integer; the component type says what it is.
    Typed,
}

/// Encoding/decoding conventions for numeric components, passed into the
/// codec operations instead of living in process-global flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingContext {
    pub encoding: Convention,
    pub decoding: Convention,
}

impl Default for NamingContext {
    fn default() -> Self {
        Self {
            encoding: Convention::Typed,
            decoding: Convention::Typed,
        }
    }
}

impl NamingContext {
    /// Encodes `number` as the value of a numeric component.
    pub fn encode_number(&self, number: u64) -> Bytes {
        match self.encoding {
            Convention::Typed => tlv::encode_nonneg_integer(number),
            Convention::Marker => {
                let mut buf = BytesMut::new();
                buf.extend_from_slice(&[SEGMENT_MARKER]);
                buf.extend_from_slice(&tlv::encode_nonneg_integer(number));
                buf.freeze()
            }
        }
    }

    /// Decodes a numeric component value, or `None` when the value does not
    /// follow the decoding convention.
    pub fn decode_number(&self, value: &[u8]) -> Option<u64> {
        match self.decoding {
            Convention::Typed => tlv::decode_nonneg_integer(value).ok(),
            Convention::Marker => {
                if value.first() != Some(&SEGMENT_MARKER) {
                    return None;
                }
                tlv::decode_nonneg_integer(&value[1..]).ok()
            }
        }
    }
}

/* ---------------------------------------------------------------- *\
 * NameComponent
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent {
    typ: u64,
    value: Bytes,
}

impl NameComponent {
    /// Creates a component, rejecting TLV types outside the valid range.
    pub fn new(typ: u64, value: impl Into<Bytes>) -> Result<Self, Error> {
        if !(NAME_COMPONENT_MIN..=NAME_COMPONENT_MAX).contains(&typ) {
            return Err(Error::InvalidComponent(typ));
        }
        Ok(Self {
            typ,
            value: value.into(),
        })
    }

    /// Creates a GenericNameComponent.
    pub fn generic(value: impl Into<Bytes>) -> Self {
        Self {
            typ: GENERIC_COMPONENT,
            value: value.into(),
        }
    }

    /// Creates a ReflexiveNameComponent.
    pub fn reflexive(value: impl Into<Bytes>) -> Self {
        Self {
            typ: REFLEXIVE_COMPONENT,
            value: value.into(),
        }
    }

    /// Creates a numeric ReflexiveNameComponent under `ctx`'s convention.
    pub fn reflexive_number(number: u64, ctx: &NamingContext) -> Self {
        Self::reflexive(ctx.encode_number(number))
    }

    /// The producer-RI sentinel component.
    pub fn producer_sentinel(ctx: &NamingContext) -> Self {
        Self::reflexive_number(REFLEXIVE_SENTINEL, ctx)
    }

    /// A VersionNameComponent carrying `version`.
    pub fn version(version: u64) -> Self {
        Self {
            typ: VERSION_COMPONENT,
            value: tlv::encode_nonneg_integer(version),
        }
    }

    /// Interprets a VersionNameComponent, or `None` for other types.
    pub fn as_version(&self) -> Option<u64> {
        if self.typ != VERSION_COMPONENT {
            return None;
        }
        tlv::decode_nonneg_integer(&self.value).ok()
    }

    pub fn typ(&self) -> u64 {
        self.typ
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// True when this component's type is ReflexiveNameComponent.
    pub fn is_reflexive(&self) -> bool {
        self.typ == REFLEXIVE_COMPONENT
    }

    /// True when this is a reflexive component carrying the producer-RI
    /// sentinel number.
    pub fn is_producer_sentinel(&self, ctx: &NamingContext) -> bool {
        self.is_reflexive() && ctx.decode_number(&self.value) == Some(REFLEXIVE_SENTINEL)
    }

    /// Interprets the value as a number under `ctx`'s decoding convention.
    pub fn as_number(&self, ctx: &NamingContext) -> Option<u64> {
        ctx.decode_number(&self.value)
    }

    /// The component whose value sorts immediately after this one.
    pub fn successor(&self) -> Self {
        let mut value = self.value.to_vec();
        for byte in value.iter_mut().rev() {
            let (incremented, overflow) = byte.overflowing_add(1);
            *byte = incremented;
            if !overflow {
                return Self {
                    typ: self.typ,
                    value: value.into(),
                };
            }
        }
        // all bytes carried over; the successor is one byte longer
        value.push(0);
        Self {
            typ: self.typ,
            value: value.into(),
        }
    }

    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(self.typ, self.value.clone())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        Self::new(element.tlv_type, element.value.clone())
    }

    /// Parses one URI segment. A leading `<number>=` selects the component
    /// type; without it the segment is a GenericNameComponent.
    pub fn from_escaped(segment: &str) -> Result<Self, Error> {
        match segment.split_once('=') {
            Some((prefix, rest)) if prefix.chars().all(|c| c.is_ascii_digit()) && !prefix.is_empty() => {
                let typ: u64 = prefix
                    .parse()
                    .map_err(|_| Error::Uri(format!("bad component type '{}'", prefix)))?;
                Self::new(typ, unescape_segment(rest)?)
            }
            Some((prefix, _)) => Err(Error::Uri(format!("unknown TLV-TYPE '{}' in NameComponent URI", prefix))),
            None => Ok(Self::generic(unescape_segment(segment)?)),
        }
    }

    /// Parses one URI segment as a ReflexiveNameComponent. The segment must
    /// not carry an explicit `<number>=` type prefix.
    pub fn reflexive_from_escaped(segment: &str) -> Result<Self, Error> {
        if segment.contains('=') {
            return Err(Error::Uri(format!(
                "reflexive component must not carry a type prefix: '{}'",
                segment
            )));
        }
        Ok(Self::reflexive(unescape_segment(segment)?))
    }
}

impl PartialOrd for NameComponent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NameComponent {
    /// NDN canonical order: type, then length, then value bytes.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.typ
            .cmp(&other.typ)
            .then_with(|| self.value.len().cmp(&other.value.len()))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.typ != GENERIC_COMPONENT {
            write!(f, "{}=", self.typ)?;
        }
        if !self.value.is_empty() && self.value.iter().all(|&b| b == b'.') {
            // an all-period value needs three extra periods in URI form
            for _ in 0..self.value.len() + 3 {
                write!(f, ".")?;
            }
            return Ok(());
        }
        if self.value.is_empty() {
            return write!(f, "...");
        }
        for &b in &self.value {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

fn unescape_segment(segment: &str) -> Result<Bytes, Error> {
    let raw = segment.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            if i + 3 > raw.len() {
                return Err(Error::Uri(format!("truncated percent-escape in '{}'", segment)));
            }
            let hex = std::str::from_utf8(&raw[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| Error::Uri(format!("bad percent-escape in '{}'", segment)))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    if !out.is_empty() && out.iter().all(|&b| b == b'.') {
        if out.len() < 3 {
            return Err(Error::Uri("name component cannot be . or ..".into()));
        }
        out.truncate(out.len() - 3);
    }
    Ok(out.into())
}

/* ---------------------------------------------------------------- *\
 * Name
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses a URI such as `/example/testApp/201=1234`. Explicit type
    /// prefixes outside `[NAME_COMPONENT_MIN, NAME_COMPONENT_MAX]` fail with
    /// `InvalidComponent`.
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        let stripped = uri.strip_prefix("ndn:").unwrap_or(uri);
        let mut components = Vec::new();
        for segment in stripped.split('/').filter(|s| !s.is_empty()) {
            components.push(NameComponent::from_escaped(segment)?);
        }
        Ok(Self { components })
    }

    /// Parses a URI, encoding the last component as reflexive. This is the
    /// constructor applications use to build reflexive names from text.
    pub fn from_uri_reflexive(uri: &str) -> Result<Self, Error> {
        let stripped = uri.strip_prefix("ndn:").unwrap_or(uri);
        let segments: Vec<&str> = stripped.split('/').filter(|s| !s.is_empty()).collect();
        let mut components = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            if i + 1 == segments.len() {
                components.push(NameComponent::reflexive_from_escaped(segment)?);
            } else {
                components.push(NameComponent::from_escaped(segment)?);
            }
        }
        Ok(Self { components })
    }

    pub fn append(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Consuming append for building names in expressions.
    pub fn appending(mut self, component: NameComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    /// Returns the component at `i`; negative indices count from the end.
    pub fn get(&self, i: isize) -> Option<&NameComponent> {
        let index = if i < 0 {
            self.components.len().checked_sub(i.unsigned_abs())?
        } else {
            i as usize
        };
        self.components.get(index)
    }

    /// Returns the first `k` components; a negative `k` drops `-k`
    /// components from the end.
    pub fn get_prefix(&self, k: isize) -> Self {
        let count = if k < 0 {
            self.components.len().saturating_sub(k.unsigned_abs())
        } else {
            (k as usize).min(self.components.len())
        };
        Self {
            components: self.components[..count].to_vec(),
        }
    }

    /// True when any component is reflexive.
    pub fn is_reflexive(&self) -> bool {
        self.components.iter().any(NameComponent::is_reflexive)
    }

    /// True when any component is the producer-RI sentinel.
    pub fn has_producer_sentinel(&self, ctx: &NamingContext) -> bool {
        self.components.iter().any(|c| c.is_producer_sentinel(ctx))
    }

    /// The name with all reflexive components removed, in order.
    pub fn strip_reflexive(&self) -> Self {
        Self {
            components: self
                .components
                .iter()
                .filter(|c| !c.is_reflexive())
                .cloned()
                .collect(),
        }
    }

    /// Reflexive-aware prefix match: strips reflexive components from both
    /// sides, then compares component-wise. All FIB lookups, Interest
    /// filters, and PIT data-matching use this; equality and ordering do
    /// not strip.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        let lhs = self.strip_reflexive();
        let rhs = other.strip_reflexive();
        if lhs.components.len() > rhs.components.len() {
            return false;
        }
        lhs.components
            .iter()
            .zip(rhs.components.iter())
            .all(|(a, b)| a == b)
    }

    /// The smallest name greater than this one: the last component is
    /// replaced by its successor; the empty name yields `/%00`.
    pub fn successor(&self) -> Self {
        match self.components.last() {
            Some(last) => {
                let mut components = self.components.clone();
                *components.last_mut().unwrap() = last.successor();
                Self { components }
            }
            None => Self {
                components: vec![NameComponent::generic(vec![0u8])],
            },
        }
    }

    pub fn to_uri(&self) -> String {
        self.to_string()
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        for component in &self.components {
            component.to_tlv().encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_NAME, buf.freeze())
    }

    /// The full TLV wire form of this name.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.to_tlv().encode(&mut buf);
        buf.freeze()
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::Packet(format!(
                "Expected name TLV type {}, got {}",
                tlv::TLV_NAME,
                element.tlv_type
            )));
        }

        let mut components = Vec::new();
        let mut buf = element.value.clone();
        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf)?;
            components.push(NameComponent::from_tlv(&e)?);
        }
        Ok(Self { components })
    }

    pub fn from_wire(wire: &mut impl Buf) -> Result<Self, Error> {
        let element = TlvElement::decode(wire)?;
        Self::from_tlv(&element)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn uri_round_trip() {
        let n = name("/example/testApp/1");
        assert_eq!(n.to_string(), "/example/testApp/1");
        assert_eq!(name(&n.to_string()), n);

        let escaped = Name::from_uri("/a%2Fb/c%00").unwrap();
        assert_eq!(name(&escaped.to_string()), escaped);
    }

    #[test]
    fn reflexive_uri_round_trip_is_wire_equal() {
        let n = Name::from_uri_reflexive("/example/testApp/1234").unwrap();
        assert!(n.is_reflexive());
        assert_eq!(n.get(-1).unwrap().typ(), REFLEXIVE_COMPONENT);

        let reparsed = Name::from_uri(&n.to_uri()).unwrap();
        assert_eq!(reparsed.to_wire(), n.to_wire());
    }

    #[test]
    fn invalid_component_type_is_rejected() {
        assert!(matches!(Name::from_uri("/0=x"), Err(Error::InvalidComponent(0))));
        assert!(matches!(Name::from_uri("/70000=x"), Err(Error::InvalidComponent(70000))));
        assert!(Name::from_uri("/8=ok").is_ok());
    }

    #[test]
    fn negative_get_counts_from_end() {
        let n = name("/a/b/c");
        assert_eq!(n.get(0), Some(&NameComponent::generic(&b"a"[..])));
        assert_eq!(n.get(-1), Some(&NameComponent::generic(&b"c"[..])));
        assert_eq!(n.get(-3), Some(&NameComponent::generic(&b"a"[..])));
        assert_eq!(n.get(-4), None);
        assert_eq!(n.get(3), None);
    }

    #[test]
    fn get_prefix_positive_and_negative() {
        let n = name("/a/b/c");
        assert_eq!(n.get_prefix(2), name("/a/b"));
        assert_eq!(n.get_prefix(-1), name("/a/b"));
        assert_eq!(n.get_prefix(10), n);
    }

    #[test]
    fn prefix_match_ignores_reflexive_components() {
        let ctx = NamingContext::default();
        let filter = name("/testApp");
        let ri = Name::from_uri("/testApp/reflect")
            .unwrap()
            .appending(NameComponent::producer_sentinel(&ctx));

        assert!(ri.is_reflexive());
        assert!(filter.is_prefix_of(&ri));

        // equality does not strip
        let plain = name("/testApp/reflect");
        assert_ne!(plain, ri);
        assert!(plain.is_prefix_of(&ri));
        assert!(ri.is_prefix_of(&plain));
    }

    #[test]
    fn strip_equivalence_invariant() {
        let a = Name::from_uri_reflexive("/example/testApp/1234").unwrap();
        let b = name("/example/testApp/data/1");
        assert_eq!(
            a.is_prefix_of(&b),
            a.strip_reflexive().is_prefix_of(&b.strip_reflexive())
        );
        assert!(a.is_prefix_of(&b));
    }

    #[test]
    fn producer_sentinel_detection() {
        let ctx = NamingContext::default();
        let sentinel = NameComponent::producer_sentinel(&ctx);
        assert_eq!(sentinel.value().as_ref(), b"9999");
        assert!(sentinel.is_producer_sentinel(&ctx));

        let ri = name("/testApp/reflect").appending(sentinel);
        assert!(ri.has_producer_sentinel(&ctx));
        assert!(!name("/testApp/reflect").has_producer_sentinel(&ctx));

        // a reflexive component with a different number is not the sentinel
        let other = NameComponent::reflexive_number(7, &ctx);
        assert!(!other.is_producer_sentinel(&ctx));
    }

    #[test]
    fn marker_convention_numbers() {
        let ctx = NamingContext {
            encoding: Convention::Marker,
            decoding: Convention::Marker,
        };
        let c = NameComponent::reflexive_number(42, &ctx);
        assert_eq!(c.value().as_ref(), &[0x00, 42]);
        assert_eq!(c.as_number(&ctx), Some(42));
        // typed decoding does not accept the marker form as 42
        assert_ne!(c.as_number(&NamingContext::default()), Some(42));
    }

    #[test]
    fn successor_carries() {
        let c = NameComponent::generic(vec![0x41, 0xff]);
        assert_eq!(c.successor().value().as_ref(), &[0x42, 0x00]);

        let all_ff = NameComponent::generic(vec![0xff]);
        assert_eq!(all_ff.successor().value().as_ref(), &[0x00, 0x00]);

        assert_eq!(name("/a").successor(), name("/b"));
        assert_eq!(Name::new().successor().get(0).unwrap().value().as_ref(), &[0x00]);
    }

    #[test]
    fn canonical_component_order() {
        let short = NameComponent::generic(&b"z"[..]);
        let long = NameComponent::generic(&b"aa"[..]);
        assert!(short < long); // shorter sorts first regardless of bytes
        let typed = NameComponent::new(9, &b"a"[..]).unwrap();
        assert!(NameComponent::generic(&b"a"[..]) < typed);
    }

    #[test]
    fn wire_round_trip() {
        let n = Name::from_uri_reflexive("/example/testApp/1234").unwrap();
        let wire = n.to_wire();
        let decoded = Name::from_wire(&mut wire.clone()).unwrap();
        assert_eq!(decoded, n);
    }

    #[test]
    fn dot_segments() {
        assert!(Name::from_uri("/a/./b").is_err());
        assert!(Name::from_uri("/a/../b").is_err());
        let dots = Name::from_uri("/a/....").unwrap();
        assert_eq!(dots.get(1).unwrap().value().as_ref(), b".");
        assert_eq!(name(&dots.to_string()), dots);
    }
}
