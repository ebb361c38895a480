//! TLV (Type-Length-Value) encoding and decoding utilities.
//!
//! This module provides functions for encoding and decoding NDN TLV
//! structures. Both the TLV type and the TLV length use the NDN
//! variable-length number encoding.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// NDN packet-level TLV types.
pub const TLV_INTEREST: u64 = 0x05;
pub const TLV_DATA: u64 = 0x06;
pub const TLV_NAME: u64 = 0x07;
pub const TLV_CAN_BE_PREFIX: u64 = 0x21;
pub const TLV_MUST_BE_FRESH: u64 = 0x12;
pub const TLV_FORWARDING_HINT: u64 = 0x1e;
pub const TLV_NONCE: u64 = 0x0a;
pub const TLV_INTEREST_LIFETIME: u64 = 0x0c;
pub const TLV_HOP_LIMIT: u64 = 0x22;
pub const TLV_META_INFO: u64 = 0x14;
pub const TLV_FRESHNESS_PERIOD: u64 = 0x19;
pub const TLV_CONTENT: u64 = 0x15;
pub const TLV_SIGNATURE_VALUE: u64 = 0x17;

/// Link-protocol (LP) layer TLV types.
pub const TLV_LP_PACKET: u64 = 0x64;
pub const TLV_LP_FRAGMENT: u64 = 0x50;
pub const TLV_LP_PIT_TOKEN: u64 = 0x62;
pub const TLV_LP_NACK: u64 = 0x0320;
pub const TLV_LP_NACK_REASON: u64 = 0x0321;

/// Encodes an NDN variable-length number (used for both TLV type and length).
///
/// - If the number < 253, uses 1 byte
/// - If the number <= 65535, uses 3 bytes (253 + 2 bytes)
/// - If the number <= 2^32-1, uses 5 bytes (254 + 4 bytes)
/// - Otherwise uses 9 bytes (255 + 8 bytes)
pub fn encode_var_number(number: u64, buf: &mut BytesMut) {
    if number < 253 {
        buf.put_u8(number as u8);
    } else if number <= 65535 {
        buf.put_u8(253);
        buf.put_u16(number as u16);
    } else if number <= u32::MAX as u64 {
        buf.put_u8(254);
        buf.put_u32(number as u32);
    } else {
        buf.put_u8(255);
        buf.put_u64(number);
    }
}

/// Returns the number of bytes `encode_var_number` will write for `number`.
pub fn var_number_size(number: u64) -> usize {
    if number < 253 {
        1
    } else if number <= 65535 {
        3
    } else if number <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

/// Decodes an NDN variable-length number.
pub fn decode_var_number(buf: &mut impl Buf) -> Result<u64, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("Buffer underflow when decoding TLV number".into()));
    }

    let first_byte = buf.get_u8();

    match first_byte {
        0..=252 => Ok(first_byte as u64),
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv("Buffer underflow when decoding 16-bit TLV number".into()));
            }
            Ok(buf.get_u16() as u64)
        }
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv("Buffer underflow when decoding 32-bit TLV number".into()));
            }
            Ok(buf.get_u32() as u64)
        }
        255 => {
            if buf.remaining() < 8 {
                return Err(Error::Tlv("Buffer underflow when decoding 64-bit TLV number".into()));
            }
            Ok(buf.get_u64())
        }
    }
}

/// Encodes a non-negative integer value with the minimal NDN width (1/2/4/8
/// bytes, big-endian).
pub fn encode_nonneg_integer(value: u64) -> Bytes {
    let mut buf = BytesMut::new();
    if value <= u8::MAX as u64 {
        buf.put_u8(value as u8);
    } else if value <= u16::MAX as u64 {
        buf.put_u16(value as u16);
    } else if value <= u32::MAX as u64 {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
    buf.freeze()
}

/// Decodes a non-negative integer from a 1/2/4/8 byte big-endian value.
pub fn decode_nonneg_integer(value: &[u8]) -> Result<u64, Error> {
    match value.len() {
        1 => Ok(value[0] as u64),
        2 => Ok(u16::from_be_bytes([value[0], value[1]]) as u64),
        4 => Ok(u32::from_be_bytes([value[0], value[1], value[2], value[3]]) as u64),
        8 => Ok(u64::from_be_bytes([
            value[0], value[1], value[2], value[3], value[4], value[5], value[6], value[7],
        ])),
        n => Err(Error::Tlv(format!("Invalid non-negative integer length {}", n))),
    }
}

/// A generic TLV element consisting of a type, length, and value.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u64,
    pub value: Bytes,
}

impl TlvElement {
    /// Creates a new TLV element.
    pub fn new(tlv_type: u64, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Returns the total length of this TLV element when encoded.
    pub fn len(&self) -> usize {
        let value_len = self.value.len();
        var_number_size(self.tlv_type) + var_number_size(value_len as u64) + value_len
    }

    /// Returns true when the element carries an empty value.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Encodes this TLV element into the provided buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_var_number(self.tlv_type, buf);
        encode_var_number(self.value.len() as u64, buf);
        buf.extend_from_slice(&self.value);
    }

    /// Decodes a TLV element from the provided buffer.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        let tlv_type = decode_var_number(buf)?;
        let length = decode_var_number(buf)? as usize;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "Buffer underflow: TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        Ok(Self {
            tlv_type,
            value: buf.copy_to_bytes(length),
        })
    }

    /// Interprets the value as a non-negative integer.
    pub fn as_nonneg_integer(&self) -> Result<u64, Error> {
        decode_nonneg_integer(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_number_widths() {
        for (number, expected) in [(0u64, 1usize), (252, 1), (253, 3), (65535, 3), (65536, 5), (1 << 40, 9)] {
            let mut buf = BytesMut::new();
            encode_var_number(number, &mut buf);
            assert_eq!(buf.len(), expected, "width for {}", number);
            assert_eq!(var_number_size(number), expected);
            let decoded = decode_var_number(&mut buf.freeze()).unwrap();
            assert_eq!(decoded, number);
        }
    }

    #[test]
    fn element_round_trip() {
        let element = TlvElement::new(TLV_LP_NACK, Bytes::from_static(b"abc"));
        let mut buf = BytesMut::new();
        element.encode(&mut buf);
        // 0x0320 needs the 3-byte type form
        assert_eq!(buf.len(), 3 + 1 + 3);
        assert_eq!(element.len(), buf.len());

        let decoded = TlvElement::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, element);
    }

    #[test]
    fn element_underflow() {
        let mut short = Bytes::from_static(&[0x07, 0x05, b'a']);
        assert!(matches!(TlvElement::decode(&mut short), Err(Error::Tlv(_))));
    }

    #[test]
    fn nonneg_integer_minimal_widths() {
        for (value, width) in [(0u64, 1usize), (255, 1), (256, 2), (65536, 4), (1 << 32, 8)] {
            let encoded = encode_nonneg_integer(value);
            assert_eq!(encoded.len(), width);
            assert_eq!(decode_nonneg_integer(&encoded).unwrap(), value);
        }
        assert!(decode_nonneg_integer(&[1, 2, 3]).is_err());
    }
}
