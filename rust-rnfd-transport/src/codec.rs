//! Frame delimiting for stream faces.
//!
//! A frame is one TLV element (an LP packet or a bare Interest/Data); on
//! stream sockets frames are delimited by the TLV length itself.

use bytes::{Bytes, BytesMut};
use rust_rnfd_common::tlv;

/// Pulls one complete TLV frame off the front of `buf`, or returns `None`
/// until more bytes arrive.
pub fn extract_frame(buf: &mut BytesMut) -> Option<Bytes> {
    let mut peek: &[u8] = &buf[..];
    let available = peek.len();

    let _tlv_type = tlv::decode_var_number(&mut peek).ok()?;
    let length = tlv::decode_var_number(&mut peek).ok()? as usize;
    let header = available - peek.len();
    let total = header.checked_add(length)?;

    if available < total {
        return None;
    }
    Some(buf.split_to(total).freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_rnfd_common::packet::{Interest, Packet};
    use rust_rnfd_common::Name;

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let interest = Interest::new(Name::from_uri("/frame/test").unwrap())
            .with_nonce(9)
            .with_pit_token(0x1234);
        let wire = Packet::Interest(interest.clone()).to_wire();

        let mut buf = BytesMut::new();
        for (i, byte) in wire.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            if i + 1 < wire.len() {
                assert!(extract_frame(&mut buf).is_none(), "frame complete too early at {}", i);
            }
        }

        let frame = extract_frame(&mut buf).expect("complete frame");
        assert_eq!(frame, wire);
        assert!(buf.is_empty());
    }

    #[test]
    fn back_to_back_frames_split_cleanly() {
        let a = Packet::Interest(Interest::new(Name::from_uri("/a").unwrap()).with_nonce(1));
        let b = Packet::Interest(Interest::new(Name::from_uri("/b").unwrap()).with_nonce(2));

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&a.to_wire());
        buf.extend_from_slice(&b.to_wire());

        let first = extract_frame(&mut buf).unwrap();
        let second = extract_frame(&mut buf).unwrap();
        assert!(extract_frame(&mut buf).is_none());

        assert_eq!(first, a.to_wire());
        assert_eq!(second, b.to_wire());
    }
}
