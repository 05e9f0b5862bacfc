//! Advertisement frame codec.
//!
//! Frames ride inside the vendor-data field of a BLE advertisement:
//! ```text
//! ┌──────────────┬──────────────────────────┐
//! │ Tag (2B)     │ Payload (0..N B)         │
//! │ BE u16       │ meaning depends on tag   │
//! └──────────────┴──────────────────────────┘
//! ```
//!
//! | Tag      | Value    | Payload                               |
//! |----------|----------|---------------------------------------|
//! | Register | `0x0001` | empty                                 |
//! | Delete   | `0x0002` | empty                                 |
//! | Data     | `0x0003` | 2 raw temperature register bytes      |
//!
//! The payload length is not self-described; the receiver knows it from
//! the tag.  The tag is always big-endian on the wire.

use heapless::Vec;

use crate::error::FrameError;

/// Tag size on the wire.
pub const HEADER_SIZE: usize = 2;

/// Largest frame that fits the vendor-data field next to the flags,
/// the 16-bit service UUID list and the company identifier.
pub const MAX_FRAME_LEN: usize = 20;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - HEADER_SIZE;

/// Encoded frame bytes, ready for the advertisement.
pub type EncodedFrame = Vec<u8, MAX_FRAME_LEN>;

/// The three frame kinds the node emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FrameTag {
    Register = 0x0001,
    Delete = 0x0002,
    Data = 0x0003,
}

impl FrameTag {
    pub const ALL: [FrameTag; 3] = [Self::Register, Self::Delete, Self::Data];

    pub const fn wire_value(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for FrameTag {
    type Error = FrameError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::Register),
            0x0002 => Ok(Self::Delete),
            0x0003 => Ok(Self::Data),
            other => Err(FrameError::UnknownHeader(other)),
        }
    }
}

/// Encode `tag` followed by `payload`.
///
/// Fails only when the payload does not fit the advertisement.
pub fn encode(tag: FrameTag, payload: &[u8]) -> Result<EncodedFrame, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLong(payload.len()));
    }
    let mut out = EncodedFrame::new();
    // Capacity was checked above; neither extend can overflow.
    let _ = out.extend_from_slice(&tag.wire_value().to_be_bytes());
    let _ = out.extend_from_slice(payload);
    Ok(out)
}

/// Split a received frame into its tag and payload.
pub fn decode(bytes: &[u8]) -> Result<(FrameTag, &[u8]), FrameError> {
    let Some((header, payload)) = bytes.split_first_chunk::<HEADER_SIZE>() else {
        return Err(FrameError::InvalidLength);
    };
    let tag = FrameTag::try_from(u16::from_be_bytes(*header))?;
    Ok((tag, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_frame_is_tag_only() {
        let frame = encode(FrameTag::Register, &[]).unwrap();
        assert_eq!(frame.as_slice(), &[0x00, 0x01]);
    }

    #[test]
    fn data_frame_carries_raw_reading() {
        let frame = encode(FrameTag::Data, &[0x19, 0x80]).unwrap();
        assert_eq!(frame.as_slice(), &[0x00, 0x03, 0x19, 0x80]);
    }

    #[test]
    fn tag_is_big_endian_on_wire() {
        let frame = encode(FrameTag::Delete, &[]).unwrap();
        assert_eq!(frame[0], 0x00);
        assert_eq!(frame[1], 0x02);
    }

    #[test]
    fn decode_returns_remaining_payload() {
        let (tag, payload) = decode(&[0x00, 0x03, 0xAA, 0xBB]).unwrap();
        assert_eq!(tag, FrameTag::Data);
        assert_eq!(payload, &[0xAA, 0xBB]);
    }

    #[test]
    fn decode_allows_empty_payload() {
        let (tag, payload) = decode(&[0x00, 0x01]).unwrap();
        assert_eq!(tag, FrameTag::Register);
        assert!(payload.is_empty());
    }

    #[test]
    fn decode_rejects_short_buffers() {
        assert_eq!(decode(&[]), Err(FrameError::InvalidLength));
        assert_eq!(decode(&[0x00]), Err(FrameError::InvalidLength));
    }

    #[test]
    fn decode_rejects_unknown_tags() {
        assert_eq!(decode(&[0x00, 0x00]), Err(FrameError::UnknownHeader(0)));
        assert_eq!(decode(&[0x00, 0x04]), Err(FrameError::UnknownHeader(4)));
        // Little-endian Register must not be accepted.
        assert_eq!(decode(&[0x01, 0x00]), Err(FrameError::UnknownHeader(0x0100)));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let payload = [0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            encode(FrameTag::Data, &payload),
            Err(FrameError::PayloadTooLong(MAX_PAYLOAD_LEN + 1))
        );
    }
}
