//! Frame header and payload codec.
//!
//! A frame is a fixed [`FrameHeader`] followed by exactly `payload_len` bytes
//! of CBOR. The header is read with zero-copy so a reader can validate it and
//! learn the payload size before allocating.

use serde::{Serialize, de::DeserializeOwned};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U32},
};

use crate::error::ProtoError;

/// Frame magic, ASCII "GV".
pub const MAGIC: [u8; 2] = *b"GV";

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum accepted payload size (16 MiB).
///
/// Full-state replies (`GetActiveAuctions` and friends) are the largest
/// payloads; they stay far below this for any realistic marketplace.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    magic: [u8; 2],
    version: u8,
    reserved: u8,
    payload_len: U32<BigEndian>,
}

impl FrameHeader {
    /// Size of the encoded header in bytes.
    pub const SIZE: usize = 8;

    /// Create a header for a payload of `payload_len` bytes.
    pub fn new(payload_len: u32) -> Self {
        Self { magic: MAGIC, version: PROTOCOL_VERSION, reserved: 0, payload_len: U32::new(payload_len) }
    }

    /// Parse and validate a header from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// Fails if `bytes` is shorter than [`Self::SIZE`], the magic or version
    /// is wrong, or the declared length exceeds [`MAX_PAYLOAD_SIZE`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        let (header, _) = Self::read_from_prefix(bytes)
            .map_err(|_| ProtoError::Truncated { needed: Self::SIZE, available: bytes.len() })?;
        header.validate()?;
        Ok(header)
    }

    /// Declared payload length.
    pub fn payload_len(&self) -> usize {
        self.payload_len.get() as usize
    }

    /// Protocol version byte.
    pub fn version(&self) -> u8 {
        self.version
    }

    fn validate(&self) -> Result<(), ProtoError> {
        if self.magic != MAGIC {
            return Err(ProtoError::InvalidMagic(self.magic));
        }
        if self.version != PROTOCOL_VERSION {
            return Err(ProtoError::UnsupportedVersion(self.version));
        }
        let size = self.payload_len();
        if size > MAX_PAYLOAD_SIZE {
            return Err(ProtoError::PayloadTooLarge { size, max: MAX_PAYLOAD_SIZE });
        }
        Ok(())
    }
}

/// Encode `value` as a complete frame (header + CBOR payload) into `buf`.
///
/// # Errors
///
/// Fails if CBOR serialization fails or the payload exceeds
/// [`MAX_PAYLOAD_SIZE`].
pub fn encode_frame<T: Serialize>(value: &T, buf: &mut Vec<u8>) -> Result<(), ProtoError> {
    let mut payload = Vec::new();
    ciborium::into_writer(value, &mut payload).map_err(|e| ProtoError::Encode(e.to_string()))?;

    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtoError::PayloadTooLarge { size: payload.len(), max: MAX_PAYLOAD_SIZE });
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| ProtoError::PayloadTooLarge { size: payload.len(), max: MAX_PAYLOAD_SIZE })?;

    buf.reserve(FrameHeader::SIZE + payload.len());
    buf.extend_from_slice(FrameHeader::new(len).as_bytes());
    buf.extend_from_slice(&payload);
    Ok(())
}

/// Decode a CBOR payload (the bytes after the header).
///
/// # Errors
///
/// Fails if the bytes are not a valid CBOR encoding of `T`.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtoError> {
    ciborium::from_reader(payload).map_err(|e| ProtoError::Decode(e.to_string()))
}

/// Decode a complete frame held in memory.
///
/// # Errors
///
/// Fails on an invalid header, a truncated buffer, or invalid CBOR.
pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtoError> {
    let header = FrameHeader::from_bytes(bytes)?;
    let needed = FrameHeader::SIZE + header.payload_len();
    if bytes.len() < needed {
        return Err(ProtoError::Truncated { needed, available: bytes.len() });
    }
    decode_payload(&bytes[FrameHeader::SIZE..needed])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn header_layout_is_stable() {
        let header = FrameHeader::new(5);
        assert_eq!(header.as_bytes(), hex!("4756 01 00 00000005"));
        assert_eq!(std::mem::size_of::<FrameHeader>(), FrameHeader::SIZE);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = hex!("5858 01 00 00000000");
        assert!(matches!(FrameHeader::from_bytes(&bytes), Err(ProtoError::InvalidMagic(_))));
    }

    #[test]
    fn rejects_unknown_version() {
        let bytes = hex!("4756 09 00 00000000");
        assert!(matches!(FrameHeader::from_bytes(&bytes), Err(ProtoError::UnsupportedVersion(9))));
    }

    #[test]
    fn rejects_oversized_payload() {
        let bytes = hex!("4756 01 00 ffffffff");
        assert!(matches!(
            FrameHeader::from_bytes(&bytes),
            Err(ProtoError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn rejects_short_header() {
        let bytes = hex!("4756 01");
        assert!(matches!(
            FrameHeader::from_bytes(&bytes),
            Err(ProtoError::Truncated { needed: 8, available: 3 })
        ));
    }

    #[test]
    fn frame_roundtrip() {
        let mut buf = Vec::new();
        encode_frame(&("hello", 42u32), &mut buf).unwrap();

        let header = FrameHeader::from_bytes(&buf).unwrap();
        assert_eq!(header.payload_len(), buf.len() - FrameHeader::SIZE);

        let (text, number): (String, u32) = decode_frame(&buf).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(number, 42);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut buf = Vec::new();
        encode_frame(&"a longer string payload", &mut buf).unwrap();
        buf.truncate(buf.len() - 3);

        let result: Result<String, _> = decode_frame(&buf);
        assert!(matches!(result, Err(ProtoError::Truncated { .. })));
    }
}
