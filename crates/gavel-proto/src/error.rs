//! Protocol error types.

use thiserror::Error;

/// Errors produced while framing or (de)serializing payloads.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Frame does not start with the Gavel magic bytes.
    #[error("invalid magic: {0:02x?}")]
    InvalidMagic([u8; 2]),

    /// Frame was produced by an incompatible protocol version.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Declared payload exceeds [`crate::MAX_PAYLOAD_SIZE`].
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Declared payload size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Buffer is shorter than the header or the declared payload.
    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// CBOR encoding failed.
    #[error("CBOR encode error: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("CBOR decode error: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtoError::PayloadTooLarge { size: 20, max: 10 };
        assert_eq!(err.to_string(), "payload too large: 20 bytes (max 10)");

        let err = ProtoError::InvalidMagic([0xde, 0xad]);
        assert_eq!(err.to_string(), "invalid magic: [de, ad]");
    }
}
