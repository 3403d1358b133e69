//! Cryptographic error types.

use thiserror::Error;

/// Errors from secret derivation and challenge sealing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Password does not fit the padded key layout.
    #[error("password too long: {len} bytes exceeds {max}")]
    PasswordTooLong {
        /// Password length in bytes.
        len: usize,
        /// Largest accepted length.
        max: usize,
    },

    /// HKDF expansion failed.
    #[error("key derivation failed")]
    KeyDerivation,

    /// Sealed message is shorter than nonce plus tag.
    #[error("sealed message too short: {len} bytes, need at least {min}")]
    Truncated {
        /// Actual length.
        len: usize,
        /// Minimum length.
        min: usize,
    },

    /// Encryption failed.
    #[error("encryption failed")]
    Encryption,

    /// Authentication tag did not verify: wrong secret or tampered message.
    #[error("decryption failed: authentication tag mismatch")]
    Decryption,

    /// Plaintext is not a sealed challenge.
    #[error("invalid challenge plaintext: expected 4 bytes, got {0}")]
    InvalidChallenge(usize),
}

impl CryptoError {
    /// Returns true if the error means the peer holds a different secret or
    /// sent garbage, as opposed to a local configuration problem.
    pub fn is_peer_fault(&self) -> bool {
        match self {
            Self::Truncated { .. } | Self::Decryption | Self::InvalidChallenge(_) => true,
            Self::PasswordTooLong { .. } | Self::KeyDerivation | Self::Encryption => false,
        }
    }
}
