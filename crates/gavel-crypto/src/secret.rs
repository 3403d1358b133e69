//! Shared secret derivation.
//!
//! Client and replica derive the same 32-byte key from the registered
//! password. Both ends must agree on the [`KeyDerivation`] in use.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;

/// Size of a shared secret in bytes.
pub const KEY_SIZE: usize = 32;

/// Domain separation label for HKDF expansion.
const HKDF_INFO: &[u8] = b"gavel auth v1";

/// Byte used to right-pad short passwords in [`KeyDerivation::Padded`].
const PAD_BYTE: u8 = b'0';

/// How a shared secret is obtained from a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyDerivation {
    /// Password bytes right-padded with ASCII `'0'` to [`KEY_SIZE`].
    ///
    /// Interoperates with deployments that key the cipher with the padded
    /// password directly. Offers no stretching.
    #[default]
    Padded,
    /// HKDF-SHA256 over the password, salted with the lower-cased user name.
    Hkdf,
}

impl KeyDerivation {
    /// Derive the shared secret for `user_name` from `password`.
    ///
    /// # Errors
    ///
    /// `Padded` rejects passwords longer than [`KEY_SIZE`] bytes.
    pub fn derive(self, user_name: &str, password: &str) -> Result<SharedSecret, CryptoError> {
        match self {
            Self::Padded => {
                let bytes = password.as_bytes();
                if bytes.len() > KEY_SIZE {
                    return Err(CryptoError::PasswordTooLong { len: bytes.len(), max: KEY_SIZE });
                }
                let mut key = [PAD_BYTE; KEY_SIZE];
                key[..bytes.len()].copy_from_slice(bytes);
                Ok(SharedSecret(key))
            },
            Self::Hkdf => {
                let salt = user_name.to_lowercase();
                let hk = Hkdf::<Sha256>::new(Some(salt.as_bytes()), password.as_bytes());
                let mut key = [0u8; KEY_SIZE];
                hk.expand(HKDF_INFO, &mut key).map_err(|_| CryptoError::KeyDerivation)?;
                Ok(SharedSecret(key))
            },
        }
    }
}

/// Symmetric key shared by a client and the cluster.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; KEY_SIZE]);

impl SharedSecret {
    /// Wrap raw key bytes.
    ///
    /// Used for throwaway keys generated from environment randomness.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}
