//! Challenge sealing with XChaCha20-Poly1305.
//!
//! A sealed message is laid out as:
//!
//! ```text
//! +-----------------+------------------+-------------+
//! | nonce (24 B)    | ciphertext       | tag (16 B)  |
//! +-----------------+------------------+-------------+
//! ```

use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305, XNonce, aead::Aead};

use crate::{error::CryptoError, secret::SharedSecret};

/// XChaCha20 nonce size.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size.
pub const TAG_SIZE: usize = 16;

/// Seal `plaintext` under `secret` with the caller-provided `nonce`.
///
/// The nonce must come from a cryptographically secure source in production
/// (`Environment::random_bytes`).
pub fn seal(
    secret: &SharedSecret,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(secret.as_bytes()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a message produced by [`seal`].
///
/// # Errors
///
/// - `Truncated` if the input cannot hold a nonce and a tag
/// - `Decryption` if it was sealed under another secret or modified
pub fn open(secret: &SharedSecret, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let min = NONCE_SIZE + TAG_SIZE;
    if sealed.len() < min {
        return Err(CryptoError::Truncated { len: sealed.len(), min });
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(secret.as_bytes()));
    cipher.decrypt(XNonce::from_slice(nonce), ciphertext).map_err(|_| CryptoError::Decryption)
}

/// Seal a numeric challenge (big-endian).
pub fn seal_challenge(
    secret: &SharedSecret,
    nonce: &[u8; NONCE_SIZE],
    challenge: u32,
) -> Result<Vec<u8>, CryptoError> {
    seal(secret, nonce, &challenge.to_be_bytes())
}

/// Open a numeric challenge sealed by [`seal_challenge`].
pub fn open_challenge(secret: &SharedSecret, sealed: &[u8]) -> Result<u32, CryptoError> {
    let plaintext = open(secret, sealed)?;
    let bytes: [u8; 4] =
        plaintext.as_slice().try_into().map_err(|_| CryptoError::InvalidChallenge(plaintext.len()))?;
    Ok(u32::from_be_bytes(bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::secret::KeyDerivation;

    const NONCE: [u8; NONCE_SIZE] = [7u8; NONCE_SIZE];

    fn secret(password: &str) -> SharedSecret {
        KeyDerivation::Padded.derive("alice", password).unwrap()
    }

    #[test]
    fn sealed_layout() {
        let sealed = seal_challenge(&secret("pw"), &NONCE, 42).unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + 4 + TAG_SIZE);
        assert_eq!(&sealed[..NONCE_SIZE], &NONCE);
    }

    #[test]
    fn challenge_opens_under_same_secret() {
        let sealed = seal_challenge(&secret("pw"), &NONCE, 0xDEAD_BEEF).unwrap();
        assert_eq!(open_challenge(&secret("pw"), &sealed).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn wrong_secret_fails_integrity() {
        let sealed = seal_challenge(&secret("pw"), &NONCE, 1).unwrap();
        assert_eq!(open_challenge(&secret("other"), &sealed), Err(CryptoError::Decryption));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut sealed = seal_challenge(&secret("pw"), &NONCE, 1).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert_eq!(open(&secret("pw"), &sealed), Err(CryptoError::Decryption));
    }

    #[test]
    fn short_input_is_truncated() {
        assert_eq!(
            open(&secret("pw"), &[0u8; 10]),
            Err(CryptoError::Truncated { len: 10, min: NONCE_SIZE + TAG_SIZE })
        );
    }

    #[test]
    fn non_challenge_plaintext_is_rejected() {
        let sealed = seal(&secret("pw"), &NONCE, b"hello").unwrap();
        assert_eq!(open_challenge(&secret("pw"), &sealed), Err(CryptoError::InvalidChallenge(5)));
    }
}
