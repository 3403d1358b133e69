//! Challenge-response handshake payloads.
//!
//! The handshake runs in two round trips:
//!
//! 1. Client sends `ServerAuthenticationStep { key_name, challenge }`, the
//!    replica answers with an [`AuthChallenge`].
//! 2. Client sends `ClientAuthenticationStep` with a [`ChallengeResponse`],
//!    the replica answers with a boolean verdict.
//!
//! # Security
//!
//! - **Debug Redaction**: ciphertexts are printed as their length only.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server's answer to a client challenge.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    /// The client's challenge sealed under the shared secret.
    pub ciphertext: Vec<u8>,
    /// Fresh challenge for the client to solve next.
    pub next_challenge: u32,
}

impl fmt::Debug for AuthChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthChallenge")
            .field("ciphertext", &format!("<redacted {} bytes>", self.ciphertext.len()))
            .field("next_challenge", &self.next_challenge)
            .finish()
    }
}

/// Client's proof that it holds the shared secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// The server's challenge sealed under the shared secret.
    pub ciphertext: Vec<u8>,
    /// The challenge that was sealed, so a stateless replica can check it.
    pub solved_challenge: u32,
}

impl fmt::Debug for ChallengeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeResponse")
            .field("ciphertext", &format!("<redacted {} bytes>", self.ciphertext.len()))
            .field("solved_challenge", &self.solved_challenge)
            .finish()
    }
}
