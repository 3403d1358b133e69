//! Mutual challenge-response authentication.
//!
//! Both sides hold a [`SharedSecret`] derived from the user's password. Each
//! proves knowledge of it by sealing the other's random challenge.
//!
//! ```text
//! Client                                    Replica
//!   │ ServerAuthenticationStep(name, c1)       │
//!   │─────────────────────────────────────────▶│  seal(c1), draw c2
//!   │        AuthChallenge(seal(c1), c2)       │
//!   │◀─────────────────────────────────────────│
//!   │ open == c1 ? ServerVerified : Failed     │
//!   │ ClientAuthenticationStep(seal(c2), c2)   │
//!   │─────────────────────────────────────────▶│  open == c2 ?
//!   │               Flag(bool)                 │
//!   │◀─────────────────────────────────────────│
//! ```
//!
//! The replica side is stateless: [`answer_challenge`] and [`verify_response`]
//! are free functions. The client side is the [`ClientHandshake`] state
//! machine. It emits requests and consumes replies; the caller does the I/O.

use gavel_crypto::{NONCE_SIZE, SharedSecret, open_challenge, seal_challenge};
use gavel_proto::{AuthChallenge, ChallengeResponse, Request};

use crate::{env::Environment, error::CoreError};

/// Replica side of step 2: seal the client's challenge and issue a new one.
///
/// With no secret (unknown user) the challenge is sealed under a random
/// throwaway key, so the client fails verification without learning whether
/// the user exists.
pub fn answer_challenge<E: Environment>(
    env: &E,
    secret: Option<&SharedSecret>,
    challenge: u32,
) -> Result<AuthChallenge, CoreError> {
    let throwaway;
    let secret = if let Some(secret) = secret {
        secret
    } else {
        let mut key = [0u8; gavel_crypto::KEY_SIZE];
        env.random_bytes(&mut key);
        throwaway = SharedSecret::from_bytes(key);
        &throwaway
    };

    let ciphertext = seal_challenge(secret, &nonce(env), challenge)?;
    Ok(AuthChallenge { ciphertext, next_challenge: env.random_u32() })
}

/// Replica side of step 4: check the client sealed `solved_challenge`.
pub fn verify_response(secret: Option<&SharedSecret>, response: &ChallengeResponse) -> bool {
    secret.is_some_and(|secret| {
        open_challenge(secret, &response.ciphertext) == Ok(response.solved_challenge)
    })
}

fn nonce<E: Environment>(env: &E) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    env.random_bytes(&mut nonce);
    nonce
}

/// Client handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// Nothing sent yet.
    Start,
    /// Challenge sent to the server.
    ServerChallenged {
        /// The challenge the server must seal.
        challenge: u32,
    },
    /// Server answer received and being checked.
    ClientVerifying,
    /// Server proved the secret; our proof is on its way.
    ServerVerified,
    /// Both sides proved the secret.
    Authenticated,
    /// Terminal failure. A new handshake is needed to retry.
    Failed,
}

impl HandshakeState {
    /// Whether the handshake has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Authenticated | Self::Failed)
    }
}

/// Client side of the handshake.
///
/// ```text
/// Start ──start()──▶ ServerChallenged ──on_challenge()──▶ ClientVerifying
///                                                           │
///                           Failed ◀── wrong key/number ────┤
///                                                           ▼
///            Authenticated ◀──on_verdict(true)──── ServerVerified
/// ```
pub struct ClientHandshake {
    user_name: String,
    secret: SharedSecret,
    state: HandshakeState,
}

impl ClientHandshake {
    /// New handshake for `user_name` using `secret`.
    pub fn new(user_name: impl Into<String>, secret: SharedSecret) -> Self {
        Self { user_name: user_name.into(), secret, state: HandshakeState::Start }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// User being authenticated.
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Step 1: challenge the server.
    pub fn start<E: Environment>(&mut self, env: &E) -> Result<Request, CoreError> {
        if self.state != HandshakeState::Start {
            return Err(CoreError::InvalidHandshakeState { state: self.state });
        }

        let challenge = env.random_u32();
        self.transition(HandshakeState::ServerChallenged { challenge });
        Ok(Request::ServerAuthenticationStep { key_name: self.user_name.clone(), challenge })
    }

    /// Step 3: verify the server's answer and produce our proof.
    ///
    /// Any failure moves the handshake to [`HandshakeState::Failed`].
    pub fn on_challenge<E: Environment>(
        &mut self,
        env: &E,
        answer: &AuthChallenge,
    ) -> Result<Request, CoreError> {
        let HandshakeState::ServerChallenged { challenge } = self.state else {
            return Err(CoreError::InvalidHandshakeState { state: self.state });
        };
        self.transition(HandshakeState::ClientVerifying);

        match open_challenge(&self.secret, &answer.ciphertext) {
            Ok(solved) if solved == challenge => {},
            Ok(_) => {
                self.transition(HandshakeState::Failed);
                return Err(CoreError::ServerNotVerified);
            },
            Err(e) if e.is_peer_fault() => {
                tracing::debug!(user = %self.user_name, error = %e, "server answer did not open");
                self.transition(HandshakeState::Failed);
                return Err(CoreError::ServerNotVerified);
            },
            Err(e) => {
                self.transition(HandshakeState::Failed);
                return Err(e.into());
            },
        }
        self.transition(HandshakeState::ServerVerified);

        let ciphertext = match seal_challenge(&self.secret, &nonce(env), answer.next_challenge) {
            Ok(ciphertext) => ciphertext,
            Err(e) => {
                self.transition(HandshakeState::Failed);
                return Err(e.into());
            },
        };
        Ok(Request::ClientAuthenticationStep {
            response: ChallengeResponse { ciphertext, solved_challenge: answer.next_challenge },
            key_name: self.user_name.clone(),
        })
    }

    /// Step 4 result: the server's verdict on our proof.
    pub fn on_verdict(&mut self, accepted: bool) -> Result<HandshakeState, CoreError> {
        if self.state != HandshakeState::ServerVerified {
            return Err(CoreError::InvalidHandshakeState { state: self.state });
        }
        self.transition(if accepted { HandshakeState::Authenticated } else { HandshakeState::Failed });
        Ok(self.state)
    }

    /// Abandon the handshake, e.g. after a connectivity failure.
    pub fn fail(&mut self) {
        self.transition(HandshakeState::Failed);
    }

    fn transition(&mut self, next: HandshakeState) {
        tracing::trace!(user = %self.user_name, from = ?self.state, to = ?next, "handshake transition");
        self.state = next;
    }
}
