//! Fuzz target for the challenge-response handshake.
//!
//! Prevent authentication bypass with forged ciphertexts.
//!
//! # Strategy
//!
//! - Arbitrary server answers fed to a started client handshake
//! - Arbitrary client proofs fed to replica-side verification
//!
//! # Invariants
//!
//! - A forged answer never reaches `ServerVerified`
//! - A failed step leaves the handshake in `Failed`
//! - A forged proof is never accepted
//! - NEVER panic on malformed ciphertext

#![no_main]

use arbitrary::Arbitrary;
use gavel_core::{verify_response, ClientHandshake, HandshakeState};
use gavel_crypto::{KeyDerivation, SharedSecret};
use gavel_harness::SimEnv;
use gavel_proto::{AuthChallenge, ChallengeResponse};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    answer: Vec<u8>,
    next_challenge: u32,
    proof: Vec<u8>,
    solved: u32,
    key: [u8; 32],
}

fuzz_target!(|input: Input| {
    let env = SimEnv::with_seed(input.seed);
    let secret = KeyDerivation::Padded.derive("fuzz", "password").expect("short password derives");

    let mut handshake = ClientHandshake::new("fuzz", secret);
    handshake.start(&env).expect("fresh handshake starts");

    let forged = AuthChallenge { ciphertext: input.answer, next_challenge: input.next_challenge };
    let result = handshake.on_challenge(&env, &forged);
    assert!(result.is_err(), "forged answer verified the server");
    assert_eq!(handshake.state(), HandshakeState::Failed);

    let replica_secret = SharedSecret::from_bytes(input.key);
    let response = ChallengeResponse { ciphertext: input.proof, solved_challenge: input.solved };
    assert!(!verify_response(Some(&replica_secret), &response));
    assert!(!verify_response(None, &response));
});
