//! Gavel Cryptographic Primitives
//!
//! Building blocks for the mutual challenge-response handshake between a
//! client and the replica cluster.
//!
//! # Design
//!
//! All functions in this crate are pure. Nonces for sealing are provided by
//! the caller, so the handshake can run under a seeded simulation
//! environment and stays compatible with the sans-IO state machines in
//! `gavel-core`.
//!
//! ```text
//! password ──KeyDerivation──▶ SharedSecret
//!                                 │
//!   challenge (u32) ──seal(nonce)─┴─▶ nonce || ciphertext || tag
//!                                 │
//!                     open ◀──────┘  (tag failure = wrong secret)
//! ```
//!
//! # Security Properties
//!
//! - Integrity: XChaCha20-Poly1305 rejects any ciphertext sealed under a
//!   different secret or modified in transit.
//! - Redaction: [`SharedSecret`] never prints its key material.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod seal;
pub mod secret;

pub use error::CryptoError;
pub use seal::{NONCE_SIZE, TAG_SIZE, open, open_challenge, seal, seal_challenge};
pub use secret::{KEY_SIZE, KeyDerivation, SharedSecret};
