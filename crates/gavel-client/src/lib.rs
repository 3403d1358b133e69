//! Gavel marketplace client.
//!
//! Speaks the framed request/reply protocol to a front-end and layers the
//! user-facing flows on top:
//!
//! - registration under a random client id, retried when the id is taken
//! - login through the mutual challenge-response handshake
//! - bids checked locally against the auction's starting price
//!
//! The transport is behind the [`Remote`] trait, so the same client runs over
//! TCP, simulated networks or an in-process coordinator.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod connection;
mod error;

pub use client::{CLIENT_ID_RANGE, ClientConfig, MarketClient, Session};
pub use connection::{Connection, Remote};
pub use error::ClientError;
