//! Payload types carried inside frames.
//!
//! - [`market`]: auctions, client records and the identifiers that key them
//! - [`auth`]: challenge-response handshake messages
//! - [`rpc`]: the request/reply pairs of the operation table

pub mod auth;
pub mod market;
pub mod rpc;
