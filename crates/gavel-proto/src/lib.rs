//! Gavel wire protocol.
//!
//! Everything that crosses a process boundary in the Gavel auction cluster is
//! defined here: the marketplace payloads (auctions, client records), the
//! authentication challenges, the request/reply pairs of the operation table
//! and the frame codec that carries them.
//!
//! # Framing
//!
//! ```text
//! +--------+---------+----------+----------------+------------------+
//! | magic  | version | reserved | payload length | CBOR payload ... |
//! | "GV"   | u8      | u8       | u32 (BE)       |                  |
//! +--------+---------+----------+----------------+------------------+
//! ```
//!
//! The header is a fixed 8 bytes ([`FrameHeader::SIZE`]). Payloads are CBOR
//! encoded with `ciborium` and capped at [`MAX_PAYLOAD_SIZE`].
//!
//! # Crate Layout
//!
//! - [`payloads`]: serde payload types
//! - [`frame`]: header layout plus encode/decode helpers
//! - [`error`]: [`ProtoError`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod frame;
pub mod payloads;

pub use error::ProtoError;
pub use frame::{
    FrameHeader, MAGIC, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION, decode_frame, decode_payload, encode_frame,
};
pub use payloads::{
    auth::{AuthChallenge, ChallengeResponse},
    market::{
        Auction, AuctionId, AuctionStatus, ClientId, ClientProfile, ClientRecord, NewAuction,
        Password,
    },
    rpc::{BidOutcome, CloseOutcome, RegisterOutcome, Reply, Request},
};
