//! Marketplace snapshot and its replication envelope.
//!
//! A snapshot is the whole marketplace state. It is replicated and transferred
//! atomically: receivers replace their copy with the received value.
//!
//! ```text
//! SnapshotEnvelope
//!   ├─ format_version   (rejected on mismatch)
//!   ├─ origin           (sending node, for own-message filtering and logs)
//!   └─ Snapshot
//!        ├─ active       BTreeMap<AuctionId, Auction>
//!        ├─ closed       BTreeMap<AuctionId, Auction>
//!        ├─ clients      BTreeMap<ClientId, ClientRecord>
//!        ├─ next_auction_id
//!        ├─ revision
//!        └─ applied      request id → reply of the writes behind this state
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;
use gavel_proto::{Auction, AuctionId, ClientId, ClientRecord};
use serde::{Deserialize, Serialize};

use crate::{applied::AppliedWrites, error::CoreError, replica::NodeId};

/// Snapshot encoding version.
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

/// The replicated marketplace state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Auctions accepting bids.
    pub active: BTreeMap<AuctionId, Auction>,
    /// Auctions closed by their seller.
    pub closed: BTreeMap<AuctionId, Auction>,
    /// Registered clients.
    pub clients: BTreeMap<ClientId, ClientRecord>,
    /// Next id handed out by the sequential id policy.
    pub next_auction_id: u64,
    /// Number of local mutations applied to this value. Informational.
    pub revision: u64,
    /// Coordinator requests already reflected in this state.
    pub applied: AppliedWrites,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            active: BTreeMap::new(),
            closed: BTreeMap::new(),
            clients: BTreeMap::new(),
            next_auction_id: 1,
            revision: 0,
            applied: AppliedWrites::default(),
        }
    }
}

/// A snapshot as it travels on the state-sync channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEnvelope {
    /// Encoding version, [`SNAPSHOT_FORMAT_VERSION`].
    pub format_version: u16,
    /// Node that produced the snapshot.
    pub origin: NodeId,
    /// The state.
    pub snapshot: Snapshot,
}

impl SnapshotEnvelope {
    /// Wrap `snapshot` produced by `origin`.
    pub fn new(origin: NodeId, snapshot: Snapshot) -> Self {
        Self { format_version: SNAPSHOT_FORMAT_VERSION, origin, snapshot }
    }

    /// Encode to CBOR.
    pub fn encode(&self) -> Result<Bytes, CoreError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::SnapshotCodec { reason: e.to_string() })?;
        Ok(Bytes::from(buf))
    }

    /// Decode from CBOR and check the format version.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let envelope: Self = ciborium::from_reader(bytes)
            .map_err(|e| CoreError::SnapshotCodec { reason: e.to_string() })?;
        if envelope.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(CoreError::SnapshotVersion {
                expected: SNAPSHOT_FORMAT_VERSION,
                actual: envelope.format_version,
            });
        }
        Ok(envelope)
    }
}
