//! Writes already applied to a snapshot.
//!
//! The coordinator tags every fanned-out request with a [`RequestId`]. A
//! replica that changed state records the id with its reply in the snapshot,
//! so the record travels with every broadcast and transfer.
//!
//! ```text
//! RPC(req-7, PlaceBid)
//!         │
//!         ▼
//! ┌───────────────────┐
//! │ req-7 in snapshot │──► yes: answer with the recorded reply
//! └─────────┬─────────┘
//!           │ no
//!           ▼
//! ┌───────────────────┐
//! │ Execute           │──► state changed: record (req-7, reply), broadcast
//! └───────────────────┘
//! ```
//!
//! Only the newest [`APPLIED_WRITES_RETAINED`] entries are kept.

use std::{collections::BTreeMap, fmt};

use gavel_proto::Reply;
use serde::{Deserialize, Serialize};

/// Number of applied writes retained per snapshot.
pub const APPLIED_WRITES_RETAINED: usize = 1024;

/// Coordinator-assigned id of one fanned-out request. Increases per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Replies of the writes that produced a snapshot, by request id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppliedWrites(BTreeMap<RequestId, Reply>);

impl AppliedWrites {
    /// Recorded reply for `id`.
    pub fn get(&self, id: RequestId) -> Option<&Reply> {
        self.0.get(&id)
    }

    /// Newest recorded id.
    pub fn latest(&self) -> Option<RequestId> {
        self.0.last_key_value().map(|(id, _)| *id)
    }

    /// Record `reply` for `id`, evicting the oldest entries past the limit.
    pub fn record(&mut self, id: RequestId, reply: Reply) {
        self.0.insert(id, reply);
        while self.0.len() > APPLIED_WRITES_RETAINED {
            self.0.pop_first();
        }
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
