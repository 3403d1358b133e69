//! Gavel core protocol logic.
//!
//! Everything a replica and a client need that does not touch a socket or a
//! runtime lives here, so it can run unchanged in production and under a
//! deterministic simulation.
//!
//! ## Architecture
//!
//! ```text
//! gavel-core
//!   ├─ Environment        (time + randomness seam)
//!   ├─ Marketplace        (deterministic auction/client state machine)
//!   ├─ Snapshot           (replicated state + versioned envelope)
//!   ├─ AppliedWrites      (request ids already reflected in a snapshot)
//!   ├─ ReplicaMachine     (request handling, broadcast-on-mutation actions)
//!   ├─ auth               (stateless replica checks, ClientHandshake)
//!   ├─ CredentialStore    (name,password records)
//!   └─ transport          (frame read/write over async streams)
//! ```
//!
//! # Invariants
//!
//! - Equal snapshots plus equal request sequences give equal replies and
//!   equal resulting snapshots (for [`IdPolicy::Sequential`]).
//! - A snapshot is only ever replaced as a whole.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod applied;
pub mod auth;
pub mod credentials;
pub mod env;
pub mod error;
pub mod marketplace;
pub mod replica;
pub mod snapshot;
pub mod transport;

#[cfg(test)]
mod test_env;

pub use applied::{APPLIED_WRITES_RETAINED, AppliedWrites, RequestId};
pub use auth::{ClientHandshake, HandshakeState, answer_challenge, verify_response};
pub use credentials::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use env::Environment;
pub use error::{CoreError, CredentialError, TransportError};
pub use marketplace::{IdPolicy, Marketplace, RANDOM_ID_RANGE};
pub use replica::{Execution, NodeId, ReplicaAction, ReplicaMachine, SnapshotApplied};
pub use snapshot::{SNAPSHOT_FORMAT_VERSION, Snapshot, SnapshotEnvelope};
pub use transport::{read_frame, write_frame};
