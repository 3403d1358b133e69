//! Core error types.

use std::io;

use gavel_crypto::CryptoError;
use gavel_proto::ProtoError;
use thiserror::Error;

use crate::auth::HandshakeState;

/// Errors from the replica machine, snapshots and the handshake.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Snapshot could not be encoded or decoded.
    #[error("snapshot codec error: {reason}")]
    SnapshotCodec {
        /// Description of the failure.
        reason: String,
    },

    /// Received snapshot uses another format version.
    #[error("snapshot format mismatch: expected v{expected}, got v{actual}")]
    SnapshotVersion {
        /// Version this build understands.
        expected: u16,
        /// Version found in the envelope.
        actual: u16,
    },

    /// Handshake step called in the wrong state.
    #[error("handshake step not allowed in state {state:?}")]
    InvalidHandshakeState {
        /// State the handshake was in.
        state: HandshakeState,
    },

    /// Server's answer did not prove knowledge of the shared secret.
    #[error("server failed the challenge")]
    ServerNotVerified,

    /// Cryptographic failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl CoreError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// A bad snapshot is dropped and the node keeps its state, so codec and
    /// version errors are transient from the node's point of view.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::SnapshotCodec { .. } | Self::SnapshotVersion { .. } => false,
            Self::InvalidHandshakeState { .. } | Self::ServerNotVerified | Self::Crypto(_) => true,
        }
    }
}

/// Errors from credential storage.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Reading or writing the credential file failed.
    #[error("credential io error for {name}: {source}")]
    Io {
        /// User name the file belongs to.
        name: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// File content is not a `name,password` record.
    #[error("malformed credential record for {name}")]
    Malformed {
        /// User name the file belongs to.
        name: String,
    },

    /// Name cannot be used as a file name.
    #[error("invalid user name: {0:?}")]
    InvalidName(String),
}

/// Errors from reading or writing frames on a stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Stream I/O failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Frame was malformed.
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// Peer closed the stream in the middle of a frame.
    #[error("connection closed mid-frame")]
    UnexpectedEof,
}
