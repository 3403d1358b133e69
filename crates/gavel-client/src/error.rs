//! Client error types.

use gavel_core::{CoreError, CredentialError, TransportError};
use gavel_crypto::CryptoError;
use gavel_proto::AuctionId;
use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Reading or writing a frame failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Server closed the connection before replying.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Cluster could not answer the call.
    #[error("cluster unavailable: {reason}")]
    Unavailable {
        /// Reason reported by the front-end.
        reason: String,
    },

    /// Reply kind does not match the request.
    #[error("unexpected reply to {op}: {reply}")]
    UnexpectedReply {
        /// Request name.
        op: &'static str,
        /// Rendered reply.
        reply: String,
    },

    /// Credential storage failed.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// No credential stored for the user.
    #[error("no credential stored for {user}")]
    NoCredential {
        /// User name that was looked up.
        user: String,
    },

    /// Shared secret could not be derived.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Handshake failed on our side.
    #[error("handshake error: {0}")]
    Handshake(#[from] CoreError),

    /// Server could not prove knowledge of the shared secret.
    #[error("server failed the challenge for {user}")]
    ServerNotVerified {
        /// User being authenticated.
        user: String,
    },

    /// Server rejected our proof.
    #[error("authentication rejected for {user}")]
    AuthenticationRejected {
        /// User being authenticated.
        user: String,
    },

    /// Authenticated, but no client is registered with the credential.
    #[error("no client registered for {user}")]
    NotRegistered {
        /// User being authenticated.
        user: String,
    },

    /// User name is blank or already taken.
    #[error("user name {name:?} is not available")]
    NameUnavailable {
        /// Requested name.
        name: String,
    },

    /// Every drawn client id was already taken.
    #[error("no free client id after {attempts} attempts")]
    IdsExhausted {
        /// Number of ids tried.
        attempts: u32,
    },

    /// Auction is not active.
    #[error("auction {0} is not active")]
    AuctionNotActive(AuctionId),

    /// Bid failed the local checks and was not sent.
    #[error("invalid bid: {reason}")]
    InvalidBid {
        /// Which check failed.
        reason: &'static str,
    },
}

impl ClientError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Fatal errors are connectivity or protocol faults; the connection should
    /// be dropped. Business outcomes leave the session usable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(_)
            | Self::ConnectionClosed
            | Self::UnexpectedReply { .. }
            | Self::Credential(_)
            | Self::Handshake(_) => true,

            Self::Unavailable { .. }
            | Self::NoCredential { .. }
            | Self::Crypto(_)
            | Self::ServerNotVerified { .. }
            | Self::AuthenticationRejected { .. }
            | Self::NotRegistered { .. }
            | Self::NameUnavailable { .. }
            | Self::IdsExhausted { .. }
            | Self::AuctionNotActive(_)
            | Self::InvalidBid { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_connection_is_fatal() {
        assert!(ClientError::ConnectionClosed.is_fatal());
    }

    #[test]
    fn unavailable_cluster_is_transient() {
        let err = ClientError::Unavailable { reason: "no replicas in the group".to_string() };
        assert!(!err.is_fatal());
    }

    #[test]
    fn rejected_bid_is_transient() {
        let err = ClientError::InvalidBid { reason: "below starting price" };
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "invalid bid: below starting price");
    }

    #[test]
    fn inactive_auction_display() {
        let err = ClientError::AuctionNotActive(AuctionId(4));
        assert_eq!(err.to_string(), "auction 4 is not active");
    }
}
