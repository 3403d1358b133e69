//! Server error types.

use std::io;

use gavel_core::{CoreError, TransportError};
use thiserror::Error;

/// Connectivity failures of a fan-out call.
///
/// None of these are retried. At the network boundary they become
/// `Reply::Unavailable`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// The group has no registered replicas.
    #[error("no replicas in the group")]
    NoReplicas,

    /// No replica answered before the deadline.
    #[error("{op}: no reply from {dispatched} replicas within the deadline")]
    Timeout {
        /// Operation name.
        op: &'static str,
        /// Replicas the request was delivered to.
        dispatched: usize,
    },

    /// Majority reduction found no value backed by more than half the view.
    #[error("{op}: no majority among {replies} replies from a view of {view}")]
    NoAgreement {
        /// Operation name.
        op: &'static str,
        /// Replies collected.
        replies: usize,
        /// Members in the view at dispatch.
        view: usize,
    },

    /// The reduced reply does not fit the operation.
    #[error("{op}: unexpected reply {reply}")]
    UnexpectedReply {
        /// Operation name.
        op: &'static str,
        /// Debug rendering of the reply.
        reply: String,
    },
}

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket error.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// Frame error on a client connection.
    #[error("connection error: {0}")]
    Transport(#[from] TransportError),

    /// Replica state machine error.
    #[error("replica error: {0}")]
    Core(#[from] CoreError),

    /// Fan-out failure.
    #[error("coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),
}
