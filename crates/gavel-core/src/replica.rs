//! Sans-IO replica machine.
//!
//! One [`ReplicaMachine`] is one replica's copy of the marketplace plus the
//! rules for answering requests and absorbing replicated snapshots. It performs
//! no I/O: [`ReplicaMachine::handle`] returns the reply together with the
//! actions the driver must execute.
//!
//! # Replication
//!
//! After a request that changed state (created, closed, accepted bid,
//! registered) the machine emits [`ReplicaAction::BroadcastSnapshot`]
//! carrying the whole encoded [`SnapshotEnvelope`]. Receivers overwrite their
//! state with it. Reads and rejected writes emit nothing.
//!
//! Requests from the coordinator go through [`ReplicaMachine::handle_tagged`].
//! A write whose [`RequestId`] is already recorded in the snapshot, because a
//! peer's broadcast got here first, is answered from the record. A received
//! snapshot that lacks the newest write recorded here is stale and dropped.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use gavel_crypto::{KeyDerivation, SharedSecret};
use gavel_proto::{Reply, Request};
use serde::{Deserialize, Serialize};

use crate::{
    applied::RequestId,
    auth::{answer_challenge, verify_response},
    credentials::CredentialStore,
    env::Environment,
    error::CoreError,
    marketplace::{IdPolicy, Marketplace},
    snapshot::{Snapshot, SnapshotEnvelope},
};

/// Identity of a replica within the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Side effect requested by the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaAction {
    /// Publish this encoded envelope on the state-sync channel.
    BroadcastSnapshot(Bytes),
}

/// Result of handling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Reply for the caller.
    pub reply: Reply,
    /// Actions for the driver.
    pub actions: Vec<ReplicaAction>,
}

/// Outcome of offering a snapshot to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotApplied {
    /// State replaced.
    Adopted {
        /// Sender of the snapshot.
        origin: NodeId,
        /// Revision carried by the snapshot.
        revision: u64,
    },
    /// Snapshot was our own and was ignored.
    OwnSnapshot,
    /// Snapshot predates a write already applied here and was ignored.
    Stale {
        /// Sender of the snapshot.
        origin: NodeId,
    },
}

/// One replica's marketplace and request handling.
pub struct ReplicaMachine<E: Environment> {
    node: NodeId,
    env: E,
    market: Marketplace,
    key_derivation: KeyDerivation,
    credentials: Arc<dyn CredentialStore>,
}

impl<E: Environment> ReplicaMachine<E> {
    /// Empty replica.
    pub fn new(
        node: NodeId,
        env: E,
        id_policy: IdPolicy,
        key_derivation: KeyDerivation,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self { node, env, market: Marketplace::new(id_policy), key_derivation, credentials }
    }

    /// This replica's id.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Current state.
    pub fn snapshot(&self) -> &Snapshot {
        self.market.snapshot()
    }

    /// The wrapped state machine.
    pub fn marketplace(&self) -> &Marketplace {
        &self.market
    }

    /// Execute one request that carries no request id.
    pub fn handle(&mut self, request: Request) -> Result<Execution, CoreError> {
        self.run(None, request)
    }

    /// Execute one request tagged by the coordinator.
    ///
    /// A write already recorded under `request_id` is not run again; the
    /// recorded reply is returned and nothing is broadcast.
    pub fn handle_tagged(&mut self, request_id: RequestId, request: Request) -> Result<Execution, CoreError> {
        if request.is_mutating()
            && let Some(reply) = self.market.snapshot().applied.get(request_id)
        {
            tracing::debug!(node = %self.node, op = request.name(), request = %request_id, "write already applied, replaying reply");
            return Ok(Execution { reply: reply.clone(), actions: Vec::new() });
        }
        self.run(Some(request_id), request)
    }

    fn run(&mut self, request_id: Option<RequestId>, request: Request) -> Result<Execution, CoreError> {
        let op = request.name();
        let before = self.market.snapshot().revision;

        let reply = self.execute(request)?;

        let mut actions = Vec::new();
        let revision = self.market.snapshot().revision;
        if revision != before {
            if let Some(id) = request_id {
                self.market.record_write(id, reply.clone());
            }
            let envelope = self.encode_snapshot()?;
            tracing::debug!(node = %self.node, op, revision, bytes = envelope.len(), "state changed, broadcasting");
            actions.push(ReplicaAction::BroadcastSnapshot(envelope));
        } else {
            tracing::trace!(node = %self.node, op, "handled without state change");
        }

        Ok(Execution { reply, actions })
    }

    /// Encode the current state for broadcast or state transfer.
    pub fn encode_snapshot(&self) -> Result<Bytes, CoreError> {
        SnapshotEnvelope::new(self.node, self.market.snapshot().clone()).encode()
    }

    /// Replace the state with a received snapshot.
    ///
    /// On error the current state is kept. So is it when the snapshot's newest
    /// recorded write is older than ours.
    pub fn apply_snapshot(&mut self, bytes: &[u8]) -> Result<SnapshotApplied, CoreError> {
        let envelope = SnapshotEnvelope::decode(bytes)?;
        if envelope.origin == self.node {
            return Ok(SnapshotApplied::OwnSnapshot);
        }

        let ours = self.market.snapshot().applied.latest();
        let theirs = envelope.snapshot.applied.latest();
        if theirs < ours {
            tracing::debug!(node = %self.node, origin = %envelope.origin, ?ours, ?theirs, "ignored stale snapshot");
            return Ok(SnapshotApplied::Stale { origin: envelope.origin });
        }

        let revision = envelope.snapshot.revision;
        self.market.replace(envelope.snapshot);
        tracing::debug!(node = %self.node, origin = %envelope.origin, revision, "adopted snapshot");
        Ok(SnapshotApplied::Adopted { origin: envelope.origin, revision })
    }

    fn execute(&mut self, request: Request) -> Result<Reply, CoreError> {
        let reply = match request {
            Request::CreateAuction(listing) => {
                let env = &self.env;
                Reply::AuctionCreated(self.market.create_auction(listing, || env.random_u64()))
            },
            Request::CloseAuction { auction_id, requester_id } => {
                Reply::Close(self.market.close_auction(auction_id, requester_id))
            },
            Request::PlaceBid { price, auction_id, bidder_id } => {
                Reply::Bid(self.market.place_bid(price, auction_id, bidder_id))
            },
            Request::AnnounceWinner { auction_id } => {
                Reply::Client(self.market.announce_winner(auction_id))
            },
            Request::RegisterClient { client_id, record } => {
                Reply::Registration(self.market.register_client(client_id, record))
            },
            Request::ValidateAuctionId { auction_id } => {
                Reply::Flag(self.market.validate_auction_id(auction_id))
            },
            Request::ValidateUserName { user_name } => {
                Reply::Flag(self.market.validate_user_name(&user_name))
            },
            Request::GetActiveAuctions => Reply::Auctions(self.market.active_auctions()),
            Request::GetClosedAuctions => Reply::Auctions(self.market.closed_auctions()),
            Request::GetRegisteredClients => Reply::Clients(self.market.registered_clients()),
            Request::ServerAuthenticationStep { key_name, challenge } => {
                let secret = self.secret_for(&key_name);
                Reply::Challenge(answer_challenge(&self.env, secret.as_ref(), challenge)?)
            },
            Request::ClientAuthenticationStep { response, key_name } => {
                let secret = self.secret_for(&key_name);
                let verified = verify_response(secret.as_ref(), &response);
                tracing::debug!(node = %self.node, user = %key_name, verified, "client authentication");
                Reply::Flag(verified)
            },
            Request::GetClientByCredential { password } => {
                Reply::Client(self.market.client_by_credential(&password))
            },
        };
        Ok(reply)
    }

    fn secret_for(&self, key_name: &str) -> Option<SharedSecret> {
        let credential = match self.credentials.load(key_name) {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                tracing::debug!(node = %self.node, user = %key_name, "no credential on record");
                return None;
            },
            Err(e) => {
                tracing::warn!(node = %self.node, user = %key_name, error = %e, "credential lookup failed");
                return None;
            },
        };

        match self.key_derivation.derive(&credential.name, credential.password.expose()) {
            Ok(secret) => Some(secret),
            Err(e) => {
                tracing::warn!(node = %self.node, user = %key_name, error = %e, "cannot derive secret");
                None
            },
        }
    }
}
