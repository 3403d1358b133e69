//! In-process group communication.
//!
//! The [`Group`] connects replicas and the front-end over three channels:
//!
//! ```text
//!                 ┌──────────── RPC (mpsc per member) ─────────────┐
//! Coordinator ────┤                                                ├──▶ ReplicaNode
//!                 └── RpcReply (mpsc per call) ◀───────────────────┘
//!
//! ReplicaNode ──publish──▶ state-sync (broadcast) ──▶ every other subscriber
//!
//! Joiner ──TransferRequest──▶ oldest member ──oneshot(snapshot)──▶ Joiner
//! ```
//!
//! Node ids are handed out in increasing order, so the smallest registered id
//! is the longest-running member.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use gavel_core::{NodeId, RequestId};
use gavel_proto::{Reply, Request};
use tokio::sync::{broadcast, mpsc, oneshot};

/// A request addressed to one member.
#[derive(Debug)]
pub struct RpcEnvelope {
    /// Id shared by every member's copy of the same call.
    pub request_id: RequestId,
    /// Operation to execute.
    pub request: Request,
    /// Where to send the reply.
    pub reply_to: mpsc::Sender<RpcReply>,
}

/// A member's reply to an [`RpcEnvelope`].
#[derive(Debug, Clone)]
pub struct RpcReply {
    /// Replying member.
    pub node: NodeId,
    /// The reply.
    pub reply: Reply,
}

/// An encoded snapshot on the state-sync channel.
#[derive(Debug, Clone)]
pub struct SyncMessage {
    /// Publishing member.
    pub origin: NodeId,
    /// Encoded `SnapshotEnvelope`.
    pub payload: Bytes,
}

/// A joiner asking a member for its full state.
#[derive(Debug)]
pub struct TransferRequest {
    /// Joining node.
    pub requester: NodeId,
    /// Where to send the encoded snapshot.
    pub respond_to: oneshot::Sender<Bytes>,
}

/// Channel sizing.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Queue depth of each member's RPC channel.
    pub rpc_queue_depth: usize,
    /// Capacity of the state-sync broadcast before slow receivers lag.
    pub sync_capacity: usize,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self { rpc_queue_depth: 256, sync_capacity: 256 }
    }
}

/// Receiving side of a member's registration.
#[derive(Debug)]
pub struct Membership {
    /// Member id.
    pub id: NodeId,
    /// Requests addressed to this member, in delivery order.
    pub rpc_rx: mpsc::Receiver<RpcEnvelope>,
    /// State-transfer requests from joiners.
    pub transfer_rx: mpsc::Receiver<TransferRequest>,
}

/// What the state-sync channel delivered.
#[derive(Debug)]
pub enum SyncEvent {
    /// A snapshot from another member.
    Snapshot(SyncMessage),
    /// This subscriber fell behind and missed messages.
    Lagged(u64),
    /// The group is gone.
    Closed,
}

/// A member's view of the state-sync channel. Own messages are filtered out.
#[derive(Debug)]
pub struct SyncSubscription {
    node: NodeId,
    rx: broadcast::Receiver<SyncMessage>,
}

impl SyncSubscription {
    /// Next message published by another member.
    pub async fn next(&mut self) -> SyncEvent {
        loop {
            match self.rx.recv().await {
                Ok(message) if message.origin == self.node => {},
                Ok(message) => return SyncEvent::Snapshot(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => return SyncEvent::Lagged(skipped),
                Err(broadcast::error::RecvError::Closed) => return SyncEvent::Closed,
            }
        }
    }
}

/// Result of asking for a state transfer.
#[derive(Debug)]
pub enum TransferOutcome {
    /// A member answered.
    Received {
        /// Member that answered.
        from: NodeId,
        /// Encoded snapshot.
        payload: Bytes,
    },
    /// Nobody else is registered.
    NoPeers,
    /// The member did not answer in time.
    TimedOut {
        /// Member that was asked.
        from: NodeId,
    },
    /// The member left before answering.
    PeerGone {
        /// Member that was asked.
        from: NodeId,
    },
}

#[derive(Debug, Clone)]
struct MemberHandle {
    rpc_tx: mpsc::Sender<RpcEnvelope>,
    transfer_tx: mpsc::Sender<TransferRequest>,
}

#[derive(Debug)]
struct GroupInner {
    members: RwLock<BTreeMap<NodeId, MemberHandle>>,
    sync_tx: broadcast::Sender<SyncMessage>,
    next_id: AtomicU64,
    next_request: AtomicU64,
    config: GroupConfig,
}

/// The replica group. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Group {
    inner: Arc<GroupInner>,
}

impl Default for Group {
    fn default() -> Self {
        Self::new(GroupConfig::default())
    }
}

impl Group {
    /// Empty group.
    pub fn new(config: GroupConfig) -> Self {
        let (sync_tx, _) = broadcast::channel(config.sync_capacity.max(1));
        Self {
            inner: Arc::new(GroupInner {
                members: RwLock::new(BTreeMap::new()),
                sync_tx,
                next_id: AtomicU64::new(1),
                next_request: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// Reserve an id for a node that is about to join.
    pub fn allocate_id(&self) -> NodeId {
        NodeId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Id for the next fanned-out call. Increases for the life of the group.
    pub fn next_request_id(&self) -> RequestId {
        RequestId(self.inner.next_request.fetch_add(1, Ordering::Relaxed))
    }

    /// Subscribe `node` to the state-sync channel.
    pub fn subscribe(&self, node: NodeId) -> SyncSubscription {
        SyncSubscription { node, rx: self.inner.sync_tx.subscribe() }
    }

    /// Publish a snapshot. Returns the number of subscribers reached,
    /// including the publisher's own subscription.
    pub fn publish(&self, origin: NodeId, payload: Bytes) -> usize {
        self.inner.sync_tx.send(SyncMessage { origin, payload }).unwrap_or(0)
    }

    /// Ask the longest-running member other than `requester` for its state.
    pub async fn request_transfer(&self, requester: NodeId, timeout: Duration) -> TransferOutcome {
        let target = {
            let members = self.inner.members.read().unwrap_or_else(PoisonError::into_inner);
            members
                .iter()
                .find(|(id, _)| **id != requester)
                .map(|(id, handle)| (*id, handle.transfer_tx.clone()))
        };
        let Some((from, transfer_tx)) = target else {
            return TransferOutcome::NoPeers;
        };

        let (respond_to, response) = oneshot::channel();
        let exchange = async {
            transfer_tx.send(TransferRequest { requester, respond_to }).await.ok()?;
            response.await.ok()
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(Some(payload)) => TransferOutcome::Received { from, payload },
            Ok(None) => TransferOutcome::PeerGone { from },
            Err(_) => TransferOutcome::TimedOut { from },
        }
    }

    /// Add `id` to the RPC view and to the state-transfer candidates.
    pub fn register(&self, id: NodeId) -> Membership {
        let depth = self.inner.config.rpc_queue_depth.max(1);
        let (rpc_tx, rpc_rx) = mpsc::channel(depth);
        let (transfer_tx, transfer_rx) = mpsc::channel(depth);

        self.inner
            .members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, MemberHandle { rpc_tx, transfer_tx });
        tracing::debug!(node = %id, "member registered");

        Membership { id, rpc_rx, transfer_rx }
    }

    /// Allocate an id and register it without state transfer.
    pub fn join_member(&self) -> Membership {
        let id = self.allocate_id();
        self.register(id)
    }

    /// Remove `id` from the group. Returns whether it was a member.
    pub fn leave(&self, id: NodeId) -> bool {
        let removed =
            self.inner.members.write().unwrap_or_else(PoisonError::into_inner).remove(&id).is_some();
        if removed {
            tracing::debug!(node = %id, "member left");
        }
        removed
    }

    /// Current RPC view: every registered member and its request channel.
    pub fn rpc_view(&self) -> Vec<(NodeId, mpsc::Sender<RpcEnvelope>)> {
        let members = self.inner.members.read().unwrap_or_else(PoisonError::into_inner);
        members.iter().map(|(id, handle)| (*id, handle.rpc_tx.clone())).collect()
    }

    /// Registered member ids, oldest first.
    pub fn members(&self) -> Vec<NodeId> {
        self.inner.members.read().unwrap_or_else(PoisonError::into_inner).keys().copied().collect()
    }
}
