//! State replication: steady-state snapshot sync and join catch-up.
//!
//! Steady state is last-writer-wins on the whole snapshot: every received
//! envelope replaces the local state unless it lacks the newest coordinator
//! write already applied here. A joiner first subscribes to the sync channel,
//! then asks the oldest member for a full transfer, so no broadcast published
//! during the transfer is lost.

use std::{sync::Arc, time::Duration};

use gavel_core::{Environment, NodeId, ReplicaMachine, SnapshotApplied};
use tokio::sync::{Mutex, mpsc};

use crate::group::{Group, SyncEvent, SyncSubscription, TransferOutcome, TransferRequest};

/// How a joining node obtained its initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchUp {
    /// Adopted a transferred snapshot.
    Transferred {
        /// Member that sent it.
        from: NodeId,
        /// Revision of the adopted snapshot.
        revision: u64,
    },
    /// Started empty: no other member.
    FirstMember,
    /// Started empty: the transfer failed or timed out.
    StartedEmpty,
}

/// Request a full-state transfer and adopt it.
pub(crate) async fn catch_up<E: Environment>(
    group: &Group,
    node: NodeId,
    machine: &Mutex<ReplicaMachine<E>>,
    timeout: Duration,
) -> CatchUp {
    match group.request_transfer(node, timeout).await {
        TransferOutcome::Received { from, payload } => {
            match machine.lock().await.apply_snapshot(&payload) {
                Ok(SnapshotApplied::Adopted { revision, .. }) => {
                    tracing::info!(node = %node, from = %from, revision, "state transfer complete");
                    CatchUp::Transferred { from, revision }
                },
                Ok(SnapshotApplied::OwnSnapshot | SnapshotApplied::Stale { .. }) => CatchUp::StartedEmpty,
                Err(e) => {
                    tracing::error!(node = %node, from = %from, error = %e, "rejected transferred state");
                    CatchUp::StartedEmpty
                },
            }
        },
        TransferOutcome::NoPeers => {
            tracing::info!(node = %node, "first member, starting empty");
            CatchUp::FirstMember
        },
        TransferOutcome::TimedOut { from } => {
            tracing::warn!(node = %node, from = %from, ?timeout, "state transfer timed out, starting empty");
            CatchUp::StartedEmpty
        },
        TransferOutcome::PeerGone { from } => {
            tracing::warn!(node = %node, from = %from, "transfer peer left, starting empty");
            CatchUp::StartedEmpty
        },
    }
}

/// Apply snapshots from other members until the group closes.
pub(crate) async fn run_sync<E: Environment>(
    node: NodeId,
    mut subscription: SyncSubscription,
    machine: Arc<Mutex<ReplicaMachine<E>>>,
) {
    loop {
        match subscription.next().await {
            SyncEvent::Snapshot(message) => {
                let applied = machine.lock().await.apply_snapshot(&message.payload);
                match applied {
                    Ok(SnapshotApplied::Adopted { revision, .. }) => {
                        tracing::trace!(node = %node, origin = %message.origin, revision, "synced snapshot");
                    },
                    Ok(SnapshotApplied::Stale { .. } | SnapshotApplied::OwnSnapshot) => {},
                    Err(e) if e.is_fatal() => {
                        tracing::error!(node = %node, origin = %message.origin, error = %e, "sync failed");
                    },
                    Err(e) => {
                        tracing::warn!(node = %node, origin = %message.origin, error = %e, "dropped snapshot, keeping current state");
                    },
                }
            },
            SyncEvent::Lagged(skipped) => {
                tracing::warn!(node = %node, skipped, "state sync lagged, waiting for next snapshot");
            },
            SyncEvent::Closed => break,
        }
    }
}

/// Answer state-transfer requests with the current snapshot.
pub(crate) async fn serve_transfers<E: Environment>(
    node: NodeId,
    mut transfer_rx: mpsc::Receiver<TransferRequest>,
    machine: Arc<Mutex<ReplicaMachine<E>>>,
) {
    while let Some(request) = transfer_rx.recv().await {
        let encoded = machine.lock().await.encode_snapshot();
        match encoded {
            Ok(payload) => {
                tracing::debug!(node = %node, requester = %request.requester, bytes = payload.len(), "sending state transfer");
                if request.respond_to.send(payload).is_err() {
                    tracing::debug!(node = %node, requester = %request.requester, "joiner gave up on transfer");
                }
            },
            Err(e) => {
                tracing::error!(node = %node, error = %e, "cannot encode state for transfer");
            },
        }
    }
}
