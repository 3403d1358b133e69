//! Replica node driver.
//!
//! A [`ReplicaNode`] owns one [`ReplicaMachine`] behind a tokio mutex and runs
//! three tasks against it:
//!
//! - RPC: requests in channel delivery order, one at a time
//! - sync: snapshots published by other members
//! - transfer: full-state requests from joiners
//!
//! All of them take the lock, so a broadcast or transfer never captures a
//! half-applied mutation.

use std::{sync::Arc, time::Duration};

use gavel_core::{
    CredentialStore, Environment, IdPolicy, NodeId, ReplicaAction, ReplicaMachine, Snapshot,
};
use gavel_crypto::KeyDerivation;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};

use crate::{
    group::{Group, RpcEnvelope, RpcReply},
    replication::{self, CatchUp},
};

/// Per-replica settings.
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// Auction id allocation.
    pub id_policy: IdPolicy,
    /// Shared-secret derivation for authentication.
    pub key_derivation: KeyDerivation,
    /// Bound on the join state transfer.
    pub transfer_timeout: Duration,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            id_policy: IdPolicy::Sequential,
            key_derivation: KeyDerivation::Padded,
            transfer_timeout: Duration::from_millis(1000),
        }
    }
}

/// A running replica. Leaves the group when dropped.
pub struct ReplicaNode<E: Environment> {
    id: NodeId,
    group: Group,
    machine: Arc<Mutex<ReplicaMachine<E>>>,
    catch_up: CatchUp,
    tasks: Vec<JoinHandle<()>>,
}

impl<E: Environment> ReplicaNode<E> {
    /// Join `group`: subscribe to state sync, catch up from the oldest member,
    /// then start answering RPCs.
    pub async fn join(
        group: &Group,
        env: E,
        config: &ReplicaConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let id = group.allocate_id();
        let subscription = group.subscribe(id);

        let machine = Arc::new(Mutex::new(ReplicaMachine::new(
            id,
            env,
            config.id_policy,
            config.key_derivation,
            credentials,
        )));
        let catch_up = replication::catch_up(group, id, &machine, config.transfer_timeout).await;

        let membership = group.register(id);
        let tasks = vec![
            tokio::spawn(serve_rpcs(id, group.clone(), membership.rpc_rx, Arc::clone(&machine))),
            tokio::spawn(replication::run_sync(id, subscription, Arc::clone(&machine))),
            tokio::spawn(replication::serve_transfers(id, membership.transfer_rx, Arc::clone(&machine))),
        ];

        tracing::info!(node = %id, ?catch_up, "replica joined");
        Self { id, group: group.clone(), machine, catch_up, tasks }
    }

    /// This replica's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// How the replica obtained its initial state.
    pub fn catch_up(&self) -> CatchUp {
        self.catch_up
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> Snapshot {
        self.machine.lock().await.snapshot().clone()
    }

    /// Leave the group and stop all tasks.
    pub fn leave(self) {
        drop(self);
    }
}

impl<E: Environment> Drop for ReplicaNode<E> {
    fn drop(&mut self) {
        self.group.leave(self.id);
        for task in &self.tasks {
            task.abort();
        }
        tracing::debug!(node = %self.id, "replica stopped");
    }
}

async fn serve_rpcs<E: Environment>(
    node: NodeId,
    group: Group,
    mut rpc_rx: mpsc::Receiver<RpcEnvelope>,
    machine: Arc<Mutex<ReplicaMachine<E>>>,
) {
    while let Some(RpcEnvelope { request_id, request, reply_to }) = rpc_rx.recv().await {
        let op = request.name();
        let reply = {
            let mut machine = machine.lock().await;
            match machine.handle_tagged(request_id, request) {
                Ok(execution) => {
                    for action in execution.actions {
                        match action {
                            ReplicaAction::BroadcastSnapshot(payload) => {
                                let reached = group.publish(node, payload);
                                tracing::trace!(node = %node, op, reached, "published snapshot");
                            },
                        }
                    }
                    Some(execution.reply)
                },
                Err(e) if e.is_fatal() => {
                    tracing::error!(node = %node, op, request = %request_id, error = %e, "request failed");
                    None
                },
                Err(e) => {
                    tracing::warn!(node = %node, op, request = %request_id, error = %e, "request not answered");
                    None
                },
            }
        };

        if let Some(reply) = reply
            && reply_to.send(RpcReply { node, reply }).await.is_err()
        {
            tracing::debug!(node = %node, op, "caller stopped waiting");
        }
    }
}
