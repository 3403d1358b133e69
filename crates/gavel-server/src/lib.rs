//! Gavel replica cluster.
//!
//! This crate runs the replicated marketplace:
//! - an in-process replica group (RPC, state-sync and state-transfer channels)
//! - replica nodes driving the sans-IO `ReplicaMachine`
//! - the fan-out coordinator
//! - a TCP front-end speaking the framed CBOR protocol
//!
//! ## Architecture
//!
//! ```text
//! gavel-server
//!   ├─ Server             (TCP accept loop)
//!   │    └─ serve_connection (frame in → Coordinator → frame out)
//!   ├─ Coordinator        (fan-out + ReductionPolicy)
//!   ├─ Group              (RPC view, state sync, state transfer)
//!   ├─ ReplicaNode × N    (ReplicaMachine behind a mutex)
//!   └─ SystemEnv          (production Environment impl)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod coordinator;
mod error;
pub mod group;
mod node;
mod replication;
mod system_env;

use std::{net::SocketAddr, sync::Arc, time::Duration};

pub use coordinator::{Coordinator, CoordinatorConfig, ReductionPolicy};
pub use error::{CoordinatorError, ServerError};
use gavel_core::{CredentialStore, Environment, Snapshot, read_frame, write_frame};
use gavel_proto::{Reply, Request};
pub use group::{Group, GroupConfig, Membership};
pub use node::{ReplicaConfig, ReplicaNode};
pub use replication::CatchUp;
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};

/// Cluster configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Address the front-end binds to.
    pub bind_address: String,
    /// Number of in-process replicas.
    pub replicas: usize,
    /// Fan-out settings.
    pub coordinator: CoordinatorConfig,
    /// Per-replica settings.
    pub replica: ReplicaConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:1090".to_string(),
            replicas: 3,
            coordinator: CoordinatorConfig::default(),
            replica: ReplicaConfig::default(),
        }
    }
}

/// A replica group with its coordinator.
pub struct Cluster<E: Environment> {
    group: Group,
    nodes: Vec<ReplicaNode<E>>,
    coordinator: Arc<Coordinator>,
    env: E,
    replica: ReplicaConfig,
    credentials: Arc<dyn CredentialStore>,
}

impl<E: Environment> Cluster<E> {
    /// Start `replicas` nodes one after another, each catching up from the
    /// group before the next joins.
    pub async fn start(
        env: E,
        replicas: usize,
        replica: ReplicaConfig,
        coordinator: CoordinatorConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let group = Group::default();
        let coordinator = Arc::new(Coordinator::new(group.clone(), coordinator));
        let mut cluster = Self { group, nodes: Vec::with_capacity(replicas), coordinator, env, replica, credentials };
        for _ in 0..replicas {
            cluster.add_replica().await;
        }
        cluster
    }

    /// Join one more replica. It catches up from the oldest member.
    pub async fn add_replica(&mut self) -> &ReplicaNode<E> {
        let node =
            ReplicaNode::join(&self.group, self.env.clone(), &self.replica, Arc::clone(&self.credentials))
                .await;
        let index = self.nodes.len();
        self.nodes.push(node);
        &self.nodes[index]
    }

    /// Stop the replica at `index`. Returns whether it existed.
    pub fn remove_replica(&mut self, index: usize) -> bool {
        if index < self.nodes.len() {
            self.nodes.remove(index).leave();
            true
        } else {
            false
        }
    }

    /// Shared coordinator.
    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(&self.coordinator)
    }

    /// The group the replicas are in.
    pub fn group(&self) -> &Group {
        &self.group
    }

    /// Running replicas, oldest first.
    pub fn nodes(&self) -> &[ReplicaNode<E>] {
        &self.nodes
    }

    /// Copies of every replica's state, oldest replica first.
    pub async fn snapshots(&self) -> Vec<Snapshot> {
        let mut snapshots = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            snapshots.push(node.snapshot().await);
        }
        snapshots
    }

    /// Whether every replica currently holds the same state.
    pub async fn converged(&self) -> bool {
        let snapshots = self.snapshots().await;
        snapshots.windows(2).all(|pair| pair[0] == pair[1])
    }

    /// Wait until the replicas agree on two consecutive polls.
    ///
    /// Snapshots published by earlier operations can still be in flight when
    /// a call returns; this waits for the sync channel to drain.
    pub async fn settle(&self, timeout: Duration) -> bool {
        let deadline = self.env.now() + timeout;
        let mut agreed = false;
        loop {
            if self.converged().await {
                if agreed {
                    return true;
                }
                agreed = true;
            } else {
                agreed = false;
            }
            if self.env.now() >= deadline {
                return false;
            }
            self.env.sleep(SETTLE_POLL).await;
        }
    }
}

const SETTLE_POLL: Duration = Duration::from_millis(5);

/// Production Gavel server.
pub struct Server {
    listener: TcpListener,
    cluster: Cluster<SystemEnv>,
}

impl Server {
    /// Start the replicas and bind the front-end.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or binding fails.
    pub async fn bind(
        config: ClusterConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ServerError> {
        if config.replicas == 0 {
            return Err(ServerError::Config("at least one replica is required".to_string()));
        }

        let cluster = Cluster::start(
            SystemEnv::new(),
            config.replicas,
            config.replica,
            config.coordinator,
            credentials,
        )
        .await;
        let listener = TcpListener::bind(&config.bind_address).await?;

        Ok(Self { listener, cluster })
    }

    /// Accept connections until the process stops.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.local_addr()?, replicas = self.cluster.nodes().len(), "server starting");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let coordinator = self.cluster.coordinator();
                    tokio::spawn(async move {
                        tracing::debug!(%peer, "connection accepted");
                        if let Err(e) = serve_connection(stream, &coordinator).await {
                            tracing::debug!(%peer, error = %e, "connection error");
                        }
                    });
                },
                Err(e) => {
                    tracing::error!("accept error: {}", e);
                },
            }
        }
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Answer framed requests on one stream until the peer closes it.
///
/// Connectivity failures of the cluster are answered with
/// [`Reply::Unavailable`] rather than closing the stream.
pub async fn serve_connection<S>(mut stream: S, coordinator: &Coordinator) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(request) = read_frame::<_, Request>(&mut stream).await? {
        let op = request.name();
        let reply = match coordinator.call(request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(op, error = %e, "call failed");
                Reply::Unavailable { reason: e.to_string() }
            },
        };
        write_frame(&mut stream, &reply).await?;
    }
    Ok(())
}
