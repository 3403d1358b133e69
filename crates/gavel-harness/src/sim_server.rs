//! Cluster front-ends for simulation.
//!
//! [`run_front_end`] serves a [`Cluster`] over turmoil's simulated TCP, so
//! clients reach it through latency and loss like a real network.
//! [`InProcess`] skips the network and calls the coordinator directly.

use std::{
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
};

use async_trait::async_trait;
use gavel_client::{ClientError, Remote};
use gavel_core::CredentialStore;
use gavel_proto::{Reply, Request};
use gavel_server::{Cluster, Coordinator, CoordinatorConfig, ReplicaConfig, serve_connection};
use turmoil::net::TcpListener;

use crate::sim_env::SimEnv;

/// Front-end port used in simulations.
pub const FRONT_END_PORT: u16 = 1090;

/// Start `replicas` replicas and serve them on [`FRONT_END_PORT`] until the
/// simulation ends.
///
/// Must run inside a turmoil host.
pub async fn run_front_end(
    env: SimEnv,
    replicas: usize,
    replica: ReplicaConfig,
    coordinator: CoordinatorConfig,
    credentials: Arc<dyn CredentialStore>,
) -> turmoil::Result {
    let cluster = Cluster::start(env, replicas, replica, coordinator, credentials).await;
    let listener = TcpListener::bind((IpAddr::V4(Ipv4Addr::UNSPECIFIED), FRONT_END_PORT)).await?;
    tracing::info!(replicas, port = FRONT_END_PORT, "simulated front-end listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let coordinator = cluster.coordinator();
        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, &coordinator).await {
                tracing::debug!(%peer, error = %e, "simulated connection ended");
            }
        });
    }
}

/// [`Remote`] that calls a coordinator in the same process.
///
/// Coordinator failures surface as [`ClientError::Unavailable`], as they do
/// across the network.
pub struct InProcess(Arc<Coordinator>);

impl InProcess {
    /// Wrap a coordinator.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self(coordinator)
    }
}

#[async_trait]
impl Remote for InProcess {
    async fn call(&mut self, request: Request) -> Result<Reply, ClientError> {
        match self.0.call(request).await {
            Ok(Reply::Unavailable { reason }) => Err(ClientError::Unavailable { reason }),
            Ok(reply) => Ok(reply),
            Err(e) => Err(ClientError::Unavailable { reason: e.to_string() }),
        }
    }
}
