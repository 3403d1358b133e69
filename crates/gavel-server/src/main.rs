//! Gavel server binary.
//!
//! # Usage
//!
//! ```bash
//! # Three replicas behind the front-end on the default port
//! gavel-server
//!
//! # Five replicas, majority reduction, HKDF-derived secrets
//! gavel-server --replicas 5 --reduction majority --key-derivation hkdf
//! ```

use std::{sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use gavel_core::{FileCredentialStore, IdPolicy};
use gavel_crypto::KeyDerivation;
use gavel_server::{ClusterConfig, CoordinatorConfig, ReductionPolicy, ReplicaConfig, Server};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Reduction {
    Last,
    Majority,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Ids {
    Sequential,
    Random,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kdf {
    Padded,
    Hkdf,
}

/// Gavel auction cluster
#[derive(Parser, Debug)]
#[command(name = "gavel-server")]
#[command(about = "Replicated auction marketplace server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:1090")]
    bind: String,

    /// Number of in-process replicas
    #[arg(long, default_value = "3")]
    replicas: usize,

    /// Fan-out deadline in milliseconds
    #[arg(long, default_value = "1000")]
    rpc_timeout_ms: u64,

    /// Join state-transfer deadline in milliseconds
    #[arg(long, default_value = "1000")]
    transfer_timeout_ms: u64,

    /// How replica replies are reduced to one
    #[arg(long, value_enum, default_value = "last")]
    reduction: Reduction,

    /// How auction ids are allocated
    #[arg(long, value_enum, default_value = "sequential")]
    id_policy: Ids,

    /// How the shared secret is derived from a password
    #[arg(long, value_enum, default_value = "padded")]
    key_derivation: Kdf,

    /// Directory holding NAME.txt credential files
    #[arg(long, default_value = ".")]
    credentials_dir: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Gavel server starting");
    tracing::info!("Binding to {}", args.bind);

    if matches!(args.key_derivation, Kdf::Padded) {
        tracing::warn!("Shared secrets are padded passwords; use --key-derivation hkdf where clients support it");
    }

    let config = ClusterConfig {
        bind_address: args.bind,
        replicas: args.replicas,
        coordinator: CoordinatorConfig {
            rpc_timeout: Duration::from_millis(args.rpc_timeout_ms),
            reduction: match args.reduction {
                Reduction::Last => ReductionPolicy::LastResponder,
                Reduction::Majority => ReductionPolicy::Majority,
            },
        },
        replica: ReplicaConfig {
            id_policy: match args.id_policy {
                Ids::Sequential => IdPolicy::Sequential,
                Ids::Random => IdPolicy::Random,
            },
            key_derivation: match args.key_derivation {
                Kdf::Padded => KeyDerivation::Padded,
                Kdf::Hkdf => KeyDerivation::Hkdf,
            },
            transfer_timeout: Duration::from_millis(args.transfer_timeout_ms),
        },
    };

    let credentials = Arc::new(FileCredentialStore::new(args.credentials_dir));
    let server = Server::bind(config, credentials).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
