//! Replica group behaviour through the coordinator.
//!
//! Snapshots from one call can still be in flight when the next call starts,
//! so every write is followed by `Cluster::settle`. The threaded tests run the
//! replicas' RPC and sync tasks in parallel, where a peer's snapshot can reach
//! a replica before its own copy of the same write.

use std::{sync::Arc, time::Duration};

use bigdecimal::BigDecimal;
use gavel_client::{ClientConfig, ClientError, MarketClient};
use gavel_core::{Credential, CredentialStore, MemoryCredentialStore};
use gavel_harness::{InProcess, SimEnv};
use gavel_proto::{
    AuctionId, BidOutcome, ClientId, ClientRecord, CloseOutcome, NewAuction, Password,
    RegisterOutcome,
};
use gavel_server::{CatchUp, Cluster, CoordinatorConfig, ReductionPolicy, ReplicaConfig};

const SETTLE: Duration = Duration::from_secs(2);

async fn cluster(replicas: usize, reduction: ReductionPolicy, store: Arc<MemoryCredentialStore>) -> Cluster<SimEnv> {
    let coordinator = CoordinatorConfig { reduction, ..CoordinatorConfig::default() };
    Cluster::start(SimEnv::with_seed(11), replicas, ReplicaConfig::default(), coordinator, store).await
}

fn record(name: &str) -> ClientRecord {
    ClientRecord {
        name: name.to_string(),
        email: format!("{name}@example.com"),
        password: Password::new(format!("{name}-pw")),
    }
}

fn listing(seller: u64, starting: i64, reserve: i64) -> NewAuction {
    NewAuction {
        description: "brass telescope".to_string(),
        reserved_price: BigDecimal::from(reserve),
        starting_price: BigDecimal::from(starting),
        seller_id: ClientId(seller),
    }
}

#[tokio::test]
async fn replicas_converge_after_writes() {
    let cluster = cluster(3, ReductionPolicy::Majority, Arc::default()).await;
    let coordinator = cluster.coordinator();

    let registered = coordinator.register_client(ClientId(1), record("ada")).await.unwrap();
    assert_eq!(registered, RegisterOutcome::Registered);
    assert!(cluster.settle(SETTLE).await);

    let id = coordinator.create_auction(listing(1, 5, 10)).await.unwrap();
    assert!(cluster.settle(SETTLE).await);

    let snapshots = cluster.snapshots().await;
    assert_eq!(snapshots.len(), 3);
    assert!(snapshots.iter().all(|s| s == &snapshots[0]));
    assert!(snapshots[0].active.contains_key(&id));
    assert!(snapshots[0].clients.contains_key(&ClientId(1)));

    assert!(coordinator.validate_auction_id(id).await.unwrap());
    assert!(coordinator.validate_user_name("ADA").await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn threaded_write_is_applied_once() {
    let policies = [ReductionPolicy::LastResponder, ReductionPolicy::Majority];
    for (round, reduction) in policies.into_iter().cycle().take(40).enumerate() {
        let cluster = cluster(3, reduction, Arc::default()).await;
        let coordinator = cluster.coordinator();

        let id = coordinator.create_auction(listing(1, 1, 100)).await.unwrap();
        assert!(cluster.settle(SETTLE).await, "round {round}");
        for snapshot in cluster.snapshots().await {
            assert_eq!(snapshot.active.len(), 1, "round {round}: duplicate auction");
        }

        let outcome = coordinator.place_bid(BigDecimal::from(5), id, ClientId(2)).await.unwrap();
        assert_eq!(outcome, BidOutcome::Accepted, "round {round}");
        assert!(cluster.settle(SETTLE).await, "round {round}");
        for snapshot in cluster.snapshots().await {
            assert_eq!(snapshot.active[&id].highest_bid, BigDecimal::from(5), "round {round}");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn threaded_back_to_back_writes_keep_every_outcome() {
    let cluster = cluster(3, ReductionPolicy::LastResponder, Arc::default()).await;
    let coordinator = cluster.coordinator();

    let mut ids = Vec::new();
    for seller in 1..=10 {
        ids.push(coordinator.create_auction(listing(seller, 1, 10)).await.unwrap());
    }
    for (price, id) in (1..).zip(&ids) {
        let outcome = coordinator.place_bid(BigDecimal::from(price), *id, ClientId(99)).await.unwrap();
        assert_eq!(outcome, BidOutcome::Accepted);
    }
    assert!(cluster.settle(SETTLE).await);

    let expected: Vec<AuctionId> = (1..=10).map(AuctionId).collect();
    assert_eq!(ids, expected);
    for snapshot in cluster.snapshots().await {
        assert_eq!(snapshot.active.len(), 10);
        assert!(snapshot.active.values().all(|auction| auction.highest_bidder == Some(ClientId(99))));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn threaded_registrations_land_once() {
    let store = Arc::new(MemoryCredentialStore::new());
    let cluster = cluster(3, ReductionPolicy::LastResponder, store.clone()).await;
    let mut client = MarketClient::new(
        InProcess::new(cluster.coordinator()),
        SimEnv::with_seed(31),
        store,
        ClientConfig::default(),
    );

    let names = ["ann", "ben", "cat", "dan", "eve"];
    let mut profiles = Vec::new();
    for name in names {
        let email = format!("{name}@example.com");
        profiles.push(client.register(name, &email, Password::new(format!("{name}-pw"))).await.unwrap());
    }
    assert!(cluster.settle(SETTLE).await);

    assert_eq!(client.registered_clients().await.unwrap().len(), names.len());
    for snapshot in cluster.snapshots().await {
        assert_eq!(snapshot.clients.len(), names.len());
    }
    for profile in profiles {
        let session = client.login(&profile.name).await.unwrap();
        assert_eq!(session.client_id(), profile.id);
    }
}

#[tokio::test]
async fn first_member_starts_empty_and_late_joiner_catches_up() {
    let mut cluster = cluster(1, ReductionPolicy::LastResponder, Arc::default()).await;
    assert_eq!(cluster.nodes()[0].catch_up(), CatchUp::FirstMember);

    let coordinator = cluster.coordinator();
    coordinator.register_client(ClientId(4), record("grace")).await.unwrap();
    coordinator.create_auction(listing(4, 1, 2)).await.unwrap();
    assert!(cluster.settle(SETTLE).await);

    let oldest = cluster.nodes()[0].id();
    let joined = cluster.add_replica().await.catch_up();
    assert!(matches!(joined, CatchUp::Transferred { from, .. } if from == oldest));
    assert!(cluster.converged().await);

    let snapshots = cluster.snapshots().await;
    assert_eq!(snapshots[1].active.len(), 1);
    assert_eq!(snapshots[1].clients.len(), 1);
}

#[tokio::test]
async fn late_joiner_takes_part_in_later_writes() {
    let mut cluster = cluster(2, ReductionPolicy::Majority, Arc::default()).await;
    let coordinator = cluster.coordinator();
    let id = coordinator.create_auction(listing(1, 1, 100)).await.unwrap();
    assert!(cluster.settle(SETTLE).await);

    cluster.add_replica().await;
    assert_eq!(cluster.group().members().len(), 3);

    let outcome = coordinator.place_bid(BigDecimal::from(7), id, ClientId(2)).await.unwrap();
    assert_eq!(outcome, BidOutcome::Accepted);
    assert!(cluster.settle(SETTLE).await);

    for snapshot in cluster.snapshots().await {
        assert_eq!(snapshot.active[&id].highest_bid, BigDecimal::from(7));
    }
}

#[tokio::test]
async fn departed_replica_leaves_the_view() {
    let mut cluster = cluster(3, ReductionPolicy::Majority, Arc::default()).await;
    assert!(cluster.remove_replica(0));
    assert!(!cluster.remove_replica(5));
    assert_eq!(cluster.group().members().len(), 2);

    let id = cluster.coordinator().create_auction(listing(3, 1, 1)).await.unwrap();
    assert!(cluster.settle(SETTLE).await);
    assert!(cluster.snapshots().await.iter().all(|s| s.active.contains_key(&id)));
}

#[tokio::test]
async fn reserve_met_scenario_over_the_cluster() {
    let cluster = cluster(3, ReductionPolicy::Majority, Arc::default()).await;
    let coordinator = cluster.coordinator();
    for (id, name) in [(1, "seller"), (2, "low"), (3, "high")] {
        coordinator.register_client(ClientId(id), record(name)).await.unwrap();
        assert!(cluster.settle(SETTLE).await);
    }

    let id = coordinator.create_auction(listing(1, 10, 50)).await.unwrap();
    assert!(cluster.settle(SETTLE).await);

    for (price, bidder, expected) in
        [(20, 2, BidOutcome::Accepted), (15, 3, BidOutcome::Rejected), (60, 3, BidOutcome::Accepted)]
    {
        let outcome = coordinator.place_bid(BigDecimal::from(price), id, ClientId(bidder)).await.unwrap();
        assert_eq!(outcome, expected, "bid {price}");
        assert!(cluster.settle(SETTLE).await);
    }

    assert_eq!(coordinator.close_auction(id, ClientId(2)).await.unwrap(), CloseOutcome::Forbidden);
    let closed = coordinator.close_auction(id, ClientId(1)).await.unwrap();
    assert_eq!(closed.code(), 1);
    assert!(cluster.settle(SETTLE).await);

    let winner = coordinator.announce_winner(id).await.unwrap();
    assert_eq!(winner.map(|p| p.name).as_deref(), Some("high"));
    assert_eq!(coordinator.close_auction(id, ClientId(1)).await.unwrap(), CloseOutcome::NotFound);
}

#[tokio::test]
async fn reserve_not_met_scenario_over_the_cluster() {
    let cluster = cluster(3, ReductionPolicy::LastResponder, Arc::default()).await;
    let coordinator = cluster.coordinator();
    coordinator.register_client(ClientId(1), record("seller")).await.unwrap();
    assert!(cluster.settle(SETTLE).await);

    let id = coordinator.create_auction(listing(1, 10, 100)).await.unwrap();
    assert!(cluster.settle(SETTLE).await);
    coordinator.place_bid(BigDecimal::from(80), id, ClientId(2)).await.unwrap();
    assert!(cluster.settle(SETTLE).await);
    coordinator.close_auction(id, ClientId(1)).await.unwrap();
    assert!(cluster.settle(SETTLE).await);

    assert_eq!(coordinator.announce_winner(id).await.unwrap(), None);
    assert!(coordinator.active_auctions().await.unwrap().is_empty());
    assert_eq!(coordinator.closed_auctions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn login_across_replicas() {
    let store = Arc::new(MemoryCredentialStore::new());
    let cluster = cluster(3, ReductionPolicy::Majority, store.clone()).await;
    let mut client = MarketClient::new(
        InProcess::new(cluster.coordinator()),
        SimEnv::with_seed(21),
        store,
        ClientConfig::default(),
    );

    let profile = client.register("linus", "linus@example.com", Password::new("penguin1")).await.unwrap();
    assert!(cluster.settle(SETTLE).await);

    let session = client.login("LINUS").await.unwrap();
    assert_eq!(session.client_id(), profile.id);
    assert_eq!(cluster.coordinator().registered_clients().await.unwrap().len(), 1);
}

#[tokio::test]
async fn mismatched_secret_fails_across_replicas() {
    let server_store = Arc::new(MemoryCredentialStore::new());
    let client_store = Arc::new(MemoryCredentialStore::new());
    let cluster = cluster(3, ReductionPolicy::LastResponder, server_store.clone()).await;
    server_store.store(&Credential::new("mallory", Password::new("real-password"))).unwrap();
    client_store.store(&Credential::new("mallory", Password::new("guessed"))).unwrap();

    let mut client = MarketClient::new(
        InProcess::new(cluster.coordinator()),
        SimEnv::with_seed(22),
        client_store,
        ClientConfig::default(),
    );

    let err = client.login("mallory").await.unwrap_err();
    assert!(matches!(err, ClientError::ServerNotVerified { .. }));
}

#[tokio::test]
async fn unknown_user_cannot_verify_the_server() {
    let client_store = Arc::new(MemoryCredentialStore::new());
    let cluster = cluster(2, ReductionPolicy::LastResponder, Arc::default()).await;
    client_store.store(&Credential::new("ghost", Password::new("boo"))).unwrap();

    let mut client =
        MarketClient::new(InProcess::new(cluster.coordinator()), SimEnv::with_seed(23), client_store, ClientConfig::default());

    let err = client.login("ghost").await.unwrap_err();
    assert!(matches!(err, ClientError::ServerNotVerified { .. }));
}

#[tokio::test]
async fn empty_cluster_is_unavailable_to_clients() {
    let cluster = cluster(0, ReductionPolicy::LastResponder, Arc::default()).await;
    let mut client = MarketClient::new(
        InProcess::new(cluster.coordinator()),
        SimEnv::new(),
        Arc::new(MemoryCredentialStore::new()),
        ClientConfig::default(),
    );

    let err = client.active_auctions().await.unwrap_err();
    assert!(matches!(err, ClientError::Unavailable { .. }));
    assert!(!err.is_fatal());
}
