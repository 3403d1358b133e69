//! Model-based property tests.
//!
//! Random operation sequences are applied to the reference model and to a
//! real replica; every reply and the final observable state must match.
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelMarket   ReplicaMachine    Compare
//!      (reference)   (+ follower)      Replies
//! ```

use std::sync::Arc;

use gavel_core::{IdPolicy, MemoryCredentialStore, NodeId, ReplicaAction, ReplicaMachine, SnapshotApplied};
use gavel_crypto::KeyDerivation;
use gavel_harness::{
    ModelMarket, ObservableState, Operation, SimEnv,
    model::operation::{AUCTION_SLOTS, CLIENT_SLOTS, NAME_SLOTS},
};
use proptest::prelude::*;

fn replica(node: u64, seed: u64) -> ReplicaMachine<SimEnv> {
    ReplicaMachine::new(
        NodeId(node),
        SimEnv::with_seed(seed),
        IdPolicy::Sequential,
        KeyDerivation::Padded,
        Arc::new(MemoryCredentialStore::new()),
    )
}

fn observe(replica: &ReplicaMachine<SimEnv>) -> ObservableState {
    let market = replica.marketplace();
    ObservableState {
        active: market.active_auctions(),
        closed: market.closed_auctions(),
        clients: market.registered_clients(),
    }
}

/// Strategy for generating operations over the model's slots.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    let client = 0..CLIENT_SLOTS;
    let auction = 0..AUCTION_SLOTS;
    let name = 0..NAME_SLOTS;
    let price = any::<u8>();

    prop_oneof![
        2 => (client.clone(), name.clone(), any::<bool>())
            .prop_map(|(client, name, shout)| Operation::Register { client, name, shout }),
        2 => (client.clone(), price.clone(), price.clone())
            .prop_map(|(seller, starting, reserve)| Operation::CreateAuction { seller, starting, reserve }),
        5 => (client.clone(), auction.clone(), price)
            .prop_map(|(bidder, auction, price)| Operation::PlaceBid { bidder, auction, price }),
        2 => (client, auction.clone())
            .prop_map(|(requester, auction)| Operation::CloseAuction { requester, auction }),
        1 => auction.clone().prop_map(|auction| Operation::AnnounceWinner { auction }),
        1 => auction.prop_map(|auction| Operation::ValidateAuctionId { auction }),
        1 => (name.clone(), any::<bool>())
            .prop_map(|(name, shout)| Operation::ValidateUserName { name, shout }),
        1 => name.prop_map(|name| Operation::LookupCredential { name }),
    ]
}

proptest! {
    /// Every reply of a real replica equals the model's.
    #[test]
    fn prop_model_matches_replica(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation_strategy(), 0..80)
    ) {
        let mut model = ModelMarket::new();
        let mut real = replica(1, seed);

        for (i, op) in ops.iter().enumerate() {
            let expected = model.apply(op);
            let actual = real.handle(op.to_request()).unwrap().reply;
            prop_assert_eq!(
                &expected, &actual,
                "divergence at operation {}: {:?}", i, op
            );
        }

        prop_assert_eq!(model.observable_state(), observe(&real));
    }

    /// A follower that only applies broadcasts ends in the leader's state.
    #[test]
    fn prop_follower_tracks_leader_by_broadcast(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation_strategy(), 0..60)
    ) {
        let mut leader = replica(1, seed);
        let mut follower = replica(2, seed.wrapping_add(1));

        for op in &ops {
            let execution = leader.handle(op.to_request()).unwrap();
            for action in execution.actions {
                let ReplicaAction::BroadcastSnapshot(payload) = action;
                let applied = follower.apply_snapshot(&payload).unwrap();
                let is_adopted = matches!(applied, SnapshotApplied::Adopted { origin: NodeId(1), .. });
                prop_assert!(is_adopted);
            }
        }

        prop_assert_eq!(leader.snapshot(), follower.snapshot());
    }

    /// Read-only operations never produce a broadcast.
    #[test]
    fn prop_reads_never_broadcast(ops in prop::collection::vec(operation_strategy(), 0..60)) {
        let mut real = replica(1, 0);
        for op in ops {
            let request = op.to_request();
            let mutating = request.is_mutating();
            let execution = real.handle(request).unwrap();
            if !mutating {
                prop_assert!(execution.actions.is_empty(), "{:?} broadcast", op);
            }
        }
    }
}
