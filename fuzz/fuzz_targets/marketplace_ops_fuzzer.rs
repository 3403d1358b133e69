//! Fuzz target for marketplace operation sequences.
//!
//! # Strategy
//!
//! - Arbitrary operation sequences against a replica and the reference model
//! - Every broadcast is applied to a follower replica
//!
//! # Invariants
//!
//! - Every reply matches the model
//! - Active and closed ids are disjoint
//! - The follower ends in the leader's state
//! - Snapshot round-trip is content-equal

#![no_main]

use std::sync::Arc;

use gavel_core::{
    IdPolicy, MemoryCredentialStore, NodeId, ReplicaAction, ReplicaMachine, SnapshotEnvelope,
};
use gavel_crypto::KeyDerivation;
use gavel_harness::{ModelMarket, Operation, SimEnv};
use libfuzzer_sys::fuzz_target;

fn replica(node: u64) -> ReplicaMachine<SimEnv> {
    ReplicaMachine::new(
        NodeId(node),
        SimEnv::with_seed(node),
        IdPolicy::Sequential,
        KeyDerivation::Padded,
        Arc::new(MemoryCredentialStore::new()),
    )
}

fuzz_target!(|ops: Vec<Operation>| {
    let mut model = ModelMarket::new();
    let mut leader = replica(1);
    let mut follower = replica(2);

    for op in ops.iter().take(256) {
        let expected = model.apply(op);
        let execution = leader.handle(op.to_request()).expect("marketplace requests never fail");
        assert_eq!(expected, execution.reply, "divergence on {op:?}");

        for action in execution.actions {
            let ReplicaAction::BroadcastSnapshot(payload) = action;
            follower.apply_snapshot(&payload).expect("own encoding decodes");
        }
    }

    let snapshot = leader.snapshot();
    assert!(snapshot.active.keys().all(|id| !snapshot.closed.contains_key(id)));
    assert_eq!(snapshot, follower.snapshot());

    let bytes = SnapshotEnvelope::new(NodeId(1), snapshot.clone()).encode().expect("snapshot encodes");
    let decoded = SnapshotEnvelope::decode(&bytes).expect("snapshot decodes");
    assert_eq!(&decoded.snapshot, snapshot);
});
