//! Coordinator fan-out and reduction against scripted group members.

use std::time::Duration;

use gavel_core::{NodeId, read_frame, write_frame};
use gavel_proto::{AuthChallenge, Reply, Request};
use gavel_server::{
    Coordinator, CoordinatorConfig, CoordinatorError, Group, Membership, ReductionPolicy,
    group::RpcReply, serve_connection,
};
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_millis(200);

fn coordinator(group: &Group, reduction: ReductionPolicy) -> Coordinator {
    Coordinator::new(group.clone(), CoordinatorConfig { rpc_timeout: TIMEOUT, reduction })
}

/// Member that answers every request with `reply`.
fn scripted(group: &Group, reply: Reply) -> NodeId {
    let Membership { id, mut rpc_rx, .. } = group.join_member();
    tokio::spawn(async move {
        while let Some(envelope) = rpc_rx.recv().await {
            let _ = envelope.reply_to.send(RpcReply { node: id, reply: reply.clone() }).await;
        }
    });
    id
}

#[tokio::test]
async fn empty_group_has_no_replicas() {
    let group = Group::default();
    let result = coordinator(&group, ReductionPolicy::LastResponder).call(Request::GetActiveAuctions).await;
    assert_eq!(result, Err(CoordinatorError::NoReplicas));
}

#[tokio::test(start_paused = true)]
async fn silent_member_delays_until_deadline() {
    let group = Group::default();
    scripted(&group, Reply::Flag(true));
    scripted(&group, Reply::Flag(true));
    let _silent = group.join_member();

    let start = Instant::now();
    let reply = coordinator(&group, ReductionPolicy::LastResponder)
        .call(Request::ValidateUserName { user_name: "alice".to_string() })
        .await;

    assert_eq!(reply, Ok(Reply::Flag(true)));
    assert!(start.elapsed() >= TIMEOUT, "waited for the silent member");
}

#[tokio::test(start_paused = true)]
async fn all_silent_is_timeout() {
    let group = Group::default();
    let _a = group.join_member();
    let _b = group.join_member();

    let result = coordinator(&group, ReductionPolicy::LastResponder).call(Request::GetClosedAuctions).await;
    assert_eq!(result, Err(CoordinatorError::Timeout { op: "GetClosedAuctions", dispatched: 2 }));
}

#[tokio::test]
async fn responsive_members_return_before_deadline() {
    let group = Group::default();
    for _ in 0..3 {
        scripted(&group, Reply::Flag(false));
    }

    let start = Instant::now();
    let reply = coordinator(&group, ReductionPolicy::Majority)
        .validate_auction_id(gavel_proto::AuctionId(1))
        .await;
    assert_eq!(reply, Ok(false));
    assert!(start.elapsed() < TIMEOUT);
}

#[tokio::test]
async fn majority_reports_disagreement() {
    let group = Group::default();
    scripted(&group, Reply::Flag(true));
    scripted(&group, Reply::Flag(true));
    scripted(&group, Reply::Flag(false));
    scripted(&group, Reply::Flag(false));

    let result = coordinator(&group, ReductionPolicy::Majority).call(Request::GetRegisteredClients).await;
    assert_eq!(result, Err(CoordinatorError::NoAgreement { op: "GetRegisteredClients", replies: 4, view: 4 }));

    let last = coordinator(&group, ReductionPolicy::LastResponder).call(Request::GetRegisteredClients).await;
    assert!(matches!(last, Ok(Reply::Flag(_))), "last responder masks the split");
}

#[tokio::test]
async fn majority_masks_divergent_minority() {
    let group = Group::default();
    scripted(&group, Reply::Flag(true));
    scripted(&group, Reply::Flag(false));
    scripted(&group, Reply::Flag(true));

    let result = coordinator(&group, ReductionPolicy::Majority).validate_user_name("bob").await;
    assert_eq!(result, Ok(true));
}

#[tokio::test]
async fn server_challenge_is_exempt_from_majority() {
    let group = Group::default();
    for next_challenge in 0..3 {
        scripted(&group, Reply::Challenge(AuthChallenge { ciphertext: vec![1, 2, 3], next_challenge }));
    }

    let result = coordinator(&group, ReductionPolicy::Majority).server_authentication_step("alice", 9).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn mismatched_reply_kind_is_unexpected() {
    let group = Group::default();
    scripted(&group, Reply::Flag(true));

    let result = coordinator(&group, ReductionPolicy::LastResponder).active_auctions().await;
    assert!(matches!(result, Err(CoordinatorError::UnexpectedReply { op: "GetActiveAuctions", .. })));
}

#[tokio::test]
async fn departed_member_is_not_waited_for() {
    let group = Group::default();
    scripted(&group, Reply::Flag(true));
    let gone = group.join_member();
    assert!(group.leave(gone.id));

    let start = Instant::now();
    let reply = coordinator(&group, ReductionPolicy::Majority).call(Request::GetActiveAuctions).await;
    assert_eq!(reply, Ok(Reply::Flag(true)));
    assert!(start.elapsed() < TIMEOUT);
}

#[tokio::test]
async fn connection_reports_unavailable_cluster() {
    let group = Group::default();
    let coordinator = coordinator(&group, ReductionPolicy::LastResponder);
    let (mut client, server) = tokio::io::duplex(4096);

    let serve = tokio::spawn(async move { serve_connection(server, &coordinator).await });

    write_frame(&mut client, &Request::GetActiveAuctions).await.unwrap();
    let reply: Reply = read_frame(&mut client).await.unwrap().unwrap();
    assert_eq!(reply, Reply::Unavailable { reason: "no replicas in the group".to_string() });

    drop(client);
    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn every_member_sees_the_same_request_id() {
    let group = Group::default();
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
    for _ in 0..3 {
        let Membership { id, mut rpc_rx, .. } = group.join_member();
        let seen_tx = seen_tx.clone();
        tokio::spawn(async move {
            while let Some(envelope) = rpc_rx.recv().await {
                let _ = seen_tx.send(envelope.request_id);
                let _ = envelope.reply_to.send(RpcReply { node: id, reply: Reply::Flag(true) }).await;
            }
        });
    }

    let coordinator = coordinator(&group, ReductionPolicy::Majority);
    coordinator.call(Request::GetActiveAuctions).await.unwrap();
    coordinator.call(Request::GetActiveAuctions).await.unwrap();

    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(seen_rx.recv().await.unwrap());
    }
    ids.sort();
    assert_eq!(ids[0], ids[2]);
    assert_eq!(ids[3], ids[5]);
    assert!(ids[2] < ids[3]);
}
