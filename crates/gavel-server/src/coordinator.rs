//! Front-end coordinator.
//!
//! The only component remote clients talk to. Every call is fanned out to the
//! whole RPC view, replies are collected in arrival order until all
//! dispatched members answered or the deadline passed, and the collected
//! replies are reduced to one.
//!
//! ```text
//! call(request)
//!   │  deadline = now + rpc_timeout
//!   ├─▶ send to member 1 ┐
//!   ├─▶ send to member 2 ├─ bounded by the deadline
//!   ├─▶ send to member N ┘
//!   │
//!   ├─◀ collect replies (arrival order) until all in or deadline
//!   │
//!   └─▶ ReductionPolicy ─▶ Reply | CoordinatorError
//! ```
//!
//! Work that times out is not cancelled on the replicas.

use std::{collections::BTreeMap, time::Duration};

use bigdecimal::BigDecimal;
use gavel_proto::{
    Auction, AuctionId, AuthChallenge, BidOutcome, ChallengeResponse, ClientId, ClientProfile,
    ClientRecord, CloseOutcome, NewAuction, Password, RegisterOutcome, Reply, Request,
};
use tokio::{
    sync::mpsc,
    time::{Instant, timeout_at},
};

use crate::{
    error::CoordinatorError,
    group::{Group, RpcEnvelope, RpcReply},
};

/// How collected replies are reduced to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReductionPolicy {
    /// The last reply to arrive wins. Divergent replicas go unnoticed.
    #[default]
    LastResponder,
    /// The value returned by more than half the view wins.
    ///
    /// `ServerAuthenticationStep` always uses the last responder because each
    /// replica issues its own challenge.
    Majority,
}

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Deadline for dispatch plus collection.
    pub rpc_timeout: Duration,
    /// Reduction policy.
    pub reduction: ReductionPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { rpc_timeout: Duration::from_millis(1000), reduction: ReductionPolicy::LastResponder }
    }
}

/// Fan-out front-end over a [`Group`].
#[derive(Debug, Clone)]
pub struct Coordinator {
    group: Group,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Coordinator for `group`.
    pub fn new(group: Group, config: CoordinatorConfig) -> Self {
        Self { group, config }
    }

    /// Settings in use.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Fan `request` out to every replica and reduce the replies.
    pub async fn call(&self, request: Request) -> Result<Reply, CoordinatorError> {
        let op = request.name();
        let deadline = Instant::now() + self.config.rpc_timeout;
        let request_id = self.group.next_request_id();
        let view = self.group.rpc_view();
        if view.is_empty() {
            return Err(CoordinatorError::NoReplicas);
        }
        let view_size = view.len();

        let (reply_tx, mut reply_rx) = mpsc::channel::<RpcReply>(view_size);
        let mut dispatched = 0;
        for (node, member) in view {
            let envelope = RpcEnvelope { request_id, request: request.clone(), reply_to: reply_tx.clone() };
            match timeout_at(deadline, member.send(envelope)).await {
                Ok(Ok(())) => dispatched += 1,
                Ok(Err(_)) => tracing::debug!(node = %node, op, "member left before dispatch"),
                Err(_) => {
                    tracing::warn!(node = %node, op, "deadline passed during dispatch");
                    break;
                },
            }
        }
        drop(reply_tx);

        let mut replies = Vec::with_capacity(dispatched);
        while replies.len() < dispatched {
            match timeout_at(deadline, reply_rx.recv()).await {
                Ok(Some(reply)) => replies.push(reply),
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(op, dispatched, received = replies.len(), "deadline passed during collection");
                    break;
                },
            }
        }

        tracing::debug!(op, request = %request_id, view = view_size, dispatched, replies = replies.len(), "fan-out complete");
        if dispatched == 0 {
            return Err(CoordinatorError::NoReplicas);
        }

        let policy = if matches!(request, Request::ServerAuthenticationStep { .. }) {
            ReductionPolicy::LastResponder
        } else {
            self.config.reduction
        };
        reduce(op, policy, replies.into_iter().map(|r| r.reply).collect(), view_size, dispatched)
    }

    /// Open a new auction.
    pub async fn create_auction(&self, listing: NewAuction) -> Result<AuctionId, CoordinatorError> {
        let request = Request::CreateAuction(listing);
        expect(request.name(), self.call(request).await?, |reply| match reply {
            Reply::AuctionCreated(id) => Ok(id),
            other => Err(other),
        })
    }

    /// Close an auction on behalf of `requester_id`.
    pub async fn close_auction(
        &self,
        auction_id: AuctionId,
        requester_id: ClientId,
    ) -> Result<CloseOutcome, CoordinatorError> {
        let request = Request::CloseAuction { auction_id, requester_id };
        expect(request.name(), self.call(request).await?, |reply| match reply {
            Reply::Close(outcome) => Ok(outcome),
            other => Err(other),
        })
    }

    /// Bid on an active auction.
    pub async fn place_bid(
        &self,
        price: BigDecimal,
        auction_id: AuctionId,
        bidder_id: ClientId,
    ) -> Result<BidOutcome, CoordinatorError> {
        let request = Request::PlaceBid { price, auction_id, bidder_id };
        expect(request.name(), self.call(request).await?, |reply| match reply {
            Reply::Bid(outcome) => Ok(outcome),
            other => Err(other),
        })
    }

    /// Winner of a closed auction.
    pub async fn announce_winner(
        &self,
        auction_id: AuctionId,
    ) -> Result<Option<ClientProfile>, CoordinatorError> {
        let request = Request::AnnounceWinner { auction_id };
        expect(request.name(), self.call(request).await?, client)
    }

    /// Register a client under `client_id`.
    pub async fn register_client(
        &self,
        client_id: ClientId,
        record: ClientRecord,
    ) -> Result<RegisterOutcome, CoordinatorError> {
        let request = Request::RegisterClient { client_id, record };
        expect(request.name(), self.call(request).await?, |reply| match reply {
            Reply::Registration(outcome) => Ok(outcome),
            other => Err(other),
        })
    }

    /// Whether `auction_id` is active.
    pub async fn validate_auction_id(&self, auction_id: AuctionId) -> Result<bool, CoordinatorError> {
        let request = Request::ValidateAuctionId { auction_id };
        expect(request.name(), self.call(request).await?, flag)
    }

    /// Whether `user_name` is registered.
    pub async fn validate_user_name(&self, user_name: &str) -> Result<bool, CoordinatorError> {
        let request = Request::ValidateUserName { user_name: user_name.to_string() };
        expect(request.name(), self.call(request).await?, flag)
    }

    /// All active auctions.
    pub async fn active_auctions(&self) -> Result<BTreeMap<AuctionId, Auction>, CoordinatorError> {
        let request = Request::GetActiveAuctions;
        expect(request.name(), self.call(request).await?, auctions)
    }

    /// All closed auctions.
    pub async fn closed_auctions(&self) -> Result<BTreeMap<AuctionId, Auction>, CoordinatorError> {
        let request = Request::GetClosedAuctions;
        expect(request.name(), self.call(request).await?, auctions)
    }

    /// All registered clients.
    pub async fn registered_clients(
        &self,
    ) -> Result<BTreeMap<ClientId, ClientProfile>, CoordinatorError> {
        let request = Request::GetRegisteredClients;
        expect(request.name(), self.call(request).await?, |reply| match reply {
            Reply::Clients(clients) => Ok(clients),
            other => Err(other),
        })
    }

    /// Handshake step 1.
    pub async fn server_authentication_step(
        &self,
        key_name: &str,
        challenge: u32,
    ) -> Result<AuthChallenge, CoordinatorError> {
        let request = Request::ServerAuthenticationStep { key_name: key_name.to_string(), challenge };
        expect(request.name(), self.call(request).await?, |reply| match reply {
            Reply::Challenge(challenge) => Ok(challenge),
            other => Err(other),
        })
    }

    /// Handshake step 2.
    pub async fn client_authentication_step(
        &self,
        response: ChallengeResponse,
        key_name: &str,
    ) -> Result<bool, CoordinatorError> {
        let request = Request::ClientAuthenticationStep { response, key_name: key_name.to_string() };
        expect(request.name(), self.call(request).await?, flag)
    }

    /// Client registered with `password`.
    pub async fn client_by_credential(
        &self,
        password: Password,
    ) -> Result<Option<ClientProfile>, CoordinatorError> {
        let request = Request::GetClientByCredential { password };
        expect(request.name(), self.call(request).await?, client)
    }
}

/// Reduce replies collected in arrival order.
pub fn reduce(
    op: &'static str,
    policy: ReductionPolicy,
    mut replies: Vec<Reply>,
    view: usize,
    dispatched: usize,
) -> Result<Reply, CoordinatorError> {
    match policy {
        ReductionPolicy::LastResponder => {
            replies.pop().ok_or(CoordinatorError::Timeout { op, dispatched })
        },
        ReductionPolicy::Majority => {
            if replies.is_empty() {
                return Err(CoordinatorError::Timeout { op, dispatched });
            }
            let count = replies.len();
            let winner = replies.iter().position(|candidate| {
                replies.iter().filter(|other| *other == candidate).count() * 2 > view
            });
            match winner {
                Some(index) => Ok(replies.swap_remove(index)),
                None => Err(CoordinatorError::NoAgreement { op, replies: count, view }),
            }
        },
    }
}

fn expect<T>(
    op: &'static str,
    reply: Reply,
    extract: impl FnOnce(Reply) -> Result<T, Reply>,
) -> Result<T, CoordinatorError> {
    extract(reply).map_err(|other| CoordinatorError::UnexpectedReply { op, reply: format!("{other:?}") })
}

fn flag(reply: Reply) -> Result<bool, Reply> {
    match reply {
        Reply::Flag(value) => Ok(value),
        other => Err(other),
    }
}

fn client(reply: Reply) -> Result<Option<ClientProfile>, Reply> {
    match reply {
        Reply::Client(profile) => Ok(profile),
        other => Err(other),
    }
}

fn auctions(reply: Reply) -> Result<BTreeMap<AuctionId, Auction>, Reply> {
    match reply {
        Reply::Auctions(auctions) => Ok(auctions),
        other => Err(other),
    }
}
