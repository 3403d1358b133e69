//! Marketplace state machine.
//!
//! Pure, deterministic operations over a [`Snapshot`]. Every replica runs the
//! same operations in the same order against equal snapshots and therefore
//! computes equal results. The only input that is not part of the request is
//! the random draw for [`IdPolicy::Random`], which the caller supplies.
//!
//! # Invariants
//!
//! - Auction ids are unique among active auctions at creation time.
//! - `highest_bid` never decreases; a bid is accepted only if strictly
//!   greater.
//! - Auctions move from `active` to `closed` exactly once, only on the
//!   seller's request, and are never deleted.
//! - Client ids are unique; records are immutable after registration.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use gavel_proto::{
    Auction, AuctionId, AuctionStatus, BidOutcome, ClientId, ClientProfile, ClientRecord,
    CloseOutcome, NewAuction, Password, RegisterOutcome, Reply,
};

use crate::{applied::RequestId, snapshot::Snapshot};

/// Upper bound of the random id range.
pub const RANDOM_ID_RANGE: u64 = 1000;

/// How new auction ids are allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IdPolicy {
    /// Take the snapshot's counter. Identical on every replica that applied
    /// the same history.
    #[default]
    Sequential,
    /// Draw from `1..=1000`, redraw once on collision, then step upward.
    ///
    /// Replicas draw independently, so ids diverge across replicas unless
    /// their environments are seeded alike.
    Random,
}

/// Marketplace state machine.
#[derive(Debug, Clone, Default)]
pub struct Marketplace {
    state: Snapshot,
    id_policy: IdPolicy,
}

impl Marketplace {
    /// Empty marketplace.
    pub fn new(id_policy: IdPolicy) -> Self {
        Self { state: Snapshot::default(), id_policy }
    }

    /// Marketplace holding `snapshot`.
    pub fn from_snapshot(snapshot: Snapshot, id_policy: IdPolicy) -> Self {
        Self { state: snapshot, id_policy }
    }

    /// Current state.
    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    /// Replace the whole state.
    pub fn replace(&mut self, snapshot: Snapshot) {
        self.state = snapshot;
    }

    /// Id allocation policy in use.
    pub fn id_policy(&self) -> IdPolicy {
        self.id_policy
    }

    /// Open a new auction and return its id.
    ///
    /// `draw` is only called under [`IdPolicy::Random`].
    pub fn create_auction(&mut self, listing: NewAuction, mut draw: impl FnMut() -> u64) -> AuctionId {
        let id = match self.id_policy {
            IdPolicy::Sequential => {
                let id = self.next_free(self.state.next_auction_id);
                self.state.next_auction_id = id.0 + 1;
                id
            },
            IdPolicy::Random => {
                let first = AuctionId(draw() % RANDOM_ID_RANGE + 1);
                if self.is_taken(first) {
                    let second = draw() % RANDOM_ID_RANGE + 1;
                    self.next_free(second)
                } else {
                    first
                }
            },
        };

        self.state.active.insert(id, Auction::open(id, listing));
        self.bump();
        id
    }

    /// Close an auction on behalf of `requester`.
    pub fn close_auction(&mut self, auction_id: AuctionId, requester: ClientId) -> CloseOutcome {
        let Some(auction) = self.state.active.get(&auction_id) else {
            return CloseOutcome::NotFound;
        };
        if auction.seller_id != requester {
            return CloseOutcome::Forbidden;
        }

        if let Some(mut auction) = self.state.active.remove(&auction_id) {
            auction.status = AuctionStatus::Closed;
            self.state.closed.insert(auction_id, auction);
            self.bump();
        }
        CloseOutcome::Closed
    }

    /// Bid `price` on an active auction.
    pub fn place_bid(&mut self, price: BigDecimal, auction_id: AuctionId, bidder: ClientId) -> BidOutcome {
        let Some(auction) = self.state.active.get_mut(&auction_id) else {
            return BidOutcome::UnknownAuction;
        };
        if price <= auction.highest_bid {
            return BidOutcome::Rejected;
        }

        auction.highest_bid = price;
        auction.highest_bidder = Some(bidder);
        self.bump();
        BidOutcome::Accepted
    }

    /// Winner of a closed auction, if the reserve was met.
    pub fn announce_winner(&self, auction_id: AuctionId) -> Option<ClientProfile> {
        let auction = self.state.closed.get(&auction_id)?;
        if !auction.reserve_met() {
            return None;
        }
        let bidder = auction.highest_bidder?;
        self.state.clients.get(&bidder).map(|record| ClientProfile::from_record(bidder, record))
    }

    /// Register a client under `client_id`.
    pub fn register_client(&mut self, client_id: ClientId, record: ClientRecord) -> RegisterOutcome {
        if self.state.clients.contains_key(&client_id) {
            return RegisterOutcome::AlreadyExists;
        }
        self.state.clients.insert(client_id, record);
        self.bump();
        RegisterOutcome::Registered
    }

    /// Whether `auction_id` is an active auction.
    pub fn validate_auction_id(&self, auction_id: AuctionId) -> bool {
        self.state.active.contains_key(&auction_id)
    }

    /// Whether a client with this name is registered, ignoring case.
    pub fn validate_user_name(&self, user_name: &str) -> bool {
        self.client_by_name(user_name).is_some()
    }

    /// Registered client with this name, ignoring case.
    pub fn client_by_name(&self, user_name: &str) -> Option<(ClientId, &ClientRecord)> {
        let wanted = user_name.to_lowercase();
        self.state
            .clients
            .iter()
            .find(|(_, record)| record.name.to_lowercase() == wanted)
            .map(|(id, record)| (*id, record))
    }

    /// First client (by id) registered with `password`.
    pub fn client_by_credential(&self, password: &Password) -> Option<ClientProfile> {
        self.state
            .clients
            .iter()
            .find(|(_, record)| record.password == *password)
            .map(|(id, record)| ClientProfile::from_record(*id, record))
    }

    /// Copy of the active auctions.
    pub fn active_auctions(&self) -> BTreeMap<AuctionId, Auction> {
        self.state.active.clone()
    }

    /// Copy of the closed auctions.
    pub fn closed_auctions(&self) -> BTreeMap<AuctionId, Auction> {
        self.state.closed.clone()
    }

    /// Public profiles of all registered clients.
    pub fn registered_clients(&self) -> BTreeMap<ClientId, ClientProfile> {
        self.state
            .clients
            .iter()
            .map(|(id, record)| (*id, ClientProfile::from_record(*id, record)))
            .collect()
    }

    /// Remember that the write `id` produced the current state and `reply`.
    pub fn record_write(&mut self, id: RequestId, reply: Reply) {
        self.state.applied.record(id, reply);
    }

    // Closed ids count as taken so a reused id never overwrites history.
    fn is_taken(&self, id: AuctionId) -> bool {
        self.state.active.contains_key(&id) || self.state.closed.contains_key(&id)
    }

    fn next_free(&self, start: u64) -> AuctionId {
        let mut candidate = start.max(1);
        while self.is_taken(AuctionId(candidate)) {
            candidate += 1;
        }
        AuctionId(candidate)
    }

    fn bump(&mut self) {
        self.state.revision += 1;
    }
}
