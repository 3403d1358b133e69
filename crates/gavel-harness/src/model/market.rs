//! Reference marketplace.
//!
//! Flat vectors and linear scans, sequential ids only. Answers with the same
//! [`Reply`] values the replicas produce so results compare directly.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use gavel_proto::{
    Auction, AuctionId, AuctionStatus, BidOutcome, ClientId, ClientProfile, ClientRecord,
    CloseOutcome, NewAuction, RegisterOutcome, Reply, Request,
};

use super::operation::Operation;

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Active auctions by id.
    pub active: BTreeMap<AuctionId, Auction>,
    /// Closed auctions by id.
    pub closed: BTreeMap<AuctionId, Auction>,
    /// Registered client profiles by id.
    pub clients: BTreeMap<ClientId, ClientProfile>,
}

#[derive(Debug, Clone)]
struct ModelAuction {
    id: AuctionId,
    listing: NewAuction,
    highest_bid: BigDecimal,
    highest_bidder: Option<ClientId>,
    closed: bool,
}

impl ModelAuction {
    fn to_auction(&self) -> Auction {
        Auction {
            id: self.id,
            description: self.listing.description.clone(),
            starting_price: self.listing.starting_price.clone(),
            reserved_price: self.listing.reserved_price.clone(),
            highest_bid: self.highest_bid.clone(),
            highest_bidder: self.highest_bidder,
            seller_id: self.listing.seller_id,
            status: if self.closed { AuctionStatus::Closed } else { AuctionStatus::Active },
        }
    }
}

/// The reference implementation.
#[derive(Debug, Clone, Default)]
pub struct ModelMarket {
    auctions: Vec<ModelAuction>,
    clients: Vec<(ClientId, ClientRecord)>,
}

impl ModelMarket {
    /// Empty market.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an operation and return the reply the system must give.
    pub fn apply(&mut self, op: &Operation) -> Reply {
        match op.to_request() {
            Request::CreateAuction(listing) => {
                let id = AuctionId(self.auctions.len() as u64 + 1);
                self.auctions.push(ModelAuction {
                    id,
                    listing,
                    highest_bid: BigDecimal::from(0),
                    highest_bidder: None,
                    closed: false,
                });
                Reply::AuctionCreated(id)
            },
            Request::CloseAuction { auction_id, requester_id } => {
                let outcome = match self.active_mut(auction_id) {
                    None => CloseOutcome::NotFound,
                    Some(auction) if auction.listing.seller_id != requester_id => CloseOutcome::Forbidden,
                    Some(auction) => {
                        auction.closed = true;
                        CloseOutcome::Closed
                    },
                };
                Reply::Close(outcome)
            },
            Request::PlaceBid { price, auction_id, bidder_id } => {
                let outcome = match self.active_mut(auction_id) {
                    None => BidOutcome::UnknownAuction,
                    Some(auction) if price <= auction.highest_bid => BidOutcome::Rejected,
                    Some(auction) => {
                        auction.highest_bid = price;
                        auction.highest_bidder = Some(bidder_id);
                        BidOutcome::Accepted
                    },
                };
                Reply::Bid(outcome)
            },
            Request::AnnounceWinner { auction_id } => {
                let winner = self
                    .auctions
                    .iter()
                    .find(|a| a.id == auction_id && a.closed)
                    .filter(|a| a.highest_bid >= a.listing.reserved_price)
                    .and_then(|a| a.highest_bidder)
                    .and_then(|bidder| self.profile(bidder));
                Reply::Client(winner)
            },
            Request::RegisterClient { client_id, record } => {
                if self.clients.iter().any(|(id, _)| *id == client_id) {
                    Reply::Registration(RegisterOutcome::AlreadyExists)
                } else {
                    self.clients.push((client_id, record));
                    Reply::Registration(RegisterOutcome::Registered)
                }
            },
            Request::ValidateAuctionId { auction_id } => {
                Reply::Flag(self.auctions.iter().any(|a| a.id == auction_id && !a.closed))
            },
            Request::ValidateUserName { user_name } => {
                Reply::Flag(self.clients.iter().any(|(_, r)| r.name.eq_ignore_ascii_case(&user_name)))
            },
            Request::GetClientByCredential { password } => {
                let id = self.clients.iter().filter(|(_, r)| r.password == password).map(|(id, _)| *id).min();
                Reply::Client(id.and_then(|id| self.profile(id)))
            },
            other => Reply::Unavailable { reason: format!("{} is not modelled", other.name()) },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let pick = |closed: bool| -> BTreeMap<AuctionId, Auction> {
            self.auctions.iter().filter(|a| a.closed == closed).map(|a| (a.id, a.to_auction())).collect()
        };
        ObservableState {
            active: pick(false),
            closed: pick(true),
            clients: self.clients.iter().map(|(id, r)| (*id, ClientProfile::from_record(*id, r))).collect(),
        }
    }

    fn active_mut(&mut self, id: AuctionId) -> Option<&mut ModelAuction> {
        self.auctions.iter_mut().find(|a| a.id == id && !a.closed)
    }

    fn profile(&self, id: ClientId) -> Option<ClientProfile> {
        self.clients.iter().find(|(cid, _)| *cid == id).map(|(cid, r)| ClientProfile::from_record(*cid, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_met_scenario() {
        let mut model = ModelMarket::new();
        model.apply(&Operation::Register { client: 1, name: 1, shout: false });
        model.apply(&Operation::Register { client: 2, name: 2, shout: false });

        let created = model.apply(&Operation::CreateAuction { seller: 0, starting: 10, reserve: 50 });
        assert_eq!(created, Reply::AuctionCreated(AuctionId(1)));

        let bid = |bidder, price| Operation::PlaceBid { bidder, auction: 0, price };
        assert_eq!(model.apply(&bid(1, 20)), Reply::Bid(BidOutcome::Accepted));
        assert_eq!(model.apply(&bid(2, 15)), Reply::Bid(BidOutcome::Rejected));
        assert_eq!(model.apply(&bid(2, 60)), Reply::Bid(BidOutcome::Accepted));

        let close = model.apply(&Operation::CloseAuction { requester: 0, auction: 0 });
        assert_eq!(close, Reply::Close(CloseOutcome::Closed));

        let Reply::Client(Some(winner)) = model.apply(&Operation::AnnounceWinner { auction: 0 }) else {
            unreachable!("reserve was met");
        };
        assert_eq!(winner.id, ClientId(3));
    }

    #[test]
    fn only_seller_closes() {
        let mut model = ModelMarket::new();
        model.apply(&Operation::CreateAuction { seller: 0, starting: 1, reserve: 1 });

        let forbidden = model.apply(&Operation::CloseAuction { requester: 1, auction: 0 });
        assert_eq!(forbidden, Reply::Close(CloseOutcome::Forbidden));
        assert_eq!(model.observable_state().active.len(), 1);
    }
}
