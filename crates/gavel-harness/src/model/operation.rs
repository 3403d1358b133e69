//! Operations for model-based testing.
//!
//! Operations use small integers so that generated sequences hit the same
//! clients and auctions often. Each one maps to exactly one [`Request`].

use arbitrary::Arbitrary;
use bigdecimal::BigDecimal;
use gavel_proto::{AuctionId, ClientId, ClientRecord, NewAuction, Password, Request};

/// Distinct client ids the operations address.
pub const CLIENT_SLOTS: u8 = 6;

/// Distinct auction ids the operations address.
pub const AUCTION_SLOTS: u8 = 8;

/// Distinct user names the operations address.
pub const NAME_SLOTS: u8 = 4;

/// Marketplace operations that can be applied to the system.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Register `name` under client slot `client`.
    Register {
        /// Client slot.
        client: u8,
        /// Name slot.
        name: u8,
        /// Register the name upper-cased.
        shout: bool,
    },

    /// Open an auction.
    CreateAuction {
        /// Seller's client slot.
        seller: u8,
        /// Starting price.
        starting: u8,
        /// Reserve price.
        reserve: u8,
    },

    /// Bid on an auction.
    PlaceBid {
        /// Bidder's client slot.
        bidder: u8,
        /// Auction slot.
        auction: u8,
        /// Offered price.
        price: u8,
    },

    /// Close an auction.
    CloseAuction {
        /// Requester's client slot.
        requester: u8,
        /// Auction slot.
        auction: u8,
    },

    /// Ask for the winner of an auction.
    AnnounceWinner {
        /// Auction slot.
        auction: u8,
    },

    /// Check whether an auction is active.
    ValidateAuctionId {
        /// Auction slot.
        auction: u8,
    },

    /// Check whether a name is registered.
    ValidateUserName {
        /// Name slot.
        name: u8,
        /// Ask with the name upper-cased.
        shout: bool,
    },

    /// Look a client up by password.
    LookupCredential {
        /// Name slot whose password is used.
        name: u8,
    },
}

impl Operation {
    /// The request this operation sends.
    pub fn to_request(&self) -> Request {
        match *self {
            Self::Register { client, name, shout } => {
                Request::RegisterClient { client_id: client_id(client), record: record(name, shout) }
            },
            Self::CreateAuction { seller, starting, reserve } => Request::CreateAuction(NewAuction {
                description: format!("lot from {}", client_id(seller)),
                reserved_price: BigDecimal::from(reserve),
                starting_price: BigDecimal::from(starting),
                seller_id: client_id(seller),
            }),
            Self::PlaceBid { bidder, auction, price } => Request::PlaceBid {
                price: BigDecimal::from(price),
                auction_id: auction_id(auction),
                bidder_id: client_id(bidder),
            },
            Self::CloseAuction { requester, auction } => {
                Request::CloseAuction { auction_id: auction_id(auction), requester_id: client_id(requester) }
            },
            Self::AnnounceWinner { auction } => Request::AnnounceWinner { auction_id: auction_id(auction) },
            Self::ValidateAuctionId { auction } => {
                Request::ValidateAuctionId { auction_id: auction_id(auction) }
            },
            Self::ValidateUserName { name, shout } => {
                Request::ValidateUserName { user_name: user_name(name, shout) }
            },
            Self::LookupCredential { name } => Request::GetClientByCredential { password: password(name) },
        }
    }
}

/// Client id for a slot, `1..=CLIENT_SLOTS`.
pub fn client_id(slot: u8) -> ClientId {
    ClientId(u64::from(slot % CLIENT_SLOTS) + 1)
}

/// Auction id for a slot, `1..=AUCTION_SLOTS`.
pub fn auction_id(slot: u8) -> AuctionId {
    AuctionId(u64::from(slot % AUCTION_SLOTS) + 1)
}

/// User name for a slot.
pub fn user_name(slot: u8, shout: bool) -> String {
    let name = format!("user{}", slot % NAME_SLOTS);
    if shout { name.to_uppercase() } else { name }
}

/// Password registered with a name slot.
pub fn password(slot: u8) -> Password {
    Password::new(format!("pw-{}", slot % NAME_SLOTS))
}

fn record(name: u8, shout: bool) -> ClientRecord {
    ClientRecord {
        name: user_name(name, shout),
        email: format!("{}@example.com", user_name(name, false)),
        password: password(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_wrap_into_small_ranges() {
        assert_eq!(client_id(0), ClientId(1));
        assert_eq!(client_id(CLIENT_SLOTS), ClientId(1));
        assert_eq!(auction_id(255), AuctionId(u64::from(255 % AUCTION_SLOTS) + 1));
    }

    #[test]
    fn shouted_names_differ_only_in_case() {
        assert_eq!(user_name(1, true), "USER1");
        assert!(user_name(1, true).eq_ignore_ascii_case(&user_name(5, false)));
    }
}
