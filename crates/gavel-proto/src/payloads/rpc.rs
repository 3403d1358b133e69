//! Operation table.
//!
//! One [`Request`] variant per remote operation, one [`Reply`] variant per
//! result shape. The same pair is used between remote callers and the
//! front-end coordinator and between the coordinator and every replica.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::{
    auth::{AuthChallenge, ChallengeResponse},
    market::{Auction, AuctionId, ClientId, ClientProfile, ClientRecord, NewAuction, Password},
};

/// Result of closing an auction. Encoded as the legacy status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(i8)]
pub enum CloseOutcome {
    /// No active auction with that id.
    NotFound = -1,
    /// Requester is not the seller.
    Forbidden = 0,
    /// Auction moved to the closed collection.
    Closed = 1,
}

impl CloseOutcome {
    /// Legacy numeric status code.
    pub fn code(self) -> i8 {
        self as i8
    }
}

/// Result of placing a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BidOutcome {
    /// Bid became the highest bid.
    Accepted,
    /// Bid did not exceed the highest bid.
    Rejected,
    /// No active auction with that id.
    UnknownAuction,
}

impl BidOutcome {
    /// Human-readable message shown to bidders.
    pub fn message(self) -> &'static str {
        match self {
            Self::Accepted => "Your bid has been accepted.",
            Self::Rejected => "Your bid has been rejected because there is a higher bidder.",
            Self::UnknownAuction => "Your bid has been rejected because the auction is not active.",
        }
    }
}

/// Result of registering a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterOutcome {
    /// Id is already taken; nothing was stored.
    AlreadyExists,
    /// Client stored under the requested id.
    Registered,
}

/// A remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Open a new auction.
    CreateAuction(NewAuction),
    /// Close an auction on behalf of `requester_id`.
    CloseAuction {
        /// Auction to close.
        auction_id: AuctionId,
        /// Client asking; must be the seller.
        requester_id: ClientId,
    },
    /// Bid on an active auction.
    PlaceBid {
        /// Offered price.
        price: BigDecimal,
        /// Target auction.
        auction_id: AuctionId,
        /// Bidding client.
        bidder_id: ClientId,
    },
    /// Look up the winner of a closed auction.
    AnnounceWinner {
        /// Closed auction.
        auction_id: AuctionId,
    },
    /// Register a client under a caller-chosen id.
    RegisterClient {
        /// Requested id.
        client_id: ClientId,
        /// Registration record.
        record: ClientRecord,
    },
    /// Check whether an auction id is active.
    ValidateAuctionId {
        /// Id to check.
        auction_id: AuctionId,
    },
    /// Check whether a user name is registered (case-insensitive).
    ValidateUserName {
        /// Name to check.
        user_name: String,
    },
    /// All active auctions.
    GetActiveAuctions,
    /// All closed auctions.
    GetClosedAuctions,
    /// All registered clients.
    GetRegisteredClients,
    /// First handshake step: have the server solve the client's challenge.
    ServerAuthenticationStep {
        /// User whose credential holds the shared secret.
        key_name: String,
        /// Client's random challenge.
        challenge: u32,
    },
    /// Second handshake step: prove the client solved the server's challenge.
    ClientAuthenticationStep {
        /// Sealed answer.
        response: ChallengeResponse,
        /// User whose credential holds the shared secret.
        key_name: String,
    },
    /// Find the client registered with a password.
    GetClientByCredential {
        /// Password to match.
        password: Password,
    },
}

impl Request {
    /// Operation name used in logs and traces.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateAuction(_) => "CreateAuction",
            Self::CloseAuction { .. } => "CloseAuction",
            Self::PlaceBid { .. } => "PlaceBid",
            Self::AnnounceWinner { .. } => "AnnounceWinner",
            Self::RegisterClient { .. } => "RegisterClient",
            Self::ValidateAuctionId { .. } => "ValidateAuctionId",
            Self::ValidateUserName { .. } => "ValidateUserName",
            Self::GetActiveAuctions => "GetActiveAuctions",
            Self::GetClosedAuctions => "GetClosedAuctions",
            Self::GetRegisteredClients => "GetRegisteredClients",
            Self::ServerAuthenticationStep { .. } => "ServerAuthenticationStep",
            Self::ClientAuthenticationStep { .. } => "ClientAuthenticationStep",
            Self::GetClientByCredential { .. } => "GetClientByCredential",
        }
    }

    /// Whether the operation may change the marketplace state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::CreateAuction(_)
                | Self::CloseAuction { .. }
                | Self::PlaceBid { .. }
                | Self::RegisterClient { .. }
        )
    }
}

/// Result of a remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Id of a newly created auction.
    AuctionCreated(AuctionId),
    /// Outcome of `CloseAuction`.
    Close(CloseOutcome),
    /// Outcome of `PlaceBid`.
    Bid(BidOutcome),
    /// Outcome of `RegisterClient`.
    Registration(RegisterOutcome),
    /// Boolean answers (`Validate*`, `ClientAuthenticationStep`).
    Flag(bool),
    /// Optional client (`AnnounceWinner`, `GetClientByCredential`).
    Client(Option<ClientProfile>),
    /// Auction mapping (`GetActiveAuctions`, `GetClosedAuctions`).
    Auctions(BTreeMap<AuctionId, Auction>),
    /// Client mapping (`GetRegisteredClients`).
    Clients(BTreeMap<ClientId, ClientProfile>),
    /// Answer to `ServerAuthenticationStep`.
    Challenge(AuthChallenge),
    /// No replica answered in time; the operation may or may not have run.
    Unavailable {
        /// Why the cluster could not answer.
        reason: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::frame::{decode_frame, encode_frame};

    #[test]
    fn close_outcome_codes() {
        assert_eq!(CloseOutcome::NotFound.code(), -1);
        assert_eq!(CloseOutcome::Forbidden.code(), 0);
        assert_eq!(CloseOutcome::Closed.code(), 1);
    }

    #[test]
    fn close_outcome_travels_as_status_code() {
        let mut buf = Vec::new();
        encode_frame(&CloseOutcome::NotFound, &mut buf).unwrap();
        let code: i8 = decode_frame(&buf).unwrap();
        assert_eq!(code, -1);
    }

    #[test]
    fn mutating_operations() {
        let bid = Request::PlaceBid {
            price: BigDecimal::from(20),
            auction_id: AuctionId(1),
            bidder_id: ClientId(2),
        };
        assert!(bid.is_mutating());
        assert_eq!(bid.name(), "PlaceBid");

        assert!(!Request::GetActiveAuctions.is_mutating());
        assert!(!Request::AnnounceWinner { auction_id: AuctionId(1) }.is_mutating());
    }

    #[test]
    fn credential_lookup_does_not_log_password() {
        let request = Request::GetClientByCredential { password: Password::new("topsecret") };
        assert!(!format!("{request:?}").contains("topsecret"));
    }

    #[test]
    fn request_survives_the_wire() {
        let request = Request::PlaceBid {
            price: "60.25".parse().unwrap(),
            auction_id: AuctionId(4),
            bidder_id: ClientId(9),
        };

        let mut buf = Vec::new();
        encode_frame(&request, &mut buf).unwrap();
        let decoded: Request = decode_frame(&buf).unwrap();
        assert_eq!(decoded, request);
    }
}
