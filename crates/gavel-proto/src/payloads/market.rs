//! Marketplace payloads.
//!
//! These are the entities the replicated state is made of. They are plain
//! data: every rule about how they change lives in the core state machine.

use std::fmt;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Short numeric token identifying an auction.
///
/// Unique among the auctions that are active at the time it is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuctionId(pub u64);

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short numeric token identifying a registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A plaintext password.
///
/// # Security
///
/// - **Debug Redaction**: `Debug` never prints the contents, so requests and
///   records can be logged freely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    /// Wrap a plaintext password.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plaintext. Only key derivation and credential files should read it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted {} bytes>", self.0.len())
    }
}

/// Lifecycle state of an auction. Transitions only `Active -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuctionStatus {
    /// Accepting bids.
    Active,
    /// Closed by its seller.
    Closed,
}

/// Seller input for a new auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuction {
    /// Item description.
    pub description: String,
    /// Minimum price the seller accepts when announcing a winner.
    pub reserved_price: BigDecimal,
    /// Price bidding starts at.
    pub starting_price: BigDecimal,
    /// Seller creating the auction.
    pub seller_id: ClientId,
}

/// One item for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    /// Auction identifier.
    pub id: AuctionId,
    /// Item description.
    pub description: String,
    /// Price bidding starts at.
    pub starting_price: BigDecimal,
    /// Minimum winning price.
    pub reserved_price: BigDecimal,
    /// Highest accepted bid, zero until the first bid.
    pub highest_bid: BigDecimal,
    /// Bidder that placed `highest_bid`.
    pub highest_bidder: Option<ClientId>,
    /// Seller that created the auction and alone may close it.
    pub seller_id: ClientId,
    /// Lifecycle state.
    pub status: AuctionStatus,
}

impl Auction {
    /// Open a fresh auction with no bids.
    pub fn open(id: AuctionId, listing: NewAuction) -> Self {
        Self {
            id,
            description: listing.description,
            starting_price: listing.starting_price,
            reserved_price: listing.reserved_price,
            highest_bid: BigDecimal::from(0),
            highest_bidder: None,
            seller_id: listing.seller_id,
            status: AuctionStatus::Active,
        }
    }

    /// Whether the highest bid meets the reserve.
    pub fn reserve_met(&self) -> bool {
        self.highest_bid >= self.reserved_price
    }
}

/// Registration record as replicated between nodes.
///
/// Carries the password because replicas answer credential lookups. It never
/// leaves the cluster: outside callers receive a [`ClientProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Display and login name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Password the shared secret is derived from.
    pub password: Password,
}

/// Public view of a registered client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientProfile {
    /// Client identifier.
    pub id: ClientId,
    /// Display and login name.
    pub name: String,
    /// Contact address.
    pub email: String,
}

impl ClientProfile {
    /// Project a record onto its public fields.
    pub fn from_record(id: ClientId, record: &ClientRecord) -> Self {
        Self { id, name: record.name.clone(), email: record.email.clone() }
    }
}
