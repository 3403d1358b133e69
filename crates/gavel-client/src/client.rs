//! Typed marketplace client.
//!
//! `MarketClient` turns the request/reply protocol into typed calls and adds
//! the client-side flows: registration with id retry, the login handshake and
//! local bid checks.

use std::{collections::BTreeMap, sync::Arc};

use bigdecimal::BigDecimal;
use gavel_core::{ClientHandshake, CoreError, Credential, CredentialStore, Environment, HandshakeState};
use gavel_crypto::KeyDerivation;
use gavel_proto::{
    AuthChallenge, Auction, AuctionId, BidOutcome, ClientId, ClientProfile, ClientRecord,
    CloseOutcome, NewAuction, Password, RegisterOutcome, Reply, Request,
};

use crate::{connection::Remote, error::ClientError};

/// Client ids are drawn from `1..=CLIENT_ID_RANGE`.
pub const CLIENT_ID_RANGE: u64 = 1000;

/// Client settings.
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    /// Must match the replicas' setting.
    pub key_derivation: KeyDerivation,
    /// Ids drawn before registration gives up.
    pub id_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { key_derivation: KeyDerivation::Padded, id_attempts: 16 }
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    profile: ClientProfile,
}

impl Session {
    /// Profile the server returned for our credential.
    pub fn profile(&self) -> &ClientProfile {
        &self.profile
    }

    /// Our client id.
    pub fn client_id(&self) -> ClientId {
        self.profile.id
    }
}

/// Marketplace client over a [`Remote`].
pub struct MarketClient<R, E> {
    remote: R,
    env: E,
    credentials: Arc<dyn CredentialStore>,
    config: ClientConfig,
}

impl<R: Remote, E: Environment> MarketClient<R, E> {
    /// Build a client. `credentials` is where registration stores and login
    /// reads the user's password.
    pub fn new(remote: R, env: E, credentials: Arc<dyn CredentialStore>, config: ClientConfig) -> Self {
        Self { remote, env, credentials, config }
    }

    /// Underlying remote.
    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    /// Register a new user under a random free client id and store the
    /// credential.
    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: Password,
    ) -> Result<ClientProfile, ClientError> {
        if name.trim().is_empty() || self.validate_user_name(name).await? {
            return Err(ClientError::NameUnavailable { name: name.to_string() });
        }

        let record = ClientRecord { name: name.to_string(), email: email.to_string(), password };
        for attempt in 1..=self.config.id_attempts {
            let client_id = ClientId(self.env.random_u64() % CLIENT_ID_RANGE + 1);
            match self.register_client(client_id, record.clone()).await? {
                RegisterOutcome::Registered => {
                    self.credentials.store(&Credential::new(name, record.password.clone()))?;
                    tracing::info!(%client_id, user = name, attempt, "registered");
                    return Ok(ClientProfile::from_record(client_id, &record));
                },
                RegisterOutcome::AlreadyExists => {
                    tracing::debug!(%client_id, attempt, "client id taken");
                },
            }
        }
        Err(ClientError::IdsExhausted { attempts: self.config.id_attempts })
    }

    /// Authenticate `user_name` with its stored credential, then fetch the
    /// profile registered under it.
    pub async fn login(&mut self, user_name: &str) -> Result<Session, ClientError> {
        let credential = self
            .credentials
            .load(user_name)?
            .ok_or_else(|| ClientError::NoCredential { user: user_name.to_string() })?;

        let state = self.authenticate(&credential).await?;
        if state != HandshakeState::Authenticated {
            return Err(ClientError::AuthenticationRejected { user: credential.name });
        }

        let profile = self
            .client_by_credential(credential.password)
            .await?
            .ok_or(ClientError::NotRegistered { user: credential.name })?;
        tracing::info!(client_id = %profile.id, "logged in");
        Ok(Session { profile })
    }

    /// Run the mutual challenge-response handshake for `credential`.
    ///
    /// Returns the terminal state. A server that cannot prove the shared
    /// secret is reported as [`ClientError::ServerNotVerified`].
    pub async fn authenticate(&mut self, credential: &Credential) -> Result<HandshakeState, ClientError> {
        let secret = self.config.key_derivation.derive(&credential.name, credential.password.expose())?;
        let mut handshake = ClientHandshake::new(credential.name.clone(), secret);

        let request = handshake.start(&self.env)?;
        let challenge = match self.call(request, auth_challenge).await {
            Ok(challenge) => challenge,
            Err(e) => {
                handshake.fail();
                return Err(e);
            },
        };

        let proof = match handshake.on_challenge(&self.env, &challenge) {
            Ok(proof) => proof,
            Err(CoreError::ServerNotVerified) => {
                tracing::warn!(user = %credential.name, "server failed the challenge");
                return Err(ClientError::ServerNotVerified { user: credential.name.clone() });
            },
            Err(e) => return Err(e.into()),
        };

        let accepted = match self.call(proof, flag).await {
            Ok(accepted) => accepted,
            Err(e) => {
                handshake.fail();
                return Err(e);
            },
        };
        Ok(handshake.on_verdict(accepted)?)
    }

    /// Open a new auction.
    pub async fn create_auction(&mut self, listing: NewAuction) -> Result<AuctionId, ClientError> {
        self.call(Request::CreateAuction(listing), |reply| match reply {
            Reply::AuctionCreated(id) => Ok(id),
            other => Err(other),
        })
        .await
    }

    /// Close an auction we are selling.
    pub async fn close_auction(
        &mut self,
        auction_id: AuctionId,
        requester_id: ClientId,
    ) -> Result<CloseOutcome, ClientError> {
        self.call(Request::CloseAuction { auction_id, requester_id }, |reply| match reply {
            Reply::Close(outcome) => Ok(outcome),
            other => Err(other),
        })
        .await
    }

    /// Bid on an active auction.
    ///
    /// Negative prices, inactive auctions and prices below the starting price
    /// are refused locally without a bid request.
    pub async fn place_bid(
        &mut self,
        price: BigDecimal,
        auction_id: AuctionId,
        bidder_id: ClientId,
    ) -> Result<BidOutcome, ClientError> {
        if price < BigDecimal::from(0) {
            return Err(ClientError::InvalidBid { reason: "price is negative" });
        }
        let active = self.active_auctions().await?;
        let auction = active.get(&auction_id).ok_or(ClientError::AuctionNotActive(auction_id))?;
        if price < auction.starting_price {
            return Err(ClientError::InvalidBid { reason: "price is below the starting price" });
        }

        let outcome = self
            .call(Request::PlaceBid { price, auction_id, bidder_id }, |reply| match reply {
                Reply::Bid(outcome) => Ok(outcome),
                other => Err(other),
            })
            .await?;
        tracing::info!(auction = %auction_id, bidder = %bidder_id, "{}", outcome.message());
        Ok(outcome)
    }

    /// Winner of a closed auction, if the reserve was met.
    pub async fn announce_winner(
        &mut self,
        auction_id: AuctionId,
    ) -> Result<Option<ClientProfile>, ClientError> {
        self.call(Request::AnnounceWinner { auction_id }, client).await
    }

    /// Register a record under an explicit id.
    pub async fn register_client(
        &mut self,
        client_id: ClientId,
        record: ClientRecord,
    ) -> Result<RegisterOutcome, ClientError> {
        self.call(Request::RegisterClient { client_id, record }, |reply| match reply {
            Reply::Registration(outcome) => Ok(outcome),
            other => Err(other),
        })
        .await
    }

    /// Whether `auction_id` is active.
    pub async fn validate_auction_id(&mut self, auction_id: AuctionId) -> Result<bool, ClientError> {
        self.call(Request::ValidateAuctionId { auction_id }, flag).await
    }

    /// Whether `user_name` is registered.
    pub async fn validate_user_name(&mut self, user_name: &str) -> Result<bool, ClientError> {
        self.call(Request::ValidateUserName { user_name: user_name.to_string() }, flag).await
    }

    /// All active auctions.
    pub async fn active_auctions(&mut self) -> Result<BTreeMap<AuctionId, Auction>, ClientError> {
        self.call(Request::GetActiveAuctions, auctions).await
    }

    /// All closed auctions.
    pub async fn closed_auctions(&mut self) -> Result<BTreeMap<AuctionId, Auction>, ClientError> {
        self.call(Request::GetClosedAuctions, auctions).await
    }

    /// All registered clients.
    pub async fn registered_clients(&mut self) -> Result<BTreeMap<ClientId, ClientProfile>, ClientError> {
        self.call(Request::GetRegisteredClients, |reply| match reply {
            Reply::Clients(clients) => Ok(clients),
            other => Err(other),
        })
        .await
    }

    /// Client registered with `password`.
    pub async fn client_by_credential(
        &mut self,
        password: Password,
    ) -> Result<Option<ClientProfile>, ClientError> {
        self.call(Request::GetClientByCredential { password }, client).await
    }

    async fn call<T>(
        &mut self,
        request: Request,
        extract: impl FnOnce(Reply) -> Result<T, Reply>,
    ) -> Result<T, ClientError> {
        let op = request.name();
        let reply = self.remote.call(request).await?;
        extract(reply).map_err(|other| ClientError::UnexpectedReply { op, reply: format!("{other:?}") })
    }
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

fn auth_challenge(reply: Reply) -> Result<AuthChallenge, Reply> {
    match reply {
        Reply::Challenge(challenge) => Ok(challenge),
        other => Err(other),
    }
}
