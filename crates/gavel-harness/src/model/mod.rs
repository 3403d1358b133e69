//! Reference model for model-based testing.
//!
//! The model is an obviously-correct marketplace without ids drawn at random,
//! snapshots or replication. Generated operation sequences are applied to
//! both the model and a real replica, and their replies and observable
//! states are compared.

mod market;
pub mod operation;

pub use market::{ModelMarket, ObservableState};
pub use operation::Operation;
