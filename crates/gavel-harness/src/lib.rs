//! Deterministic simulation harness for Gavel.
//!
//! - [`SimEnv`]: seeded randomness on tokio's virtual clock
//! - [`run_front_end`]: a replica cluster behind turmoil's simulated TCP
//! - [`InProcess`]: a client remote wired straight to a coordinator
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference marketplace. Operations are
//! applied to both the model and a real replica, and their replies and
//! observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;
pub mod sim_server;

pub use model::{ModelMarket, ObservableState, Operation};
pub use sim_env::SimEnv;
pub use sim_server::{FRONT_END_PORT, InProcess, run_front_end};
