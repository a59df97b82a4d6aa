//! HTTP surface of the Hourlymotion ledger.

pub mod cli;
pub mod errors;
pub mod handlers;
pub mod models;

pub use cli::Args;
pub use errors::{GatewayError, Result};
