//! Hourlymotion Ledger Core
//!
//! Per-user engagement ledger that turns watched ads into tokens and spends
//! those tokens to skip future ads.
//!
//! # Architecture
//!
//! - **Keyed records**: one JSON-encoded [`UserRecord`] per user id
//! - **Serialized writes**: every mutation is a single read-modify-write
//!   transaction against the [`Storage`] backend, one at a time
//! - **Snapshot reads**: listings decode a point-in-time view of the store
//! - **Pluggable gating**: the ad decision rule is a [`GatingPolicy`]
//!
//! # Invariants
//!
//! - No double spend: a token is debited by at most one gating decision
//! - Atomicity: a failed operation leaves no partial write behind
//! - Records are created lazily and never deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod codec;
pub mod config;
pub mod error;
pub mod gating;
pub mod journal;
pub mod ledger;
pub mod metrics;
pub mod reporting;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use gating::{BalanceMode, GatingPolicy, SingleTokenPolicy, ThresholdPolicy, Verdict};
pub use ledger::Ledger;
pub use storage::Storage;
pub use types::{Event, EventKind, Settings, UserRecord};
