//! # Broker Sync Crate
//!
//! Imports Tradovate fills into a journal account as trades.
//!
//! ## Architectural Principles
//!
//! - **Trait Seams:** Storage (`SyncStore`) and the broker (`BrokerFactory`
//!   yielding `api_client::BrokerApi`) are traits, so a full pass runs in tests
//!   against memory and a mock.
//! - **Idempotent:** Each order becomes at most one trade per account; the
//!   order id is the dedupe key.
//! - **Secrets at Rest:** Credentials only ever touch storage as AES-256-GCM
//!   ciphertext produced by the `CredentialVault`.
//!
//! ## Public API
//!
//! - `BrokerSync`: `sync`, `save_credentials`, `status`, `delete_credentials`.
//! - `group_fills` / `synthesize_trade`: the pure fill-to-trade transform.

pub mod error;
pub mod store;
pub mod sync;
pub mod trades;
pub mod vault;

pub use error::SyncError;
pub use store::SyncStore;
pub use sync::{BrokerFactory, BrokerStatus, BrokerSync, SyncOutcome, TradovateFactory};
pub use trades::{group_fills, synthesize_trade, ContractCache, FillGroup};
pub use vault::CredentialVault;
