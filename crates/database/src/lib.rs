//! # Tradebook Database Crate
//!
//! This crate is the application-specific interface to PostgreSQL: the
//! permanent home of accounts, trades, tags and encrypted broker credentials.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** all SQL lives here. The rest of the workspace sees domain types
//!   from `core-types` and the `DbRepository` methods, never rows.
//! - **Owner scoping:** every trade and tag query is filtered by the owning
//!   account, so one user can never read or mutate another's journal.
//! - **Asynchronous & Pooled:** all operations are async over a shared `PgPool`.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: pool setup and schema migrations.
//! - `DbRepository`: the data access methods.
//! - `EncryptedCredentials`: broker credentials in their stored (ciphertext) form.
//! - `DbError`: the error type for this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, connect_with, run_migrations};
pub use error::DbError;
pub use repository::{DbRepository, EncryptedCredentials};
