//! # Tradebook Analytics Engine
//!
//! This crate turns a snapshot of a user's trades into everything the
//! dashboard shows: summary statistics, the equity curve, calendar and
//! heatmap views, and time-of-day session performance.
//!
//! ## Architectural Principles
//!
//! - **Pure logic:** no I/O, no knowledge of storage or HTTP. It depends only on
//!   `core-types`.
//! - **Derived, never stored:** realized P/L is recomputed from each trade on every
//!   call, so editing a trade's prices retroactively changes every aggregate.
//! - **Total functions:** empty or degenerate input yields zero-valued results,
//!   never an error. Only an impossible calendar period is rejected.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: summary statistics, equity curve and breakdowns.
//! - `calendar`: day binning, monthly grid, month calendar and year heatmap.
//! - `sessions`: 30-minute entry-time buckets.
//! - `pnl`: the per-trade P/L and duration rules shared by all of the above.

// Declare the modules that constitute this crate.
pub mod calendar;
pub mod engine;
pub mod error;
pub mod pnl;
pub mod report;
pub mod sessions;

// Re-export the key components to create a clean, public-facing API.
pub use calendar::{DayActivity, DayBucket, group_by_day, offset_from_minutes};
pub use engine::AnalyticsEngine;
pub use error::AnalyticsError;
pub use pnl::{format_duration, realized_pl};
pub use report::{EquityPoint, JournalStats, TagStats, TickerStats};
pub use sessions::{SessionBucket, group_by_entry_time_bucket};
