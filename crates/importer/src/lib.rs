//! # Importer Crate
//!
//! Moves trades in and out of the journal as CSV.
//!
//! ## Public API
//!
//! - `preview` / `detect_mapping`: read a header row and guess which column
//!   feeds each trade field. The guess is a `ColumnMapping` the user can edit.
//! - `parse_trades`: apply a mapping to every row, producing `TradeDraft`s or
//!   a row-numbered error.
//! - `export_trades`: the inverse, with the computed P/L appended.

pub mod error;
pub mod export;
pub mod mapping;
pub mod parse;

pub use error::ImportError;
pub use export::{export_trades, EXPORT_HEADER};
pub use mapping::{detect_mapping, normalize_header, ColumnMapping};
pub use parse::{parse_decimal, parse_time, parse_trades, preview, ImportPreview};
