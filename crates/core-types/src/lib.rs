pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{BrokerEnvironment, Theme};
pub use error::CoreError;
pub use structs::{
    Account, BrokerCredentials, Fill, Tag, TagDraft, Trade, TradeDraft, TradeInput,
    MAX_TRADE_MAGNITUDE,
};
