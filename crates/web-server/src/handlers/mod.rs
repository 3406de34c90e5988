pub mod account;
pub mod analytics;
pub mod broker;
pub mod import;
pub mod tags;
pub mod trades;

use serde::Serialize;

/// A plain `{ "message": ... }` body for operations with nothing else to return.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
