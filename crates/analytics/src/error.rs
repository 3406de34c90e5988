use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AnalyticsError {
    #[error("Invalid calendar period: {0}")]
    InvalidPeriod(String),
}
