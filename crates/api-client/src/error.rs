use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to reach the broker: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to build the HTTP client: {0}")]
    ClientBuild(String),

    #[error("Tradovate auth failed: {0}")]
    AuthFailed(String),

    #[error("Failed to fetch {resource}: {status}")]
    Status { resource: String, status: u16 },

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),
}
