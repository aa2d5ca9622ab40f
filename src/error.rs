use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure talking to the time-series database.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The database answered, but not with a 2xx.
    #[error("write rejected with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}
