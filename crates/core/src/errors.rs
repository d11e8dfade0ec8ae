//! Core error types for the portfolio aggregation engine.
//!
//! Failures are recovered at the lowest possible layer: adapters turn bad
//! records into defaults plus warnings, the conversion engine turns missing
//! rates into `None`. Only the variants below travel between crates, and of
//! those only `Auth` blocks a broker's contribution to a snapshot.

use thiserror::Error;

use crate::fx::FxError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the aggregation engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing, expired, or rejected credential. Surfaced to the caller
    /// with a re-authentication call to action; never retried.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection error or non-2xx status on a single call. The call's
    /// contribution is treated as missing data; the refresh continues.
    #[error("Network request failed: {0}")]
    Network(String),

    /// Malformed or unexpected payload shape.
    #[error("Failed to parse payload: {0}")]
    Parse(String),

    #[error("Fx error: {0}")]
    Fx(#[from] FxError),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Whether this error is authentication-class. Auth failures block the
    /// owning broker's fragment entirely; everything else degrades to
    /// defaults or omissions further down.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
