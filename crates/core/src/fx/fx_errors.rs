use thiserror::Error;

/// Errors raised while obtaining exchange rates.
///
/// Conversion call sites never see these directly: the engine degrades a
/// failed lookup into `None` and the position is excluded from converted
/// aggregates. The variants exist for rate sources and logging.
#[derive(Error, Debug)]
pub enum FxError {
    #[error("Exchange rate not found: {0}")]
    RateNotFound(String),

    #[error("Invalid currency code: {0}")]
    InvalidCurrencyCode(String),

    #[error("Failed to fetch exchange rate: {0}")]
    FetchError(String),
}
