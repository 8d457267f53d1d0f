//! Error types for series, catalog, projection and ledger operations

use chrono::NaiveDate;
use thiserror::Error;

use crate::ledger::ReceiptId;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Typed failures surfaced to callers.
///
/// Validation failures are never coerced into a default value; the only local
/// recovery is the provider fallback chain in [`crate::series::FallbackChain`].
#[derive(Debug, Error)]
pub enum Error {
    /// Raw series is empty, out of order, duplicated, or holds an impossible change
    #[error("invalid series: {0}")]
    InvalidSeries(String),

    /// Every provider in a fallback chain failed
    #[error("no data available for '{series_id}' ({} provider attempts failed)", attempts.len())]
    DataUnavailable {
        series_id: String,
        attempts: Vec<String>,
    },

    /// Country table could not be turned into a catalog
    #[error("malformed catalog: {0}")]
    MalformedCatalog(String),

    #[error("unknown country code '{0}'")]
    UnknownCountry(String),

    /// A window or date range holds no observations
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A growth rate at or below -100%
    #[error("rate {rate} for '{name}' is at or below -100%")]
    NegativeRateOverflow { name: String, rate: f64 },

    #[error("invalid amount {0}: must be a positive number")]
    InvalidAmount(f64),

    #[error("receipt {0} has already been reimbursed")]
    AlreadyReimbursed(ReceiptId),

    #[error("as-of date {as_of} is before incurred date {incurred}")]
    FutureDate { incurred: NaiveDate, as_of: NaiveDate },

    #[error("unknown receipt {0}")]
    UnknownReceipt(ReceiptId),

    /// Balances, rates and flows do not describe the same set of buckets
    #[error("invalid projection input: {0}")]
    InvalidProjection(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_series(msg: impl Into<String>) -> Self {
        Error::InvalidSeries(msg.into())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedCatalog(msg.into())
    }

    pub(crate) fn invalid_projection(msg: impl Into<String>) -> Self {
        Error::InvalidProjection(msg.into())
    }
}
