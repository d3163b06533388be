//! Error taxonomy for the RFM pipeline

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by the segmentation core.
///
/// Every variant is local to one pipeline invocation; nothing here is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RfmError {
    #[error("Invalid hour range {lo}-{hi}: bounds must lie in 0-23 with lo <= hi")]
    InvalidFilterRange { lo: i32, hi: i32 },

    #[error("Customer '{customer_id}' has no parsable order date; recency is undefined")]
    UndefinedRecency { customer_id: String },

    #[error("Cannot compute percentage of total for {dimension}: total sales are zero")]
    EmptyAggregateResult { dimension: &'static str },

    #[error("Unknown frequency rule '{0}' (expected 'raw-count' or 'distinct-orders')")]
    UnknownFrequencyRule(String),

    #[error("Unknown scoring policy '{0}' (expected 'threshold' or 'rank-quintile')")]
    UnknownScoringPolicy(String),

    #[error("Unknown missing-recency policy '{0}' (expected 'exclude' or 'fail')")]
    UnknownMissingRecencyPolicy(String),

    #[error("Invalid reference date '{0}' (expected YYYY-MM-DD or 'today')")]
    InvalidReferenceDate(String),

    /// A polars aggregation failed; the message is kept so the error stays comparable.
    #[error("Dataframe operation failed: {0}")]
    Frame(String),
}

impl From<PolarsError> for RfmError {
    fn from(err: PolarsError) -> Self {
        RfmError::Frame(err.to_string())
    }
}

pub type RfmResult<T> = std::result::Result<T, RfmError>;
