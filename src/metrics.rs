//! Per-customer Recency / Frequency / Monetary aggregation

use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::{RfmError, RfmResult};
use crate::frame::{self, transactions_frame, CUSTOMER_ID, ORDER_ID, ORDER_MILLIS, SALES};
use crate::transaction::Transaction;

const LAST_ORDER: &str = "last_order";
const FREQUENCY: &str = "frequency";

/// How purchases are counted for the Frequency metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrequencyRule {
    /// One per transaction line
    #[default]
    RawCount,
    /// One per distinct order identifier
    DistinctOrders,
}

impl std::str::FromStr for FrequencyRule {
    type Err = RfmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw-count" | "raw" | "count" => Ok(Self::RawCount),
            "distinct-orders" | "distinct" | "nunique" => Ok(Self::DistinctOrders),
            _ => Err(RfmError::UnknownFrequencyRule(s.to_string())),
        }
    }
}

impl std::fmt::Display for FrequencyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RawCount => write!(f, "raw-count"),
            Self::DistinctOrders => write!(f, "distinct-orders"),
        }
    }
}

/// Raw RFM metrics of one customer, before scoring
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub customer_id: String,
    /// Whole days between the last order and the reference date
    pub recency_days: u32,
    pub frequency: u32,
    /// Exact sum of sales, may be zero or negative
    pub monetary: f64,
}

impl FrequencyRule {
    /// Per-customer aggregation expression for this rule
    fn expr(self) -> Expr {
        match self {
            FrequencyRule::RawCount => len(),
            FrequencyRule::DistinctOrders => col(ORDER_ID).n_unique(),
        }
    }
}

/// Group `transactions` by customer and compute their raw metrics.
///
/// Results come back sorted by customer id. A customer whose order dates are
/// all missing yields `Err(RfmError::UndefinedRecency)` in its slot; the other
/// customers are unaffected. The outer error only reports a failed frame
/// operation.
pub fn aggregate(
    transactions: &[Transaction],
    reference_date: NaiveDateTime,
    frequency_rule: FrequencyRule,
) -> RfmResult<Vec<RfmResult<CustomerMetrics>>> {
    if transactions.is_empty() {
        return Ok(Vec::new());
    }

    let grouped = transactions_frame(transactions)?
        .lazy()
        .group_by([col(CUSTOMER_ID)])
        .agg([
            col(ORDER_MILLIS).max().alias(LAST_ORDER),
            frequency_rule.expr().alias(FREQUENCY),
            col(SALES).sum().alias(frame::MONETARY),
        ])
        .sort([CUSTOMER_ID], SortMultipleOptions::default())
        .collect()?;

    debug!(
        customers = grouped.height(),
        transactions = transactions.len(),
        rule = %frequency_rule,
        "aggregated customer metrics"
    );

    let customers = grouped.column(CUSTOMER_ID)?.str()?;
    let last_orders = grouped.column(LAST_ORDER)?.i64()?;
    let frequencies = grouped.column(FREQUENCY)?.u32()?;
    let monetary = grouped.column(frame::MONETARY)?.f64()?;

    Ok(customers
        .into_iter()
        .zip(last_orders)
        .zip(frequencies)
        .zip(monetary)
        .map(|(((customer_id, last_order), frequency), monetary)| -> RfmResult<CustomerMetrics> {
            let customer_id = customer_id.unwrap_or_default();
            let last_order = last_order
                .and_then(frame::from_millis)
                .ok_or_else(|| RfmError::UndefinedRecency {
                    customer_id: customer_id.to_string(),
                })?;

            Ok(CustomerMetrics {
                customer_id: customer_id.to_string(),
                recency_days: recency_days(customer_id, last_order, reference_date),
                frequency: frequency.unwrap_or(0),
                monetary: monetary.unwrap_or(0.0),
            })
        })
        .collect())
}

fn recency_days(customer_id: &str, last_order: NaiveDateTime, reference_date: NaiveDateTime) -> u32 {
    let days = (reference_date - last_order).num_days();
    if days < 0 {
        warn!(
            customer_id,
            %last_order,
            %reference_date,
            "last order is after the reference date, clamping recency to 0"
        );
        return 0;
    }
    u32::try_from(days).unwrap_or(u32::MAX)
}
