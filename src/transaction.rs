//! Transaction records as handed to the pipeline

use chrono::NaiveDateTime;

/// One source row of the transaction log.
///
/// Fields that failed date/time coercion during ingestion are `None`; the row
/// itself is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Opaque customer identifier
    pub customer_id: String,
    /// Order identifier, repeated across the lines of a multi-line order
    pub order_id: String,
    /// Order timestamp, `None` when unparsable
    pub order_date: Option<NaiveDateTime>,
    /// Hour of day (0-23), `None` when unparsable
    pub hour_of_day: Option<u8>,
    /// Establishment label (store or channel)
    pub establishment: String,
    /// Signed sales amount; refunds are negative
    pub sales_amount: f64,
}

impl Transaction {
    pub fn new(
        customer_id: impl Into<String>,
        order_id: impl Into<String>,
        order_date: Option<NaiveDateTime>,
        hour_of_day: Option<u8>,
        establishment: impl Into<String>,
        sales_amount: f64,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            order_id: order_id.into(),
            order_date,
            hour_of_day,
            establishment: establishment.into(),
            sales_amount,
        }
    }
}
