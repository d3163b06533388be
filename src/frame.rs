//! Columnar view of transactions and RFM rows for polars group-bys

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

use crate::pipeline::RfmRow;
use crate::segment::Segment;
use crate::transaction::Transaction;

pub const CUSTOMER_ID: &str = "customer_id";
pub const ORDER_ID: &str = "order_id";
/// Order timestamp as epoch milliseconds, null when the date did not parse
pub const ORDER_MILLIS: &str = "order_millis";
/// Hour of day as `u32`, null when the hour did not parse
pub const HOUR: &str = "hour";
pub const ESTABLISHMENT: &str = "establishment";
pub const SALES: &str = "sales";

pub const MONETARY: &str = "monetary";
pub const RFM_SCORE: &str = "rfm_score";
/// Position of the segment in [`Segment::ALL`]
pub const SEGMENT: &str = "segment";

/// One row per transaction, in slice order
pub fn transactions_frame(transactions: &[Transaction]) -> PolarsResult<DataFrame> {
    let customers: Vec<&str> = transactions.iter().map(|t| t.customer_id.as_str()).collect();
    let orders: Vec<&str> = transactions.iter().map(|t| t.order_id.as_str()).collect();
    let order_millis: Vec<Option<i64>> = transactions
        .iter()
        .map(|t| t.order_date.map(|date| date.and_utc().timestamp_millis()))
        .collect();
    let hours: Vec<Option<u32>> = transactions
        .iter()
        .map(|t| t.hour_of_day.map(u32::from))
        .collect();
    let establishments: Vec<&str> = transactions.iter().map(|t| t.establishment.as_str()).collect();
    let sales: Vec<f64> = transactions.iter().map(|t| t.sales_amount).collect();

    DataFrame::new(vec![
        Series::new(CUSTOMER_ID, customers),
        Series::new(ORDER_ID, orders),
        Series::new(ORDER_MILLIS, order_millis),
        Series::new(HOUR, hours),
        Series::new(ESTABLISHMENT, establishments),
        Series::new(SALES, sales),
    ])
}

/// One row per scored customer, joinable on [`CUSTOMER_ID`]
pub fn rows_frame(rows: &[RfmRow]) -> PolarsResult<DataFrame> {
    let customers: Vec<&str> = rows.iter().map(|r| r.customer_id()).collect();
    let monetary: Vec<f64> = rows.iter().map(|r| r.monetary()).collect();
    let scores: Vec<u32> = rows.iter().map(|r| u32::from(r.rfm_score())).collect();
    let segments: Vec<u32> = rows.iter().map(|r| segment_position(r.segment)).collect();

    DataFrame::new(vec![
        Series::new(CUSTOMER_ID, customers),
        Series::new(MONETARY, monetary),
        Series::new(RFM_SCORE, scores),
        Series::new(SEGMENT, segments),
    ])
}

pub fn from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|date| date.naive_utc())
}

fn segment_position(segment: Segment) -> u32 {
    Segment::ALL
        .iter()
        .position(|&s| s == segment)
        .map_or(0, |position| position as u32)
}

/// Inverse of the [`SEGMENT`] column encoding
pub fn segment_at(position: Option<u32>) -> Option<Segment> {
    position.and_then(|p| Segment::ALL.get(p as usize).copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CustomerMetrics;
    use crate::scoring::Scores;
    use chrono::NaiveDate;

    #[test]
    fn test_transactions_frame_keeps_nulls() {
        let date = NaiveDate::from_ymd_opt(2015, 12, 1)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap();
        let transactions = vec![
            Transaction::new("C1", "O1", Some(date), Some(7), "Grifos", 10.0),
            Transaction::new("C2", "O2", None, None, "Supermercados", 5.5),
        ];

        let df = transactions_frame(&transactions).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column(HOUR).unwrap().null_count(), 1);

        let millis = df.column(ORDER_MILLIS).unwrap().i64().unwrap();
        assert_eq!(millis.get(0).and_then(from_millis), Some(date));
        assert_eq!(millis.get(1), None);
    }

    #[test]
    fn test_segment_column_round_trips() {
        let row = RfmRow::new(
            CustomerMetrics {
                customer_id: "C1".to_string(),
                recency_days: 1,
                frequency: 1,
                monetary: 2.0,
            },
            Scores { r: 1, f: 1, m: 1 },
        );
        let df = rows_frame(&[row]).unwrap();
        let position = df.column(SEGMENT).unwrap().u32().unwrap().get(0);
        assert_eq!(segment_at(position), Some(Segment::EnRiesgo));
        assert_eq!(segment_at(Some(9)), None);
    }
}
