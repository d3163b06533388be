//! Sales breakdowns by establishment, hour and segment

use polars::prelude::*;
use tracing::debug;

use crate::error::{RfmError, RfmResult};
use crate::frame::{self, rows_frame, segment_at, transactions_frame, CUSTOMER_ID, ESTABLISHMENT, HOUR, SALES};
use crate::pipeline::RfmRow;
use crate::segment::Segment;
use crate::transaction::Transaction;

/// Share of the estimated margin over monetary value
pub const MARGIN_RATE: f64 = 0.3;

const MEAN_RFM_SCORE: &str = "mean_rfm_score";
const ESTIMATED_MARGIN: &str = "estimated_margin";
const CUSTOMERS: &str = "customers";
const MEAN_MONETARY: &str = "mean_monetary";

/// Every keyed sales table produced for one filtered dataset.
///
/// Keys are sorted ascending. The segment-joined tables only see transactions
/// of customers present in the RFM table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DimensionalReport {
    pub sales_by_establishment: Vec<(String, f64)>,
    pub sales_by_hour: Vec<(u8, f64)>,
    pub sales_by_hour_establishment: Vec<((u8, String), f64)>,
    pub sales_by_segment_establishment: Vec<((Segment, String), f64)>,
    pub sales_by_segment_hour: Vec<((Segment, u8), f64)>,
    pub competitive_map: Vec<CompetitivePosition>,
    pub segment_summary: Vec<SegmentSummary>,
}

/// Per-establishment value of the customers who bought there
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitivePosition {
    pub establishment: String,
    /// Customer `Monetary`, summed once per joined transaction
    pub monetary: f64,
    pub mean_rfm_score: f64,
    pub estimated_margin: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub customers: usize,
    pub mean_monetary: f64,
}

/// Sum `sales` per distinct `keys` combination, sorted by the keys.
///
/// Rows with a null key (an unparsed hour) are left out.
fn sum_sales(lf: LazyFrame, keys: &[&str]) -> PolarsResult<DataFrame> {
    let present = keys
        .iter()
        .fold(lit(true), |acc, &key| acc.and(col(key).is_not_null()));
    let by: Vec<Expr> = keys.iter().map(|&key| col(key)).collect();

    lf.filter(present)
        .group_by(by)
        .agg([col(SALES).sum()])
        .sort(keys.to_vec(), SortMultipleOptions::default())
        .collect()
}

/// Transactions of scored customers, each carrying its customer's row
fn joined(transactions: &DataFrame, rows: &[RfmRow]) -> PolarsResult<LazyFrame> {
    Ok(transactions
        .clone()
        .lazy()
        .inner_join(rows_frame(rows)?.lazy(), col(CUSTOMER_ID), col(CUSTOMER_ID)))
}

fn hour(value: Option<u32>) -> u8 {
    value.and_then(|h| u8::try_from(h).ok()).unwrap_or_default()
}

fn segment(value: Option<u32>) -> RfmResult<Segment> {
    segment_at(value).ok_or_else(|| RfmError::Frame(format!("unknown segment position {value:?}")))
}

/// Sales per establishment, from a [`transactions_frame`]
pub fn sales_by_establishment(transactions: &DataFrame) -> RfmResult<Vec<(String, f64)>> {
    let totals = sum_sales(transactions.clone().lazy(), &[ESTABLISHMENT])?;
    let establishments = totals.column(ESTABLISHMENT)?.str()?;
    let sales = totals.column(SALES)?.f64()?;

    Ok(establishments
        .into_iter()
        .zip(sales)
        .map(|(establishment, sales)| (establishment.unwrap_or_default().to_string(), sales.unwrap_or(0.0)))
        .collect())
}

pub fn sales_by_hour(transactions: &DataFrame) -> RfmResult<Vec<(u8, f64)>> {
    let totals = sum_sales(transactions.clone().lazy(), &[HOUR])?;
    let hours = totals.column(HOUR)?.u32()?;
    let sales = totals.column(SALES)?.f64()?;

    Ok(hours
        .into_iter()
        .zip(sales)
        .map(|(h, sales)| (hour(h), sales.unwrap_or(0.0)))
        .collect())
}

pub fn sales_by_hour_establishment(transactions: &DataFrame) -> RfmResult<Vec<((u8, String), f64)>> {
    let totals = sum_sales(transactions.clone().lazy(), &[HOUR, ESTABLISHMENT])?;
    let hours = totals.column(HOUR)?.u32()?;
    let establishments = totals.column(ESTABLISHMENT)?.str()?;
    let sales = totals.column(SALES)?.f64()?;

    Ok(hours
        .into_iter()
        .zip(establishments)
        .zip(sales)
        .map(|((h, establishment), sales)| {
            (
                (hour(h), establishment.unwrap_or_default().to_string()),
                sales.unwrap_or(0.0),
            )
        })
        .collect())
}

pub fn sales_by_segment_establishment(
    transactions: &DataFrame,
    rows: &[RfmRow],
) -> RfmResult<Vec<((Segment, String), f64)>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let totals = sum_sales(joined(transactions, rows)?, &[frame::SEGMENT, ESTABLISHMENT])?;
    let segments = totals.column(frame::SEGMENT)?.u32()?;
    let establishments = totals.column(ESTABLISHMENT)?.str()?;
    let sales = totals.column(SALES)?.f64()?;

    segments
        .into_iter()
        .zip(establishments)
        .zip(sales)
        .map(|((position, establishment), sales)| -> RfmResult<_> {
            Ok((
                (segment(position)?, establishment.unwrap_or_default().to_string()),
                sales.unwrap_or(0.0),
            ))
        })
        .collect()
}

pub fn sales_by_segment_hour(transactions: &DataFrame, rows: &[RfmRow]) -> RfmResult<Vec<((Segment, u8), f64)>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let totals = sum_sales(joined(transactions, rows)?, &[frame::SEGMENT, HOUR])?;
    let segments = totals.column(frame::SEGMENT)?.u32()?;
    let hours = totals.column(HOUR)?.u32()?;
    let sales = totals.column(SALES)?.f64()?;

    segments
        .into_iter()
        .zip(hours)
        .zip(sales)
        .map(|((position, h), sales)| -> RfmResult<_> { Ok(((segment(position)?, hour(h)), sales.unwrap_or(0.0))) })
        .collect()
}

/// Normalize totals to percentages of their sum.
///
/// A zero sum (no rows, or sales cancelling out) is reported as
/// `EmptyAggregateResult` for `dimension`.
pub fn percentage_of_total<K: Clone>(
    totals: &[(K, f64)],
    dimension: &'static str,
) -> RfmResult<Vec<(K, f64)>> {
    let sum: f64 = totals.iter().map(|(_, v)| v).sum();
    if sum == 0.0 {
        debug!(dimension, "percentage requested over a zero total");
        return Err(RfmError::EmptyAggregateResult { dimension });
    }
    Ok(totals
        .iter()
        .map(|(key, value)| (key.clone(), value / sum * 100.0))
        .collect())
}

/// The `n` best and `n` worst selling hours.
///
/// Peaks come in descending sales order, valleys ascending; equal sales keep
/// ascending hour order.
pub fn peak_and_valley_hours(hour_totals: &[(u8, f64)], n: usize) -> (Vec<(u8, f64)>, Vec<(u8, f64)>) {
    let mut peaks = hour_totals.to_vec();
    peaks.sort_by(|a, b| b.1.total_cmp(&a.1));
    peaks.truncate(n);

    let mut valleys = hour_totals.to_vec();
    valleys.sort_by(|a, b| a.1.total_cmp(&b.1));
    valleys.truncate(n);

    (peaks, valleys)
}

/// Join transactions with the RFM table and summarize per establishment.
///
/// Each joined transaction contributes its customer's full `Monetary` and
/// `RFMScore`, so frequent buyers weigh more.
pub fn competitive_map(transactions: &DataFrame, rows: &[RfmRow]) -> RfmResult<Vec<CompetitivePosition>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let map = joined(transactions, rows)?
        .group_by([col(ESTABLISHMENT)])
        .agg([
            col(frame::MONETARY).sum(),
            col(frame::RFM_SCORE).mean().alias(MEAN_RFM_SCORE),
        ])
        .with_columns([(col(frame::MONETARY) * lit(MARGIN_RATE)).alias(ESTIMATED_MARGIN)])
        .sort([ESTABLISHMENT], SortMultipleOptions::default())
        .collect()?;

    let establishments = map.column(ESTABLISHMENT)?.str()?;
    let monetary = map.column(frame::MONETARY)?.f64()?;
    let scores = map.column(MEAN_RFM_SCORE)?.f64()?;
    let margins = map.column(ESTIMATED_MARGIN)?.f64()?;

    Ok(establishments
        .into_iter()
        .zip(monetary)
        .zip(scores)
        .zip(margins)
        .map(|(((establishment, monetary), score), margin)| CompetitivePosition {
            establishment: establishment.unwrap_or_default().to_string(),
            monetary: monetary.unwrap_or(0.0),
            mean_rfm_score: score.unwrap_or(0.0),
            estimated_margin: margin.unwrap_or(0.0),
        })
        .collect())
}

/// Customer count and mean monetary value of each segment present
pub fn segment_summary(rows: &[RfmRow]) -> RfmResult<Vec<SegmentSummary>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let summary = rows_frame(rows)?
        .lazy()
        .group_by([col(frame::SEGMENT)])
        .agg([
            len().alias(CUSTOMERS),
            col(frame::MONETARY).mean().alias(MEAN_MONETARY),
        ])
        .sort([frame::SEGMENT], SortMultipleOptions::default())
        .collect()?;

    let segments = summary.column(frame::SEGMENT)?.u32()?;
    let customers = summary.column(CUSTOMERS)?.u32()?;
    let means = summary.column(MEAN_MONETARY)?.f64()?;

    segments
        .into_iter()
        .zip(customers)
        .zip(means)
        .map(|((position, customers), mean)| -> RfmResult<SegmentSummary> {
            Ok(SegmentSummary {
                segment: segment(position)?,
                customers: customers.unwrap_or(0) as usize,
                mean_monetary: mean.unwrap_or(0.0),
            })
        })
        .collect()
}

/// Compute every breakdown for one pipeline run.
pub fn summarize(transactions: &[Transaction], rows: &[RfmRow]) -> RfmResult<DimensionalReport> {
    if transactions.is_empty() {
        return Ok(DimensionalReport::default());
    }
    let df = transactions_frame(transactions)?;
    debug!(rows = df.height(), customers = rows.len(), "computing sales breakdowns");

    Ok(DimensionalReport {
        sales_by_establishment: sales_by_establishment(&df)?,
        sales_by_hour: sales_by_hour(&df)?,
        sales_by_hour_establishment: sales_by_hour_establishment(&df)?,
        sales_by_segment_establishment: sales_by_segment_establishment(&df, rows)?,
        sales_by_segment_hour: sales_by_segment_hour(&df, rows)?,
        competitive_map: competitive_map(&df, rows)?,
        segment_summary: segment_summary(rows)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CustomerMetrics;
    use crate::scoring::Scores;

    fn tx(customer: &str, establishment: &str, hour: Option<u8>, sales: f64) -> Transaction {
        Transaction::new(customer, "O", None, hour, establishment, sales)
    }

    fn row(customer: &str, monetary: f64, scores: Scores) -> RfmRow {
        RfmRow::new(
            CustomerMetrics {
                customer_id: customer.to_string(),
                recency_days: 1,
                frequency: 1,
                monetary,
            },
            scores,
        )
    }

    fn sample() -> DataFrame {
        transactions_frame(&[
            tx("C1", "Grifos", Some(7), 10.0),
            tx("C2", "Supermercados", Some(7), 30.0),
            tx("C1", "Supermercados", Some(18), 20.0),
            tx("C3", "Grifos", Some(18), 40.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_sales_by_establishment_and_hour() {
        let transactions = sample();
        assert_eq!(
            sales_by_establishment(&transactions).unwrap(),
            vec![("Grifos".to_string(), 50.0), ("Supermercados".to_string(), 50.0)]
        );
        assert_eq!(sales_by_hour(&transactions).unwrap(), vec![(7, 40.0), (18, 60.0)]);
        assert_eq!(sales_by_hour_establishment(&transactions).unwrap().len(), 4);
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let transactions = sample();
        let shares = percentage_of_total(&sales_by_establishment(&transactions).unwrap(), "establishment").unwrap();
        let total: f64 = shares.iter().map(|(_, pct)| pct).sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert!((shares[0].1 - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_total_is_empty_aggregate() {
        let empty: Vec<(String, f64)> = Vec::new();
        assert_eq!(
            percentage_of_total(&empty, "establishment"),
            Err(RfmError::EmptyAggregateResult {
                dimension: "establishment"
            })
        );

        let cancelled = vec![(7u8, 25.0), (8u8, -25.0)];
        assert!(matches!(
            percentage_of_total(&cancelled, "hour"),
            Err(RfmError::EmptyAggregateResult { dimension: "hour" })
        ));
    }

    #[test]
    fn test_segment_joined_tables_use_inner_join() {
        let transactions = sample();
        let rows = vec![
            row("C1", 30.0, Scores { r: 5, f: 5, m: 5 }),
            row("C2", 30.0, Scores { r: 1, f: 1, m: 1 }),
        ];

        let by_segment = sales_by_segment_establishment(&transactions, &rows).unwrap();
        assert_eq!(
            by_segment,
            vec![
                ((Segment::Champions, "Grifos".to_string()), 10.0),
                ((Segment::Champions, "Supermercados".to_string()), 20.0),
                ((Segment::EnRiesgo, "Supermercados".to_string()), 30.0),
            ]
        );

        let by_hour = sales_by_segment_hour(&transactions, &rows).unwrap();
        assert_eq!(
            by_hour,
            vec![
                ((Segment::Champions, 7), 10.0),
                ((Segment::Champions, 18), 20.0),
                ((Segment::EnRiesgo, 7), 30.0),
            ]
        );
    }

    #[test]
    fn test_unparsed_hours_are_left_out_of_hour_tables() {
        let transactions = transactions_frame(&[
            tx("C1", "Grifos", None, 99.0),
            tx("C1", "Grifos", Some(9), 1.0),
        ])
        .unwrap();
        assert_eq!(sales_by_hour(&transactions).unwrap(), vec![(9, 1.0)]);
        assert_eq!(
            sales_by_hour_establishment(&transactions).unwrap(),
            vec![((9, "Grifos".to_string()), 1.0)]
        );
        assert_eq!(
            sales_by_establishment(&transactions).unwrap(),
            vec![("Grifos".to_string(), 100.0)]
        );
    }

    #[test]
    fn test_summarize_empty_input() {
        assert_eq!(summarize(&[], &[]).unwrap(), DimensionalReport::default());
    }

    #[test]
    fn test_peak_and_valley_hours() {
        let totals = vec![(6, 5.0), (7, 50.0), (8, 20.0), (9, 50.0), (10, 1.0)];
        let (peaks, valleys) = peak_and_valley_hours(&totals, 3);
        assert_eq!(peaks, vec![(7, 50.0), (9, 50.0), (8, 20.0)]);
        assert_eq!(valleys, vec![(10, 1.0), (6, 5.0), (8, 20.0)]);

        let (peaks, valleys) = peak_and_valley_hours(&totals[..1], 3);
        assert_eq!(peaks.len(), 1);
        assert_eq!(valleys.len(), 1);
    }

    #[test]
    fn test_competitive_map_weights_by_joined_transactions() {
        let transactions = sample();
        let rows = vec![
            row("C1", 30.0, Scores { r: 5, f: 5, m: 5 }),
            row("C3", 40.0, Scores { r: 1, f: 1, m: 1 }),
        ];

        let map = competitive_map(&transactions, &rows).unwrap();
        assert_eq!(map.len(), 2);

        let grifos = &map[0];
        assert_eq!(grifos.establishment, "Grifos");
        assert_eq!(grifos.monetary, 70.0);
        assert_eq!(grifos.mean_rfm_score, 9.0);
        assert!((grifos.estimated_margin - 21.0).abs() < 1e-9);

        let supermercados = &map[1];
        assert_eq!(supermercados.monetary, 30.0);
        assert_eq!(supermercados.mean_rfm_score, 15.0);
    }

    #[test]
    fn test_segment_summary_lists_present_segments_in_order() {
        let rows = vec![
            row("C1", 10.0, Scores { r: 1, f: 1, m: 1 }),
            row("C2", 100.0, Scores { r: 5, f: 5, m: 5 }),
            row("C3", 30.0, Scores { r: 1, f: 1, m: 2 }),
        ];
        let summary = segment_summary(&rows).unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].segment, Segment::Champions);
        assert_eq!(summary[0].customers, 1);
        assert_eq!(summary[1].segment, Segment::EnRiesgo);
        assert_eq!(summary[1].customers, 2);
        assert_eq!(summary[1].mean_monetary, 20.0);
    }
}
