//! Filter -> aggregate -> score -> classify -> breakdowns, as one pure call

use tracing::{info, warn};

use crate::config::{MissingRecencyPolicy, PipelineConfig};
use crate::dimensions::{self, DimensionalReport};
use crate::error::{RfmError, RfmResult};
use crate::filter::filter;
use crate::metrics::{aggregate, CustomerMetrics};
use crate::scoring::{score_population, Scores};
use crate::segment::{classify_scores, Segment};
use crate::transaction::Transaction;

/// Column names of the exported RFM table, in order
pub const RFM_TABLE_COLUMNS: [&str; 9] = [
    "CustomerId",
    "Recency",
    "Frequency",
    "Monetary",
    "R",
    "F",
    "M",
    "RFMScore",
    "Segment",
];

/// One scored and classified customer
#[derive(Debug, Clone, PartialEq)]
pub struct RfmRow {
    pub metrics: CustomerMetrics,
    pub scores: Scores,
    pub segment: Segment,
}

impl RfmRow {
    pub fn new(metrics: CustomerMetrics, scores: Scores) -> Self {
        let segment = classify_scores(&scores);
        Self {
            metrics,
            scores,
            segment,
        }
    }

    pub fn customer_id(&self) -> &str {
        &self.metrics.customer_id
    }

    pub fn recency(&self) -> u32 {
        self.metrics.recency_days
    }

    pub fn frequency(&self) -> u32 {
        self.metrics.frequency
    }

    pub fn monetary(&self) -> f64 {
        self.metrics.monetary
    }

    pub fn rfm_score(&self) -> u8 {
        self.scores.rfm_score()
    }

    pub fn rfm_code(&self) -> String {
        self.scores.rfm_code()
    }
}

/// Complete output of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct RfmReport {
    /// One row per scored customer, sorted by customer id
    pub rows: Vec<RfmRow>,
    /// Customers dropped because none of their order dates parsed
    pub excluded_customers: Vec<String>,
    pub filtered_transactions: usize,
    pub dimensions: DimensionalReport,
}

impl RfmReport {
    pub fn customers(&self) -> usize {
        self.rows.len()
    }

    pub fn segment_count(&self, segment: Segment) -> usize {
        self.rows.iter().filter(|r| r.segment == segment).count()
    }
}

/// Run the whole segmentation over `transactions`.
///
/// Either a complete report comes back or an error does. Under
/// [`MissingRecencyPolicy::Fail`] the first customer without a usable order
/// date aborts the run.
pub fn run(transactions: &[Transaction], config: &PipelineConfig) -> RfmResult<RfmReport> {
    info!(
        transactions = transactions.len(),
        establishments = config.establishments.len(),
        hours = %config.hour_range,
        reference_date = %config.reference_date,
        frequency_rule = %config.frequency_rule,
        scoring_policy = %config.scoring_policy,
        missing_recency = %config.missing_recency,
        "running rfm pipeline"
    );

    let filtered = filter(transactions, &config.establishments, config.hour_range);

    let mut metrics = Vec::new();
    let mut excluded_customers = Vec::new();
    for outcome in aggregate(&filtered, config.reference_date, config.frequency_rule)? {
        match outcome {
            Ok(customer) => metrics.push(customer),
            Err(RfmError::UndefinedRecency { customer_id }) => match config.missing_recency {
                MissingRecencyPolicy::Fail => return Err(RfmError::UndefinedRecency { customer_id }),
                MissingRecencyPolicy::Exclude => excluded_customers.push(customer_id),
            },
            Err(other) => return Err(other),
        }
    }

    if !excluded_customers.is_empty() {
        warn!(
            excluded = excluded_customers.len(),
            "customers without a parsable order date were left out of scoring"
        );
    }

    let scores = score_population(&metrics, config.scoring_policy)?;
    let rows: Vec<RfmRow> = metrics
        .into_iter()
        .zip(scores)
        .map(|(customer, scores)| RfmRow::new(customer, scores))
        .collect();

    let dimensions = dimensions::summarize(&filtered, &rows)?;

    info!(
        filtered = filtered.len(),
        customers = rows.len(),
        excluded = excluded_customers.len(),
        "rfm pipeline complete"
    );

    Ok(RfmReport {
        rows,
        excluded_customers,
        filtered_transactions: filtered.len(),
        dimensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::HourRange;
    use crate::metrics::FrequencyRule;
    use crate::scoring::ScoringPolicy;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// Ten customers, customer `i` buys `i` times `i * 10.0` in December 2015
    fn population() -> Vec<Transaction> {
        let mut transactions = Vec::new();
        for i in 1..=10u32 {
            for n in 0..i {
                transactions.push(Transaction::new(
                    format!("C{i:02}"),
                    format!("O{i}-{n}"),
                    Some(at(2015, 12, i)),
                    Some((n % 24) as u8),
                    if i % 2 == 0 { "Grifos" } else { "Supermercados" },
                    f64::from(i) * 10.0,
                ));
            }
        }
        transactions
    }

    fn config() -> PipelineConfig {
        PipelineConfig::new(["Grifos", "Supermercados"], HourRange::full_day(), at(2015, 12, 31))
    }

    #[test]
    fn test_scores_stay_in_range() {
        for policy in [ScoringPolicy::Threshold, ScoringPolicy::RankQuintile] {
            let report = run(&population(), &config().with_scoring_policy(policy)).unwrap();
            assert_eq!(report.customers(), 10);
            for row in &report.rows {
                assert!((3..=15).contains(&row.rfm_score()));
                for score in [row.scores.r, row.scores.f, row.scores.m] {
                    assert!((1..=5).contains(&score));
                }
            }
        }
    }

    #[test]
    fn test_best_customer_is_champion() {
        let report = run(&population(), &config().with_scoring_policy(ScoringPolicy::RankQuintile)).unwrap();
        let best = report.rows.iter().find(|r| r.customer_id() == "C10").unwrap();
        assert_eq!(best.rfm_code(), "555");
        assert_eq!(best.segment, Segment::Champions);

        let worst = report.rows.iter().find(|r| r.customer_id() == "C01").unwrap();
        assert_eq!(worst.rfm_code(), "111");
        assert_eq!(worst.segment, Segment::EnRiesgo);
    }

    #[test]
    fn test_run_is_idempotent() {
        let transactions = population();
        let config = config().with_frequency_rule(FrequencyRule::DistinctOrders);
        assert_eq!(run(&transactions, &config), run(&transactions, &config));
    }

    #[test]
    fn test_missing_recency_policies() {
        let mut transactions = population();
        transactions.push(Transaction::new("GHOST", "X1", None, Some(3), "Grifos", 5.0));

        let report = run(&transactions, &config()).unwrap();
        assert_eq!(report.excluded_customers, vec!["GHOST".to_string()]);
        assert_eq!(report.customers(), 10);

        let result = run(&transactions, &config().with_missing_recency(MissingRecencyPolicy::Fail));
        assert_eq!(
            result,
            Err(RfmError::UndefinedRecency {
                customer_id: "GHOST".to_string()
            })
        );
    }

    #[test]
    fn test_empty_selection_yields_empty_report() {
        let config = PipelineConfig::new(Vec::<String>::new(), HourRange::full_day(), at(2015, 12, 31));
        let report = run(&population(), &config).unwrap();
        assert!(report.rows.is_empty());
        assert_eq!(report.filtered_transactions, 0);
        assert!(report.dimensions.sales_by_establishment.is_empty());
    }

    #[test]
    fn test_rank_ties_resolve_by_customer_id() {
        // Every customer buys once on the same day for the same amount
        let transactions: Vec<Transaction> = ["E", "D", "C", "B", "A"]
            .iter()
            .map(|&id| Transaction::new(id, id, Some(at(2015, 12, 1)), Some(9), "Grifos", 10.0))
            .collect();
        let config = config().with_scoring_policy(ScoringPolicy::RankQuintile);
        let report = run(&transactions, &config).unwrap();

        let f_scores: Vec<(&str, u8)> = report.rows.iter().map(|r| (r.customer_id(), r.scores.f)).collect();
        assert_eq!(f_scores, vec![("A", 1), ("B", 2), ("C", 3), ("D", 4), ("E", 5)]);
    }

    #[test]
    fn test_segment_counts_cover_every_row() {
        let report = run(&population(), &config()).unwrap();
        let total: usize = Segment::ALL.iter().map(|&s| report.segment_count(s)).sum();
        assert_eq!(total, report.customers());
    }
}
