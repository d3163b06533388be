//! Quantile scoring of raw RFM metrics into 1-5 ordinal scores
//!
//! Two policies are available and they are not numerically equivalent:
//!
//! * [`ScoringPolicy::Threshold`] compares each value against the 20/40/60/80th
//!   percentiles of the current population, inclusively.
//! * [`ScoringPolicy::RankQuintile`] ranks the population (ties keep row
//!   order) and cuts the ranks into five equal-frequency bins.
//!
//! Both run on a one-column polars frame of the metric values.

use polars::prelude::*;
use tracing::debug;

use crate::error::{RfmError, RfmResult};
use crate::metrics::CustomerMetrics;

/// Number of score buckets
const BUCKETS: usize = 5;

const VALUE: &str = "value";
const RANK: &str = "rank";

/// Which quantile scheme turns metrics into scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScoringPolicy {
    /// Inclusive comparison against population percentiles
    #[default]
    Threshold,
    /// Equal-frequency bins over stable ranks
    RankQuintile,
}

impl std::str::FromStr for ScoringPolicy {
    type Err = RfmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "threshold" | "quantile" => Ok(Self::Threshold),
            "rank-quintile" | "rank" | "qcut" => Ok(Self::RankQuintile),
            _ => Err(RfmError::UnknownScoringPolicy(s.to_string())),
        }
    }
}

impl std::fmt::Display for ScoringPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Threshold => write!(f, "threshold"),
            Self::RankQuintile => write!(f, "rank-quintile"),
        }
    }
}

/// The three scored dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Recency,
    Frequency,
    Monetary,
}

impl Metric {
    /// Recency is the only dimension where a smaller value is better.
    pub fn lower_is_better(self) -> bool {
        matches!(self, Metric::Recency)
    }

    /// Score for the `bucket`-th lowest value bucket (0-based)
    fn label(self, bucket: usize) -> u8 {
        let bucket = bucket.min(BUCKETS - 1) as u8;
        if self.lower_is_better() {
            BUCKETS as u8 - bucket
        } else {
            bucket + 1
        }
    }
}

/// R, F and M scores of one customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scores {
    pub r: u8,
    pub f: u8,
    pub m: u8,
}

impl Scores {
    /// Composite score in `3..=15`
    pub fn rfm_score(&self) -> u8 {
        self.r + self.f + self.m
    }

    /// Three-digit segmentation key, e.g. `"545"`
    pub fn rfm_code(&self) -> String {
        format!("{}{}{}", self.r, self.f, self.m)
    }
}

/// The four percentile cut points of one metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundaries {
    pub p20: f64,
    pub p40: f64,
    pub p60: f64,
    pub p80: f64,
}

impl Boundaries {
    /// Compute the cut points of `values`; `None` for an empty population.
    ///
    /// Percentiles interpolate linearly between the two closest ranks.
    pub fn from_population(values: &[f64]) -> RfmResult<Option<Self>> {
        if values.is_empty() {
            return Ok(None);
        }

        let cuts = value_frame(values)?
            .lazy()
            .select([
                percentile(0.2, "p20"),
                percentile(0.4, "p40"),
                percentile(0.6, "p60"),
                percentile(0.8, "p80"),
            ])
            .collect()?;

        let at = |name: &str| -> RfmResult<f64> {
            cuts.column(name)?
                .f64()?
                .get(0)
                .ok_or_else(|| RfmError::Frame(format!("{name} is null for a non-empty population")))
        };

        Ok(Some(Self {
            p20: at("p20")?,
            p40: at("p40")?,
            p60: at("p60")?,
            p80: at("p80")?,
        }))
    }

    /// Inclusive `<=` chain: a value sitting exactly on a cut point takes the
    /// lower value bucket.
    pub fn score(&self, value: f64, metric: Metric) -> u8 {
        let bucket = if value <= self.p20 {
            0
        } else if value <= self.p40 {
            1
        } else if value <= self.p60 {
            2
        } else if value <= self.p80 {
            3
        } else {
            4
        };
        metric.label(bucket)
    }
}

fn value_frame(values: &[f64]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![Series::new(VALUE, values)])
}

fn percentile(quantile: f64, name: &str) -> Expr {
    col(VALUE)
        .quantile(lit(quantile), QuantileInterpolOptions::Linear)
        .alias(name)
}

/// Equal-frequency bin (0-based) of every value, in input order.
///
/// Values get ordinal ranks `1..=n`, so equal values are ranked in row order.
/// Rank `r` goes to the first bin `k` whose upper edge `1 + (n - 1) * k / 5`
/// is `>= r`, the same right-inclusive edges a quantile cut over the rank
/// sequence produces.
pub fn rank_quintile_bins(values: &[f64]) -> RfmResult<Vec<usize>> {
    let n = values.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let ranked = value_frame(values)?
        .lazy()
        .select([col(VALUE)
            .rank(
                RankOptions {
                    method: RankMethod::Ordinal,
                    descending: false,
                },
                None,
            )
            .alias(RANK)])
        .collect()?;

    Ok(ranked
        .column(RANK)?
        .u32()?
        .into_iter()
        .map(|rank| {
            let scaled_position = BUCKETS * rank.unwrap_or(1).saturating_sub(1) as usize;
            (1..=BUCKETS)
                .find(|&k| scaled_position <= (n - 1) * k)
                .map_or(BUCKETS - 1, |k| k - 1)
        })
        .collect())
}

impl ScoringPolicy {
    /// Score every value of one metric against its own population.
    pub fn score(&self, values: &[f64], metric: Metric) -> RfmResult<Vec<u8>> {
        match self {
            ScoringPolicy::Threshold => match Boundaries::from_population(values)? {
                Some(boundaries) => {
                    debug!(?metric, ?boundaries, "threshold cut points");
                    Ok(values.iter().map(|&v| boundaries.score(v, metric)).collect())
                }
                None => Ok(Vec::new()),
            },
            ScoringPolicy::RankQuintile => Ok(rank_quintile_bins(values)?
                .into_iter()
                .map(|bin| metric.label(bin))
                .collect()),
        }
    }
}

/// Score a whole population; the result is index-aligned with `metrics`.
///
/// Rank ties resolve in `metrics` order, which the aggregation sorts by
/// customer id.
pub fn score_population(metrics: &[CustomerMetrics], policy: ScoringPolicy) -> RfmResult<Vec<Scores>> {
    let recency: Vec<f64> = metrics.iter().map(|m| f64::from(m.recency_days)).collect();
    let frequency: Vec<f64> = metrics.iter().map(|m| f64::from(m.frequency)).collect();
    let monetary: Vec<f64> = metrics.iter().map(|m| m.monetary).collect();

    let r = policy.score(&recency, Metric::Recency)?;
    let f = policy.score(&frequency, Metric::Frequency)?;
    let m = policy.score(&monetary, Metric::Monetary)?;

    Ok(r.into_iter()
        .zip(f)
        .zip(m)
        .map(|((r, f), m)| Scores { r, f, m })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_interpolate_linearly() {
        let b = Boundaries::from_population(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap().unwrap();
        assert!((b.p20 - 1.8).abs() < 1e-12);
        assert!((b.p40 - 2.6).abs() < 1e-12);
        assert!((b.p60 - 3.4).abs() < 1e-12);
        assert!((b.p80 - 4.2).abs() < 1e-12);
    }

    #[test]
    fn test_value_on_boundary_takes_lower_bucket() {
        // n = 6 puts every cut point exactly on an element: 20, 30, 40, 50
        let values = [60.0, 10.0, 50.0, 20.0, 40.0, 30.0];
        let b = Boundaries::from_population(&values).unwrap().unwrap();
        assert_eq!(b, Boundaries { p20: 20.0, p40: 30.0, p60: 40.0, p80: 50.0 });

        assert_eq!(b.score(20.0, Metric::Monetary), 1);
        assert_eq!(b.score(20.5, Metric::Monetary), 2);
        assert_eq!(b.score(50.0, Metric::Frequency), 4);
        assert_eq!(b.score(60.0, Metric::Frequency), 5);

        assert_eq!(b.score(20.0, Metric::Recency), 5);
        assert_eq!(b.score(30.0, Metric::Recency), 4);
        assert_eq!(b.score(50.0, Metric::Recency), 2);
        assert_eq!(b.score(60.0, Metric::Recency), 1);
    }

    #[test]
    fn test_few_distinct_values_collapse_buckets() {
        let values = [1.0, 1.0, 1.0, 1.0, 2.0];
        let scores = ScoringPolicy::Threshold.score(&values, Metric::Frequency).unwrap();
        // p20..p60 all equal 1, p80 is 1.2: ones score 1, the two scores 5
        assert_eq!(scores, vec![1, 1, 1, 1, 5]);

        let same = [7.0; 4];
        let scores = ScoringPolicy::Threshold.score(&same, Metric::Recency).unwrap();
        assert_eq!(scores, vec![5; 4]);
    }

    #[test]
    fn test_rank_quintile_equal_bins() {
        let values: Vec<f64> = (0..15).rev().map(f64::from).collect();
        let bins = rank_quintile_bins(&values).unwrap();
        for bin in 0..BUCKETS {
            assert_eq!(bins.iter().filter(|&&b| b == bin).count(), 3);
        }
        // Largest value first in input, so it sits in the top bin
        assert_eq!(bins[0], 4);
        assert_eq!(bins[14], 0);
    }

    #[test]
    fn test_rank_quintile_uneven_population() {
        let values: Vec<f64> = (0..7).map(f64::from).collect();
        let bins = rank_quintile_bins(&values).unwrap();
        assert_eq!(bins, vec![0, 0, 1, 2, 3, 4, 4]);
    }

    #[test]
    fn test_rank_quintile_ties_keep_input_order() {
        // Every value equal: bins follow input position only
        let values = [3.0; 10];
        let bins = rank_quintile_bins(&values).unwrap();
        assert_eq!(bins, vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);

        let scores = ScoringPolicy::RankQuintile.score(&values, Metric::Frequency).unwrap();
        assert_eq!(scores, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
        let scores = ScoringPolicy::RankQuintile.score(&values, Metric::Recency).unwrap();
        assert_eq!(scores, vec![5, 5, 4, 4, 3, 3, 2, 2, 1, 1]);
    }

    #[test]
    fn test_single_customer_population() {
        assert_eq!(rank_quintile_bins(&[42.0]).unwrap(), vec![0]);
        assert_eq!(ScoringPolicy::Threshold.score(&[42.0], Metric::Monetary).unwrap(), vec![1]);
        assert_eq!(ScoringPolicy::Threshold.score(&[42.0], Metric::Recency).unwrap(), vec![5]);
        assert!(ScoringPolicy::Threshold.score(&[], Metric::Monetary).unwrap().is_empty());
        assert!(ScoringPolicy::RankQuintile.score(&[], Metric::Monetary).unwrap().is_empty());
    }

    #[test]
    fn test_policies_are_not_equivalent() {
        let values = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 9.0];
        let threshold = ScoringPolicy::Threshold.score(&values, Metric::Frequency).unwrap();
        let ranked = ScoringPolicy::RankQuintile.score(&values, Metric::Frequency).unwrap();
        assert_ne!(threshold, ranked);
    }

    #[test]
    fn test_scores_composite() {
        let s = Scores { r: 5, f: 4, m: 3 };
        assert_eq!(s.rfm_score(), 12);
        assert_eq!(s.rfm_code(), "543");
    }

    #[test]
    fn test_scoring_policy_from_str() {
        assert_eq!("threshold".parse::<ScoringPolicy>(), Ok(ScoringPolicy::Threshold));
        assert_eq!("RANK-QUINTILE".parse::<ScoringPolicy>(), Ok(ScoringPolicy::RankQuintile));
        assert!(matches!(
            "kmeans".parse::<ScoringPolicy>(),
            Err(RfmError::UnknownScoringPolicy(_))
        ));
    }
}
