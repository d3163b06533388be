//! Pipeline configuration surface

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{RfmError, RfmResult};
use crate::filter::HourRange;
use crate::metrics::FrequencyRule;
use crate::scoring::ScoringPolicy;

/// What to do with customers whose recency cannot be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MissingRecencyPolicy {
    /// Drop them from scoring and list them in the report
    #[default]
    Exclude,
    /// Abort the run with `UndefinedRecency`
    Fail,
}

impl std::str::FromStr for MissingRecencyPolicy {
    type Err = RfmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclude" => Ok(Self::Exclude),
            "fail" => Ok(Self::Fail),
            _ => Err(RfmError::UnknownMissingRecencyPolicy(s.to_string())),
        }
    }
}

impl std::fmt::Display for MissingRecencyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exclude => write!(f, "exclude"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Every input that determines a pipeline run besides the transactions.
///
/// Two equal configs over the same dataset always yield the same report, so
/// callers can use this as a memoization key.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub establishments: BTreeSet<String>,
    pub hour_range: HourRange,
    pub reference_date: NaiveDateTime,
    pub frequency_rule: FrequencyRule,
    pub scoring_policy: ScoringPolicy,
    pub missing_recency: MissingRecencyPolicy,
}

impl PipelineConfig {
    pub fn new<I, S>(establishments: I, hour_range: HourRange, reference_date: NaiveDateTime) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            establishments: establishments.into_iter().map(Into::into).collect(),
            hour_range,
            reference_date,
            frequency_rule: FrequencyRule::default(),
            scoring_policy: ScoringPolicy::default(),
            missing_recency: MissingRecencyPolicy::default(),
        }
    }

    pub fn with_frequency_rule(mut self, rule: FrequencyRule) -> Self {
        self.frequency_rule = rule;
        self
    }

    pub fn with_scoring_policy(mut self, policy: ScoringPolicy) -> Self {
        self.scoring_policy = policy;
        self
    }

    pub fn with_missing_recency(mut self, policy: MissingRecencyPolicy) -> Self {
        self.missing_recency = policy;
        self
    }
}

/// Parse a reference date given as `YYYY-MM-DD` or the keyword `today`.
///
/// `today` resolves to the supplied date so the result stays reproducible;
/// the binary passes the local calendar date. The time of day is midnight.
pub fn parse_reference_date(value: &str, today: NaiveDate) -> RfmResult<NaiveDateTime> {
    let value = value.trim();
    let date = if value.eq_ignore_ascii_case("today") {
        today
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| RfmError::InvalidReferenceDate(value.to_string()))?
    };

    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| RfmError::InvalidReferenceDate(value.to_string()))
}
