//! Command-line interface definitions and argument parsing

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::config::{parse_reference_date, MissingRecencyPolicy, PipelineConfig};
use crate::filter::HourRange;
use crate::metrics::FrequencyRule;
use crate::scoring::ScoringPolicy;

/// RFM customer segmentation over a transaction log
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file (the "Transaction Data" sheet)
    #[arg(short, long, default_value = "transactions.csv")]
    pub input: String,

    /// Directory the CSV reports are written to
    #[arg(short, long, default_value = "rfm_output")]
    pub output_dir: PathBuf,

    /// Reference date for recency: YYYY-MM-DD, or "today"
    #[arg(short, long)]
    pub reference_date: String,

    /// Comma-separated establishments to keep (default: every establishment in the file)
    /// Example: --establishments "Grifos,Supermercados"
    #[arg(short, long)]
    pub establishments: Option<String>,

    /// Inclusive hour-of-day window as LO-HI
    #[arg(long, default_value = "0-23")]
    pub hours: String,

    /// Frequency rule: raw-count or distinct-orders
    #[arg(long, default_value = "raw-count")]
    pub frequency_rule: String,

    /// Scoring policy: threshold or rank-quintile
    #[arg(long, default_value = "threshold")]
    pub scoring: String,

    /// Customers without a parsable order date: exclude or fail
    #[arg(long, default_value = "exclude")]
    pub missing_recency: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the hour window
    /// Expected format: "lo-hi"
    pub fn parse_hour_range(&self) -> crate::Result<HourRange> {
        let (lo, hi) = self
            .hours
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("Hour range must be in format 'lo-hi', got '{}'", self.hours))?;

        let lo: i32 = lo
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid start hour: {}", lo))?;
        let hi: i32 = hi
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid end hour: {}", hi))?;

        Ok(HourRange::new(lo, hi)?)
    }

    /// Selected establishments, falling back to every one in `available`
    pub fn selected_establishments(&self, available: &BTreeSet<String>) -> BTreeSet<String> {
        match self.establishments {
            Some(ref list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => available.clone(),
        }
    }

    /// Validate every flag into a pipeline configuration.
    ///
    /// `today` resolves a reference date of "today".
    pub fn to_config(&self, available: &BTreeSet<String>, today: NaiveDate) -> crate::Result<PipelineConfig> {
        let reference_date = parse_reference_date(&self.reference_date, today)?;
        let frequency_rule: FrequencyRule = self.frequency_rule.parse()?;
        let scoring_policy: ScoringPolicy = self.scoring.parse()?;
        let missing_recency: MissingRecencyPolicy = self.missing_recency.parse()?;

        Ok(PipelineConfig::new(
            self.selected_establishments(available),
            self.parse_hour_range()?,
            reference_date,
        )
        .with_frequency_rule(frequency_rule)
        .with_scoring_policy(scoring_policy)
        .with_missing_recency(missing_recency))
    }
}
