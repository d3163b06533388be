//! rfmforge: RFM (Recency, Frequency, Monetary) customer segmentation
//!
//! The library filters a transaction log by establishment and hour of day,
//! aggregates per-customer RFM metrics, scores them with one of two quantile
//! policies, classifies customers into segments and produces sales
//! breakdowns ready for charting or CSV export.

pub mod cli;
pub mod config;
pub mod data;
pub mod dimensions;
pub mod error;
pub mod export;
pub mod filter;
pub mod frame;
pub mod metrics;
pub mod pipeline;
pub mod playbook;
pub mod scoring;
pub mod segment;
pub mod transaction;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{MissingRecencyPolicy, PipelineConfig};
pub use data::load_transactions;
pub use dimensions::DimensionalReport;
pub use error::{RfmError, RfmResult};
pub use export::write_report;
pub use filter::{filter, HourRange};
pub use metrics::{aggregate, CustomerMetrics, FrequencyRule};
pub use pipeline::{run, RfmReport, RfmRow, RFM_TABLE_COLUMNS};
pub use scoring::{ScoringPolicy, Scores};
pub use segment::{classify, Segment};
pub use transaction::Transaction;

/// Result type for I/O-facing code (ingestion, export, the binary)
pub type Result<T> = anyhow::Result<T>;
