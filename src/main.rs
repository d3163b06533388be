//! rfmforge: RFM customer segmentation CLI
//!
//! This is the main entrypoint that orchestrates transaction loading, the
//! segmentation pipeline and CSV export.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use rfmforge::dimensions::{peak_and_valley_hours, percentage_of_total};
use rfmforge::filter::distinct_establishments;
use rfmforge::{load_transactions, pipeline, write_report, Args, RfmReport, Segment};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Hours listed in the peak/valley summary
const PEAK_HOURS: usize = 3;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    if args.verbose {
        println!("rfmforge - RFM Customer Segmentation");
        println!("====================================\n");
    }

    let start_time = Instant::now();

    // Step 1: Load transactions
    if args.verbose {
        println!("Step 1: Loading transactions");
        println!("  Input file: {}", args.input);
    }

    let load_start = Instant::now();
    let transactions = load_transactions(&args.input)?;
    let available = distinct_establishments(&transactions);
    let config = args.to_config(&available, Local::now().date_naive())?;

    println!("✓ Data loaded: {} transactions", transactions.len());
    if args.verbose {
        println!("  Loading time: {:.2}s", load_start.elapsed().as_secs_f64());
        println!("  Establishments available: {}", join(available.iter()));
    }

    // Step 2: Run the segmentation
    if args.verbose {
        println!("\nStep 2: Running segmentation");
        println!("  Establishments: {}", join(config.establishments.iter()));
        println!("  Hours: {}", config.hour_range);
        println!("  Reference date: {}", config.reference_date.date());
        println!("  Frequency rule: {}", config.frequency_rule);
        println!("  Scoring policy: {}", config.scoring_policy);
    }

    let run_start = Instant::now();
    let report = pipeline::run(&transactions, &config)?;

    println!(
        "✓ Segmentation complete: {} customers from {} filtered transactions",
        report.customers(),
        report.filtered_transactions
    );
    if args.verbose {
        println!("  Processing time: {:.2}s", run_start.elapsed().as_secs_f64());
    }
    if !report.excluded_customers.is_empty() {
        println!(
            "  {} customers excluded (no parsable order date)",
            report.excluded_customers.len()
        );
    }

    print_summary(&report);

    // Step 3: Export
    if args.verbose {
        println!("\nStep 3: Exporting reports");
        println!("  Output directory: {}", args.output_dir.display());
    }

    let written = write_report(&report, &config, &args.output_dir)?;

    println!("\n✓ Reports written");
    for path in &written {
        println!("  {}", path.display());
    }

    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}

/// Print segment distribution, establishment shares and peak hours
fn print_summary(report: &RfmReport) {
    println!("\n=== Segment Distribution ===");
    let total = report.customers();
    for segment in Segment::ALL {
        let count = report.segment_count(segment);
        let percentage = if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        };
        println!("{}: {} customers ({:.1}%)", segment, count, percentage);
    }

    println!("\n=== Sales by Establishment ===");
    match percentage_of_total(&report.dimensions.sales_by_establishment, "establishment") {
        Ok(shares) => {
            for ((establishment, sales), (_, share)) in report.dimensions.sales_by_establishment.iter().zip(shares) {
                println!("{}: {:.2} ({:.1}%)", establishment, sales, share);
            }
        }
        Err(err) => println!("{}", err),
    }

    let (peaks, valleys) = peak_and_valley_hours(&report.dimensions.sales_by_hour, PEAK_HOURS);
    println!("\nPeak hours: {}", join(peaks.iter().map(|(h, _)| format!("{h}:00"))));
    println!("Valley hours: {}", join(valleys.iter().map(|(h, _)| format!("{h}:00"))));
}

fn join<I, T>(items: I) -> String
where
    I: Iterator<Item = T>,
    T: std::fmt::Display,
{
    items.map(|item| item.to_string()).collect::<Vec<_>>().join(", ")
}
