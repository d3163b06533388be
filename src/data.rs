//! Loading the transaction log from a CSV export using Polars

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::transaction::Transaction;

pub const CUSTOMER_ID: &str = "Customer ID";
pub const ORDER_ID: &str = "Order ID";
pub const ORDER_DATE: &str = "Order Date";
pub const TRANSACTION_HOUR: &str = "Hr transacc";
pub const ESTABLISHMENT: &str = "Establecimiento";
pub const SALES: &str = "Sales";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M",
];
/// Slash dates are month-first, like the spreadsheet export
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Load the "Transaction Data" sheet, exported as CSV, into transactions.
///
/// Every column is read as text and coerced row by row: dates and hours that
/// do not parse become `None` and the row is kept. Rows without a customer id
/// are skipped; an unparsable sales amount is an error.
///
/// # Arguments
/// * `file_path` - Path to the CSV file
pub fn load_transactions(file_path: &str) -> crate::Result<Vec<Transaction>> {
    let df = LazyCsvReader::new(file_path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .with_context(|| format!("failed to open transaction file {file_path}"))?
        .collect()
        .with_context(|| format!("failed to read transaction file {file_path}"))?;

    if df.height() == 0 {
        anyhow::bail!("No transactions found in {}", file_path);
    }

    let transactions = frame_to_transactions(&df)?;
    info!(path = file_path, rows = df.height(), loaded = transactions.len(), "loaded transactions");
    Ok(transactions)
}

/// Convert a text-typed frame with the source column names into transactions
pub fn frame_to_transactions(df: &DataFrame) -> crate::Result<Vec<Transaction>> {
    let customers = text_column(df, CUSTOMER_ID)?;
    let orders = text_column(df, ORDER_ID)?;
    let dates = text_column(df, ORDER_DATE)?;
    let hours = text_column(df, TRANSACTION_HOUR)?;
    let establishments = text_column(df, ESTABLISHMENT)?;
    let sales = text_column(df, SALES)?;

    let mut transactions = Vec::with_capacity(df.height());
    let mut skipped = 0usize;
    let mut unparsed_dates = 0usize;
    let mut unparsed_hours = 0usize;

    for row in 0..df.height() {
        let customer_id = match customers.get(row).map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => {
                skipped += 1;
                continue;
            }
        };

        let order_date = dates.get(row).and_then(parse_order_date);
        if order_date.is_none() {
            unparsed_dates += 1;
        }
        let hour_of_day = hours.get(row).and_then(parse_hour);
        if hour_of_day.is_none() {
            unparsed_hours += 1;
        }

        // Header is line 1, so data row `row` sits on line `row + 2`
        let sales_amount = parse_sales(sales.get(row))
            .with_context(|| format!("invalid {SALES} value on line {}", row + 2))?;

        transactions.push(Transaction::new(
            customer_id,
            orders.get(row).map(str::trim).unwrap_or_default(),
            order_date,
            hour_of_day,
            establishments.get(row).map(str::trim).unwrap_or_default(),
            sales_amount,
        ));
    }

    if skipped > 0 {
        warn!(skipped, "rows without a customer id were skipped");
    }
    debug!(unparsed_dates, unparsed_hours, "date and hour coercion");

    Ok(transactions)
}

fn text_column<'a>(df: &'a DataFrame, name: &str) -> crate::Result<&'a StringChunked> {
    df.column(name)
        .with_context(|| format!("missing required column '{name}'"))?
        .str()
        .with_context(|| format!("column '{name}' is not text"))
}

/// Parse an order timestamp; `None` when no supported layout matches.
pub fn parse_order_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Extract the hour from a `HH:MM:SS` (or `HH:MM`) time of day.
pub fn parse_hour(raw: &str) -> Option<u8> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(raw, format).ok())
        .map(|time| time.hour() as u8)
}

fn parse_sales(raw: Option<&str>) -> crate::Result<f64> {
    let raw = raw.map(str::trim).unwrap_or_default();
    let value: f64 = raw
        .parse()
        .map_err(|_| anyhow::anyhow!("'{}' is not a number", raw))?;
    if !value.is_finite() {
        anyhow::bail!("'{}' is not a finite amount", raw);
    }
    Ok(value)
}
