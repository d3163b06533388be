//! CSV export of the RFM table, sales breakdowns and playbook using Polars

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::Context;
use polars::prelude::*;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::dimensions::{self, DimensionalReport};
use crate::error::RfmError;
use crate::pipeline::{RfmReport, RfmRow, RFM_TABLE_COLUMNS};
use crate::playbook;

pub const RFM_TABLE_FILE: &str = "rfm_segmentacion.csv";
pub const ESTABLISHMENT_SALES_FILE: &str = "ventas_establecimiento.csv";
pub const ESTABLISHMENT_SHARE_FILE: &str = "participacion_establecimiento.csv";
pub const HOUR_SALES_FILE: &str = "ventas_hora.csv";
pub const HOUR_ESTABLISHMENT_SALES_FILE: &str = "ventas_hora_establecimiento.csv";
pub const SEGMENT_ESTABLISHMENT_SALES_FILE: &str = "ventas_segmento_establecimiento.csv";
pub const SEGMENT_HOUR_SALES_FILE: &str = "ventas_segmento_hora.csv";
pub const COMPETITIVE_MAP_FILE: &str = "mapa_competitivo.csv";
pub const SEGMENT_SUMMARY_FILE: &str = "resumen_segmentos.csv";
pub const PLAYBOOK_FILE: &str = "estrategias_marketing.csv";
pub const HOURLY_PROMOTIONS_FILE: &str = "estrategias.csv";

/// Build the RFM table with the exported column names and order
pub fn rfm_table_frame(rows: &[RfmRow]) -> PolarsResult<DataFrame> {
    let [customer, recency, frequency, monetary, r, f, m, score, segment] = RFM_TABLE_COLUMNS;

    DataFrame::new(vec![
        Series::new(customer, rows.iter().map(|row| row.customer_id().to_string()).collect::<Vec<_>>()),
        Series::new(recency, rows.iter().map(RfmRow::recency).collect::<Vec<u32>>()),
        Series::new(frequency, rows.iter().map(RfmRow::frequency).collect::<Vec<u32>>()),
        Series::new(monetary, rows.iter().map(RfmRow::monetary).collect::<Vec<f64>>()),
        Series::new(r, rows.iter().map(|row| u32::from(row.scores.r)).collect::<Vec<_>>()),
        Series::new(f, rows.iter().map(|row| u32::from(row.scores.f)).collect::<Vec<_>>()),
        Series::new(m, rows.iter().map(|row| u32::from(row.scores.m)).collect::<Vec<_>>()),
        Series::new(score, rows.iter().map(|row| u32::from(row.rfm_score())).collect::<Vec<_>>()),
        Series::new(segment, rows.iter().map(|row| row.segment.label()).collect::<Vec<_>>()),
    ])
}

fn keyed_frame(key_name: &str, value_name: &str, totals: &[(String, f64)]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(key_name, totals.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>()),
        Series::new(value_name, totals.iter().map(|(_, v)| *v).collect::<Vec<f64>>()),
    ])
}

fn hour_frame(totals: &[(u8, f64)]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new("Hora", totals.iter().map(|(h, _)| u32::from(*h)).collect::<Vec<_>>()),
        Series::new("Sales", totals.iter().map(|(_, v)| *v).collect::<Vec<f64>>()),
    ])
}

fn competitive_map_frame(dimensions: &DimensionalReport) -> PolarsResult<DataFrame> {
    let map = &dimensions.competitive_map;
    DataFrame::new(vec![
        Series::new("Establecimiento", map.iter().map(|p| p.establishment.as_str()).collect::<Vec<_>>()),
        Series::new("Monetary", map.iter().map(|p| p.monetary).collect::<Vec<f64>>()),
        Series::new("RFM Score", map.iter().map(|p| p.mean_rfm_score).collect::<Vec<f64>>()),
        Series::new("Margen Estimado", map.iter().map(|p| p.estimated_margin).collect::<Vec<f64>>()),
    ])
}

fn segment_summary_frame(dimensions: &DimensionalReport) -> PolarsResult<DataFrame> {
    let summary = &dimensions.segment_summary;
    DataFrame::new(vec![
        Series::new("Segment", summary.iter().map(|s| s.segment.label()).collect::<Vec<_>>()),
        Series::new("Customers", summary.iter().map(|s| s.customers as u32).collect::<Vec<_>>()),
        Series::new("Monetary", summary.iter().map(|s| s.mean_monetary).collect::<Vec<f64>>()),
    ])
}

fn playbook_frame(config: &PipelineConfig) -> PolarsResult<DataFrame> {
    let entries = playbook::playbook(config.establishments.iter().map(String::as_str));
    DataFrame::new(vec![
        Series::new("Segmento", entries.iter().map(|e| e.segment.label()).collect::<Vec<_>>()),
        Series::new("Establecimiento", entries.iter().map(|e| e.establishment.as_str()).collect::<Vec<_>>()),
        Series::new("Hora óptima", entries.iter().map(|e| e.optimal_hours).collect::<Vec<_>>()),
        Series::new("Oferta", entries.iter().map(|e| e.offer).collect::<Vec<_>>()),
        Series::new("Canal recomendado", entries.iter().map(|e| e.channel).collect::<Vec<_>>()),
        Series::new("Mensaje sugerido", entries.iter().map(|e| e.message.as_str()).collect::<Vec<_>>()),
    ])
}

fn hourly_promotions_frame(config: &PipelineConfig) -> PolarsResult<DataFrame> {
    let promotions = playbook::hourly_promotions(config.establishments.iter().map(String::as_str), config.hour_range);
    DataFrame::new(vec![
        Series::new("Establecimiento", promotions.iter().map(|p| p.establishment.as_str()).collect::<Vec<_>>()),
        Series::new("Hora", promotions.iter().map(|p| format!("{}:00", p.hour)).collect::<Vec<_>>()),
        Series::new("Estrategia", promotions.iter().map(|p| p.strategy.as_str()).collect::<Vec<_>>()),
    ])
}

/// Establishment shares of total sales; header only when the total is zero
fn establishment_share_frame(dimensions: &DimensionalReport) -> PolarsResult<DataFrame> {
    let shares = match dimensions::percentage_of_total(&dimensions.sales_by_establishment, "establishment") {
        Ok(shares) => shares,
        Err(err @ RfmError::EmptyAggregateResult { .. }) => {
            warn!(error = %err, "writing empty establishment share table");
            Vec::new()
        }
        Err(err) => return Err(PolarsError::ComputeError(err.to_string().into())),
    };
    keyed_frame("Establecimiento", "% Ventas", &shares)
}

fn write_frame(mut df: DataFrame, path: &Path) -> crate::Result<()> {
    let mut file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Write every output table of `report` as CSV under `out_dir`.
///
/// # Returns
/// * The written file paths, in a fixed order
pub fn write_report(report: &RfmReport, config: &PipelineConfig, out_dir: &Path) -> crate::Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;

    let dims = &report.dimensions;
    let segment_establishment: Vec<(String, String, f64)> = dims
        .sales_by_segment_establishment
        .iter()
        .map(|((segment, est), v)| (segment.label().to_string(), est.clone(), *v))
        .collect();
    let segment_hour: Vec<(String, u32, f64)> = dims
        .sales_by_segment_hour
        .iter()
        .map(|((segment, hour), v)| (segment.label().to_string(), u32::from(*hour), *v))
        .collect();

    let frames: Vec<(&str, DataFrame)> = vec![
        (RFM_TABLE_FILE, rfm_table_frame(&report.rows)?),
        (
            ESTABLISHMENT_SALES_FILE,
            keyed_frame("Establecimiento", "Sales", &dims.sales_by_establishment)?,
        ),
        (ESTABLISHMENT_SHARE_FILE, establishment_share_frame(dims)?),
        (HOUR_SALES_FILE, hour_frame(&dims.sales_by_hour)?),
        (
            HOUR_ESTABLISHMENT_SALES_FILE,
            DataFrame::new(vec![
                Series::new(
                    "Hora",
                    dims.sales_by_hour_establishment
                        .iter()
                        .map(|((h, _), _)| u32::from(*h))
                        .collect::<Vec<_>>(),
                ),
                Series::new(
                    "Establecimiento",
                    dims.sales_by_hour_establishment
                        .iter()
                        .map(|((_, e), _)| e.as_str())
                        .collect::<Vec<_>>(),
                ),
                Series::new(
                    "Sales",
                    dims.sales_by_hour_establishment
                        .iter()
                        .map(|(_, v)| *v)
                        .collect::<Vec<f64>>(),
                ),
            ])?,
        ),
        (
            SEGMENT_ESTABLISHMENT_SALES_FILE,
            DataFrame::new(vec![
                Series::new("Segment", segment_establishment.iter().map(|(s, _, _)| s.as_str()).collect::<Vec<_>>()),
                Series::new(
                    "Establecimiento",
                    segment_establishment.iter().map(|(_, e, _)| e.as_str()).collect::<Vec<_>>(),
                ),
                Series::new("Sales", segment_establishment.iter().map(|(_, _, v)| *v).collect::<Vec<f64>>()),
            ])?,
        ),
        (
            SEGMENT_HOUR_SALES_FILE,
            DataFrame::new(vec![
                Series::new("Segment", segment_hour.iter().map(|(s, _, _)| s.as_str()).collect::<Vec<_>>()),
                Series::new("Hora", segment_hour.iter().map(|(_, h, _)| *h).collect::<Vec<u32>>()),
                Series::new("Sales", segment_hour.iter().map(|(_, _, v)| *v).collect::<Vec<f64>>()),
            ])?,
        ),
        (COMPETITIVE_MAP_FILE, competitive_map_frame(dims)?),
        (SEGMENT_SUMMARY_FILE, segment_summary_frame(dims)?),
        (PLAYBOOK_FILE, playbook_frame(config)?),
        (HOURLY_PROMOTIONS_FILE, hourly_promotions_frame(config)?),
    ];

    let mut written = Vec::with_capacity(frames.len());
    for (name, df) in frames {
        let path = out_dir.join(name);
        write_frame(df, &path)?;
        written.push(path);
    }

    info!(dir = %out_dir.display(), files = written.len(), "exported rfm report");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CustomerMetrics;
    use crate::scoring::Scores;

    fn row(customer: &str, scores: Scores) -> RfmRow {
        RfmRow::new(
            CustomerMetrics {
                customer_id: customer.to_string(),
                recency_days: 30,
                frequency: 3,
                monetary: 60.0,
            },
            scores,
        )
    }

    #[test]
    fn test_rfm_table_columns_and_order() {
        let rows = vec![
            row("C1", Scores { r: 5, f: 5, m: 4 }),
            row("C2", Scores { r: 1, f: 2, m: 1 }),
        ];
        let df = rfm_table_frame(&rows).unwrap();

        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, RFM_TABLE_COLUMNS.iter().map(|n| n.to_string()).collect::<Vec<_>>());
        assert_eq!(df.height(), 2);

        let segments: Vec<Option<&str>> = df.column("Segment").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(segments, vec![Some("Champions"), Some("En riesgo")]);
    }

    #[test]
    fn test_empty_share_table_keeps_header() {
        let df = establishment_share_frame(&DimensionalReport::default()).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 2);
    }
}
