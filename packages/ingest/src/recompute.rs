//! Second-pass change-rate maintenance.
//!
//! Importing years out of order leaves later rows annotated against an
//! incomplete history. [`recompute`] rebuilds every stored series from
//! scratch and rewrites the rows whose rates changed.

use duckdb::Connection;
use landprice_aggregate::build_time_series;
use landprice_database::price_db;
use landprice_models::TimeSeries;

use crate::IngestError;
use crate::progress::ProgressCallback;

/// Counts from one [`recompute`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    /// Series examined.
    pub series: u64,
    /// Rows whose change rates were rewritten.
    pub rows_updated: u64,
}

/// Loads one block's stored series with freshly computed change rates.
///
/// # Errors
///
/// Returns [`IngestError::Database`] if the series cannot be read.
pub fn load_time_series(
    conn: &Connection,
    block_code: &str,
    disambiguator: &str,
    horizon: usize,
) -> Result<TimeSeries, IngestError> {
    let rows = price_db::load_series(conn, block_code, disambiguator)?;
    Ok(build_time_series(block_code, disambiguator, rows, horizon))
}

/// Recomputes change rates for every stored series.
///
/// # Errors
///
/// Returns [`IngestError::Database`] if a series cannot be read or a row
/// cannot be rewritten.
pub fn recompute(
    conn: &Connection,
    horizon: usize,
    progress: &dyn ProgressCallback,
) -> Result<RecomputeReport, IngestError> {
    let keys = price_db::series_keys(conn)?;
    progress.set_total(keys.len() as u64);
    progress.set_message("Recomputing change rates".to_string());

    let mut report = RecomputeReport::default();
    for (block_code, disambiguator) in keys {
        let stored = price_db::load_series(conn, &block_code, &disambiguator)?;
        let series = build_time_series(&block_code, &disambiguator, stored.clone(), horizon);

        // Stored rows are unique per year and ordered, so they line up.
        for (fresh, old) in series.rows.iter().zip(&stored) {
            if fresh.changes != old.changes {
                price_db::upsert_row(conn, fresh)?;
                report.rows_updated += 1;
            }
        }

        report.series += 1;
        progress.inc(1);
    }

    log::info!(
        "Recomputed {} series, updated {} rows",
        report.series,
        report.rows_updated
    );
    progress.finish_and_clear();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use landprice_database::open_in_memory;
    use landprice_models::{AggregatedYearlyPrice, Attributes, ChangeRates};

    use super::*;
    use crate::progress::NullProgress;

    fn row(block: &str, year: u16, avg: f64) -> AggregatedYearlyPrice {
        AggregatedYearlyPrice {
            block_code: block.to_string(),
            survey_year: year,
            disambiguator: String::new(),
            point_count: 1,
            avg_price: Some(avg),
            min_price: None,
            max_price: None,
            attributes: Attributes::default(),
            representative_address: String::new(),
            coordinates: None,
            changes: ChangeRates::default(),
        }
    }

    #[test]
    fn rewrites_only_stale_rows() {
        let conn = open_in_memory().unwrap();
        let report = price_db::upsert_rows(
            &conn,
            &[row("A", 2000, 100.0), row("A", 2005, 150.0), row("B", 2000, 1.0)],
        );
        assert_eq!(report.written, 3);

        let report = recompute(&conn, 5, &NullProgress).unwrap();
        assert_eq!(
            report,
            RecomputeReport {
                series: 2,
                rows_updated: 1,
            }
        );
        let series = price_db::load_series(&conn, "A", "").unwrap();
        assert_eq!(series[1].changes.vs_prior_year, Some(50.0));

        let again = recompute(&conn, 5, &NullProgress).unwrap();
        assert_eq!(again.rows_updated, 0);
    }

    #[test]
    fn time_series_is_computed_on_load() {
        let conn = open_in_memory().unwrap();
        let _ = price_db::upsert_rows(&conn, &[row("A", 2010, 120.0), row("A", 2000, 100.0)]);
        let series = load_time_series(&conn, "A", "", 5).unwrap();
        assert_eq!(series.rows.len(), 2);
        assert_eq!(series.rows[1].changes.vs_first_year, Some(20.0));
        assert_eq!(series.horizon, 5);
    }
}
