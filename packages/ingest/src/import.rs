//! Year-by-year import.

use std::sync::Arc;

use duckdb::Connection;
use futures::stream::{self, StreamExt as _};
use landprice_aggregate::{Aggregation, PriceOutcome, aggregate, annotate, classify};
use landprice_database::price_db::{self, RowKey};
use landprice_database::{DbError, catalog_db, point_db, store, unresolved_db};
use landprice_matcher::CatalogIndex;
use landprice_models::{
    AggregatedYearlyPrice, ErrorKind, MatchOutcome, MatchedRecord, RawRecord, RunSummary,
    UnresolvedRecord, YearReport,
};
use landprice_schema::{ProfileTable, extract_record};

use crate::progress::{ProgressCallback, null_progress};
use crate::source::FeatureSource;
use crate::{ImportConfig, IngestError};

/// Imports survey years into one store.
///
/// The catalog index is built once, when the importer is created; reload
/// the catalog by creating a new importer.
pub struct Importer {
    conn: Connection,
    table: ProfileTable,
    source: Arc<dyn FeatureSource>,
    config: ImportConfig,
    index: CatalogIndex,
    year_progress: Arc<dyn ProgressCallback>,
    row_progress: Arc<dyn ProgressCallback>,
}

impl Importer {
    /// Creates an importer, indexing the active catalog blocks of the
    /// configured city.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Database`] if the catalog cannot be read.
    pub fn new(
        conn: Connection,
        table: ProfileTable,
        source: Arc<dyn FeatureSource>,
        config: ImportConfig,
    ) -> Result<Self, IngestError> {
        let blocks = catalog_db::load_blocks(&conn, &config.city_code)?;
        let index = CatalogIndex::build(&config.city_code, &blocks);
        if index.is_empty() {
            log::warn!(
                "{}: no active town blocks in the catalog; every record will be unresolved",
                config.city_code
            );
        }

        Ok(Self {
            conn,
            table,
            source,
            config,
            index,
            year_progress: null_progress(),
            row_progress: null_progress(),
        })
    }

    /// Reports per-year progress to `years` and per-row writes to `rows`.
    #[must_use]
    pub fn with_progress(
        mut self,
        years: Arc<dyn ProgressCallback>,
        rows: Arc<dyn ProgressCallback>,
    ) -> Self {
        self.year_progress = years;
        self.row_progress = rows;
        self
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    #[must_use]
    pub const fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Imports `years` in ascending order.
    ///
    /// A year that fails is skipped and counted; the run continues. If any
    /// imported year precedes the latest year already stored, change rates
    /// are recomputed for every series afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Database`] if the store cannot be read before
    /// the run or the closing recompute fails.
    pub async fn import_years(
        &self,
        years: impl IntoIterator<Item = u16>,
    ) -> Result<RunSummary, IngestError> {
        let mut years: Vec<u16> = years.into_iter().collect();
        years.sort_unstable();
        years.dedup();

        let latest_stored = price_db::max_year(&self.conn)?;
        let mut summary = RunSummary::default();

        self.year_progress.set_total(years.len() as u64);
        for &year in &years {
            self.year_progress.set_message(format!("Importing {year}"));
            summary.merge(self.import_year(year).await);
            self.year_progress.inc(1);
        }

        let backfilled = summary
            .years
            .iter()
            .map(|y| y.survey_year)
            .min()
            .zip(latest_stored)
            .filter(|(earliest, latest)| earliest < latest);
        if let Some((earliest, latest)) = backfilled {
            log::info!(
                "Imported {earliest} before already stored {latest}; recomputing change rates"
            );
            crate::recompute(&self.conn, self.config.horizon, self.row_progress.as_ref())?;
        }

        self.year_progress.finish(format!(
            "Imported {} of {} years",
            summary.years.len(),
            years.len()
        ));
        Ok(summary)
    }

    /// Imports one year. Never fails: a year that cannot be imported shows
    /// up in [`RunSummary::skipped_years`] and, unless it is an expected
    /// skip, in the error counts.
    pub async fn import_year(&self, year: u16) -> RunSummary {
        let mut summary = RunSummary::default();

        match self.try_import_year(year, &mut summary).await {
            Ok(Some(report)) => {
                log::info!(
                    "{year}: matched {} of {} records, wrote {} rows",
                    report.records_matched,
                    report.records_seen,
                    report.rows_written
                );
                summary.years.push(report);
            }
            Ok(None) => summary.skipped_years.push(year),
            Err(e) => {
                log::error!("{year}: import failed: {e}");
                if let Some(kind) = e.kind() {
                    summary.record(kind, 1);
                }
                summary.skipped_years.push(year);
            }
        }

        summary
    }

    async fn try_import_year(
        &self,
        year: u16,
        summary: &mut RunSummary,
    ) -> Result<Option<YearReport>, IngestError> {
        let profile = match self.table.resolve(year) {
            Ok(profile) => profile,
            Err(e) if e.is_skippable() => {
                log::info!("{year}: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        log::debug!("{year}: using profile {}", profile.id);

        let features = {
            let source = Arc::clone(&self.source);
            let profile = profile.clone();
            tokio::task::spawn_blocking(move || source.features(year, &profile)).await??
        };
        let total_features = features.len();

        let records: Vec<RawRecord> = features
            .into_iter()
            .map(|f| extract_record(year, profile, &f.properties, f.coordinates))
            .filter(|r| r.city_code == self.config.city_code)
            .collect();
        log::debug!(
            "{year}: {} of {total_features} features belong to {}",
            records.len(),
            self.config.city_code
        );

        let mut matched = Vec::with_capacity(records.len());
        let mut unresolved = Vec::new();
        for record in records {
            let m = self.match_record(record, summary);
            if let MatchOutcome::Unresolved { reason } = &m.outcome {
                log::debug!("{year}: unresolved {:?} ({reason})", m.record.address);
                unresolved.push(UnresolvedRecord {
                    survey_year: year,
                    raw_address: m.record.address.clone(),
                    raw_price: m.record.price.to_string(),
                    reason: *reason,
                });
            }
            matched.push(m);
        }

        point_db::replace_points(&self.conn, year, &matched)?;
        unresolved_db::replace_year(&self.conn, year, &unresolved)?;
        summary.record(ErrorKind::AddressUnmatched, unresolved.len() as u64);

        let records_seen = matched.len() as u64;
        let records_matched = records_seen - unresolved.len() as u64;

        let Aggregation { rows, rejected } = aggregate(matched, self.config.grouping);
        summary.record(ErrorKind::AggregationInvariantViolation, rejected.len() as u64);

        let (rows_written, conflicts) = self.write_rows(rows).await?;
        summary.record(ErrorKind::StoreWriteConflict, conflicts);

        store::record_year_imported(&self.conn, year)?;

        Ok(Some(YearReport {
            survey_year: year,
            records_seen,
            records_matched,
            rows_written,
        }))
    }

    fn match_record(&self, record: RawRecord, summary: &mut RunSummary) -> MatchedRecord {
        let candidates = landprice_address::normalize(&record.address, &self.config.city_prefixes);
        let outcome = self.index.resolve(&candidates);

        let price = classify(&record.price);
        match &price {
            PriceOutcome::Invalid(raw) => {
                log::debug!("{}: invalid price {raw:?} for {:?}", record.survey_year, record.address);
                summary.record(ErrorKind::PriceInvalid, 1);
            }
            PriceOutcome::Corrected { raw, corrected } => {
                log::debug!(
                    "{}: price {raw} for {:?} corrected to {corrected}",
                    record.survey_year,
                    record.address
                );
            }
            PriceOutcome::Valid(_) | PriceOutcome::Missing => {}
        }

        MatchedRecord {
            normalized_address: candidates.into_iter().next().map(|c| c.text),
            price: price.value(),
            outcome,
            record,
        }
    }

    /// Annotates and upserts rows concurrently, one connection per task.
    /// Returns `(written, failed)`.
    async fn write_rows(&self, rows: Vec<AggregatedYearlyPrice>) -> Result<(u64, u64), IngestError> {
        let horizon = self.config.horizon;
        self.row_progress.set_total(rows.len() as u64);

        let tasks = rows.into_iter().map(|row| {
            let conn = self.conn.try_clone();
            let progress = Arc::clone(&self.row_progress);
            async move {
                let conn = conn.map_err(DbError::from)?;
                let key = RowKey::from(&row);
                let result =
                    tokio::task::spawn_blocking(move || write_row(&conn, &row, horizon)).await?;
                progress.inc(1);
                Ok::<_, IngestError>((key, result))
            }
        });

        let results: Vec<_> = stream::iter(tasks)
            .buffer_unordered(self.config.workers)
            .collect()
            .await;

        let (mut written, mut failed) = (0u64, 0u64);
        for result in results {
            match result? {
                (_, Ok(())) => written += 1,
                (key, Err(e)) => {
                    log::warn!("{key}: not written after retry: {e}");
                    failed += 1;
                }
            }
        }

        self.row_progress.finish_and_clear();
        Ok((written, failed))
    }
}

/// Annotates `row` against the stored series and upserts it, retrying once
/// against a fresh read if the write fails.
fn write_row(conn: &Connection, row: &AggregatedYearlyPrice, horizon: usize) -> Result<(), DbError> {
    let attempt = || {
        let existing = price_db::load_series(conn, &row.block_code, &row.disambiguator)?;
        price_db::upsert_row(conn, &annotate(&existing, row.clone(), horizon))
    };

    attempt().or_else(|e| {
        log::debug!("{}: retrying after {e}", RowKey::from(row));
        attempt()
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use landprice_database::open_in_memory;
    use landprice_models::{TownBlock, UnresolvedReason};
    use landprice_schema::{SchemaProfile, default_table};
    use serde_json::{Map, Value, json};

    use super::*;
    use crate::source::SurveyFeature;

    struct MemorySource(BTreeMap<u16, Vec<SurveyFeature>>);

    impl FeatureSource for MemorySource {
        fn features(
            &self,
            year: u16,
            profile: &SchemaProfile,
        ) -> Result<Vec<SurveyFeature>, IngestError> {
            self.0
                .get(&year)
                .cloned()
                .ok_or_else(|| IngestError::SourceNotFound {
                    year,
                    searched: profile.path_candidates(year),
                })
        }
    }

    /// Feature laid out for 2018-2021 extracts.
    fn feature(city_code: &str, address: &str, price: Value) -> SurveyFeature {
        let mut properties = Map::new();
        properties.insert("L01_021".to_string(), json!(city_code));
        properties.insert("L01_023".to_string(), json!(address));
        properties.insert("L01_006".to_string(), price);
        properties.insert("L01_047".to_string(), json!("住宅"));
        SurveyFeature {
            properties,
            coordinates: None,
        }
    }

    fn catalog() -> Vec<TownBlock> {
        ["成城6丁目", "三軒茶屋2丁目"]
            .iter()
            .enumerate()
            .map(|(i, name)| TownBlock {
                block_code: format!("13112{:06}", i + 1),
                block_name: (*name).to_string(),
                city_code: "13112".to_string(),
                active: true,
            })
            .collect()
    }

    fn importer(years: BTreeMap<u16, Vec<SurveyFeature>>) -> Importer {
        let conn = open_in_memory().unwrap();
        catalog_db::upsert_blocks(&conn, &catalog()).unwrap();
        Importer::new(
            conn,
            default_table().unwrap(),
            Arc::new(MemorySource(years)),
            ImportConfig::default(),
        )
        .unwrap()
    }

    fn seijo_series() -> BTreeMap<u16, Vec<SurveyFeature>> {
        BTreeMap::from([
            (
                2019,
                vec![feature("13112", "東京都世田谷区成城６－１－５", json!(600_000))],
            ),
            (
                2020,
                vec![
                    feature("13112", "東京都世田谷区成城６－１－５", json!(650_000)),
                    feature("13112", "東京都世田谷区成城６－２０", json!("670,000")),
                ],
            ),
            (
                2021,
                vec![feature("13112", "東京都世田谷区成城６－１－５", json!(720_000))],
            ),
        ])
    }

    fn close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap();
        assert!((actual - expected).abs() < 1e-6, "{actual} != {expected}");
    }

    #[tokio::test]
    async fn three_year_series_gets_change_rates() {
        let importer = importer(seijo_series());
        let summary = importer.import_years(2019..=2021).await.unwrap();

        assert_eq!(summary.years.len(), 3);
        assert!(summary.errors.is_empty(), "{:?}", summary.errors);
        assert_eq!(summary.rows_written(), 3);

        let series = price_db::load_series(importer.connection(), "13112000001", "").unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[1].point_count, 2);
        assert_eq!(series[1].avg_price, Some(660_000.0));
        assert_eq!(series[1].min_price, Some(650_000));
        assert_eq!(series[1].max_price, Some(670_000));
        assert_eq!(series[1].representative_address, "東京都世田谷区成城６－２０");
        assert_eq!(series[0].changes.vs_prior_year, None);
        close(series[2].changes.vs_prior_year, 60_000.0 / 660_000.0 * 100.0);
        close(series[2].changes.vs_first_year, 20.0);
    }

    #[tokio::test]
    async fn per_record_problems_are_counted_not_raised() {
        let importer = importer(BTreeMap::from([(
            2020,
            vec![
                feature("13112", "東京都世田谷区三軒茶屋２丁目１０番５号", json!(6_500)),
                feature("13112", "東京都世田谷区三軒茶屋２丁目１１", json!(-1)),
                feature("13112", "東京都世田谷区砧公園１", json!(900_000)),
                feature("13113", "東京都渋谷区代々木１－１", json!(2_000_000)),
                feature("13112", "東京都世田谷区成城６－１", json!("_")),
            ],
        )]));
        let summary = importer.import_years([2020]).await.unwrap();

        let report = &summary.years[0];
        assert_eq!(report.records_seen, 4);
        assert_eq!(report.records_matched, 3);
        assert_eq!(report.rows_written, 2);
        assert_eq!(summary.count(ErrorKind::AddressUnmatched), 1);
        assert_eq!(summary.count(ErrorKind::PriceInvalid), 1);

        let rows = price_db::load_all(importer.connection()).unwrap();
        let sancha = rows.iter().find(|r| r.block_code == "13112000002").unwrap();
        assert_eq!(sancha.point_count, 2);
        assert_eq!(sancha.avg_price, Some(650_000.0));
        let seijo = rows.iter().find(|r| r.block_code == "13112000001").unwrap();
        assert_eq!(seijo.avg_price, None);
        assert_eq!(seijo.attributes.land_use.as_deref(), Some("住宅"));

        let unresolved = unresolved_db::load(importer.connection(), Some(2020)).unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].raw_address, "東京都世田谷区砧公園１");
        assert_eq!(unresolved[0].raw_price, "900000");
        assert_eq!(unresolved[0].reason, UnresolvedReason::NoMatch);

        assert_eq!(point_db::count_points(importer.connection(), 2020).unwrap(), (3, 4));
    }

    #[tokio::test]
    async fn failed_years_do_not_stop_the_run() {
        let importer = importer(seijo_series());
        let summary = importer.import_years([1999, 2019, 2022]).await.unwrap();

        assert_eq!(summary.years.len(), 1);
        assert_eq!(summary.skipped_years, vec![1999, 2022]);
        assert_eq!(summary.count(ErrorKind::UnknownYearProfile), 1);
        assert_eq!(summary.count(ErrorKind::SourceUnavailable), 1);
    }

    #[tokio::test]
    async fn reimport_is_idempotent() {
        let importer = importer(seijo_series());
        importer.import_years([2019, 2020]).await.unwrap();
        let before = price_db::load_all(importer.connection()).unwrap();

        let summary = importer.import_years([2020]).await.unwrap();
        assert_eq!(summary.rows_written(), 1);
        assert_eq!(price_db::load_all(importer.connection()).unwrap(), before);
    }

    #[tokio::test]
    async fn backfilled_year_triggers_recompute() {
        let importer = importer(seijo_series());
        importer.import_years([2021]).await.unwrap();
        importer.import_years([2019]).await.unwrap();

        let series = price_db::load_series(importer.connection(), "13112000001", "").unwrap();
        assert_eq!(series[0].survey_year, 2019);
        close(series[1].changes.vs_prior_year, 20.0);
    }

    /// Same columns as the store's table, with a check that rejects one block.
    const REJECT_SANCHA_DDL: &str = "DROP TABLE yearly_prices;
CREATE TABLE yearly_prices (
    block_code TEXT NOT NULL CHECK (block_code <> '13112000002'),
    survey_year INTEGER NOT NULL,
    disambiguator TEXT NOT NULL DEFAULT '',
    point_count BIGINT NOT NULL,
    avg_price DOUBLE,
    min_price BIGINT,
    max_price BIGINT,
    land_area BIGINT,
    land_use TEXT,
    building_coverage BIGINT,
    floor_area_ratio BIGINT,
    road_direction TEXT,
    road_width DOUBLE,
    nearest_station TEXT,
    station_distance BIGINT,
    representative_address TEXT NOT NULL,
    latitude DOUBLE,
    longitude DOUBLE,
    change_vs_prior_year DOUBLE,
    change_vs_n_years_ago DOUBLE,
    change_vs_first_year DOUBLE,
    PRIMARY KEY (block_code, survey_year, disambiguator)
);";

    #[tokio::test]
    async fn rejected_row_is_counted_as_write_conflict() {
        let importer = importer(BTreeMap::from([(
            2020,
            vec![
                feature("13112", "東京都世田谷区成城６－１－５", json!(650_000)),
                feature("13112", "東京都世田谷区三軒茶屋２丁目１０番５号", json!(900_000)),
            ],
        )]));
        importer
            .connection()
            .execute_batch(REJECT_SANCHA_DDL)
            .unwrap();

        let summary = importer.import_years([2020]).await.unwrap();

        assert_eq!(summary.years.len(), 1);
        assert_eq!(summary.years[0].records_matched, 2);
        assert_eq!(summary.years[0].rows_written, 1);
        assert_eq!(summary.count(ErrorKind::StoreWriteConflict), 1);

        let rows = price_db::load_all(importer.connection()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].block_code, "13112000001");
        assert_eq!(rows[0].avg_price, Some(650_000.0));
    }

    #[tokio::test]
    async fn years_are_imported_in_ascending_order() {
        let importer = importer(seijo_series());
        let summary = importer.import_years([2021, 2019, 2020, 2019]).await.unwrap();
        let years: Vec<u16> = summary.years.iter().map(|y| y.survey_year).collect();
        assert_eq!(years, vec![2019, 2020, 2021]);
    }
}
