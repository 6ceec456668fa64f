//! Town-block master catalog.
//!
//! The catalog is owned by a separate master-data workflow; the pipeline
//! only reads it. [`load_catalog_csv`] and [`upsert_blocks`] exist so the
//! catalog can be seeded from a CSV export.

use std::collections::BTreeSet;
use std::io::Read;

use duckdb::Connection;
use landprice_models::TownBlock;
use serde::Deserialize;

use crate::DbError;

/// One row of a catalog CSV export.
#[derive(Debug, Deserialize)]
struct CatalogCsvRow {
    #[serde(alias = "choume", alias = "block_name")]
    name: String,
    #[serde(default, alias = "block_code")]
    code: Option<String>,
    #[serde(default)]
    active: Option<bool>,
}

/// Reads a catalog CSV with a `name` (or `choume`) column and optional
/// `code` and `active` columns.
///
/// Names are trimmed and deduplicated. Rows without a code get
/// `{city_code}{nnnnnn}`, numbered in name order, so regenerating from the
/// same file yields the same codes.
///
/// # Errors
///
/// Returns [`DbError::Csv`] if the CSV is malformed.
pub fn load_catalog_csv<R: Read>(reader: R, city_code: &str) -> Result<Vec<TownBlock>, DbError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut rows: Vec<CatalogCsvRow> = Vec::new();
    for row in csv_reader.deserialize() {
        let mut row: CatalogCsvRow = row?;
        row.name = row.name.trim().to_string();
        if !row.name.is_empty() {
            rows.push(row);
        }
    }

    rows.sort_by(|a, b| a.name.cmp(&b.name));
    let mut seen = BTreeSet::new();
    rows.retain(|r| seen.insert(r.name.clone()));

    let blocks = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| TownBlock {
            block_code: row
                .code
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| format!("{city_code}{:06}", i + 1)),
            block_name: row.name,
            city_code: city_code.to_string(),
            active: row.active.unwrap_or(true),
        })
        .collect();

    Ok(blocks)
}

/// Inserts or updates catalog blocks. Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub fn upsert_blocks(conn: &Connection, blocks: &[TownBlock]) -> Result<u64, DbError> {
    let mut stmt = conn.prepare(
        "INSERT INTO town_blocks (block_code, block_name, city_code, active)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (block_code) DO UPDATE SET
            block_name = EXCLUDED.block_name,
            city_code = EXCLUDED.city_code,
            active = EXCLUDED.active",
    )?;

    let mut total = 0u64;
    for block in blocks {
        let rows = stmt.execute(duckdb::params![
            block.block_code,
            block.block_name,
            block.city_code,
            block.active
        ])?;
        total += u64::try_from(rows).unwrap_or(0);
    }

    log::info!("Upserted {total} town blocks");
    Ok(total)
}

/// Loads every block (active or not) of `city_code`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn load_blocks(conn: &Connection, city_code: &str) -> Result<Vec<TownBlock>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT block_code, block_name, city_code, active
         FROM town_blocks WHERE city_code = ? ORDER BY block_code",
    )?;
    let blocks = stmt
        .query_map([city_code], |row| {
            Ok(TownBlock {
                block_code: row.get(0)?,
                block_name: row.get(1)?,
                city_code: row.get(2)?,
                active: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(blocks)
}
