#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` storage for the land-price pipeline.
//!
//! A single database file (`data/landprice.duckdb` by default) holds:
//! - `town_blocks`: the master catalog, read by the matcher
//! - `land_price_points`: every survey point with its match result
//! - `yearly_prices`: reconciled rows unique on (block, year, disambiguator)
//! - `unresolved_records`: points no catalog block could be found for
//! - `_meta`: import bookkeeping
//!
//! All writes are `INSERT ... ON CONFLICT DO UPDATE`, so re-running an
//! import is idempotent and corrected inputs update rows in place.

pub mod catalog_db;
pub mod paths;
pub mod point_db;
pub mod price_db;
pub mod store;
pub mod unresolved_db;

pub use store::{open, open_default, open_in_memory};

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error (file read/write, directory creation).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
