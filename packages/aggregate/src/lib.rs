#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Turns matched survey points into the reconciled yearly series.
//!
//! - [`price`] validates raw prices and applies the unit correction
//! - [`aggregate`] groups one year's points per block and summarizes them
//! - [`change`] annotates yearly rows with change rates against earlier years

pub mod aggregate;
pub mod change;
pub mod price;

pub use aggregate::{Aggregation, Grouping, RecordGroup, aggregate, aggregate_group, group_records};
pub use change::{DEFAULT_HORIZON, annotate, build_time_series, percent_change};
pub use price::{PriceOutcome, classify, sanitize};

/// Errors raised while aggregating a block-year.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregateError {
    /// The computed row broke `count >= 1` or `min <= avg <= max`.
    #[error("Aggregation invariant violated for {block_code} in {survey_year}: {message}")]
    InvariantViolation {
        /// Block the row belongs to.
        block_code: String,
        /// Survey year of the row.
        survey_year: u16,
        /// Description of what went wrong.
        message: String,
    },
}
