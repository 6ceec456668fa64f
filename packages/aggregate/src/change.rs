//! Change rates against earlier years of the same block.
//!
//! "Prior" and "N years ago" are positional: survey years are not
//! contiguous, so the comparison row is the nearest (or Nth) earlier year
//! present in the series rather than `year - 1` (or `year - N`).

use landprice_models::{AggregatedYearlyPrice, ChangeRates, TimeSeries};

/// Default positional horizon for `vs_n_years_ago`.
pub const DEFAULT_HORIZON: usize = 5;

/// `(current - base) / base * 100`, or `None` when either side is missing
/// or the base is zero.
#[must_use]
pub fn percent_change(current: Option<f64>, base: Option<f64>) -> Option<f64> {
    let (current, base) = (current?, base?);
    if base == 0.0 {
        return None;
    }
    let change = (current - base) / base * 100.0;
    change.is_finite().then_some(change)
}

fn rates(earlier: &[&AggregatedYearlyPrice], current: Option<f64>, horizon: usize) -> ChangeRates {
    let nth_back = horizon
        .checked_sub(1)
        .and_then(|back| earlier.len().checked_sub(1 + back))
        .and_then(|i| earlier.get(i));

    ChangeRates {
        vs_prior_year: percent_change(current, earlier.last().and_then(|r| r.avg_price)),
        vs_n_years_ago: percent_change(current, nth_back.and_then(|r| r.avg_price)),
        vs_first_year: percent_change(current, earlier.first().and_then(|r| r.avg_price)),
    }
}

/// Annotates `new_row` using the rows of `existing` that precede it.
///
/// `existing` may be unsorted, may contain the row being replaced, and
/// may contain later years; only strictly earlier years with the same
/// disambiguator are considered.
#[must_use]
pub fn annotate(
    existing: &[AggregatedYearlyPrice],
    mut new_row: AggregatedYearlyPrice,
    horizon: usize,
) -> AggregatedYearlyPrice {
    let mut earlier: Vec<&AggregatedYearlyPrice> = existing
        .iter()
        .filter(|r| {
            r.block_code == new_row.block_code
                && r.disambiguator == new_row.disambiguator
                && r.survey_year < new_row.survey_year
        })
        .collect();
    earlier.sort_by_key(|r| r.survey_year);

    new_row.changes = rates(&earlier, new_row.avg_price, horizon);
    new_row
}

/// Sorts rows by year (later duplicates of a year win) and recomputes
/// every row's change rates from scratch.
#[must_use]
pub fn build_time_series(
    block_code: &str,
    disambiguator: &str,
    mut rows: Vec<AggregatedYearlyPrice>,
    horizon: usize,
) -> TimeSeries {
    rows.retain(|r| r.block_code == block_code && r.disambiguator == disambiguator);
    rows.reverse();
    rows.sort_by_key(|r| r.survey_year);
    rows.dedup_by_key(|r| r.survey_year);

    for i in 0..rows.len() {
        let current = rows[i].avg_price;
        let changes = {
            let earlier: Vec<&AggregatedYearlyPrice> = rows[..i].iter().collect();
            rates(&earlier, current, horizon)
        };
        rows[i].changes = changes;
    }

    TimeSeries {
        block_code: block_code.to_string(),
        disambiguator: disambiguator.to_string(),
        horizon,
        rows,
    }
}
