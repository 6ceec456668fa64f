//! Unresolved-records report for catalog maintenance.
//!
//! Each year's report is replaced wholesale on re-import, so records that
//! a catalog fix has since resolved disappear from it.

use duckdb::Connection;
use landprice_models::{UnresolvedReason, UnresolvedRecord};

use crate::DbError;
use crate::store::year_from_sql;

/// Replaces the stored report for `year` with `records`, keeping repeated
/// addresses as separate entries.
///
/// # Errors
///
/// Returns [`DbError`] if the delete or any insert fails.
pub fn replace_year(
    conn: &Connection,
    year: u16,
    records: &[UnresolvedRecord],
) -> Result<u64, DbError> {
    conn.execute(
        "DELETE FROM unresolved_records WHERE survey_year = ?",
        [i32::from(year)],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO unresolved_records (survey_year, ordinal, raw_address, raw_price, reason)
         VALUES (?, ?, ?, ?, ?)",
    )?;

    let mut total = 0u64;
    let in_year = records.iter().filter(|r| r.survey_year == year);
    for (ordinal, record) in in_year.enumerate() {
        let rows = stmt.execute(duckdb::params![
            i32::from(record.survey_year),
            ordinal,
            record.raw_address,
            record.raw_price,
            record.reason.as_ref(),
        ])?;
        total += u64::try_from(rows).unwrap_or(0);
    }

    Ok(total)
}

/// Loads the report, optionally for one year, in year then source order.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored reason is unknown.
pub fn load(conn: &Connection, year: Option<u16>) -> Result<Vec<UnresolvedRecord>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT survey_year, raw_address, COALESCE(raw_price, ''), reason
         FROM unresolved_records
         WHERE ? IS NULL OR survey_year = ?
         ORDER BY survey_year, ordinal",
    )?;
    let year = year.map(i32::from);
    let rows = stmt
        .query_map(duckdb::params![year, year], |row| {
            Ok((
                row.get::<_, i32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(survey_year, raw_address, raw_price, reason)| {
            Ok(UnresolvedRecord {
                survey_year: year_from_sql(survey_year)?,
                raw_address,
                raw_price,
                reason: reason
                    .parse::<UnresolvedReason>()
                    .map_err(|_| DbError::Conversion {
                        message: format!("unknown unresolved reason {reason:?}"),
                    })?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_in_memory;

    fn record(year: u16, address: &str) -> UnresolvedRecord {
        UnresolvedRecord {
            survey_year: year,
            raw_address: address.to_string(),
            raw_price: "650000".to_string(),
            reason: UnresolvedReason::NoMatch,
        }
    }

    #[test]
    fn replace_drops_previously_unresolved() {
        let conn = open_in_memory().unwrap();
        replace_year(&conn, 2020, &[record(2020, "a"), record(2020, "b")]).unwrap();
        replace_year(&conn, 2021, &[record(2021, "c")]).unwrap();
        replace_year(&conn, 2020, &[record(2020, "b")]).unwrap();

        let all = load(&conn, None).unwrap();
        assert_eq!(all, vec![record(2020, "b"), record(2021, "c")]);
        assert_eq!(load(&conn, Some(2021)).unwrap(), vec![record(2021, "c")]);
    }

    #[test]
    fn repeated_addresses_are_each_reported() {
        let conn = open_in_memory().unwrap();
        let mut second = record(2020, "砧公園1");
        second.raw_price = "910000".to_string();
        let written =
            replace_year(&conn, 2020, &[record(2020, "砧公園1"), second.clone()]).unwrap();

        assert_eq!(written, 2);
        assert_eq!(load(&conn, Some(2020)).unwrap(), vec![record(2020, "砧公園1"), second]);
    }

    #[test]
    fn reason_round_trips() {
        let conn = open_in_memory().unwrap();
        let mut ambiguous = record(2020, "三軒茶屋");
        ambiguous.reason = UnresolvedReason::Ambiguous;
        replace_year(&conn, 2020, std::slice::from_ref(&ambiguous)).unwrap();
        assert_eq!(load(&conn, Some(2020)).unwrap(), vec![ambiguous]);
    }
}
