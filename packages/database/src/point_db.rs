//! Point-level survey records with their match results.
//!
//! Keyed by `(survey_year, ordinal)`, the record's position in that year's
//! source. Two points published with the same address are kept apart.
//! Re-importing a year replaces its points, so a catalog fix followed by a
//! re-import moves points to their corrected block.

use duckdb::Connection;
use landprice_models::{MatchOutcome, MatchedRecord};

use crate::DbError;

const INSERT_SQL: &str = "INSERT INTO land_price_points (
        survey_year, ordinal, original_address, city_code, block_code,
        match_tier, matched_candidate, raw_price, price, latitude, longitude,
        land_area, land_use, building_coverage, floor_area_ratio,
        road_direction, road_width, nearest_station, station_distance
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Replaces the stored points for `year` with `records`, in source order.
/// Rows that fail are logged and skipped. Returns the number written.
///
/// # Errors
///
/// Returns [`DbError`] if the delete fails or the statement cannot be
/// prepared.
pub fn replace_points(
    conn: &Connection,
    year: u16,
    records: &[MatchedRecord],
) -> Result<u64, DbError> {
    conn.execute(
        "DELETE FROM land_price_points WHERE survey_year = ?",
        [i32::from(year)],
    )?;

    let mut stmt = conn.prepare(INSERT_SQL)?;
    let mut total = 0u64;

    let in_year = records.iter().filter(|m| m.record.survey_year == year);
    for (ordinal, matched) in in_year.enumerate() {
        let r = &matched.record;
        let a = &r.attributes;
        let (tier, candidate) = match &matched.outcome {
            MatchOutcome::Resolved {
                tier, candidate, ..
            } => (Some(tier.as_ref()), Some(candidate.as_str())),
            MatchOutcome::Unresolved { .. } => (None, None),
        };
        let raw_price = r.price.to_string();

        let result = stmt.execute(duckdb::params![
            i32::from(year),
            ordinal,
            r.address,
            r.city_code,
            matched.block_code(),
            tier,
            candidate,
            (!raw_price.is_empty()).then_some(raw_price.as_str()),
            matched.price,
            r.coordinates.map(|p| p.latitude),
            r.coordinates.map(|p| p.longitude),
            a.land_area,
            a.land_use,
            a.building_coverage,
            a.floor_area_ratio,
            a.road_direction,
            a.road_width,
            a.nearest_station,
            a.station_distance,
        ]);

        match result {
            Ok(rows) => total += u64::try_from(rows).unwrap_or(0),
            Err(e) => log::warn!("{year}: point {ordinal} {:?} not stored: {e}", r.address),
        }
    }

    Ok(total)
}

/// Counts stored points for `year`, split into `(matched, total)`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn count_points(conn: &Connection, year: u16) -> Result<(u64, u64), DbError> {
    let (matched, total): (i64, i64) = conn.query_row(
        "SELECT COUNT(block_code), COUNT(*) FROM land_price_points WHERE survey_year = ?",
        [i32::from(year)],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    #[allow(clippy::cast_sign_loss)]
    Ok((matched as u64, total as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_in_memory;
    use landprice_models::{Attributes, MatchTier, RawPrice, RawRecord, UnresolvedReason};

    fn matched(address: &str, block: Option<&str>, price: Option<i64>) -> MatchedRecord {
        MatchedRecord {
            record: RawRecord {
                survey_year: 2020,
                city_code: "13112".to_string(),
                city_name: None,
                address: address.to_string(),
                price: RawPrice::Text("500".to_string()),
                coordinates: None,
                attributes: Attributes::default(),
            },
            outcome: block.map_or(
                MatchOutcome::Unresolved {
                    reason: UnresolvedReason::NoMatch,
                },
                |b| MatchOutcome::Resolved {
                    block_code: b.to_string(),
                    tier: MatchTier::Containment,
                    candidate: address.to_string(),
                },
            ),
            normalized_address: None,
            price,
        }
    }

    #[test]
    fn reimport_replaces_points() {
        let conn = open_in_memory().unwrap();
        replace_points(
            &conn,
            2020,
            &[matched("成城6-1", None, None), matched("成城6-2", Some("A"), Some(50_000))],
        )
        .unwrap();
        assert_eq!(count_points(&conn, 2020).unwrap(), (1, 2));

        replace_points(
            &conn,
            2020,
            &[matched("成城6-1", Some("A"), Some(50_000)), matched("成城6-2", Some("A"), Some(50_000))],
        )
        .unwrap();
        assert_eq!(count_points(&conn, 2020).unwrap(), (2, 2));
    }

    #[test]
    fn points_sharing_an_address_are_kept_apart() {
        let conn = open_in_memory().unwrap();
        let written = replace_points(
            &conn,
            2020,
            &[matched("成城6-1", Some("A"), Some(50_000)), matched("成城6-1", Some("A"), Some(52_000))],
        )
        .unwrap();
        assert_eq!(written, 2);
        assert_eq!(count_points(&conn, 2020).unwrap(), (2, 2));

        let prices: Vec<i64> = conn
            .prepare("SELECT price FROM land_price_points ORDER BY ordinal")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(prices, vec![50_000, 52_000]);
    }

    #[test]
    fn other_years_are_left_alone() {
        let conn = open_in_memory().unwrap();
        replace_points(&conn, 2020, &[matched("成城6-1", None, None)]).unwrap();
        replace_points(&conn, 2021, &[]).unwrap();
        assert_eq!(count_points(&conn, 2020).unwrap(), (0, 1));
    }
}
