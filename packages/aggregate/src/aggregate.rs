//! Per-block yearly aggregation.
//!
//! Records are grouped by (year, block) or, with [`Grouping::BlockAndAddress`],
//! by (year, block, normalized address). Each group yields one
//! [`AggregatedYearlyPrice`] whose attributes are assembled field by field
//! from the most recent record carrying a value for that field.

use std::collections::BTreeMap;

use landprice_models::{AggregatedYearlyPrice, Attributes, ChangeRates, Coordinates, MatchedRecord};
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::AggregateError;

/// How matched records are grouped into rows.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Grouping {
    /// One row per block; the disambiguator is empty.
    #[default]
    Block,
    /// One row per block and distinct normalized address.
    BlockAndAddress,
}

/// Matched records sharing one output row, in input order.
#[derive(Debug, Clone)]
pub struct RecordGroup {
    pub block_code: String,
    pub survey_year: u16,
    pub disambiguator: String,
    pub records: Vec<MatchedRecord>,
}

/// Result of aggregating one year.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// Rows that passed the invariant check.
    pub rows: Vec<AggregatedYearlyPrice>,
    /// Block-years that were dropped.
    pub rejected: Vec<AggregateError>,
}

/// Groups resolved records, preserving first-appearance order. Unresolved
/// records are dropped.
#[must_use]
pub fn group_records(records: Vec<MatchedRecord>, grouping: Grouping) -> Vec<RecordGroup> {
    let mut groups: Vec<RecordGroup> = Vec::new();
    let mut positions: BTreeMap<(u16, String, String), usize> = BTreeMap::new();

    for record in records {
        let Some(block_code) = record.block_code().map(str::to_string) else {
            continue;
        };
        let disambiguator = match grouping {
            Grouping::Block => String::new(),
            Grouping::BlockAndAddress => record
                .normalized_address
                .clone()
                .unwrap_or_else(|| record.record.address.clone()),
        };
        let key = (record.record.survey_year, block_code, disambiguator);

        if let Some(&i) = positions.get(&key) {
            groups[i].records.push(record);
        } else {
            positions.insert(key.clone(), groups.len());
            let (survey_year, block_code, disambiguator) = key;
            groups.push(RecordGroup {
                block_code,
                survey_year,
                disambiguator,
                records: vec![record],
            });
        }
    }

    groups
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0_u64), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Summarizes one group.
///
/// # Errors
///
/// Returns [`AggregateError::InvariantViolation`] if the group is empty
/// or the computed statistics violate `min <= avg <= max`.
#[allow(clippy::cast_precision_loss)]
pub fn aggregate_group(group: &RecordGroup) -> Result<AggregatedYearlyPrice, AggregateError> {
    let violation = |message: String| AggregateError::InvariantViolation {
        block_code: group.block_code.clone(),
        survey_year: group.survey_year,
        message,
    };

    let point_count = u32::try_from(group.records.len())
        .map_err(|_| violation(format!("{} points overflow u32", group.records.len())))?;
    let Some(latest) = group.records.last() else {
        return Err(violation("group has no points".to_string()));
    };

    let prices: Vec<i64> = group.records.iter().filter_map(|r| r.price).collect();
    let min_price = prices.iter().copied().min();
    let max_price = prices.iter().copied().max();
    let avg_price = mean(prices.iter().map(|p| *p as f64));

    match (min_price, avg_price, max_price) {
        (Some(min), Some(avg), Some(max)) if min as f64 <= avg && avg <= max as f64 => {}
        (None, None, None) => {}
        other => return Err(violation(format!("min/avg/max = {other:?}"))),
    }

    let mut attributes = Attributes::default();
    for record in &group.records {
        attributes.overlay(&record.record.attributes);
    }

    let points: Vec<Coordinates> = group.records.iter().filter_map(|r| r.record.coordinates).collect();
    let coordinates = mean(points.iter().map(|c| c.latitude))
        .zip(mean(points.iter().map(|c| c.longitude)))
        .map(|(latitude, longitude)| Coordinates {
            latitude,
            longitude,
        });

    Ok(AggregatedYearlyPrice {
        block_code: group.block_code.clone(),
        survey_year: group.survey_year,
        disambiguator: group.disambiguator.clone(),
        point_count,
        avg_price,
        min_price,
        max_price,
        attributes,
        representative_address: latest.record.address.clone(),
        coordinates,
        changes: ChangeRates::default(),
    })
}

/// Groups and summarizes one year's matched records.
#[must_use]
pub fn aggregate(records: Vec<MatchedRecord>, grouping: Grouping) -> Aggregation {
    let mut out = Aggregation::default();
    for group in group_records(records, grouping) {
        match aggregate_group(&group) {
            Ok(row) => out.rows.push(row),
            Err(e) => {
                log::warn!("{e}");
                out.rejected.push(e);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use landprice_models::{MatchOutcome, MatchTier, RawPrice, RawRecord, UnresolvedReason};

    fn record(block: Option<&str>, address: &str, price: Option<i64>) -> MatchedRecord {
        MatchedRecord {
            record: RawRecord {
                survey_year: 2020,
                city_code: "13112".to_string(),
                city_name: None,
                address: address.to_string(),
                price: price.map_or(RawPrice::Missing, |p| RawPrice::Number(p as f64)),
                coordinates: None,
                attributes: Attributes::default(),
            },
            outcome: block.map_or(
                MatchOutcome::Unresolved {
                    reason: UnresolvedReason::NoMatch,
                },
                |b| MatchOutcome::Resolved {
                    block_code: b.to_string(),
                    tier: MatchTier::Exact,
                    candidate: address.to_string(),
                },
            ),
            normalized_address: Some(address.to_string()),
            price,
        }
    }

    #[test]
    fn computes_min_avg_max_per_block() {
        let result = aggregate(
            vec![
                record(Some("A"), "a1", Some(600_000)),
                record(Some("B"), "b1", Some(300_000)),
                record(Some("A"), "a2", Some(700_000)),
            ],
            Grouping::Block,
        );
        assert!(result.rejected.is_empty());
        assert_eq!(result.rows.len(), 2);

        let a = &result.rows[0];
        assert_eq!(a.block_code, "A");
        assert_eq!(a.point_count, 2);
        assert_eq!(a.min_price, Some(600_000));
        assert_eq!(a.max_price, Some(700_000));
        assert_eq!(a.avg_price, Some(650_000.0));
        assert_eq!(a.representative_address, "a2");
        assert_eq!(a.disambiguator, "");

        for row in &result.rows {
            assert!(row.point_count >= 1);
            let (min, avg, max) = (row.min_price.unwrap(), row.avg_price.unwrap(), row.max_price.unwrap());
            assert!(min as f64 <= avg && avg <= max as f64);
        }
    }

    #[test]
    fn unresolved_records_are_excluded() {
        let result = aggregate(
            vec![
                record(None, "x", Some(9_999_999)),
                record(Some("A"), "a", Some(500_000)),
            ],
            Grouping::Block,
        );
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].max_price, Some(500_000));
    }

    #[test]
    fn group_without_prices_keeps_attributes() {
        let mut r = record(Some("A"), "a", None);
        r.record.attributes.land_use = Some("住宅".to_string());
        let result = aggregate(vec![r], Grouping::Block);
        let row = &result.rows[0];
        assert_eq!(row.avg_price, None);
        assert_eq!(row.min_price, None);
        assert_eq!(row.attributes.land_use.as_deref(), Some("住宅"));
    }

    #[test]
    fn attributes_are_merged_per_field() {
        let mut first = record(Some("A"), "a1", Some(600_000));
        first.record.attributes.land_use = Some("住宅".to_string());
        first.record.attributes.land_area = Some(100);
        let mut second = record(Some("A"), "a2", Some(620_000));
        second.record.attributes.road_width = Some(6.0);
        second.record.attributes.land_area = Some(120);

        let row = &aggregate(vec![first, second], Grouping::Block).rows[0];
        assert_eq!(row.attributes.land_use.as_deref(), Some("住宅"));
        assert_eq!(row.attributes.road_width, Some(6.0));
        assert_eq!(row.attributes.land_area, Some(120));
    }

    #[test]
    fn centroid_is_averaged() {
        let mut a = record(Some("A"), "a1", Some(1));
        a.record.coordinates = Some(Coordinates {
            latitude: 35.0,
            longitude: 139.0,
        });
        let mut b = record(Some("A"), "a2", Some(1));
        b.record.coordinates = Some(Coordinates {
            latitude: 35.2,
            longitude: 139.2,
        });
        let c = aggregate(vec![a, b], Grouping::Block).rows[0].coordinates.unwrap();
        assert!((c.latitude - 35.1).abs() < 1e-9);
        assert!((c.longitude - 139.1).abs() < 1e-9);
    }

    #[test]
    fn block_and_address_grouping_sets_disambiguator() {
        let result = aggregate(
            vec![
                record(Some("A"), "三軒茶屋2丁目", Some(600_000)),
                record(Some("A"), "三軒茶屋二丁目", Some(700_000)),
            ],
            Grouping::BlockAndAddress,
        );
        let disambiguators: Vec<&str> = result.rows.iter().map(|r| r.disambiguator.as_str()).collect();
        assert_eq!(disambiguators, vec!["三軒茶屋2丁目", "三軒茶屋二丁目"]);
    }

    #[test]
    fn empty_group_is_an_invariant_violation() {
        let group = RecordGroup {
            block_code: "A".to_string(),
            survey_year: 2020,
            disambiguator: String::new(),
            records: vec![],
        };
        assert!(matches!(
            aggregate_group(&group),
            Err(AggregateError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn grouping_parses_from_kebab_case() {
        assert_eq!("block-and-address".parse::<Grouping>().ok(), Some(Grouping::BlockAndAddress));
    }
}
