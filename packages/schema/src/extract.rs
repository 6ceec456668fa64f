//! Builds [`RawRecord`]s from decoded feature properties using a profile.

use landprice_models::{Attributes, Coordinates, RawPrice, RawRecord};
use serde_json::{Map, Value};

use crate::profile::{FieldRole, SchemaProfile};

/// Placeholder the publisher writes for "not applicable".
const NOT_APPLICABLE: &str = "_";

type Properties = Map<String, Value>;

fn get<'a>(props: &'a Properties, profile: &SchemaProfile, role: FieldRole) -> Option<&'a Value> {
    props.get(profile.fields.get(role)?).filter(|v| !v.is_null())
}

/// Reads a field as text; numbers are rendered without a fractional part
/// when they are integral (city codes are sometimes published as numbers).
fn get_text(props: &Properties, profile: &SchemaProfile, role: FieldRole) -> Option<String> {
    let text = match get(props, profile, role)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n
            .as_i64()
            .map_or_else(|| n.to_string(), |i| i.to_string()),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() || text == NOT_APPLICABLE {
        None
    } else {
        Some(text)
    }
}

fn get_f64(props: &Properties, profile: &SchemaProfile, role: FieldRole) -> Option<f64> {
    let value = match get(props, profile, role)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    // Zero is the publisher's "unknown" for every measured attribute.
    (value.is_finite() && value != 0.0).then_some(value)
}

#[allow(clippy::cast_possible_truncation)]
fn get_i64(props: &Properties, profile: &SchemaProfile, role: FieldRole) -> Option<i64> {
    get_f64(props, profile, role).map(|v| v.trunc() as i64)
}

fn get_price(props: &Properties, profile: &SchemaProfile) -> RawPrice {
    match get(props, profile, FieldRole::Price) {
        None => RawPrice::Missing,
        Some(Value::Number(n)) => n.as_f64().map_or(RawPrice::Missing, RawPrice::Number),
        Some(Value::String(s)) => RawPrice::Text(s.clone()),
        Some(Value::Bool(b)) => RawPrice::Flag(*b),
        Some(other) => RawPrice::Text(other.to_string()),
    }
}

/// Extracts one [`RawRecord`] from a feature's property map.
///
/// Missing optional fields become `None`; a missing address becomes an
/// empty string so the record still flows to the unresolved report.
#[must_use]
pub fn extract_record(
    survey_year: u16,
    profile: &SchemaProfile,
    props: &Properties,
    coordinates: Option<Coordinates>,
) -> RawRecord {
    RawRecord {
        survey_year,
        city_code: get_text(props, profile, FieldRole::CityCode).unwrap_or_default(),
        city_name: get_text(props, profile, FieldRole::CityName),
        address: get_text(props, profile, FieldRole::Address).unwrap_or_default(),
        price: get_price(props, profile),
        coordinates,
        attributes: Attributes {
            land_area: get_i64(props, profile, FieldRole::LandArea),
            land_use: get_text(props, profile, FieldRole::LandUse),
            building_coverage: get_i64(props, profile, FieldRole::BuildingCoverage),
            floor_area_ratio: get_i64(props, profile, FieldRole::FloorAreaRatio),
            road_direction: get_text(props, profile, FieldRole::RoadDirection),
            road_width: get_f64(props, profile, FieldRole::RoadWidth),
            nearest_station: get_text(props, profile, FieldRole::NearestStation),
            station_distance: get_i64(props, profile, FieldRole::StationDistance),
        },
    }
}
