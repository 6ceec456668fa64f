//! Raw price validation and unit correction.
//!
//! Prices are published in yen per square meter. A few vintages contain
//! values that are two orders of magnitude too small for this market, as
//! if written in a coarser unit. Values below [`MIN_PLAUSIBLE_PRICE`] are
//! multiplied by [`UNIT_CORRECTION_FACTOR`]. This is a data-quality
//! assumption, not publisher-documented behavior; corrected prices are
//! reported as [`PriceOutcome::Corrected`] so callers can audit them.

use landprice_models::RawPrice;

/// Smallest plausible price in yen per square meter.
pub const MIN_PLAUSIBLE_PRICE: i64 = 10_000;

/// Factor applied to implausibly small prices.
pub const UNIT_CORRECTION_FACTOR: i64 = 100;

/// Tokens the publisher uses for "no price".
const NULL_TOKENS: &[&str] = &["", "_", "false", "False", "None", "null"];

/// Classification of a raw price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceOutcome {
    /// Plausible as published.
    Valid(i64),
    /// Below the plausibility threshold and scaled up.
    Corrected {
        /// Value as published.
        raw: i64,
        /// Value after correction.
        corrected: i64,
    },
    /// Absent or an explicit placeholder.
    Missing,
    /// Present but unusable (unparseable, non-positive, or out of range).
    Invalid(String),
}

impl PriceOutcome {
    /// Sanitized price, if usable.
    #[must_use]
    pub const fn value(&self) -> Option<i64> {
        match self {
            Self::Valid(v) | Self::Corrected { corrected: v, .. } => Some(*v),
            Self::Missing | Self::Invalid(_) => None,
        }
    }

    /// Returns `true` if the price was present but could not be used.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn from_number(value: f64) -> PriceOutcome {
    if !value.is_finite() || value.trunc() >= i64::MAX as f64 {
        return PriceOutcome::Invalid(value.to_string());
    }
    let truncated = value.trunc() as i64;
    if truncated <= 0 {
        return PriceOutcome::Invalid(value.to_string());
    }
    if truncated >= MIN_PLAUSIBLE_PRICE {
        return PriceOutcome::Valid(truncated);
    }
    truncated
        .checked_mul(UNIT_CORRECTION_FACTOR)
        .map_or_else(
            || PriceOutcome::Invalid(value.to_string()),
            |corrected| PriceOutcome::Corrected {
                raw: truncated,
                corrected,
            },
        )
}

/// Classifies a raw price.
#[must_use]
pub fn classify(raw: &RawPrice) -> PriceOutcome {
    match raw {
        RawPrice::Missing | RawPrice::Flag(false) => PriceOutcome::Missing,
        RawPrice::Flag(true) => PriceOutcome::Invalid("true".to_string()),
        RawPrice::Number(n) => from_number(*n),
        RawPrice::Text(s) => {
            let s = s.trim();
            if NULL_TOKENS.contains(&s) {
                return PriceOutcome::Missing;
            }
            s.replace(',', "")
                .parse::<f64>()
                .map_or_else(|_| PriceOutcome::Invalid(s.to_string()), from_number)
        }
    }
}

/// Sanitized price in yen per square meter, or `None`.
#[must_use]
pub fn sanitize(raw: &RawPrice) -> Option<i64> {
    let outcome = classify(raw);
    if let PriceOutcome::Corrected { raw, corrected } = outcome {
        log::debug!("Price {raw} below {MIN_PLAUSIBLE_PRICE}, corrected to {corrected}");
    }
    outcome.value()
}
