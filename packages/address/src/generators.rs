//! Independent candidate generators.
//!
//! Each generator inspects a folded address and returns at most one
//! block reference. [`crate::normalize`] runs them in rank order.

use std::sync::LazyLock;

use landprice_models::CandidateKind;
use regex::Regex;

use crate::BLOCK_MARKER;
use crate::numeral::{from_kanji, to_kanji};

/// `<area><digits>丁目`.
static DIGIT_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^0-9\-]+?)([0-9]+)丁目").expect("valid regex"));

/// `<area><kanji>丁目`.
static KANJI_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^0-9\-]+?)([一二三四五六七八九十]+)丁目").expect("valid regex")
});

/// `<area><digits>-<digits>`.
static HYPHEN_LOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^0-9\-]+?)([0-9]+)-[0-9]").expect("valid regex"));

/// Leading area name, stopping before any block number.
static AREA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^0-9\-]+?)(?:[一二三四五六七八九十]+丁目|[0-9]|-|$)").expect("valid regex")
});

/// A named area plus a numbered block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRef {
    /// Area name (e.g. `"三軒茶屋"`).
    pub area: String,
    /// Block number without leading zeros.
    pub number: u32,
}

impl BlockRef {
    fn new(area: &str, number: u32) -> Option<Self> {
        (number > 0 && !area.is_empty()).then(|| Self {
            area: area.to_string(),
            number,
        })
    }

    /// `三軒茶屋2丁目`
    #[must_use]
    pub fn digit_form(&self) -> String {
        format!("{}{}{BLOCK_MARKER}", self.area, self.number)
    }

    /// `三軒茶屋二丁目`
    #[must_use]
    pub fn kanji_form(&self) -> Option<String> {
        to_kanji(self.number).map(|k| format!("{}{k}{BLOCK_MARKER}", self.area))
    }
}

/// Signature shared by block-producing generators.
pub type BlockGenerator = fn(&str) -> Option<BlockRef>;

/// Block generators in rank order, tagged with the kind they produce.
pub const BLOCK_GENERATORS: &[(CandidateKind, BlockGenerator)] = &[
    (CandidateKind::BlockMarker, block_first),
    (CandidateKind::HyphenSynthesized, hyphen_lot),
];

/// Address already names its block, in digits or kanji.
#[must_use]
pub fn block_first(folded: &str) -> Option<BlockRef> {
    if let Some(caps) = DIGIT_BLOCK_RE.captures(folded) {
        let number = caps[2].parse::<u32>().ok()?;
        return BlockRef::new(&caps[1], number);
    }
    let caps = KANJI_BLOCK_RE.captures(folded)?;
    BlockRef::new(&caps[1], from_kanji(&caps[2])?)
}

/// Address is a hyphenated lot number whose first part is the block.
#[must_use]
pub fn hyphen_lot(folded: &str) -> Option<BlockRef> {
    let caps = HYPHEN_LOT_RE.captures(folded)?;
    BlockRef::new(&caps[1], caps[2].parse::<u32>().ok()?)
}

/// Leading non-numeric run of the address.
#[must_use]
pub fn area_only(folded: &str) -> Option<String> {
    let caps = AREA_RE.captures(folded)?;
    let area = caps[1].trim_end_matches(BLOCK_MARKER);
    (!area.is_empty()).then(|| area.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_first_digit_form() {
        let b = block_first("三軒茶屋2丁目10-5").unwrap();
        assert_eq!(b.area, "三軒茶屋");
        assert_eq!(b.number, 2);
    }

    #[test]
    fn block_first_strips_leading_zeros() {
        assert_eq!(block_first("成城06丁目").unwrap().digit_form(), "成城6丁目");
    }

    #[test]
    fn block_first_kanji_form() {
        let b = block_first("三軒茶屋二丁目").unwrap();
        assert_eq!(b.digit_form(), "三軒茶屋2丁目");
        assert_eq!(b.kanji_form().as_deref(), Some("三軒茶屋二丁目"));
    }

    #[test]
    fn block_first_ignores_zero_block() {
        assert_eq!(block_first("成城0丁目"), None);
    }

    #[test]
    fn hyphen_lot_synthesizes_block() {
        let b = hyphen_lot("桜上水5-40-10").unwrap();
        assert_eq!(b.digit_form(), "桜上水5丁目");
    }

    #[test]
    fn hyphen_lot_requires_number_after_hyphen() {
        assert_eq!(hyphen_lot("桜上水5-"), None);
        assert_eq!(hyphen_lot("桜上水5"), None);
    }

    #[test]
    fn area_only_stops_at_digits() {
        assert_eq!(area_only("桜上水5-40").as_deref(), Some("桜上水"));
    }

    #[test]
    fn area_only_stops_at_kanji_block() {
        assert_eq!(area_only("三軒茶屋二丁目").as_deref(), Some("三軒茶屋"));
    }

    #[test]
    fn area_only_whole_name() {
        assert_eq!(area_only("成城").as_deref(), Some("成城"));
    }

    #[test]
    fn area_only_none_for_numeric_address() {
        assert_eq!(area_only("123-4"), None);
    }
}
