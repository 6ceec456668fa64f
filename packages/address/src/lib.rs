#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address normalization for land-price survey points.
//!
//! The same town block is written many ways across survey vintages:
//! - Explicit block: `"三軒茶屋２丁目"`
//! - Hyphenated lot number: `"桜上水５−４０−１０"`
//! - With the city prefix: `"東京都世田谷区成城６丁目"`
//! - Kanji block number: `"三軒茶屋二丁目"`
//!
//! [`normalize`] folds these into an ordered list of
//! [`NormalizedAddressCandidate`]s, most specific first, which the block
//! matcher tries in turn.

pub mod fold;
pub mod generators;
pub mod numeral;

use landprice_models::{CandidateKind, NormalizedAddressCandidate};

pub use fold::{fold_width, strip_city_prefix};

/// Suffix denoting a numbered block within a named area.
pub const BLOCK_MARKER: &str = "丁目";

/// Accumulates candidates in rank order, dropping duplicates.
#[derive(Default)]
struct Candidates(Vec<NormalizedAddressCandidate>);

impl Candidates {
    fn push(&mut self, text: String, kind: CandidateKind) {
        if text.is_empty() || self.0.iter().any(|c| c.text == text) {
            return;
        }
        let rank = u8::try_from(self.0.len()).unwrap_or(u8::MAX);
        self.0.push(NormalizedAddressCandidate { text, rank, kind });
    }
}

/// Produces ranked match candidates for a raw survey address.
///
/// Steps, each contributing at most one candidate:
/// 1. strip `city_prefixes` (in order) from the start
/// 2. fold full-width digits, hyphen variants, and whitespace
/// 3. explicit `<area><n>丁目` block
/// 4. `<area><n>丁目` synthesized from a hyphenated lot number
/// 5. kanji-numeral sibling after each of the above
/// 6. bare area name
///
/// Returns an empty list when nothing usable remains; the record is then
/// reported as unresolved.
#[must_use]
pub fn normalize<S: AsRef<str>>(raw: &str, city_prefixes: &[S]) -> Vec<NormalizedAddressCandidate> {
    let folded = fold_width(strip_city_prefix(raw, city_prefixes));

    let mut out = Candidates::default();

    for (kind, generate) in generators::BLOCK_GENERATORS {
        if let Some(block) = generate(&folded) {
            out.push(block.digit_form(), *kind);
            if let Some(kanji) = block.kanji_form() {
                out.push(kanji, CandidateKind::NumeralVariant);
            }
        }
    }

    if let Some(area) = generators::area_only(&folded) {
        out.push(area, CandidateKind::AreaOnly);
    }

    if out.0.is_empty() {
        log::debug!("No address candidates for {raw:?}");
    }

    out.0
}

/// Removes the block marker, for marker-insensitive comparison.
#[must_use]
pub fn strip_block_marker(name: &str) -> String {
    name.replace(BLOCK_MARKER, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(candidates: &[NormalizedAddressCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn full_width_block_address_with_prefix() {
        let c = normalize("東京都　三軒茶屋２丁目", &["東京都"]);
        assert_eq!(c[0].text, "三軒茶屋2丁目");
        assert_eq!(c[0].rank, 0);
        assert_eq!(c[0].kind, CandidateKind::BlockMarker);
    }

    #[test]
    fn hyphenated_lot_synthesizes_block() {
        let c = normalize("桜上水５−４０−１０", &["東京都", "世田谷区"]);
        assert!(texts(&c).contains(&"桜上水5丁目"));
        assert_eq!(c[0].kind, CandidateKind::HyphenSynthesized);
    }

    #[test]
    fn full_candidate_order() {
        let c = normalize("東京都世田谷区三軒茶屋２丁目１０番５号", &["東京都", "世田谷区"]);
        assert_eq!(
            texts(&c),
            vec!["三軒茶屋2丁目", "三軒茶屋二丁目", "三軒茶屋"]
        );
        assert_eq!(
            c.iter().map(|c| c.rank).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn kanji_variant_ranks_below_digit_sibling() {
        let c = normalize("桜上水5-40", &[] as &[&str]);
        assert_eq!(c[0].text, "桜上水5丁目");
        assert_eq!(c[1].text, "桜上水五丁目");
        assert_eq!(c[1].kind, CandidateKind::NumeralVariant);
    }

    #[test]
    fn kanji_block_produces_digit_form_first() {
        let c = normalize("三軒茶屋二丁目", &[] as &[&str]);
        assert_eq!(texts(&c), vec!["三軒茶屋2丁目", "三軒茶屋二丁目", "三軒茶屋"]);
    }

    #[test]
    fn area_only_when_no_block_number() {
        let c = normalize("世田谷区成城", &["世田谷区"]);
        assert_eq!(texts(&c), vec!["成城"]);
        assert_eq!(c[0].kind, CandidateKind::AreaOnly);
    }

    #[test]
    fn empty_address_yields_nothing() {
        assert!(normalize("", &["東京都"]).is_empty());
        assert!(normalize("東京都", &["東京都"]).is_empty());
        assert!(normalize("　", &[] as &[&str]).is_empty());
    }

    #[test]
    fn numeric_only_address_yields_nothing() {
        assert!(normalize("１２３−４", &[] as &[&str]).is_empty());
    }

    #[test]
    fn strips_marker() {
        assert_eq!(strip_block_marker("成城6丁目"), "成城6");
    }
}
