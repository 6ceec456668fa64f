#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tiered matching of normalized addresses against the town-block catalog.
//!
//! A [`CatalogIndex`] is built once per city and import run, then shared
//! read-only across workers. [`CatalogIndex::resolve`] tries three tiers
//! in order, and within each tier the candidates in rank order:
//!
//! 1. exact canonical name
//! 2. exact after removing the block marker from both sides
//! 3. substring containment in either direction, longest overlap wins
//!
//! Containment never crosses block numbers: a match may not end inside a
//! digit run, and when the address names a block number, catalog names
//! carrying a different number are skipped.
//!
//! A tier that finds several equally good blocks never guesses; if no
//! later candidate or tier resolves the record it is reported as
//! [`UnresolvedReason::Ambiguous`].

use std::collections::BTreeMap;

use landprice_address::generators::block_first;
use landprice_address::{fold_width, strip_block_marker};
use landprice_models::{
    CandidateKind, MatchOutcome, MatchTier, NormalizedAddressCandidate, TownBlock,
    UnresolvedReason,
};

/// Shortest candidate (in characters) allowed to match by containment.
const MIN_CONTAINMENT_CHARS: usize = 2;

#[derive(Debug, Clone)]
struct Entry {
    block_code: String,
    name: String,
    name_chars: usize,
    block_number: Option<u32>,
}

/// Block number named by a catalog entry: `<area><n>丁目` in digits or
/// kanji, or a bare trailing digit run (`成城6`).
fn catalog_block_number(name: &str) -> Option<u32> {
    if let Some(block) = block_first(name) {
        return Some(block.number);
    }
    let unmarked = strip_block_marker(name);
    let digits_at = unmarked
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + unmarked[i..].chars().next().map_or(1, char::len_utf8));
    unmarked[digits_at..].parse().ok()
}

/// Block number the address itself names, taken from its highest-ranked
/// block candidate.
fn address_block_number(ranked: &[&NormalizedAddressCandidate]) -> Option<u32> {
    ranked
        .iter()
        .filter(|c| {
            matches!(
                c.kind,
                CandidateKind::BlockMarker | CandidateKind::HyphenSynthesized
            )
        })
        .find_map(|c| block_first(&c.text))
        .map(|block| block.number)
}

/// `haystack` contains `needle` at a position where neither end of the
/// match splits a digit run.
fn contains_on_boundary(haystack: &str, needle: &str) -> bool {
    let starts_with_digit = needle.chars().next().is_some_and(|c| c.is_ascii_digit());
    let ends_with_digit = needle.chars().next_back().is_some_and(|c| c.is_ascii_digit());

    haystack.match_indices(needle).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !(starts_with_digit && before.is_some_and(|c| c.is_ascii_digit()))
            && !(ends_with_digit && after.is_some_and(|c| c.is_ascii_digit()))
    })
}

/// Result of one tier for one candidate.
enum TierHit {
    None,
    One(usize),
    Many,
}

/// Precomputed lookup over the active blocks of one city.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    city_code: String,
    entries: Vec<Entry>,
    by_name: BTreeMap<String, Vec<usize>>,
    by_unmarked_name: BTreeMap<String, Vec<usize>>,
}

impl CatalogIndex {
    /// Builds the index from catalog rows, keeping only active blocks of
    /// `city_code`. Names are width-folded so they compare equal to
    /// normalized candidates.
    #[must_use]
    pub fn build<'a, I>(city_code: &str, blocks: I) -> Self
    where
        I: IntoIterator<Item = &'a TownBlock>,
    {
        let mut index = Self {
            city_code: city_code.to_string(),
            ..Self::default()
        };

        for block in blocks {
            if !block.active || block.city_code != city_code {
                continue;
            }
            let name = fold_width(&block.block_name);
            if name.is_empty() {
                continue;
            }
            let i = index.entries.len();
            index
                .by_name
                .entry(name.clone())
                .or_default()
                .push(i);
            index
                .by_unmarked_name
                .entry(strip_block_marker(&name))
                .or_default()
                .push(i);
            index.entries.push(Entry {
                block_code: block.block_code.clone(),
                name_chars: name.chars().count(),
                block_number: catalog_block_number(&name),
                name,
            });
        }

        log::debug!(
            "{}: indexed {} active town blocks",
            index.city_code,
            index.entries.len()
        );

        index
    }

    /// City this index was built for.
    #[must_use]
    pub fn city_code(&self) -> &str {
        &self.city_code
    }

    /// Number of indexed blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves ranked candidates to a single block.
    #[must_use]
    pub fn resolve(&self, candidates: &[NormalizedAddressCandidate]) -> MatchOutcome {
        if candidates.is_empty() {
            return MatchOutcome::Unresolved {
                reason: UnresolvedReason::NoCandidates,
            };
        }

        let mut ranked: Vec<&NormalizedAddressCandidate> = candidates.iter().collect();
        ranked.sort_by_key(|c| c.rank);
        let block_number = address_block_number(&ranked);

        let mut ambiguous = false;

        for tier in [
            MatchTier::Exact,
            MatchTier::MarkerInsensitive,
            MatchTier::Containment,
        ] {
            for candidate in &ranked {
                match self.try_tier(tier, &candidate.text, block_number) {
                    TierHit::One(i) => {
                        return MatchOutcome::Resolved {
                            block_code: self.entries[i].block_code.clone(),
                            tier,
                            candidate: candidate.text.clone(),
                        };
                    }
                    TierHit::Many => ambiguous = true,
                    TierHit::None => {}
                }
            }
        }

        MatchOutcome::Unresolved {
            reason: if ambiguous {
                UnresolvedReason::Ambiguous
            } else {
                UnresolvedReason::NoMatch
            },
        }
    }

    fn try_tier(&self, tier: MatchTier, candidate: &str, block_number: Option<u32>) -> TierHit {
        match tier {
            MatchTier::Exact => Self::hit(self.by_name.get(candidate)),
            MatchTier::MarkerInsensitive => {
                Self::hit(self.by_unmarked_name.get(&strip_block_marker(candidate)))
            }
            MatchTier::Containment => self.containment(candidate, block_number),
        }
    }

    fn hit(indices: Option<&Vec<usize>>) -> TierHit {
        match indices.map(Vec::as_slice) {
            None | Some([]) => TierHit::None,
            Some([i]) => TierHit::One(*i),
            Some(_) => TierHit::Many,
        }
    }

    /// Longest overlap wins; the overlap of two strings where one contains
    /// the other is the length of the shorter one.
    fn containment(&self, candidate: &str, block_number: Option<u32>) -> TierHit {
        let candidate_chars = candidate.chars().count();
        if candidate_chars < MIN_CONTAINMENT_CHARS {
            return TierHit::None;
        }

        let mut best: Option<(usize, usize)> = None;
        let mut tied = false;

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.name_chars < MIN_CONTAINMENT_CHARS {
                continue;
            }
            if matches!((block_number, entry.block_number), (Some(wanted), Some(named)) if wanted != named)
            {
                continue;
            }
            if !contains_on_boundary(candidate, &entry.name)
                && !contains_on_boundary(&entry.name, candidate)
            {
                continue;
            }
            let overlap = entry.name_chars.min(candidate_chars);
            match best {
                Some((_, b)) if overlap < b => {}
                Some((j, b)) if overlap == b => {
                    if self.entries[j].block_code != entry.block_code {
                        tied = true;
                    }
                }
                _ => {
                    best = Some((i, overlap));
                    tied = false;
                }
            }
        }

        match best {
            None => TierHit::None,
            Some(_) if tied => TierHit::Many,
            Some((i, _)) => TierHit::One(i),
        }
    }
}
