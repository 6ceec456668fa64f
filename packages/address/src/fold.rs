//! Character-level canonicalization: city prefixes, width, hyphens, spaces.
//!
//! Applied symmetrically to survey addresses and catalog block names so
//! that both sides of a comparison use the same glyphs.

/// Hyphen-like glyphs that always mean "-".
const HYPHENS: &[char] = &[
    '\u{FF0D}', // FULLWIDTH HYPHEN-MINUS
    '\u{2212}', // MINUS SIGN
    '\u{2010}', // HYPHEN
    '\u{2011}', // NON-BREAKING HYPHEN
    '\u{2012}', // FIGURE DASH
    '\u{2013}', // EN DASH
    '\u{2014}', // EM DASH
    '\u{2015}', // HORIZONTAL BAR
    '\u{FE63}', // SMALL HYPHEN-MINUS
];

/// Prolonged sound marks, which only mean "-" directly after a digit
/// (elsewhere they are part of a katakana word).
const LONG_VOWEL_MARKS: &[char] = &['\u{30FC}', '\u{FF70}'];

/// Removes each prefix, in order, when the remaining address starts with
/// it. Whitespace around prefixes is skipped.
#[must_use]
pub fn strip_city_prefix<'a, S: AsRef<str>>(raw: &'a str, prefixes: &[S]) -> &'a str {
    let mut rest = raw.trim_start();
    for prefix in prefixes {
        let prefix = prefix.as_ref();
        if prefix.is_empty() {
            continue;
        }
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped.trim_start();
        }
    }
    rest
}

/// Folds full-width digits and hyphen variants to ASCII and removes all
/// whitespace (including ideographic spaces).
#[must_use]
pub fn fold_width(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_whitespace() {
            continue;
        }
        let folded = match c {
            '\u{FF10}'..='\u{FF19}' => {
                char::from_u32(u32::from(c) - 0xFF10 + u32::from(b'0')).unwrap_or(c)
            }
            c if HYPHENS.contains(&c) => '-',
            c if LONG_VOWEL_MARKS.contains(&c)
                && out.chars().last().is_some_and(|p| p.is_ascii_digit()) =>
            {
                '-'
            }
            c => c,
        };
        out.push(folded);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefixes_in_order() {
        assert_eq!(
            strip_city_prefix("東京都世田谷区成城6丁目", &["東京都", "世田谷区"]),
            "成城6丁目"
        );
    }

    #[test]
    fn strips_later_prefix_when_earlier_is_absent() {
        assert_eq!(
            strip_city_prefix("世田谷区成城6丁目", &["東京都", "世田谷区"]),
            "成城6丁目"
        );
    }

    #[test]
    fn prefix_not_at_start_is_kept() {
        assert_eq!(strip_city_prefix("成城東京都", &["東京都"]), "成城東京都");
    }

    #[test]
    fn skips_ideographic_space_after_prefix() {
        assert_eq!(
            strip_city_prefix("東京都\u{3000}三軒茶屋", &["東京都"]),
            "三軒茶屋"
        );
    }

    #[test]
    fn folds_full_width_digits() {
        assert_eq!(fold_width("三軒茶屋２丁目"), "三軒茶屋2丁目");
    }

    #[test]
    fn folds_three_hyphen_families() {
        assert_eq!(fold_width("5\u{FF0D}40\u{2212}10\u{2010}1"), "5-40-10-1");
    }

    #[test]
    fn long_vowel_mark_after_digit_is_hyphen() {
        assert_eq!(fold_width("5ー40"), "5-40");
        assert_eq!(fold_width("5ｰ40"), "5-40");
    }

    #[test]
    fn long_vowel_mark_in_word_is_kept() {
        assert_eq!(fold_width("センター"), "センター");
    }

    #[test]
    fn removes_all_whitespace() {
        assert_eq!(fold_width(" 桜 上水\u{3000}5 "), "桜上水5");
    }
}
