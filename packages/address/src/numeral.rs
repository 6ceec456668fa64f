//! Kanji numeral rendering for block numbers.
//!
//! Older catalog entries write block numbers in kanji (`三軒茶屋二丁目`), so
//! digit-form candidates get a kanji sibling. Block numbers never exceed
//! two digits, so only 1..=99 is supported.

const DIGITS: [char; 10] = ['〇', '一', '二', '三', '四', '五', '六', '七', '八', '九'];
const TEN: char = '十';

/// Renders `n` (1..=99) in kanji numerals, e.g. `21` → `二十一`.
#[must_use]
pub fn to_kanji(n: u32) -> Option<String> {
    if n == 0 || n > 99 {
        return None;
    }
    let (tens, ones) = (n / 10, n % 10);
    let mut out = String::new();
    if tens > 1 {
        out.push(DIGITS[tens as usize]);
    }
    if tens > 0 {
        out.push(TEN);
    }
    if ones > 0 {
        out.push(DIGITS[ones as usize]);
    }
    Some(out)
}

/// Parses a kanji numeral (1..=99) written with `十`, e.g. `二十一` → `21`.
#[must_use]
pub fn from_kanji(s: &str) -> Option<u32> {
    let digit = |c: char| {
        DIGITS
            .iter()
            .position(|d| *d == c)
            .and_then(|i| u32::try_from(i).ok())
    };

    let chars: Vec<char> = s.chars().collect();
    let value = match chars.as_slice() {
        [c] if *c == TEN => 10,
        [c] => digit(*c)?,
        [t, o] if *t == TEN => 10 + digit(*o)?,
        [d, t] if *t == TEN => digit(*d)? * 10,
        [d, t, o] if *t == TEN => digit(*d)? * 10 + digit(*o)?,
        _ => return None,
    };
    (1..=99).contains(&value).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_kanji() {
        assert_eq!(to_kanji(1).as_deref(), Some("一"));
        assert_eq!(to_kanji(10).as_deref(), Some("十"));
        assert_eq!(to_kanji(11).as_deref(), Some("十一"));
        assert_eq!(to_kanji(20).as_deref(), Some("二十"));
        assert_eq!(to_kanji(21).as_deref(), Some("二十一"));
    }

    #[test]
    fn out_of_range_is_none() {
        assert_eq!(to_kanji(0), None);
        assert_eq!(to_kanji(100), None);
    }

    #[test]
    fn parses_kanji() {
        assert_eq!(from_kanji("二"), Some(2));
        assert_eq!(from_kanji("十"), Some(10));
        assert_eq!(from_kanji("十五"), Some(15));
        assert_eq!(from_kanji("三十"), Some(30));
        assert_eq!(from_kanji("二十一"), Some(21));
    }

    #[test]
    fn rejects_malformed_kanji() {
        assert_eq!(from_kanji(""), None);
        assert_eq!(from_kanji("〇"), None);
        assert_eq!(from_kanji("十十"), None);
        assert_eq!(from_kanji("一二三"), None);
    }
}
