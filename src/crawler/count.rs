//! Metric-string parsing
//!
//! The site renders engagement counts in abbreviated Chinese-locale forms
//! ("1.2万", "3.5k", "1,024") and sometimes as bare action labels ("赞",
//! "收藏") when the count is zero. Parsing is total: anything unrecognized
//! is zero, because a garbled count must never sink the record around it.

/// Parse an on-screen count string into an absolute number.
///
/// Handles `万` (×10 000) and `k`/`K` (×1 000) suffixes, comma grouping and
/// surrounding whitespace. Fractional results truncate toward zero.
#[must_use]
pub fn parse_count(raw: &str) -> u64 {
    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return 0;
    }

    if let Some(stem) = cleaned.strip_suffix('万') {
        return scale(stem, 10_000.0);
    }
    if let Some(stem) = cleaned.strip_suffix('k').or_else(|| cleaned.strip_suffix('K')) {
        return scale(stem, 1_000.0);
    }

    scale(cleaned, 1.0)
}

fn scale(stem: &str, factor: f64) -> u64 {
    match stem.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => (value * factor) as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_integers() {
        assert_eq!(parse_count("0"), 0);
        assert_eq!(parse_count("42"), 42);
        assert_eq!(parse_count("1,024"), 1024);
        assert_eq!(parse_count(" 7 "), 7);
    }

    #[test]
    fn test_wan_suffix() {
        assert_eq!(parse_count("1.2万"), 12_000);
        assert_eq!(parse_count("10万"), 100_000);
        assert_eq!(parse_count("0.5万"), 5_000);
    }

    #[test]
    fn test_k_suffix() {
        assert_eq!(parse_count("3.5k"), 3_500);
        assert_eq!(parse_count("2K"), 2_000);
    }

    #[test]
    fn test_fractions_truncate() {
        assert_eq!(parse_count("1.27万"), 12_700);
        assert_eq!(parse_count("1.234万"), 12_340);
        assert_eq!(parse_count("3.1"), 3);
    }

    #[test]
    fn test_unparseable_is_zero() {
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("赞"), 0);
        assert_eq!(parse_count("收藏"), 0);
        assert_eq!(parse_count("abc万"), 0);
        assert_eq!(parse_count("-5"), 0);
        assert_eq!(parse_count("NaN"), 0);
    }
}
