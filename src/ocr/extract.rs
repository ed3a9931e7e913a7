//! Field parsers for recognized cell text.
//!
//! Both parsers are total: any text that is not a usable number yields
//! `None`, which the worker treats as a missing value rather than an error.

/// Characters the recognizer or upstream UI may leave around a ratio.
fn is_ratio_noise(c: char) -> bool {
    c.is_whitespace() || c == '<' || c == '>'
}

/// Parses one number, ignoring thousands-separator commas.
fn parse_quantity(text: &str) -> Option<f64> {
    let digits: String = text.chars().filter(|&c| c != ',').collect();
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a ratio cell such as `12,500:1` into `have / want`.
///
/// A bare number is a ratio against 1. Anything after a second colon is
/// ignored. A zero `want` quantity or a non-numeric part yields `None`.
pub fn parse_ratio(text: &str) -> Option<f64> {
    let clean: String = text.chars().filter(|&c| !is_ratio_noise(c)).collect();
    if clean.is_empty() {
        return None;
    }

    let mut parts = clean.split(':');
    let have = parse_quantity(parts.next()?)?;
    let want = match parts.next() {
        Some(part) => parse_quantity(part)?,
        None => 1.0,
    };
    if want == 0.0 {
        return None;
    }

    Some(have / want)
}

/// Parses a stock cell such as `3,400` into an integer.
pub fn parse_stock(text: &str) -> Option<i64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|&c| c != ',')
        .collect();
    digits.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ratio_pair() {
        assert_eq!(parse_ratio("12500:1"), Some(12500.0));
        assert_eq!(parse_ratio("1:4"), Some(0.25));
        assert_eq!(parse_ratio("3:2"), Some(1.5));
    }

    #[test]
    fn test_parse_ratio_thousands_separators() {
        assert_eq!(parse_ratio("12,500:1"), Some(12500.0));
        assert_eq!(parse_ratio("1:1,000"), Some(0.001));
        assert_eq!(parse_ratio("1,234"), Some(1234.0));
    }

    #[test]
    fn test_parse_ratio_bare_value() {
        assert_eq!(parse_ratio("42"), Some(42.0));
        assert_eq!(parse_ratio("0.5"), Some(0.5));
    }

    #[test]
    fn test_parse_ratio_strips_brackets_and_whitespace() {
        assert_eq!(parse_ratio(" <10 : 4> "), Some(2.5));
        assert_eq!(parse_ratio("<<7>>"), Some(7.0));
    }

    #[test]
    fn test_parse_ratio_ignores_trailing_parts() {
        assert_eq!(parse_ratio("1:2:3"), Some(0.5));
        assert_eq!(parse_ratio("10:4:1"), Some(2.5));
        assert_eq!(parse_ratio("10:4:junk"), Some(2.5));
        assert_eq!(parse_ratio("10:0:1"), None);
    }

    #[test]
    fn test_parse_ratio_zero_want_is_absent() {
        assert_eq!(parse_ratio("5:0"), None);
        assert_eq!(parse_ratio("5:0,000"), None);
    }

    #[test]
    fn test_parse_ratio_malformed_is_absent() {
        assert_eq!(parse_ratio(""), None);
        assert_eq!(parse_ratio("   "), None);
        assert_eq!(parse_ratio(":"), None);
        assert_eq!(parse_ratio("12:"), None);
        assert_eq!(parse_ratio(":3"), None);
        assert_eq!(parse_ratio("1.2.3:1"), None);
        assert_eq!(parse_ratio(",,"), None);
    }

    #[test]
    fn test_parse_stock() {
        assert_eq!(parse_stock("3400"), Some(3400));
        assert_eq!(parse_stock("3,400"), Some(3400));
        assert_eq!(parse_stock("1,234,567"), Some(1_234_567));
        assert_eq!(parse_stock(" 12 "), Some(12));
    }

    #[test]
    fn test_parse_stock_malformed_is_absent() {
        assert_eq!(parse_stock(""), None);
        assert_eq!(parse_stock(","), None);
        assert_eq!(parse_stock("12:1"), None);
        assert_eq!(parse_stock("3.5"), None);
    }
}
