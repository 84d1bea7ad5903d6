use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use tally_core::Money;

fn bank_annotations() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)CR|DR|[,$]").expect("invalid regex"))
}

/// Parses raw statement amount text into a signed amount rounded to cents.
///
/// `CR` / `DR` markers (any case), thousands separators and `$` are stripped before
/// coercion. The markers never change the sign: it must already be carried by the
/// numeral. Returns `None` for text that is not a number once stripped, and for
/// magnitudes no statement row can carry.
pub fn normalize_amount(raw: &str) -> Option<Money> {
    let stripped = bank_annotations().replace_all(raw, "");
    let mut cleaned = stripped.trim();
    // "(DR) 12.00" leaves an empty pair of parentheses behind.
    if let Some(rest) = cleaned.strip_prefix("()") {
        cleaned = rest.trim_start();
    }
    if let Some(rest) = cleaned.strip_suffix("()") {
        cleaned = rest.trim_end();
    }
    if cleaned.is_empty() {
        return None;
    }
    let cleaned: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
        .map(|d| Money::from_decimal(d.round_dp(2)))
        .filter(|m| m.is_plausible())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cents(n: i64) -> Option<Money> {
        Some(Money::from_cents(n))
    }

    #[test]
    fn plain_and_signed() {
        assert_eq!(normalize_amount("123.45"), cents(12345));
        assert_eq!(normalize_amount("-5.50"), cents(-550));
        assert_eq!(normalize_amount("0"), cents(0));
    }

    #[test]
    fn strips_currency_and_separators() {
        assert_eq!(normalize_amount("$88.00"), cents(8800));
        assert_eq!(normalize_amount("-$1,234.56"), cents(-123456));
    }

    #[test]
    fn strips_credit_debit_markers_without_flipping_sign() {
        assert_eq!(normalize_amount("1,234.50 CR"), cents(123450));
        assert_eq!(normalize_amount("1,234.50 cr"), cents(123450));
        assert_eq!(normalize_amount("12.00 DR"), cents(1200));
        assert_eq!(normalize_amount("-12.00 DR"), cents(-1200));
        assert_eq!(normalize_amount("(DR) 12.00"), cents(1200));
    }

    #[test]
    fn unparseable_text_is_none() {
        assert_eq!(normalize_amount(""), None);
        assert_eq!(normalize_amount("   "), None);
        assert_eq!(normalize_amount("CR"), None);
        assert_eq!(normalize_amount("n/a"), None);
        assert_eq!(normalize_amount("12.00.1"), None);
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(normalize_amount("12.3456"), cents(1235));
    }

    #[test]
    fn implausible_magnitudes_are_none() {
        assert_eq!(normalize_amount("79228162514264337593543950335"), None);
        assert_eq!(normalize_amount("-50000000000000000000000000000"), None);
        assert_eq!(normalize_amount("1e20"), None);
        assert_eq!(normalize_amount("999,999,999,999.99"), cents(99_999_999_999_999));
    }

    #[test]
    fn spreadsheet_float_text() {
        assert_eq!(normalize_amount("1e2"), cents(10000));
    }
}
