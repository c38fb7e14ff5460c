// src/services/ingest/values.rs
//
// Cell text → typed values.

use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::{prelude::ToPrimitive, Decimal};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%Y%m%d",
];

const SHORT_YEAR_FORMATS: &[&str] = &["%d/%m/%y", "%m/%d/%y", "%d-%m-%y", "%d.%m.%y", "%d-%b-%y"];

// Excel serials outside this window are treated as plain numbers.
const SERIAL_MIN: f64 = 1_000.0;
const SERIAL_MAX: f64 = 100_000.0;

/// Days since 1899-12-30; the fractional part (time of day) is dropped.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    (1900..=2200).contains(&date.year()).then_some(date)
}

fn parse_exact(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok().and_then(plausible))
        .or_else(|| {
            SHORT_YEAR_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok().and_then(plausible))
        })
}

/// Accepts the common spreadsheet spellings of a calendar date.
///
/// Day-first wins over month-first, so `03/04/2024` is 3 April; `04/13/2024`
/// is only readable as month-first. A trailing time (`2024-05-01T10:00:00`,
/// `01/05/2024 10:00`) is ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(date) = parse_exact(text) {
        return Some(date);
    }

    if let Some((prefix, _)) = text.split_once('T').filter(|(p, _)| p.len() >= 8) {
        if let Some(date) = parse_exact(prefix) {
            return Some(date);
        }
    }
    if let Some((prefix, _)) = text.split_once(' ') {
        if let Some(date) = parse_exact(prefix) {
            return Some(date);
        }
    }

    match text.parse::<f64>() {
        Ok(serial) if (SERIAL_MIN..SERIAL_MAX).contains(&serial) => excel_serial_to_date(serial),
        _ => None,
    }
}

/// Strips currency marks, spaces and `%`, and resolves `,` / `.` separators.
///
/// `1,234.50`, `1.234,50`, `$ 1 234`, `€99,90`, `(12.00)` and `78.5%` are all
/// understood.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let mut text: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '$' | '€' | '£' | '¥' | '₹' | '%' | '\''))
        .collect();

    // Leading / trailing ISO codes such as "USD 120" or "120EUR".
    let alpha_prefix = text.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    text.drain(..alpha_prefix);
    let alpha_suffix = text.chars().rev().take_while(|c| c.is_ascii_alphabetic()).count();
    text.truncate(text.len() - alpha_suffix);

    let negative = text.starts_with('(') && text.ends_with(')');
    if negative {
        text = text[1..text.len() - 1].to_string();
    }
    if text.is_empty() {
        return None;
    }

    let normalized = match (text.rfind(','), text.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => text.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => text.replace(',', ""),
        (Some(_), None) => {
            let groups: Vec<&str> = text.split(',').collect();
            let thousands = groups.len() > 1
                && !groups[0].trim_start_matches('-').is_empty()
                && groups[1..].iter().all(|g| g.len() == 3);
            if thousands {
                text.replace(',', "")
            } else if groups.len() == 2 {
                text.replace(',', ".")
            } else {
                return None;
            }
        }
        (None, _) => text,
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

pub fn parse_integer(raw: &str) -> Option<i32> {
    let value = parse_decimal(raw)?;
    if !value.fract().is_zero() {
        return None;
    }
    value.to_i32()
}

/// Percentages as 0–100. A bare fraction such as `0.785` is scaled up.
pub fn parse_percentage(raw: &str) -> Option<Decimal> {
    let value = parse_decimal(raw)?;
    if !raw.contains('%') && value > Decimal::ZERO && value <= Decimal::ONE {
        Some(value * Decimal::ONE_HUNDRED)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn iso_and_slash_dates() {
        assert_eq!(parse_date("2024-05-01"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date("2024/05/01"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date("20240501"), Some(d(2024, 5, 1)));
    }

    #[test]
    fn day_first_wins_and_month_first_is_a_fallback() {
        assert_eq!(parse_date("03/04/2024"), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("13/04/2024"), Some(d(2024, 4, 13)));
        assert_eq!(parse_date("04/13/2024"), Some(d(2024, 4, 13)));
        assert_eq!(parse_date("03-04-2024"), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("03.04.2024"), Some(d(2024, 4, 3)));
    }

    #[test]
    fn month_names_and_short_years() {
        assert_eq!(parse_date("1 May 2024"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date("01-May-2024"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date("May 1, 2024"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date("September 30, 2024"), Some(d(2024, 9, 30)));
        assert_eq!(parse_date("01/05/24"), Some(d(2024, 5, 1)));
    }

    #[test]
    fn time_suffixes_are_ignored() {
        assert_eq!(parse_date("2024-05-01T14:30:00Z"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date("2024-05-01 00:00:00"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date("01/05/2024 10:15"), Some(d(2024, 5, 1)));
    }

    #[test]
    fn excel_serials() {
        assert_eq!(parse_date("45413"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date("45413.75"), Some(d(2024, 5, 1)));
        assert_eq!(excel_serial_to_date(1.0), Some(d(1899, 12, 31)));
        assert_eq!(parse_date("42"), None);
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("tomorrow"), None);
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("13/13/2024"), None);
    }

    #[test]
    fn numbers_with_currency_and_separators() {
        assert_eq!(parse_decimal("1,234.50"), Some(dec("1234.50")));
        assert_eq!(parse_decimal("1.234,50"), Some(dec("1234.50")));
        assert_eq!(parse_decimal("$ 1 234"), Some(dec("1234")));
        assert_eq!(parse_decimal("€99,90"), Some(dec("99.90")));
        assert_eq!(parse_decimal("USD 120"), Some(dec("120")));
        assert_eq!(parse_decimal("120EUR"), Some(dec("120")));
        assert_eq!(parse_decimal("(12.00)"), Some(dec("-12.00")));
        assert_eq!(parse_decimal("1,234,567"), Some(dec("1234567")));
        assert_eq!(parse_decimal("-5"), Some(dec("-5")));
    }

    #[test]
    fn rejects_garbage_numbers() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("n/a"), None);
        assert_eq!(parse_decimal("1,2,3"), None);
        assert_eq!(parse_decimal("12abc34"), None);
    }

    #[test]
    fn integers_must_be_whole() {
        assert_eq!(parse_integer("12"), Some(12));
        assert_eq!(parse_integer("12.0"), Some(12));
        assert_eq!(parse_integer("1,200"), Some(1200));
        assert_eq!(parse_integer("12.5"), None);
    }

    #[test]
    fn percentages() {
        assert_eq!(parse_percentage("78.5%"), Some(dec("78.5")));
        assert_eq!(parse_percentage("0.785"), Some(dec("78.500")));
        assert_eq!(parse_percentage("64"), Some(dec("64")));
    }
}
