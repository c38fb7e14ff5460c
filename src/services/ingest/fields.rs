// src/services/ingest/fields.rs
//
// Column lookup by alias list.

use crate::services::ingest::parser::SheetRow;

/// A logical field and the header spellings it is known under.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { name, aliases, required: true }
    }

    pub const fn optional(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { name, aliases, required: false }
    }
}

fn squash_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

// Keeps letters, digits and hyphens only: "Check_In Date" → "checkindate",
// "check-in" → "check-in".
fn keep_hyphens(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_lowercase()
}

/// Index of the first key matching `candidate`, trying progressively looser
/// comparisons: exact, whitespace-insensitive lowercase, then
/// punctuation-insensitive lowercase that still keeps hyphens.
fn position_of<'a, I>(keys: I, candidate: &str) -> Option<usize>
where
    I: Iterator<Item = &'a str> + Clone,
{
    if let Some(idx) = keys.clone().position(|k| k == candidate) {
        return Some(idx);
    }

    let squashed = squash_whitespace(candidate);
    if let Some(idx) = keys.clone().position(|k| squash_whitespace(k) == squashed) {
        return Some(idx);
    }

    let loose = keep_hyphens(candidate);
    if loose.is_empty() {
        return None;
    }
    keys.clone().position(|k| keep_hyphens(k) == loose)
}

/// First non-empty value among the `candidates` spellings, or `None`.
///
/// A matching column whose cell is blank does not stop the search, so a later
/// alias can still supply the value.
pub fn get_value<'a>(row: &'a SheetRow, candidates: &[&str]) -> Option<&'a str> {
    candidates.iter().find_map(|candidate| {
        let idx = position_of(row.values.iter().map(|(k, _)| k.as_str()), candidate)?;
        let value = row.values[idx].1.as_str();
        (!value.is_empty()).then_some(value)
    })
}

pub fn header_has(headers: &[String], candidates: &[&str]) -> bool {
    candidates
        .iter()
        .any(|c| position_of(headers.iter().map(String::as_str), c).is_some())
}

/// Names of the required fields no header column matches.
pub fn missing_columns(headers: &[String], fields: &[FieldSpec]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|f| f.required && !header_has(headers, f.aliases))
        .map(|f| f.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> SheetRow {
        SheetRow {
            number: 2,
            values: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn exact_match_comes_first() {
        let r = row(&[("room type", "lower"), ("Room Type", "exact")]);
        assert_eq!(get_value(&r, &["Room Type"]), Some("exact"));
    }

    #[test]
    fn whitespace_and_case_are_ignored() {
        let r = row(&[("  ROOMS   SOLD ", "12")]);
        assert_eq!(get_value(&r, &["Rooms Sold"]), Some("12"));
    }

    #[test]
    fn punctuation_is_ignored_but_hyphens_are_kept() {
        let r = row(&[("Room_Type", "Deluxe"), ("check-in", "2024-05-01")]);
        assert_eq!(get_value(&r, &["Room Type"]), Some("Deluxe"));
        assert_eq!(get_value(&r, &["Check-In"]), Some("2024-05-01"));
        assert_eq!(get_value(&r, &["Check In"]), None);
    }

    #[test]
    fn aliases_are_tried_in_order_and_blank_cells_fall_through() {
        let r = row(&[("Date", ""), ("Stay Date", "2024-05-02"), ("Arrival", "2024-05-03")]);
        assert_eq!(get_value(&r, &["Date", "Stay Date", "Arrival"]), Some("2024-05-02"));
        assert_eq!(get_value(&r, &["Arrival", "Stay Date"]), Some("2024-05-03"));
        assert_eq!(get_value(&r, &["Revenue"]), None);
    }

    #[test]
    fn reports_missing_required_columns() {
        const FIELDS: &[FieldSpec] = &[
            FieldSpec::required("stayDate", &["Date", "Stay Date"]),
            FieldSpec::required("revenue", &["Revenue", "Room Revenue"]),
            FieldSpec::optional("channel", &["Channel"]),
        ];
        let headers = vec!["stay date".to_string(), "Rooms".to_string()];
        assert_eq!(missing_columns(&headers, FIELDS), vec!["revenue"]);
    }
}
