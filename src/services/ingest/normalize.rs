// src/services/ingest/normalize.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    common::error::{AppError, RowError},
    models::upload::{
        BookingRow, CompetitorRow, ExtractedRow, FileType, NormalizedRow, PriceRow, StrRow,
    },
    services::ingest::{
        fields::{get_value, missing_columns, FieldSpec},
        parser::{Sheet, SheetRow},
        values::{parse_date, parse_decimal, parse_integer, parse_percentage},
    },
};

// Upload is rejected with at most this many row problems listed.
const MAX_REPORTED_ERRORS: usize = 100;

// ---
// Column aliases
// ---

const STAY_DATE: &[&str] = &[
    "Stay Date",
    "Date",
    "Occupancy Date",
    "Business Date",
    "Arrival Date",
    "Arrival",
    "Check In",
    "Check-in",
    "Check-In Date",
    "Checkin Date",
    "Day",
];

const BOOKING_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("stayDate", STAY_DATE),
    FieldSpec::required("roomsSold", &["Rooms Sold", "Room Nights", "Room Nights Sold", "Rooms", "Nights", "RN"]),
    FieldSpec::required("revenue", &["Revenue", "Room Revenue", "Total Revenue", "Rev", "Amount"]),
    FieldSpec::optional("bookingDate", &["Booking Date", "Reservation Date", "Book Date", "Created Date", "Created"]),
    FieldSpec::optional("roomType", &["Room Type", "Room", "Room Category", "Accommodation"]),
    FieldSpec::optional("adr", &["ADR", "Average Daily Rate", "Average Rate", "Avg Rate"]),
    FieldSpec::optional("channel", &["Channel", "Source", "Booking Source"]),
    FieldSpec::optional("marketSegment", &["Market Segment", "Segment"]),
];

const COMPETITOR_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("stayDate", STAY_DATE),
    FieldSpec::required(
        "competitorName",
        &["Competitor", "Competitor Name", "Hotel", "Hotel Name", "Property", "Property Name"],
    ),
    FieldSpec::required("rate", &["Rate", "Price", "Competitor Rate", "Lowest Rate", "Amount"]),
    FieldSpec::optional("roomType", &["Room Type", "Room", "Room Category"]),
    FieldSpec::optional("source", &["Source", "Channel", "OTA"]),
];

const STR_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("stayDate", STAY_DATE),
    FieldSpec::required("occupancy", &["Occupancy", "Occupancy %", "Occ", "Occ %", "My Property Occupancy"]),
    FieldSpec::required("adr", &["ADR", "Average Daily Rate", "My Property ADR"]),
    FieldSpec::required("revpar", &["RevPAR", "Rev PAR", "My Property RevPAR"]),
    FieldSpec::optional("compOccupancy", &["Comp Set Occupancy", "Compset Occupancy", "Comp Occupancy", "Comp Occ"]),
    FieldSpec::optional("compAdr", &["Comp Set ADR", "Compset ADR", "Comp ADR"]),
    FieldSpec::optional("compRevpar", &["Comp Set RevPAR", "Compset RevPAR", "Comp RevPAR"]),
];

const PRICE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("stayDate", &["Stay Date", "Date", "Rate Date", "Day"]),
    FieldSpec::required("roomType", &["Room Type", "Room", "Room Category", "Room Name"]),
    FieldSpec::required("price", &["Price", "Rate", "BAR", "Amount"]),
    FieldSpec::optional("rateCategory", &["Rate Category", "Rate Plan", "Rate Code", "Rate Type"]),
];

pub fn fields_for(file_type: FileType) -> &'static [FieldSpec] {
    match file_type {
        FileType::Booking => BOOKING_FIELDS,
        FileType::Competitor => COMPETITOR_FIELDS,
        FileType::Str => STR_FIELDS,
        FileType::PriceData => PRICE_FIELDS,
    }
}

// ---
// Per-row extraction
// ---

/// Reads the fields of a single row, collecting every problem instead of
/// stopping at the first one.
struct RowReader<'a> {
    row: &'a SheetRow,
    fields: &'static [FieldSpec],
    errors: Vec<RowError>,
}

impl<'a> RowReader<'a> {
    fn new(row: &'a SheetRow, fields: &'static [FieldSpec]) -> Self {
        Self { row, fields, errors: Vec::new() }
    }

    fn raw(&self, name: &str) -> Option<&'a str> {
        let spec = self.fields.iter().find(|f| f.name == name)?;
        get_value(self.row, spec.aliases)
    }

    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(RowError {
            row: self.row.number,
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn parsed<T>(&mut self, name: &str, parse: fn(&str) -> Option<T>, what: &str) -> Option<T> {
        let raw = self.raw(name)?;
        let value = parse(raw);
        if value.is_none() {
            self.fail(name, format!("'{}' is not a valid {}.", raw, what));
        }
        value
    }

    fn require<T>(&mut self, name: &str, value: Option<T>) -> Option<T> {
        if value.is_none() && self.raw(name).is_none() {
            self.fail(name, "Value is required.");
        }
        value
    }

    fn date(&mut self, name: &str) -> Option<NaiveDate> {
        self.parsed(name, parse_date, "date")
    }

    fn required_date(&mut self, name: &str) -> Option<NaiveDate> {
        let value = self.date(name);
        self.require(name, value)
    }

    fn decimal(&mut self, name: &str) -> Option<Decimal> {
        self.parsed(name, parse_decimal, "number")
    }

    fn required_amount(&mut self, name: &str) -> Option<Decimal> {
        let value = self.decimal(name);
        let value = self.require(name, value)?;
        if value.is_sign_negative() && !value.is_zero() {
            self.fail(name, "Value cannot be negative.");
            return None;
        }
        Some(value)
    }

    fn percentage(&mut self, name: &str) -> Option<Decimal> {
        let value = self.parsed(name, parse_percentage, "percentage")?;
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            self.fail(name, "Percentage must be between 0 and 100.");
            return None;
        }
        Some(value)
    }

    fn required_percentage(&mut self, name: &str) -> Option<Decimal> {
        let value = self.percentage(name);
        self.require(name, value)
    }

    fn text(&self, name: &str) -> Option<String> {
        self.raw(name).map(str::to_string)
    }

    fn required_text(&mut self, name: &str) -> Option<String> {
        let value = self.text(name);
        self.require(name, value)
    }

    fn finish(self, stay_date: Option<NaiveDate>, data: Option<ExtractedRow>) -> Result<NormalizedRow, Vec<RowError>> {
        match (stay_date, data) {
            (Some(stay_date), Some(data)) if self.errors.is_empty() => Ok(NormalizedRow {
                row_number: self.row.number,
                stay_date,
                data,
            }),
            _ => Err(self.errors),
        }
    }
}

fn booking(row: &SheetRow) -> Result<NormalizedRow, Vec<RowError>> {
    let mut r = RowReader::new(row, BOOKING_FIELDS);
    let stay_date = r.required_date("stayDate");
    let rooms_sold = r.parsed("roomsSold", parse_integer, "whole number");
    let rooms_sold = r.require("roomsSold", rooms_sold);
    if rooms_sold.is_some_and(|n| n < 0) {
        r.fail("roomsSold", "Value cannot be negative.");
    }
    let revenue = r.required_amount("revenue");
    let booking_date = r.date("bookingDate");
    let adr = r.decimal("adr");

    // ADR falls back to revenue / rooms when the file does not carry it.
    let adr = adr.or_else(|| match (revenue, rooms_sold) {
        (Some(rev), Some(rooms)) if rooms > 0 => Some((rev / Decimal::from(rooms)).round_dp(2)),
        _ => None,
    });

    let data = match (rooms_sold, revenue) {
        (Some(rooms_sold), Some(revenue)) => Some(ExtractedRow::Booking(BookingRow {
            booking_date,
            room_type: r.text("roomType"),
            rooms_sold,
            revenue,
            adr,
            channel: r.text("channel"),
            market_segment: r.text("marketSegment"),
        })),
        _ => None,
    };
    r.finish(stay_date, data)
}

fn competitor(row: &SheetRow) -> Result<NormalizedRow, Vec<RowError>> {
    let mut r = RowReader::new(row, COMPETITOR_FIELDS);
    let stay_date = r.required_date("stayDate");
    let competitor_name = r.required_text("competitorName");
    let rate = r.required_amount("rate");

    let data = match (competitor_name, rate) {
        (Some(competitor_name), Some(rate)) => Some(ExtractedRow::Competitor(CompetitorRow {
            competitor_name,
            rate,
            room_type: r.text("roomType"),
            source: r.text("source"),
        })),
        _ => None,
    };
    r.finish(stay_date, data)
}

fn str_report(row: &SheetRow) -> Result<NormalizedRow, Vec<RowError>> {
    let mut r = RowReader::new(row, STR_FIELDS);
    let stay_date = r.required_date("stayDate");
    let occupancy = r.required_percentage("occupancy");
    let adr = r.required_amount("adr");
    let revpar = r.required_amount("revpar");
    let comp_occupancy = r.percentage("compOccupancy");
    let comp_adr = r.decimal("compAdr");
    let comp_revpar = r.decimal("compRevpar");

    let data = match (occupancy, adr, revpar) {
        (Some(occupancy), Some(adr), Some(revpar)) => Some(ExtractedRow::Str(StrRow {
            occupancy,
            adr,
            revpar,
            comp_occupancy,
            comp_adr,
            comp_revpar,
        })),
        _ => None,
    };
    r.finish(stay_date, data)
}

fn price(row: &SheetRow) -> Result<NormalizedRow, Vec<RowError>> {
    let mut r = RowReader::new(row, PRICE_FIELDS);
    let stay_date = r.required_date("stayDate");
    let room_type = r.required_text("roomType");
    let price = r.required_amount("price");

    let data = match (room_type, price) {
        (Some(room_type), Some(price)) => Some(ExtractedRow::PriceData(PriceRow {
            room_type,
            rate_category: r.text("rateCategory"),
            price,
        })),
        _ => None,
    };
    r.finish(stay_date, data)
}

pub fn normalize_row(file_type: FileType, row: &SheetRow) -> Result<NormalizedRow, Vec<RowError>> {
    match file_type {
        FileType::Booking => booking(row),
        FileType::Competitor => competitor(row),
        FileType::Str => str_report(row),
        FileType::PriceData => price(row),
    }
}

/// Validates a whole sheet. Either every row normalizes or the upload is
/// rejected with the collected problems; nothing is partially accepted.
pub fn normalize_sheet(file_type: FileType, sheet: &Sheet) -> Result<Vec<NormalizedRow>, AppError> {
    let missing = missing_columns(&sheet.headers, fields_for(file_type));
    if !missing.is_empty() {
        return Err(AppError::UploadRejected {
            message: format!(
                "Missing required columns for a {} file: {}.",
                file_type,
                missing.join(", ")
            ),
            details: missing
                .iter()
                .map(|field| RowError {
                    row: 1,
                    field: field.to_string(),
                    message: "Column not found in the header.".to_string(),
                })
                .collect(),
        });
    }

    if sheet.rows.is_empty() {
        return Err(AppError::bad_request("The file has a header but no data rows."));
    }

    let mut rows = Vec::with_capacity(sheet.rows.len());
    let mut errors = Vec::new();
    for row in &sheet.rows {
        match normalize_row(file_type, row) {
            Ok(normalized) => rows.push(normalized),
            Err(row_errors) => errors.extend(row_errors),
        }
    }

    if !errors.is_empty() {
        let total = errors.len();
        errors.truncate(MAX_REPORTED_ERRORS);
        return Err(AppError::UploadRejected {
            message: format!("The file has {} invalid value(s); nothing was imported.", total),
            details: errors,
        });
    }

    Ok(rows)
}

/// Earliest and latest stay date of the rows.
pub fn date_range(rows: &[NormalizedRow]) -> Option<(NaiveDate, NaiveDate)> {
    let min = rows.iter().map(|r| r.stay_date).min()?;
    let max = rows.iter().map(|r| r.stay_date).max()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ingest::parser::parse_sheet;
    use std::str::FromStr;

    fn sheet(csv: &str) -> Sheet {
        parse_sheet("data.csv", csv.as_bytes()).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn booking_rows_are_normalized() {
        let s = sheet(
            "Stay Date,Room Nights,Room Revenue,Channel\n\
             01/05/2024,4,\"$1,000.00\",Direct\n\
             2024-05-02,0,0,\n",
        );
        let rows = normalize_sheet(FileType::Booking, &s).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[0].stay_date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        match &rows[0].data {
            ExtractedRow::Booking(b) => {
                assert_eq!(b.rooms_sold, 4);
                assert_eq!(b.revenue, dec("1000"));
                assert_eq!(b.adr, Some(dec("250")));
                assert_eq!(b.channel.as_deref(), Some("Direct"));
                assert_eq!(b.room_type, None);
            }
            other => panic!("unexpected row {:?}", other),
        }
        match &rows[1].data {
            ExtractedRow::Booking(b) => assert_eq!(b.adr, None),
            other => panic!("unexpected row {:?}", other),
        }
        assert_eq!(
            date_range(&rows),
            Some((
                NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
            ))
        );
    }

    #[test]
    fn missing_required_columns_reject_the_file() {
        let s = sheet("Date,Rooms Sold\n2024-05-01,3\n");
        match normalize_sheet(FileType::Booking, &s) {
            Err(AppError::UploadRejected { message, details }) => {
                assert!(message.contains("revenue"));
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "revenue");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn any_malformed_row_rejects_the_whole_file() {
        let s = sheet(
            "Date,Competitor,Rate\n\
             2024-05-01,Rival Inn,120\n\
             not-a-date,Rival Inn,abc\n\
             2024-05-03,,99\n",
        );
        match normalize_sheet(FileType::Competitor, &s) {
            Err(AppError::UploadRejected { details, .. }) => {
                assert_eq!(
                    details,
                    vec![
                        RowError { row: 3, field: "stayDate".into(), message: "'not-a-date' is not a valid date.".into() },
                        RowError { row: 3, field: "rate".into(), message: "'abc' is not a valid number.".into() },
                        RowError { row: 4, field: "competitorName".into(), message: "Value is required.".into() },
                    ]
                );
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn row_errors_point_at_the_file_line_after_blank_lines() {
        let s = sheet("Date,Competitor,Rate\n\n2024-05-01,Rival,abc\n");
        match normalize_sheet(FileType::Competitor, &s) {
            Err(AppError::UploadRejected { details, .. }) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].row, 3);
                assert_eq!(details[0].field, "rate");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let s = sheet("Date,Room Type,Price\n2024-05-01,Deluxe,-10\n");
        let err = normalize_sheet(FileType::PriceData, &s).unwrap_err();
        assert!(matches!(err, AppError::UploadRejected { ref details, .. } if details[0].field == "price"));
    }

    #[test]
    fn str_percentages_are_checked() {
        let s = sheet(
            "Date,Occ %,ADR,RevPAR,Comp Set Occupancy\n\
             2024-05-01,78.5%,120,94.2,0.81\n",
        );
        let rows = normalize_sheet(FileType::Str, &s).unwrap();
        match &rows[0].data {
            ExtractedRow::Str(r) => {
                assert_eq!(r.occupancy, dec("78.5"));
                assert_eq!(r.comp_occupancy, Some(dec("81")));
            }
            other => panic!("unexpected row {:?}", other),
        }

        let s = sheet("Date,Occupancy,ADR,RevPAR\n2024-05-01,140,120,94\n");
        assert!(normalize_sheet(FileType::Str, &s).is_err());
    }

    #[test]
    fn header_only_file_is_a_bad_request() {
        let s = sheet("Date,Room Type,Price\n");
        assert!(matches!(normalize_sheet(FileType::PriceData, &s), Err(AppError::BadRequest(_))));
    }
}
