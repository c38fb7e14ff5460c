// src/models/upload.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "upload_file_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Booking,
    Competitor,
    Str,
    PriceData,
}

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Booking => "booking",
            FileType::Competitor => "competitor",
            FileType::Str => "str",
            FileType::PriceData => "price_data",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `fileType=ocr` selects the STR file type with the OCR report flavour.
pub fn implied_report_type(raw_file_type: &str) -> Option<&'static str> {
    raw_file_type.trim().eq_ignore_ascii_case("ocr").then_some("ocr")
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "booking" | "bookings" => Ok(FileType::Booking),
            "competitor" | "competitors" => Ok(FileType::Competitor),
            "str" | "ocr" | "str_ocr" => Ok(FileType::Str),
            "price_data" | "pricedata" | "price" => Ok(FileType::PriceData),
            other => Err(format!("Unknown file type '{}'.", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "upload_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Saved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "extract_row_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExtractRowStatus {
    Staged,
    Saved,
}

// --- Normalized row payloads (stored as JSONB) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingRow {
    pub booking_date: Option<NaiveDate>,
    pub room_type: Option<String>,
    pub rooms_sold: i32,
    pub revenue: Decimal,
    pub adr: Option<Decimal>,
    pub channel: Option<String>,
    pub market_segment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorRow {
    pub competitor_name: String,
    pub rate: Decimal,
    pub room_type: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StrRow {
    pub occupancy: Decimal,
    pub adr: Decimal,
    pub revpar: Decimal,
    pub comp_occupancy: Option<Decimal>,
    pub comp_adr: Option<Decimal>,
    pub comp_revpar: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceRow {
    pub room_type: String,
    pub rate_category: Option<String>,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractedRow {
    Booking(BookingRow),
    Competitor(CompetitorRow),
    Str(StrRow),
    PriceData(PriceRow),
}

/// One spreadsheet row after normalization, before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRow {
    pub row_number: usize,
    pub stay_date: NaiveDate,
    pub data: ExtractedRow,
}

// --- Persisted staging hierarchy ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadData {
    pub id: Uuid,
    pub company_id: Uuid,
    pub uploaded_by: Uuid,
    pub file_name: String,
    pub file_type: FileType,
    pub report_type: Option<String>,
    pub status: UploadStatus,
    pub row_count: i32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetaUploadData {
    pub id: Uuid,
    pub upload_data_id: Uuid,
    pub hotel_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedExtractDataFile {
    pub id: Uuid,
    pub upload_data_id: Uuid,
    pub company_id: Uuid,
    pub hotel_id: Option<Uuid>,
    pub file_type: FileType,
    pub report_type: Option<String>,
    pub row_number: i32,
    pub stay_date: NaiveDate,
    #[schema(value_type = ExtractedRow)]
    pub data: Json<ExtractedRow>,
    pub status: ExtractRowStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadDetail {
    #[serde(flatten)]
    pub upload: UploadData,
    pub meta: Vec<MetaUploadData>,
}

/// Answer to a successful upload: the staged batch plus a short preview.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadAccepted {
    pub upload: UploadData,
    #[schema(value_type = Vec<Object>)]
    pub preview: Vec<NormalizedRow>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmUploadPayload {
    pub hotel_id: Uuid,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct UploadListQuery {
    pub status: Option<UploadStatus>,
    pub file_type: Option<FileType>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RowsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl RowsQuery {
    /// (limit, offset) with sane bounds.
    pub fn limit_offset(&self) -> (i64, i64) {
        let per_page = self.per_page.unwrap_or(100).clamp(1, 500);
        let page = self.page.unwrap_or(1).max(1);
        (per_page, (page - 1).saturating_mul(per_page))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct HotelDataQuery {
    pub file_type: Option<FileType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_accepts_common_spellings() {
        assert_eq!("Booking".parse::<FileType>().unwrap(), FileType::Booking);
        assert_eq!("price-data".parse::<FileType>().unwrap(), FileType::PriceData);
        assert_eq!("STR OCR".parse::<FileType>().unwrap(), FileType::Str);
        assert!("invoice".parse::<FileType>().is_err());
    }

    #[test]
    fn ocr_spelling_keeps_its_report_flavour() {
        assert_eq!("ocr".parse::<FileType>().unwrap(), FileType::Str);
        assert_eq!(implied_report_type(" OCR "), Some("ocr"));
        assert_eq!(implied_report_type("str"), None);
        assert_eq!(implied_report_type("booking"), None);
    }

    #[test]
    fn extracted_row_is_tagged_in_json() {
        let row = ExtractedRow::PriceData(PriceRow {
            room_type: "Deluxe".into(),
            rate_category: None,
            price: Decimal::new(12050, 2),
        });
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["kind"], "price_data");
        assert_eq!(value["roomType"], "Deluxe");
    }

    #[test]
    fn pagination_is_clamped() {
        let q = RowsQuery { page: Some(0), per_page: Some(10_000) };
        assert_eq!(q.limit_offset(), (500, 0));
        let q = RowsQuery { page: Some(3), per_page: Some(20) };
        assert_eq!(q.limit_offset(), (20, 40));
        let q = RowsQuery { page: Some(i64::MAX), per_page: Some(500) };
        assert_eq!(q.limit_offset(), (500, i64::MAX));
    }
}
