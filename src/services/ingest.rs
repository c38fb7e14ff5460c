// src/services/ingest.rs
//
// Spreadsheet ingestion: parse → match columns → coerce → validate.

pub mod fields;
pub mod normalize;
pub mod parser;
pub mod values;

use crate::{
    common::error::AppError,
    models::upload::{FileType, NormalizedRow},
};

/// Parses and normalizes an uploaded file in one pass.
pub fn ingest_file(file_name: &str, bytes: &[u8], file_type: FileType) -> Result<Vec<NormalizedRow>, AppError> {
    let sheet = parser::parse_sheet(file_name, bytes)?;
    tracing::debug!(
        "Parsed '{}': {} column(s), {} data row(s)",
        file_name,
        sheet.headers.len(),
        sheet.rows.len()
    );
    normalize::normalize_sheet(file_type, &sheet)
}
