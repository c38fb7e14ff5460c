// src/services/ingest/parser.rs
//
// CSV / Excel → header + rows of trimmed strings.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::{
    common::{error::AppError, files::extension_of},
    services::ingest::values::excel_serial_to_date,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Excel,
}

impl SheetFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self, AppError> {
        match extension_of(file_name).as_deref() {
            Some("csv") | Some("txt") => Ok(SheetFormat::Csv),
            Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => Ok(SheetFormat::Excel),
            _ => Err(AppError::bad_request(
                "Unsupported file format. Upload a .csv, .xlsx or .xls file.",
            )),
        }
    }
}

/// One data row: `(header, value)` pairs in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// 1-based position in the sheet, header included.
    pub number: usize,
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

pub fn parse_sheet(file_name: &str, bytes: &[u8]) -> Result<Sheet, AppError> {
    let lines = match SheetFormat::from_file_name(file_name)? {
        SheetFormat::Csv => read_csv(bytes)?,
        SheetFormat::Excel => read_excel(bytes)?,
    };
    build_sheet(lines)
}

fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|c| c.is_empty())
}

/// A source line with its 1-based line number in the file.
type NumberedLine = (usize, Vec<String>);

/// First non-blank line becomes the header, blank lines are skipped.
fn build_sheet(lines: Vec<NumberedLine>) -> Result<Sheet, AppError> {
    let mut numbered = lines.into_iter().filter(|(_, cells)| !is_blank(cells));

    let (_, mut headers) = numbered
        .next()
        .ok_or_else(|| AppError::bad_request("The uploaded file is empty."))?;

    if let Some(first) = headers.first_mut() {
        *first = first.trim_start_matches('\u{feff}').trim().to_string();
    }

    let rows = numbered
        .map(|(number, cells)| SheetRow {
            number,
            values: headers
                .iter()
                .enumerate()
                .filter(|(_, h)| !h.is_empty())
                .map(|(i, h)| (h.clone(), cells.get(i).cloned().unwrap_or_default()))
                .collect(),
        })
        .collect();

    Ok(Sheet { headers, rows })
}

fn detect_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    let count = |needle: u8| first_line.iter().filter(|&&b| b == needle).count();
    if count(b';') > count(b',') {
        b';'
    } else if count(b'\t') > count(b',') {
        b'\t'
    } else {
        b','
    }
}

// The csv reader drops empty lines, so numbers come from the record position.
fn read_csv(bytes: &[u8]) -> Result<Vec<NumberedLine>, AppError> {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(detect_delimiter(bytes))
        .from_reader(bytes);

    let mut lines = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| AppError::bad_request(format!("Could not read the CSV file: {}", e)))?;
        let number = record
            .position()
            .and_then(|p| usize::try_from(p.line()).ok())
            .unwrap_or(idx + 1);
        lines.push((number, record.iter().map(|cell| cell.trim().to_string()).collect()));
    }
    Ok(lines)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
    }
}

/// Reads the first worksheet.
fn read_excel(bytes: &[u8]) -> Result<Vec<NumberedLine>, AppError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| AppError::bad_request(format!("Could not open the spreadsheet: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::bad_request("The spreadsheet has no sheets."))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::bad_request(format!("Could not read sheet '{}': {}", sheet_name, e)))?;

    Ok(range
        .rows()
        .enumerate()
        .map(|(idx, row)| (idx + 1, row.iter().map(cell_to_string).collect()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_extensions() {
        assert!(matches!(parse_sheet("data.pdf", b"x"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn csv_header_is_first_non_blank_line_and_bom_is_stripped() {
        let csv = "\u{feff}\n,,\nDate,Rooms Sold, Revenue \n2024-05-01,10,1000\n,,\n2024-05-02, 12 ,1250.50\n";
        let sheet = parse_sheet("bookings.csv", csv.as_bytes()).unwrap();

        assert_eq!(sheet.headers, vec!["Date", "Rooms Sold", "Revenue"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].number, 4);
        assert_eq!(sheet.rows[1].number, 6);
        assert_eq!(sheet.rows[1].values[1], ("Rooms Sold".to_string(), "12".to_string()));
    }

    #[test]
    fn blank_csv_lines_keep_file_line_numbers() {
        let sheet = parse_sheet("rates.csv", b"Date,Competitor,Rate\n\n2024-05-01,Rival,abc\n\n\n2024-05-02,Rival,90\n").unwrap();
        let numbers: Vec<usize> = sheet.rows.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![3, 6]);
    }

    #[test]
    fn semicolon_csv_is_detected() {
        let csv = "Date;Price\n01/05/2024;99,50\n";
        let sheet = parse_sheet("prices.csv", csv.as_bytes()).unwrap();
        assert_eq!(sheet.headers, vec!["Date", "Price"]);
        assert_eq!(sheet.rows[0].values[1].1, "99,50");
    }

    #[test]
    fn short_rows_are_padded() {
        let sheet = parse_sheet("a.csv", b"A,B,C\n1\n").unwrap();
        assert_eq!(sheet.rows[0].values.len(), 3);
        assert_eq!(sheet.rows[0].values[2].1, "");
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(matches!(parse_sheet("a.csv", b"\n\n"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn reads_first_sheet_of_an_xlsx_workbook() {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Date").unwrap();
        sheet.write_string(0, 1, "Rate").unwrap();
        sheet.write_string(0, 2, "Competitor").unwrap();
        // 45413 is 2024-05-01 as an Excel serial
        sheet.write_number(1, 0, 45413.0).unwrap();
        sheet.write_number(1, 1, 120.5).unwrap();
        sheet.write_string(1, 2, "Hotel Rival").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let parsed = parse_sheet("competitors.xlsx", &bytes).unwrap();
        assert_eq!(parsed.headers, vec!["Date", "Rate", "Competitor"]);
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].values[0].1, "45413");
        assert_eq!(parsed.rows[0].values[1].1, "120.5");
        assert_eq!(parsed.rows[0].values[2].1, "Hotel Rival");
    }
}
