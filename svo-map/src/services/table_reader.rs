//! Input table reading
//!
//! Spreadsheets (`.xlsx`, `.xlsm`, `.xls`, `.ods`) are read with calamine
//! from the first worksheet; `.csv` files with the csv crate. In both cases
//! the first row holds the headers. Cells are converted into a small `Cell`
//! enum, then mapped onto `ServiceRecord`s by header name.
//!
//! Unparseable timestamps become `None` (unscheduled) rather than errors,
//! matching how the spreadsheets are filled in by hand.

use crate::error::{MapError, MapResult};
use crate::models::ServiceRecord;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::Path;
use svo_common::config::ColumnConfig;
use tracing::{debug, info};

/// One cell, reduced to what the pipeline needs
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Text form; `None` for empty or blank cells
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Timestamp form; `None` when empty or not a recognizable date
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            Cell::Text(s) => parse_timestamp(s),
            Cell::Empty | Cell::Number(_) => None,
        }
    }
}

/// Header row plus data rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Index of the column whose trimmed header equals `name`
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name.trim())
    }
}

/// Parse a timestamp written as text
///
/// Accepts ISO dates with optional time (space or `T` separator), RFC 3339
/// (offset dropped) and Brazilian `DD/MM/YYYY` with optional time.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Read the input file into a `Table`
///
/// # Errors
/// `InputNotFound`, `UnsupportedFormat` or `UnreadableInput`.
pub fn read_table(path: &Path) -> MapResult<Table> {
    if !path.exists() {
        return Err(MapError::InputNotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let table = match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_spreadsheet(path)?,
        "csv" => read_csv(path)?,
        _ => return Err(MapError::UnsupportedFormat(path.to_path_buf())),
    };

    debug!(
        path = %path.display(),
        columns = table.headers.len(),
        rows = table.rows.len(),
        "Read input table"
    );
    Ok(table)
}

fn read_spreadsheet(path: &Path) -> MapResult<Table> {
    let unreadable = |message: String| MapError::UnreadableInput {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| unreadable("workbook has no worksheets".to_string()))?
        .map_err(|e| unreadable(e.to_string()))?;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|header| {
            header
                .iter()
                .map(|c| cell_from_data(c).as_text().unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();

    Ok(Table {
        headers,
        rows: rows
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect(),
    })
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => dt.as_datetime().map_or(Cell::Empty, Cell::DateTime),
    }
}

fn read_csv(path: &Path) -> MapResult<Table> {
    let unreadable = |message: String| MapError::UnreadableInput {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| unreadable(e.to_string()))?;

    let headers = reader
        .byte_headers()
        .map_err(|e| unreadable(e.to_string()))?
        .iter()
        .map(|h| decode_field(h).trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| unreadable(e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let text = decode_field(field);
                    if text.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(text)
                    }
                })
                .collect(),
        );
    }

    Ok(Table { headers, rows })
}

/// Decode one CSV field: UTF-8 when valid, otherwise Latin-1
///
/// Spreadsheet exports on Windows are often Latin-1; every byte maps to one
/// char, so a stray non-UTF-8 cell never makes the file unreadable.
fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Map table rows onto service records
///
/// `scheduled_for`, `neighborhood`, `city` and `order_id` columns are
/// required; `status` is optional.
///
/// # Errors
/// `MissingColumn` naming the first absent required header.
pub fn parse_records(
    table: &Table,
    columns: &ColumnConfig,
    source: &Path,
) -> MapResult<Vec<ServiceRecord>> {
    let require = |name: &str| {
        table
            .column_index(name)
            .ok_or_else(|| MapError::MissingColumn {
                path: source.to_path_buf(),
                column: name.to_string(),
            })
    };

    let scheduled_idx = require(&columns.scheduled_for)?;
    let neighborhood_idx = require(&columns.neighborhood)?;
    let city_idx = require(&columns.city)?;
    let order_idx = require(&columns.order_id)?;
    let status_idx = table.column_index(&columns.status);

    let cell = |row: &[Cell], idx: usize| row.get(idx).cloned().unwrap_or(Cell::Empty);

    let records: Vec<ServiceRecord> = table
        .rows
        .iter()
        .filter(|row| row.iter().any(|c| *c != Cell::Empty))
        .map(|row| ServiceRecord {
            order_id: cell(row, order_idx).as_text().unwrap_or_default(),
            scheduled_for: cell(row, scheduled_idx).as_datetime(),
            neighborhood: cell(row, neighborhood_idx).as_text(),
            city: cell(row, city_idx).as_text(),
            status: status_idx.and_then(|idx| cell(row, idx).as_text()),
        })
        .collect();

    info!(
        path = %source.display(),
        records = records.len(),
        "Parsed service records"
    );
    Ok(records)
}

/// First non-blank city in file order
pub fn first_city(records: &[ServiceRecord]) -> Option<String> {
    records
        .iter()
        .filter_map(|r| r.city.as_deref())
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(String::from)
}

/// Read and parse in one step
pub fn load_records(path: &Path, columns: &ColumnConfig) -> MapResult<Vec<ServiceRecord>> {
    let table = read_table(path)?;
    parse_records(&table, columns, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("2025-03-07 14:30:00"), Some(dt(2025, 3, 7, 14, 30)));
        assert_eq!(parse_timestamp("2025-03-07T14:30"), Some(dt(2025, 3, 7, 14, 30)));
        assert_eq!(parse_timestamp("2025-03-07"), Some(dt(2025, 3, 7, 0, 0)));
        assert_eq!(parse_timestamp("07/03/2025 14:30"), Some(dt(2025, 3, 7, 14, 30)));
        assert_eq!(parse_timestamp("07/03/2025"), Some(dt(2025, 3, 7, 0, 0)));
        assert_eq!(
            parse_timestamp("2025-03-07T14:30:00-03:00"),
            Some(dt(2025, 3, 7, 14, 30))
        );
    }

    #[test]
    fn test_parse_timestamp_coerces_garbage_to_none() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("a combinar"), None);
        assert_eq!(parse_timestamp("31/02/2025"), None);
    }

    #[test]
    fn test_cell_text_forms() {
        assert_eq!(Cell::Number(12.0).as_text().as_deref(), Some("12"));
        assert_eq!(Cell::Number(1.5).as_text().as_deref(), Some("1.5"));
        assert_eq!(Cell::Text("  ".to_string()).as_text(), None);
        assert_eq!(Cell::Empty.as_text(), None);
    }

    fn table() -> Table {
        Table {
            headers: vec![
                "SVO".to_string(),
                "Agendado para".to_string(),
                "Bairro Consumidor".to_string(),
                " Cidade Consumidor ".to_string(),
            ],
            rows: vec![
                vec![
                    Cell::Text("SVO-1".to_string()),
                    Cell::DateTime(dt(2025, 3, 7, 9, 0)),
                    Cell::Text("Centro".to_string()),
                    Cell::Text("Campinas".to_string()),
                ],
                vec![
                    Cell::Text("SVO-2".to_string()),
                    Cell::Text("sem data".to_string()),
                    Cell::Text("Cambuí".to_string()),
                ],
                vec![Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty],
            ],
        }
    }

    #[test]
    fn test_parse_records_maps_columns_and_skips_blank_rows() {
        let records = parse_records(&table(), &ColumnConfig::default(), Path::new("t.xlsx")).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].order_id, "SVO-1");
        assert_eq!(records[0].scheduled_for, Some(dt(2025, 3, 7, 9, 0)));
        assert_eq!(records[0].city.as_deref(), Some("Campinas"));
        assert_eq!(records[0].status, None);
        // Short row: missing trailing cells read as empty
        assert_eq!(records[1].scheduled_for, None);
        assert_eq!(records[1].city, None);
    }

    #[test]
    fn test_parse_records_reports_missing_column() {
        let mut t = table();
        t.headers[2] = "Bairro".to_string();

        let err = parse_records(&t, &ColumnConfig::default(), Path::new("t.xlsx")).unwrap_err();
        assert!(matches!(
            err,
            MapError::MissingColumn { ref column, .. } if column == "Bairro Consumidor"
        ));
    }

    #[test]
    fn test_first_city_skips_blank_rows() {
        let mut records = parse_records(&table(), &ColumnConfig::default(), Path::new("t.xlsx")).unwrap();
        assert_eq!(first_city(&records).as_deref(), Some("Campinas"));

        records.swap(0, 1);
        assert_eq!(first_city(&records).as_deref(), Some("Campinas"));
        assert_eq!(first_city(&records[..1]), None);
    }

    #[test]
    fn test_read_csv_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.csv");
        fs::write(
            &path,
            "\u{feff}SVO,Agendado para,Bairro Consumidor,Cidade Consumidor,Status da OS\n\
             SVO-1,2025-03-07 09:00:00,Centro,Campinas,Aberta\n\
             SVO-2,,Cambuí,Campinas,\n",
        )
        .unwrap();

        let records = load_records(&path, &ColumnConfig::default()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status.as_deref(), Some("Aberta"));
        assert_eq!(records[0].scheduled_for, Some(dt(2025, 3, 7, 9, 0)));
        assert_eq!(records[1].scheduled_for, None);
        assert_eq!(records[1].status, None);
    }

    #[test]
    fn test_read_latin1_csv_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.csv");
        let mut content =
            b"SVO,Agendado para,Bairro Consumidor,Cidade Consumidor\nSVO-1,2025-03-07,Cambu".to_vec();
        content.push(0xED); // 'í' in Latin-1
        content.extend_from_slice(b",Campinas\nSVO-2,2025-03-08,Centro,Campinas\n");
        fs::write(&path, content).unwrap();

        let records = load_records(&path, &ColumnConfig::default()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].neighborhood.as_deref(), Some("Cambuí"));
        assert_eq!(records[1].neighborhood.as_deref(), Some("Centro"));
    }

    #[test]
    fn test_decode_field_prefers_utf8() {
        assert_eq!(decode_field("Cambuí".as_bytes()), "Cambuí");
        assert_eq!(decode_field(&[b'S', 0xE3, b'o']), "São");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = read_table(Path::new("/nonexistent/orders.xlsx")).unwrap_err();
        assert!(matches!(err, MapError::InputNotFound(_)));
    }

    #[test]
    fn test_unknown_extension_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.txt");
        fs::write(&path, "x").unwrap();

        assert!(matches!(read_table(&path), Err(MapError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_corrupt_spreadsheet_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.xlsx");
        fs::write(&path, "not a zip archive").unwrap();

        assert!(matches!(read_table(&path), Err(MapError::UnreadableInput { .. })));
    }
}
