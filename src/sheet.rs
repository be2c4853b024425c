//! Spreadsheet decoding: base64 attachment payload to an in-memory table.
//!
//! The first row is always treated as column headers. Excel workbooks go
//! through calamine (first worksheet only, which is how the export tool
//! writes them); csv/tsv attachments go through the csv crate. Every
//! failure mode here is a [`IngestError::Decode`] so the orchestrator can
//! keep processing sibling attachments.

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::NaiveDateTime;
use log::debug;

use crate::error::IngestError;

/// One decoded cell. Excel preserves native types; csv yields text only.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

/// Header row plus data rows, padded/truncated to the header width.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls", "xlsm", "csv", "tsv"];

/// Decodes a base64 attachment into a [`Sheet`].
///
/// The filename gates on extension before any decoding happens, so a PDF
/// or image attachment is rejected cheaply.
pub fn decode_attachment(filename: &str, data: &str) -> Result<Sheet, IngestError> {
    let extension = filename
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !filename.contains('.') || !SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        return Err(IngestError::Decode(format!(
            "'{filename}' is not a spreadsheet (expected one of {SPREADSHEET_EXTENSIONS:?})"
        )));
    }

    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|err| IngestError::Decode(format!("invalid base64 in '{filename}': {err}")))?;
    debug!("decoded {} byte(s) from '{filename}'", bytes.len());

    let sheet = match extension.as_str() {
        "csv" => parse_delimited(&bytes, b',', filename)?,
        "tsv" => parse_delimited(&bytes, b'\t', filename)?,
        _ => parse_workbook(bytes, filename)?,
    };

    if sheet.headers.is_empty() || sheet.rows.is_empty() {
        return Err(IngestError::Decode(format!(
            "'{filename}' parsed to an empty table"
        )));
    }
    Ok(sheet)
}

fn parse_workbook(bytes: Vec<u8>, filename: &str) -> Result<Sheet, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|err| IngestError::Decode(format!("unreadable workbook '{filename}': {err}")))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestError::Decode(format!("'{filename}' contains no worksheets")))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| IngestError::Decode(format!("unreadable worksheet '{sheet_name}': {err}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(header_text).collect())
        .unwrap_or_default();
    let width = headers.len();

    let data_rows = rows
        .map(|row| {
            let mut cells: Vec<Cell> = row.iter().take(width).map(convert_cell).collect();
            cells.resize(width, Cell::Empty);
            cells
        })
        .collect();

    Ok(Sheet {
        headers,
        rows: data_rows,
    })
}

fn parse_delimited(bytes: &[u8], delimiter: u8, filename: &str) -> Result<Sheet, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| IngestError::Decode(format!("unreadable header row in '{filename}': {err}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let width = headers.len();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|err| IngestError::Decode(format!("unreadable row in '{filename}': {err}")))?;
        let mut cells: Vec<Cell> = record
            .iter()
            .take(width)
            .map(|field| {
                if field.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        cells.resize(width, Cell::Empty);
        rows.push(cells);
    }

    Ok(Sheet { headers, rows })
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn convert_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(parsed) => Cell::DateTime(parsed),
            None => Cell::Text(dt.to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(format!("#ERR({e:?})")),
    }
}
