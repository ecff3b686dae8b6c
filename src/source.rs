//! Reads an uploaded workbook into a [`RawSheetSet`].
//!
//! Two shapes are accepted: a spreadsheet file (anything calamine opens) and a
//! directory holding one CSV file per sheet.

use std::fs;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, info};

use crate::error::DashboardError;
use crate::models::{CellValue, RawSheetSet, Sheet};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn load_workbook(path: &Path) -> Result<RawSheetSet, DashboardError> {
    let sheets = if path.is_dir() {
        load_csv_dir(path)?
    } else {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            ext if WORKBOOK_EXTENSIONS.contains(&ext) => load_spreadsheet(path)?,
            _ => return Err(DashboardError::UnsupportedSource(path.to_path_buf())),
        }
    };

    info!(
        path = %path.display(),
        sheets = sheets.sheets.len(),
        "workbook loaded"
    );
    Ok(sheets)
}

fn load_spreadsheet(path: &Path) -> Result<RawSheetSet, DashboardError> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names().to_vec();

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook.worksheet_range(&name)?;
        // Ranges start at the first used cell; pad so column indices stay absolute.
        let lead_columns = range.start().map(|(_, col)| col as usize).unwrap_or(0);
        let rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| {
                std::iter::repeat(CellValue::Empty)
                    .take(lead_columns)
                    .chain(row.iter().map(cell_from_data))
                    .collect()
            })
            .collect();
        debug!(sheet = %name, rows = rows.len(), "read worksheet");
        sheets.push(Sheet::from_rows(name, rows));
    }
    Ok(RawSheetSet::new(sheets))
}

fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(text) => CellValue::from_text(text),
        Data::Float(value) => CellValue::Number(*value),
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Bool(value) => CellValue::Bool(*value),
        Data::Error(err) => CellValue::Text(format!("{err:?}")),
        Data::DateTime(value) => CellValue::Number(value.as_f64()),
        Data::DateTimeIso(text) => CellValue::Text(text.clone()),
        Data::DurationIso(text) => CellValue::Text(text.clone()),
    }
}

/// Every `*.csv` in the directory becomes a sheet named after the file stem,
/// in file-name order.
fn load_csv_dir(dir: &Path) -> Result<RawSheetSet, DashboardError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            paths.push(path);
        }
    }
    paths.sort();

    let sheets = paths
        .iter()
        .map(|path| load_csv_file(path))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawSheetSet::new(sheets))
}

fn load_csv_file(path: &Path) -> Result<Sheet, DashboardError> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(cell_from_text).collect());
    }
    debug!(sheet = %name, rows = rows.len(), "read csv sheet");
    Ok(Sheet::from_rows(name, rows))
}

/// CSV cells arrive as text; numeric-looking ones become numbers the way a
/// spreadsheet parser would type them.
fn cell_from_text(text: &str) -> CellValue {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => CellValue::Number(value),
        _ => CellValue::from_text(text),
    }
}
