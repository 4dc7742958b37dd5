//! Spreadsheet decoding via calamine (xlsx, xls, xlsb, ods).

use crate::error::{ReportError, Result};
use crate::schema::{CellValue, SheetGrid, Workbook};
use calamine::{open_workbook_auto, Data, ExcelDateTime, Reader};
use chrono::Timelike;
use log::debug;
use std::path::Path;

/// Reads every sheet of the file at `path` into a [`Workbook`].
pub fn read_workbook(path: impl AsRef<Path>) -> Result<Workbook> {
    let path = path.as_ref();
    let mut sheets = open_workbook_auto(path)
        .map_err(|e| ReportError::Workbook(format!("{}: {}", path.display(), e)))?;

    let mut workbook = Workbook::new();
    for name in sheets.sheet_names() {
        let range = sheets
            .worksheet_range(&name)
            .map_err(|e| ReportError::Workbook(format!("sheet '{}': {}", name, e)))?;

        let grid: SheetGrid = range
            .rows()
            .map(|row| row.iter().map(to_cell).collect())
            .collect();

        debug!("Decoded sheet '{}' with {} row(s)", name, grid.len());
        workbook.insert_sheet(name, grid);
    }

    Ok(workbook)
}

fn to_cell(data: &Data) -> CellValue {
    match data {
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => CellValue::Text(render_datetime(dt)),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Empty,
    }
}

/// Dates render as `YYYY-MM-DD`, with the time appended when it is not midnight.
/// Durations keep their serial value.
fn render_datetime(dt: &ExcelDateTime) -> String {
    match dt.as_datetime() {
        Some(value) if dt.is_datetime() => {
            if value.num_seconds_from_midnight() == 0 {
                value.format("%Y-%m-%d").to_string()
            } else {
                value.format("%Y-%m-%d %H:%M:%S").to_string()
            }
        }
        _ => dt.as_f64().to_string(),
    }
}
