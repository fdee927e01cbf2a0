use crate::error::FileError;
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDateTime, NaiveTime};
use model::records::sheet::Sheet;
use std::io::Cursor;

/// Reads the first worksheet of an xlsx/xlsm/xls/ods workbook.
pub fn read_workbook(name: &str, bytes: &[u8]) -> Result<Sheet, FileError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FileError::InvalidFormat {
            name: name.to_string(),
            reason: "workbook has no sheets".to_string(),
        })??;

    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(render_cell).collect())
        .collect();

    if rows.is_empty() {
        return Err(FileError::InvalidFormat {
            name: name.to_string(),
            reason: "first sheet is empty".to_string(),
        });
    }
    Ok(Sheet::new(rows))
}

/// Display string of a cell, as a spreadsheet user would read it.
pub fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => render_float(*f),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => render_datetime(value),
            None => render_float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Error(e) => e.to_string(),
    }
}

fn render_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn render_datetime(value: NaiveDateTime) -> String {
    if value.time() == NaiveTime::MIN {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
