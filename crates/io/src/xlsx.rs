// Excel import (calamine) / export (rust_xlsxwriter)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use deltagrid_recon::{Table, Value};
use rust_xlsxwriter::{Format, Workbook};

use crate::csv::dedupe_headers;
use crate::error::IoError;

/// Largest integer Excel stores without losing digits (15 significant).
const EXCEL_EXACT_INT: u64 = 999_999_999_999_999;

/// Read one worksheet (the first when `sheet` is `None`). The first row is the header.
pub fn import(path: &Path, sheet: Option<&str>, infer_types: bool) -> Result<Table, IoError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| IoError::xlsx(path, e))?;

    let sheet_names = workbook.sheet_names();
    let name = match sheet {
        Some(name) if sheet_names.iter().any(|s| s == name) => name.to_string(),
        Some(name) => {
            return Err(IoError::xlsx(
                path,
                format!("sheet '{name}' not found (have: {})", sheet_names.join(", ")),
            ))
        }
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| IoError::xlsx(path, "workbook contains no sheets"))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| IoError::xlsx(path, format!("failed to read sheet '{name}': {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(header_text).collect(),
        None => return Ok(Table::default()),
    };
    let mut table = Table::new(dedupe_headers(headers));

    for row in rows {
        let values: Vec<Value> = row.iter().map(|cell| cell_value(cell, infer_types)).collect();
        if values.iter().all(Value::is_null) {
            continue;
        }
        table.push_row(values)?;
    }

    log::debug!(
        "xlsx: {}[{name}]: {} row(s) x {} column(s)",
        path.display(),
        table.num_rows(),
        table.num_columns()
    );
    Ok(table)
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell, false) {
        Value::Null => String::new(),
        v => v.to_text().unwrap_or_default(),
    }
}

fn cell_value(cell: &Data, infer_types: bool) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) if infer_types => Value::infer(s),
        Data::String(s) => Value::Text(s.clone()),
        // Integral floats are how Excel stores whole numbers.
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => Value::Int(*n as i64),
        Data::Float(n) => Value::from(*n),
        Data::Int(n) => Value::Int(*n),
        Data::Bool(b) => Value::Bool(*b),
        Data::Error(e) => Value::Text(format!("#{e:?}")),
        Data::DateTime(dt) => serial_to_value(dt.as_f64()),
        Data::DateTimeIso(s) => parse_iso(s),
        Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

/// Excel 1900 date system serial → `Date` (whole days) or `DateTime`.
fn serial_to_value(serial: f64) -> Value {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return Value::from(serial);
    };
    let days = serial.trunc() as i64;
    let secs = (serial.fract() * 86_400.0).round() as i64;
    let Some(date) = epoch.checked_add_signed(Duration::days(days)) else {
        return Value::from(serial);
    };
    if secs == 0 {
        return Value::Date(date);
    }
    match date.and_hms_opt(0, 0, 0) {
        Some(midnight) => Value::DateTime(midnight + Duration::seconds(secs)),
        None => Value::from(serial),
    }
}

fn parse_iso(s: &str) -> Value {
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Value::DateTime(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Value::Date(d);
    }
    Value::Text(s.to_string())
}

/// Write `table` to a single-sheet workbook: bold frozen header, then rows.
pub fn export(table: &Table, path: &Path, sheet_name: &str) -> Result<(), IoError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sheet_name)
        .map_err(|e| IoError::xlsx(path, format!("failed to create sheet '{sheet_name}': {e}")))?;

    let header = Format::new().set_bold();
    for (col, name) in table.columns().iter().enumerate() {
        let col = column_number(path, col)?;
        worksheet
            .write_string_with_format(0, col, name, &header)
            .map_err(|e| IoError::xlsx(path, e))?;
    }
    worksheet
        .set_freeze_panes(1, 0)
        .map_err(|e| IoError::xlsx(path, e))?;

    for (r, row) in table.rows().iter().enumerate() {
        let row32 = u32::try_from(r + 1)
            .map_err(|_| IoError::xlsx(path, format!("row {r} out of range")))?;
        for (c, value) in row.iter().enumerate() {
            let col = column_number(path, c)?;
            let written = match value {
                Value::Null => continue,
                Value::Bool(b) => worksheet.write_boolean(row32, col, *b),
                Value::Int(i) if i.unsigned_abs() <= EXCEL_EXACT_INT => {
                    worksheet.write_number(row32, col, *i as f64)
                }
                Value::Float(x) => worksheet.write_number(row32, col, x.into_inner()),
                other => worksheet.write_string(row32, col, other.to_text().unwrap_or_default()),
            };
            written.map_err(|e| {
                IoError::xlsx(path, format!("failed to write cell ({}, {c}): {e}", r + 1))
            })?;
        }
    }

    workbook
        .save(path)
        .map_err(|e| IoError::xlsx(path, format!("failed to save: {e}")))?;
    Ok(())
}

fn column_number(path: &Path, col: usize) -> Result<u16, IoError> {
    u16::try_from(col).map_err(|_| IoError::xlsx(path, format!("column {col} out of range")))
}
