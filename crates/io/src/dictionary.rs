//! Data dictionary: which column is the business key and which are watched.
//!
//! One row per column of the subject table. The row whose role is `PK` names
//! the key; every other listed column is watched.

use std::path::{Path, PathBuf};

use deltagrid_recon::{Table, Value};

use crate::csv::CsvOptions;
use crate::error::IoError;
use crate::format::{read_table, ReadOptions};

const COLUMN_HEADERS: &[&str] = &["column", "nombre_columna"];
const ROLE_HEADERS: &[&str] = &["role", "jerarquia"];
const KEY_ROLE: &str = "PK";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDictionary {
    pub key: String,
    pub watched: Vec<String>,
}

/// Load a dictionary from CSV or Excel; `sheet` selects the worksheet of an
/// Excel dictionary that holds one sheet per subject.
pub fn load(path: &Path, sheet: Option<&str>) -> Result<DataDictionary, IoError> {
    let options = ReadOptions {
        sheet: sheet.map(str::to_string),
        csv: CsvOptions {
            delimiter: None,
            infer_types: false,
        },
    };
    let table = read_table(path, &options)?;
    let dictionary = from_table(&table).map_err(|message| IoError::Dictionary {
        path: PathBuf::from(path),
        message,
    })?;
    log::debug!(
        "dictionary: key '{}', {} watched column(s)",
        dictionary.key,
        dictionary.watched.len()
    );
    Ok(dictionary)
}

pub fn from_table(table: &Table) -> Result<DataDictionary, String> {
    let column_col = find_header(table, COLUMN_HEADERS)?;
    let role_col = find_header(table, ROLE_HEADERS)?;

    let mut key: Option<String> = None;
    let mut watched = Vec::new();
    for row in table.rows() {
        let Some(name) = row[column_col].to_text().map(|s| s.trim().to_string()) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let is_key = matches!(&row[role_col], Value::Text(r) if r.trim().eq_ignore_ascii_case(KEY_ROLE));
        if is_key {
            if let Some(existing) = &key {
                return Err(format!("more than one PK column: '{existing}' and '{name}'"));
            }
            key = Some(name);
        } else if !watched.contains(&name) {
            watched.push(name);
        }
    }

    let key = key.ok_or_else(|| "no column has role PK".to_string())?;
    watched.retain(|c| c != &key);
    Ok(DataDictionary { key, watched })
}

fn find_header(table: &Table, accepted: &[&str]) -> Result<usize, String> {
    table
        .columns()
        .iter()
        .position(|c| accepted.iter().any(|a| c.trim().eq_ignore_ascii_case(a)))
        .ok_or_else(|| format!("missing '{}' header", accepted[0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn csv_dictionary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dict.csv");
        fs::write(
            &path,
            "column,role,description\nRadicado,PK,id\nEstado,,estado\nRpta,attr,\n",
        )
        .unwrap();

        let dict = load(&path, None).unwrap();
        assert_eq!(dict.key, "Radicado");
        assert_eq!(dict.watched, ["Estado", "Rpta"]);
    }

    #[test]
    fn spanish_headers_are_accepted() {
        let table = Table::from_rows(
            ["Nombre_columna", "Jerarquia"],
            vec![
                vec!["Estado".into(), Value::Null],
                vec!["Radicado".into(), "pk".into()],
            ],
        )
        .unwrap();
        let dict = from_table(&table).unwrap();
        assert_eq!(dict.key, "Radicado");
        assert_eq!(dict.watched, ["Estado"]);
    }

    #[test]
    fn excel_dictionary_by_sheet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dict.xlsx");
        let table = Table::from_rows(
            ["Nombre_columna", "Jerarquia"],
            vec![vec!["id".into(), "PK".into()], vec!["status".into(), Value::Null]],
        )
        .unwrap();
        crate::xlsx::export(&table, &path, "creditos").unwrap();

        let dict = load(&path, Some("creditos")).unwrap();
        assert_eq!(dict, DataDictionary { key: "id".into(), watched: vec!["status".into()] });
    }

    #[test]
    fn missing_pk_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dict.csv");
        fs::write(&path, "column,role\nEstado,\n").unwrap();
        let err = load(&path, None).unwrap_err();
        assert!(err.to_string().contains("no column has role PK"));
    }

    #[test]
    fn two_pks_are_an_error() {
        let table = Table::from_rows(
            ["column", "role"],
            vec![vec!["a".into(), "PK".into()], vec!["b".into(), "PK".into()]],
        )
        .unwrap();
        assert!(from_table(&table).unwrap_err().contains("more than one PK"));
    }

    #[test]
    fn missing_headers_are_an_error() {
        let table = Table::new(["name", "role"]);
        assert_eq!(from_table(&table).unwrap_err(), "missing 'column' header");
    }
}
