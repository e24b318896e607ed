//! Extension-driven dispatch to the CSV / Excel / JSON adapters.

use std::path::Path;

use deltagrid_recon::Table;

use crate::csv::CsvOptions;
use crate::error::IoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Excel,
    Json,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Excel),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Formats [`read_table`] can load.
    pub fn is_readable(self) -> bool {
        !matches!(self, Self::Json)
    }
}

/// Options for [`read_table`]; fields that do not apply to a format are ignored.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub sheet: Option<String>,
    pub csv: CsvOptions,
}

pub fn read_table(path: &Path, options: &ReadOptions) -> Result<Table, IoError> {
    match FileFormat::from_path(path) {
        Some(FileFormat::Csv) => crate::csv::import(path, &options.csv),
        Some(FileFormat::Tsv) => crate::csv::import(
            path,
            &CsvOptions {
                delimiter: Some(options.csv.delimiter.unwrap_or(b'\t')),
                ..options.csv
            },
        ),
        Some(FileFormat::Excel) => {
            crate::xlsx::import(path, options.sheet.as_deref(), options.csv.infer_types)
        }
        Some(FileFormat::Json) | None => Err(IoError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Write `table`; the extension picks the format. Excel output uses `sheet_name`.
pub fn write_table(table: &Table, path: &Path, sheet_name: &str) -> Result<(), IoError> {
    match FileFormat::from_path(path) {
        Some(FileFormat::Csv) => crate::csv::export(table, path, b','),
        Some(FileFormat::Tsv) => crate::csv::export(table, path, b'\t'),
        Some(FileFormat::Excel) => crate::xlsx::export(table, path, sheet_name),
        Some(FileFormat::Json) => crate::json::export(table, path),
        None => Err(IoError::UnsupportedFormat(path.to_path_buf())),
    }
}
