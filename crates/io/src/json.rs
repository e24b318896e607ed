// JSON export

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use deltagrid_recon::{Table, Value};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::IoError;

/// Table as an array of objects, keys in column order.
struct Records<'a>(&'a Table);

struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.num_rows()))?;
        for row in self.0.rows() {
            seq.serialize_element(&Record {
                columns: self.0.columns(),
                values: row,
            })?;
        }
        seq.end()
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Export table as a JSON array of objects. Nulls stay `null`.
pub fn export(table: &Table, path: &Path) -> Result<(), IoError> {
    write_value(path, &Records(table))
}

pub fn to_string(table: &Table) -> Result<String, IoError> {
    Ok(serde_json::to_string_pretty(&Records(table))?)
}

/// Pretty-print any serializable value to `path`.
pub fn write_value<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), IoError> {
    let file = File::create(path).map_err(|e| IoError::read(path, e))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}
