use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ReconError;
use crate::schema::SchemaWarning;
use crate::table::Table;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Sides
// ---------------------------------------------------------------------------

/// Which snapshot a value or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Previously published (modeled) state.
    Old,
    /// Freshly extracted (raw) state.
    New,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Old => write!(f, "old"),
            Self::New => write!(f, "new"),
        }
    }
}

/// A key seen more than once within one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyCount {
    pub key: Value,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Class of a key across the two snapshots. `Unchanged` never appears in a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ChangeType {
    New,
    Modified,
    Deleted,
    Unchanged,
}

impl ChangeType {
    pub fn is_logged(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Modified => "Modified",
            Self::Deleted => "Deleted",
            Self::Unchanged => "Unchanged",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Old/new pair for one watched field. An absent side is `Null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDelta {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

impl FieldDelta {
    /// Both sides present and different. Nulls never count as a change.
    pub fn changed(&self) -> bool {
        !self.old.is_null() && !self.new.is_null() && !self.old.same_as(&self.new)
    }
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeLogEntry {
    pub log_id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub change_type: ChangeType,
    pub source_label: String,
    pub key_old: Value,
    pub key_new: Value,
    pub fields: Vec<FieldDelta>,
}

impl ChangeLogEntry {
    /// The key that is present, preferring the old side.
    pub fn key(&self) -> &Value {
        if self.key_old.is_null() {
            &self.key_new
        } else {
            &self.key_old
        }
    }
}

/// Entries of one detection run, sorted ascending by key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeLog {
    pub watched: Vec<String>,
    pub entries: Vec<ChangeLogEntry>,
}

impl ChangeLog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, change_type: ChangeType) -> usize {
        self.entries.iter().filter(|e| e.change_type == change_type).count()
    }

    /// Column order of the log table.
    pub fn column_names(&self) -> Vec<String> {
        let mut cols: Vec<String> = [
            "log_id",
            "captured_at",
            "change_type",
            "source_label",
            "key_old",
            "key_new",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for field in &self.watched {
            cols.push(format!("{field}_old"));
            cols.push(format!("{field}_new"));
        }
        cols
    }

    /// Flatten into the persisted log table layout.
    pub fn to_table(&self) -> Result<Table, ReconError> {
        let mut table = Table::new(self.column_names());
        for entry in &self.entries {
            let mut row = vec![
                Value::Text(entry.log_id.to_string()),
                Value::Text(entry.captured_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
                Value::Text(entry.change_type.to_string()),
                Value::Text(entry.source_label.clone()),
                entry.key_old.clone(),
                entry.key_new.clone(),
            ];
            for delta in &entry.fields {
                row.push(delta.old.clone());
                row.push(delta.new.clone());
            }
            table.push_row(row)?;
        }
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconSummary {
    pub name: String,
    pub source_label: String,
    pub old_rows: usize,
    pub new_rows: usize,
    pub new: usize,
    pub modified: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub merged_rows: usize,
    pub warnings: Vec<SchemaWarning>,
    pub engine_version: String,
    pub run_at: String,
}
