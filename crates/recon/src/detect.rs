//! Change detection: full outer join on the business key, classification of
//! every key, and the audit log of watched-field changes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ReconError;
use crate::keys::{check_key_kinds, index_keys, outer_join, JoinedKey};
use crate::model::{ChangeLog, ChangeLogEntry, ChangeType, FieldDelta, Side};
use crate::schema::require_columns;
use crate::table::Table;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Stamping
// ---------------------------------------------------------------------------

/// Source of the non-deterministic parts of a log entry.
pub trait Stamper {
    /// A fresh identifier, unique per entry.
    fn log_id(&mut self) -> Uuid;
    /// Capture time; called once per detection run.
    fn now(&mut self) -> DateTime<Utc>;
}

/// Random v4 ids and the wall clock.
#[derive(Debug, Default)]
pub struct SystemStamper;

impl Stamper for SystemStamper {
    fn log_id(&mut self) -> Uuid {
        Uuid::new_v4()
    }

    fn now(&mut self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Sequential ids (`00000000-…-0001`, `…-0002`, …) and a fixed clock.
/// For reproducible output in dry runs and tests.
#[derive(Debug, Clone)]
pub struct SequenceStamper {
    at: DateTime<Utc>,
    next: u128,
}

impl SequenceStamper {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at, next: 1 }
    }
}

impl Stamper for SequenceStamper {
    fn log_id(&mut self) -> Uuid {
        let id = Uuid::from_u128(self.next);
        self.next += 1;
        id
    }

    fn now(&mut self) -> DateTime<Utc> {
        self.at
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// One key of the union keyspace with its class and watched-field pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedKey {
    pub key: Value,
    pub change_type: ChangeType,
    pub old_row: Option<usize>,
    pub new_row: Option<usize>,
    pub fields: Vec<FieldDelta>,
}

/// Every key of `old ∪ new`, each in exactly one class, ascending by key.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub keys: Vec<ClassifiedKey>,
}

impl Classification {
    pub fn count(&self, change_type: ChangeType) -> usize {
        self.keys.iter().filter(|k| k.change_type == change_type).count()
    }
}

/// Classify every key of `old ∪ new` on `key` by the `watched` fields.
///
/// Preconditions checked before joining: key and watched columns present,
/// no null or duplicate keys on either side, one key kind across both sides.
pub fn classify(
    old: &Table,
    new: &Table,
    key: &str,
    watched: &[String],
) -> Result<Classification, ReconError> {
    require_columns(old, Side::Old, key, watched)?;
    require_columns(new, Side::New, key, watched)?;

    let old_index = index_keys(old, Side::Old, key)?;
    let new_index = index_keys(new, Side::New, key)?;
    check_key_kinds(&old_index, &new_index)?;

    let old_cols = watched_indices(old, watched);
    let new_cols = watched_indices(new, watched);

    let keys: Vec<ClassifiedKey> = outer_join(&old_index, &new_index)
        .into_iter()
        .map(|JoinedKey { key, old_row, new_row }| {
            let fields: Vec<FieldDelta> = watched
                .iter()
                .enumerate()
                .map(|(i, field)| FieldDelta {
                    field: field.clone(),
                    old: cell(old, old_row, old_cols[i]),
                    new: cell(new, new_row, new_cols[i]),
                })
                .collect();

            let change_type = match (old_row, new_row) {
                (None, Some(_)) => ChangeType::New,
                (Some(_), None) => ChangeType::Deleted,
                _ if fields.iter().any(FieldDelta::changed) => ChangeType::Modified,
                _ => ChangeType::Unchanged,
            };

            ClassifiedKey { key, change_type, old_row, new_row, fields }
        })
        .collect();

    log::debug!(
        "detect: {} keys joined (old={}, new={})",
        keys.len(),
        old.num_rows(),
        new.num_rows()
    );

    Ok(Classification { keys })
}

/// Build the audit log: one entry per New, Modified or Deleted key.
///
/// All entries of one run share a single capture timestamp; each gets its
/// own `log_id`. Entries are ordered ascending by key.
pub fn detect_changes(
    old: &Table,
    new: &Table,
    key: &str,
    watched: &[String],
    source_label: &str,
    stamper: &mut dyn Stamper,
) -> Result<ChangeLog, ReconError> {
    let classification = classify(old, new, key, watched)?;
    let captured_at = stamper.now();

    let entries: Vec<ChangeLogEntry> = classification
        .keys
        .into_iter()
        .filter(|k| k.change_type.is_logged())
        .map(|k| {
            let key_old = if k.old_row.is_some() { k.key.clone() } else { Value::Null };
            let key_new = if k.new_row.is_some() { k.key } else { Value::Null };
            ChangeLogEntry {
                log_id: stamper.log_id(),
                captured_at,
                change_type: k.change_type,
                source_label: source_label.to_string(),
                key_old,
                key_new,
                fields: k.fields,
            }
        })
        .collect();

    let log = ChangeLog {
        watched: watched.to_vec(),
        entries,
    };
    log::debug!(
        "detect: {} change(s): {} new, {} modified, {} deleted",
        log.len(),
        log.count(ChangeType::New),
        log.count(ChangeType::Modified),
        log.count(ChangeType::Deleted)
    );
    Ok(log)
}

fn watched_indices(table: &Table, watched: &[String]) -> Vec<usize> {
    // Presence already checked by require_columns.
    watched
        .iter()
        .filter_map(|f| table.column_index(f))
        .collect()
}

fn cell(table: &Table, row: Option<usize>, col: usize) -> Value {
    row.and_then(|r| table.row(r))
        .and_then(|r| r.get(col))
        .cloned()
        .unwrap_or(Value::Null)
}
