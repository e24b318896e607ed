//! Schema alignment: decide whether two snapshots can be diffed at all.
//!
//! Missing key or watched columns are fatal. Everything else is advisory and
//! travels in the [`AlignmentReport`] as [`SchemaWarning`]s.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::ReconError;
use crate::model::Side;
use crate::table::Table;

/// Suffix given to new-side columns that collide with old-side names in the joined view.
pub const NEW_SUFFIX: &str = "_new";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaWarning {
    /// Column counts differ by more than the configured tolerance.
    Dimension { old_columns: usize, new_columns: usize },
    /// Non-key, non-watched columns present under the same name on both sides.
    ColumnOverlap { columns: Vec<String> },
    /// `<column>_new` already names a column on either side.
    SuffixCollision { column: String, collides_with: String },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dimension { old_columns, new_columns } => write!(
                f,
                "column count differs: old={old_columns} new={new_columns}"
            ),
            Self::ColumnOverlap { columns } => write!(
                f,
                "{} unwatched column(s) present on both sides: {}",
                columns.len(),
                columns.join(", ")
            ),
            Self::SuffixCollision { column, collides_with } => write!(
                f,
                "new column '{column}' would be suffixed to '{collides_with}', which already exists"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlignmentReport {
    pub old_columns: usize,
    pub new_columns: usize,
    pub warnings: Vec<SchemaWarning>,
}

/// Check that `key` and every watched field exist in `table`.
pub fn require_columns(
    table: &Table,
    side: Side,
    key: &str,
    watched: &[String],
) -> Result<(), ReconError> {
    for column in std::iter::once(key).chain(watched.iter().map(String::as_str)) {
        if !table.has_column(column) {
            return Err(ReconError::SchemaMismatch {
                side,
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate that `old` and `new` are comparable on `key` / `watched`.
///
/// `max_column_delta` is the largest column-count difference tolerated
/// without a [`SchemaWarning::Dimension`].
pub fn align(
    old: &Table,
    new: &Table,
    key: &str,
    watched: &[String],
    max_column_delta: usize,
) -> Result<AlignmentReport, ReconError> {
    require_columns(old, Side::Old, key, watched)?;
    require_columns(new, Side::New, key, watched)?;

    let mut warnings = Vec::new();

    if old.num_columns().abs_diff(new.num_columns()) > max_column_delta {
        warnings.push(SchemaWarning::Dimension {
            old_columns: old.num_columns(),
            new_columns: new.num_columns(),
        });
    }

    let old_names: BTreeSet<&str> = old.columns().iter().map(String::as_str).collect();
    let overlap: Vec<String> = new
        .columns()
        .iter()
        .filter(|c| c.as_str() != key && !watched.contains(*c))
        .filter(|c| old_names.contains(c.as_str()))
        .cloned()
        .collect();
    if !overlap.is_empty() {
        warnings.push(SchemaWarning::ColumnOverlap { columns: overlap });
    }

    let new_names: BTreeSet<&str> = new.columns().iter().map(String::as_str).collect();
    for column in new.columns() {
        let suffixed = format!("{column}{NEW_SUFFIX}");
        let taken =
            old_names.contains(suffixed.as_str()) || new_names.contains(suffixed.as_str());
        if old_names.contains(column.as_str()) && taken {
            warnings.push(SchemaWarning::SuffixCollision {
                column: column.clone(),
                collides_with: suffixed,
            });
        }
    }

    for warning in &warnings {
        log::warn!("schema: {warning}");
    }
    log::debug!(
        "schema: aligned old={} cols / new={} cols on key '{key}' ({} watched)",
        old.num_columns(),
        new.num_columns(),
        watched.len()
    );

    Ok(AlignmentReport {
        old_columns: old.num_columns(),
        new_columns: new.num_columns(),
        warnings,
    })
}
