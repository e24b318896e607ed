//! State merge: next authoritative table from the old and new snapshots.
//!
//! Unchanged keys keep the old row (semi-join on the unchanged set); every
//! other key of the new snapshot takes the new row (anti-join). Keys that
//! exist only in the old snapshot are dropped here even though the detector
//! logs them as `Deleted`.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ReconError;
use crate::keys::{check_key_kinds, index_keys};
use crate::model::Side;
use crate::schema::require_columns;
use crate::table::Table;
use crate::value::Value;

/// Result of a merge. `table` has the new snapshot's columns, text cells,
/// rows ascending by key.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedState {
    pub table: Table,
    /// Rows carried over from the old snapshot.
    pub kept: usize,
    /// Rows taken from the new snapshot (new + modified keys).
    pub replaced: usize,
    /// New-snapshot columns the old rows had no counterpart for (filled with null).
    pub filled_columns: Vec<String>,
}

/// Merge `old` into `new` on `key`.
///
/// A joined key is unchanged iff every watched field is null-safe equal:
/// two nulls are equal, exactly one null is a change. `renames` maps old
/// column names to their name in the new snapshot before old rows are
/// projected onto the new column order.
pub fn merge_state(
    old: &Table,
    new: &Table,
    key: &str,
    watched: &[String],
    renames: &BTreeMap<String, String>,
) -> Result<MergedState, ReconError> {
    require_columns(old, Side::Old, key, watched)?;
    require_columns(new, Side::New, key, watched)?;

    let old_index = index_keys(old, Side::Old, key)?;
    let new_index = index_keys(new, Side::New, key)?;
    check_key_kinds(&old_index, &new_index)?;

    let pairs: Vec<(usize, usize)> = watched
        .iter()
        .filter_map(|f| Some((old.column_index(f)?, new.column_index(f)?)))
        .collect();

    // Inner join, keep keys whose watched fields all agree.
    let unchanged: BTreeSet<&Value> = old_index
        .iter()
        .filter_map(|(k, &old_row)| {
            let new_row = *new_index.get(k)?;
            let same = pairs.iter().all(|&(oc, nc)| {
                old.rows()[old_row][oc].null_safe_eq(&new.rows()[new_row][nc])
            });
            same.then_some(k)
        })
        .collect();

    let (projection, filled_columns) = project_old_columns(old, new, renames)?;
    for column in &filled_columns {
        log::warn!("merge: old snapshot has no column for '{column}', kept rows get null");
    }

    let mut merged: Vec<(&Value, Vec<Value>)> = Vec::with_capacity(new.num_rows());

    // Semi-join: old rows of unchanged keys, reshaped to the new layout.
    for (k, &row) in &old_index {
        if unchanged.contains(k) {
            let src = &old.rows()[row];
            let projected = projection
                .iter()
                .map(|col| col.map(|c| src[c].clone()).unwrap_or(Value::Null))
                .collect();
            merged.push((k, projected));
        }
    }
    let kept = merged.len();

    // Anti-join: new rows of every other key.
    for (k, &row) in &new_index {
        if !unchanged.contains(k) {
            merged.push((k, new.rows()[row].clone()));
        }
    }
    let replaced = merged.len() - kept;

    // Typed key order, before the text cast.
    merged.sort_by(|a, b| a.0.cmp(b.0));

    let rows: Vec<Vec<Value>> = merged
        .into_iter()
        .map(|(_, row)| row.into_iter().map(Value::into_text).collect())
        .collect();
    let table = Table::from_rows(new.columns().iter().cloned(), rows)?;

    log::debug!(
        "merge: {} row(s) = {kept} kept from old + {replaced} from new ({} old-only dropped)",
        table.num_rows(),
        old_index.keys().filter(|k| !new_index.contains_key(*k)).count()
    );

    Ok(MergedState {
        table,
        kept,
        replaced,
        filled_columns,
    })
}

/// For each new-snapshot column, the old-snapshot column feeding it after renames.
fn project_old_columns(
    old: &Table,
    new: &Table,
    renames: &BTreeMap<String, String>,
) -> Result<(Vec<Option<usize>>, Vec<String>), ReconError> {
    for from in renames.keys().filter(|from| !old.has_column(from)) {
        log::debug!("merge: rename source '{from}' not in old snapshot, skipped");
    }

    // Renames apply simultaneously; only the final names must be distinct.
    let renamed: Vec<&String> = old
        .columns()
        .iter()
        .map(|c| renames.get(c).unwrap_or(c))
        .collect();
    for (i, name) in renamed.iter().enumerate() {
        if let Some(j) = renamed[..i].iter().position(|earlier| earlier == name) {
            let from = if renames.contains_key(&old.columns()[i]) {
                &old.columns()[i]
            } else {
                &old.columns()[j]
            };
            return Err(ReconError::RenameCollision {
                from: from.clone(),
                to: (*name).clone(),
            });
        }
    }

    let mut projection = Vec::with_capacity(new.num_columns());
    let mut filled = Vec::new();
    for column in new.columns() {
        let source = renamed.iter().position(|c| *c == column);
        if source.is_none() {
            filled.push(column.clone());
        }
        projection.push(source);
    }
    Ok((projection, filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_table(rows: &[(i64, Option<&str>)]) -> Table {
        Table::from_rows(
            ["id", "status"],
            rows.iter()
                .map(|(id, s)| vec![Value::Int(*id), Value::from(*s)])
                .collect(),
        )
        .unwrap()
    }

    fn watched() -> Vec<String> {
        vec!["status".to_string()]
    }

    fn text_rows(table: &Table) -> Vec<Vec<Option<String>>> {
        table
            .rows()
            .iter()
            .map(|r| r.iter().map(Value::to_text).collect())
            .collect()
    }

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn reference_scenario_drops_deleted_key() {
        let old = status_table(&[(1, Some("A")), (2, Some("B")), (3, Some("C"))]);
        let new = status_table(&[(1, Some("A")), (2, Some("B2")), (4, Some("D"))]);
        let merged = merge_state(&old, &new, "id", &watched(), &BTreeMap::new()).unwrap();

        assert_eq!(
            text_rows(&merged.table),
            vec![
                vec![s("1"), s("A")],
                vec![s("2"), s("B2")],
                vec![s("4"), s("D")],
            ]
        );
        assert_eq!(merged.kept, 1);
        assert_eq!(merged.replaced, 2);
    }

    #[test]
    fn values_are_text() {
        let old = status_table(&[(1, Some("A"))]);
        let new = status_table(&[(1, Some("A"))]);
        let merged = merge_state(&old, &new, "id", &watched(), &BTreeMap::new()).unwrap();
        assert_eq!(merged.table.rows()[0][0], Value::from("1"));
    }

    #[test]
    fn sort_uses_typed_key_order() {
        let old = status_table(&[]);
        let new = status_table(&[(10, Some("x")), (9, Some("y")), (100, Some("z"))]);
        let merged = merge_state(&old, &new, "id", &watched(), &BTreeMap::new()).unwrap();
        let keys: Vec<Option<String>> = merged.table.rows().iter().map(|r| r[0].to_text()).collect();
        assert_eq!(keys, vec![s("9"), s("10"), s("100")]);
    }

    #[test]
    fn exactly_one_null_takes_new_row() {
        let old = Table::from_rows(
            ["id", "status", "note"],
            vec![
                vec![1.into(), Value::Null, "old".into()],
                vec![2.into(), Value::Null, "old".into()],
            ],
        )
        .unwrap();
        let new = Table::from_rows(
            ["id", "status", "note"],
            vec![
                vec![1.into(), "A".into(), "new".into()],
                vec![2.into(), Value::Null, "new".into()],
            ],
        )
        .unwrap();
        let merged = merge_state(&old, &new, "id", &watched(), &BTreeMap::new()).unwrap();
        assert_eq!(
            text_rows(&merged.table),
            vec![
                vec![s("1"), s("A"), s("new")],
                vec![s("2"), None, s("old")],
            ]
        );
    }

    #[test]
    fn kept_rows_follow_new_layout_with_renames() {
        let old = Table::from_rows(
            ["fecha_solicitud", "id", "status", "legacy"],
            vec![vec!["2025-06-01".into(), 1.into(), "A".into(), "gone".into()]],
        )
        .unwrap();
        let new = Table::from_rows(
            ["id", "status", "Fecha Radicacion"],
            vec![vec![1.into(), "A".into(), "2025-06-02".into()]],
        )
        .unwrap();
        let renames = BTreeMap::from([("fecha_solicitud".to_string(), "Fecha Radicacion".to_string())]);
        let merged = merge_state(&old, &new, "id", &watched(), &renames).unwrap();

        assert_eq!(merged.table.columns(), ["id", "status", "Fecha Radicacion"]);
        assert_eq!(text_rows(&merged.table), vec![vec![s("1"), s("A"), s("2025-06-01")]]);
        assert!(merged.filled_columns.is_empty());
    }

    #[test]
    fn missing_old_column_is_filled_with_null() {
        let old = status_table(&[(1, Some("A"))]);
        let new = Table::from_rows(
            ["id", "status", "grupo"],
            vec![vec![1.into(), "A".into(), "GER".into()]],
        )
        .unwrap();
        let merged = merge_state(&old, &new, "id", &watched(), &BTreeMap::new()).unwrap();
        assert_eq!(merged.filled_columns, vec!["grupo".to_string()]);
        assert_eq!(text_rows(&merged.table), vec![vec![s("1"), s("A"), None]]);
    }

    #[test]
    fn rename_collision_rejected() {
        let old = Table::from_rows(["id", "status", "a", "b"], vec![]).unwrap();
        let new = status_table(&[]);
        let renames = BTreeMap::from([("a".to_string(), "b".to_string())]);
        let err = merge_state(&old, &new, "id", &watched(), &renames).unwrap_err();
        match err {
            ReconError::RenameCollision { from, to } => {
                assert_eq!(from, "a");
                assert_eq!(to, "b");
            }
            other => panic!("expected RenameCollision, got {other:?}"),
        }
    }

    #[test]
    fn rename_chains_and_swaps_apply_together() {
        let old = Table::from_rows(
            ["id", "status", "a", "b"],
            vec![vec![1.into(), "A".into(), "from_a".into(), "from_b".into()]],
        )
        .unwrap();
        let new = Table::from_rows(
            ["id", "status", "b", "c"],
            vec![vec![1.into(), "A".into(), "x".into(), "y".into()]],
        )
        .unwrap();

        let chain = BTreeMap::from([
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "c".to_string()),
        ]);
        let merged = merge_state(&old, &new, "id", &watched(), &chain).unwrap();
        assert_eq!(
            text_rows(&merged.table),
            vec![vec![s("1"), s("A"), s("from_a"), s("from_b")]]
        );

        let swap = BTreeMap::from([
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "a".to_string()),
        ]);
        let merged = merge_state(&old, &new, "id", &watched(), &swap).unwrap();
        assert_eq!(text_rows(&merged.table), vec![vec![s("1"), s("A"), s("from_a"), None]]);
        assert_eq!(merged.filled_columns, vec!["c".to_string()]);
    }

    #[test]
    fn missing_watched_column_aborts() {
        let old = Table::new(["id"]);
        let new = status_table(&[(1, Some("A"))]);
        let err = merge_state(&old, &new, "id", &watched(), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ReconError::SchemaMismatch { side: Side::Old, .. }));
    }

    #[test]
    fn empty_new_gives_empty_state() {
        let old = status_table(&[(1, Some("A")), (2, Some("B"))]);
        let new = status_table(&[]);
        let merged = merge_state(&old, &new, "id", &watched(), &BTreeMap::new()).unwrap();
        assert!(merged.table.is_empty());
        assert_eq!(merged.table.columns(), ["id", "status"]);
    }
}
