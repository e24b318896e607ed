use std::collections::{BTreeMap, BTreeSet};

use crate::error::ReconError;
use crate::model::{KeyCount, Side};
use crate::table::Table;
use crate::value::{Value, ValueKind};

/// Key → row index for one snapshot.
pub type KeyIndex = BTreeMap<Value, usize>;

/// Index a snapshot by its key column.
///
/// Fails on the first null key, then on duplicates (all of them, sorted by
/// key), so a bad snapshot never reaches the join.
pub fn index_keys(table: &Table, side: Side, key: &str) -> Result<KeyIndex, ReconError> {
    let col = table.column_index(key).ok_or_else(|| ReconError::SchemaMismatch {
        side,
        column: key.to_string(),
    })?;

    let mut index = KeyIndex::new();
    let mut counts: BTreeMap<&Value, usize> = BTreeMap::new();
    for (row, value) in table.column_values(col).enumerate() {
        if value.is_null() {
            return Err(ReconError::NullKey { side, row });
        }
        *counts.entry(value).or_insert(0) += 1;
        index.entry(value.clone()).or_insert(row);
    }

    let duplicates: Vec<KeyCount> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, count)| KeyCount { key: key.clone(), count })
        .collect();
    if !duplicates.is_empty() {
        return Err(ReconError::DuplicateKey { side, keys: duplicates });
    }

    Ok(index)
}

/// Both indexes must hold keys of one kind; mixing e.g. int and text keys
/// would silently never match.
pub fn check_key_kinds(old: &KeyIndex, new: &KeyIndex) -> Result<(), ReconError> {
    let old_kinds = kinds(old);
    let new_kinds = kinds(new);

    for (side, found) in [(Side::Old, &old_kinds), (Side::New, &new_kinds)] {
        if found.len() > 1 {
            return Err(ReconError::Join {
                reason: format!("{side} snapshot mixes key kinds: {}", describe(found)),
            });
        }
    }

    match (old_kinds.iter().next(), new_kinds.iter().next()) {
        (Some(o), Some(n)) if o != n => Err(ReconError::Join {
            reason: format!("key kind mismatch: old keys are {o}, new keys are {n}"),
        }),
        _ => Ok(()),
    }
}

fn kinds(index: &KeyIndex) -> BTreeSet<ValueKind> {
    index.keys().map(Value::kind).collect()
}

fn describe(kinds: &BTreeSet<ValueKind>) -> String {
    kinds.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
}

/// One key of the full outer join with its row on each side.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedKey {
    pub key: Value,
    pub old_row: Option<usize>,
    pub new_row: Option<usize>,
}

/// Full outer join of two key indexes, ascending by key.
pub fn outer_join(old: &KeyIndex, new: &KeyIndex) -> Vec<JoinedKey> {
    let mut joined: BTreeMap<&Value, (Option<usize>, Option<usize>)> = BTreeMap::new();
    for (key, &row) in old {
        joined.entry(key).or_default().0 = Some(row);
    }
    for (key, &row) in new {
        joined.entry(key).or_default().1 = Some(row);
    }
    joined
        .into_iter()
        .map(|(key, (old_row, new_row))| JoinedKey { key: key.clone(), old_row, new_row })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(keys: Vec<Value>) -> Table {
        Table::from_rows(["id"], keys.into_iter().map(|k| vec![k]).collect()).unwrap()
    }

    #[test]
    fn index_maps_key_to_row() {
        let t = table(vec![3.into(), 1.into(), 2.into()]);
        let idx = index_keys(&t, Side::Old, "id").unwrap();
        assert_eq!(idx.get(&Value::Int(1)), Some(&1));
        assert_eq!(idx.keys().cloned().collect::<Vec<_>>(), vec![1.into(), 2.into(), 3.into()]);
    }

    #[test]
    fn duplicates_reported_with_counts() {
        let t = table(vec![1.into(), 2.into(), 1.into(), 2.into(), 2.into()]);
        let err = index_keys(&t, Side::New, "id").unwrap_err();
        match err {
            ReconError::DuplicateKey { side, keys } => {
                assert_eq!(side, Side::New);
                assert_eq!(
                    keys,
                    vec![
                        KeyCount { key: 1.into(), count: 2 },
                        KeyCount { key: 2.into(), count: 3 },
                    ]
                );
            }
            other => panic!("expected DuplicateKey, got {other:?}"),
        }
    }

    #[test]
    fn null_key_rejected() {
        let t = table(vec![1.into(), Value::Null]);
        let err = index_keys(&t, Side::Old, "id").unwrap_err();
        assert!(matches!(err, ReconError::NullKey { side: Side::Old, row: 1 }));
    }

    #[test]
    fn missing_key_column() {
        let t = table(vec![1.into()]);
        let err = index_keys(&t, Side::Old, "Radicado").unwrap_err();
        assert!(matches!(err, ReconError::SchemaMismatch { side: Side::Old, .. }));
    }

    #[test]
    fn key_kind_mismatch_is_join_error() {
        let old = index_keys(&table(vec![1.into()]), Side::Old, "id").unwrap();
        let new = index_keys(&table(vec!["1".into()]), Side::New, "id").unwrap();
        let err = check_key_kinds(&old, &new).unwrap_err();
        assert!(err.to_string().contains("old keys are int, new keys are text"));
    }

    #[test]
    fn empty_side_is_compatible() {
        let old = KeyIndex::new();
        let new = index_keys(&table(vec!["a".into()]), Side::New, "id").unwrap();
        assert!(check_key_kinds(&old, &new).is_ok());
    }

    #[test]
    fn outer_join_covers_union() {
        let old = index_keys(&table(vec![1.into(), 2.into(), 3.into()]), Side::Old, "id").unwrap();
        let new = index_keys(&table(vec![4.into(), 2.into(), 1.into()]), Side::New, "id").unwrap();
        let joined = outer_join(&old, &new);
        let shape: Vec<(i64, bool, bool)> = joined
            .iter()
            .map(|j| match j.key {
                Value::Int(k) => (k, j.old_row.is_some(), j.new_row.is_some()),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            shape,
            vec![(1, true, true), (2, true, true), (3, true, false), (4, false, true)]
        );
    }
}
