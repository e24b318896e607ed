use serde::Deserialize;

use crate::error::ReconError;
use crate::table::Table;
use crate::value::{parse_float, Value};

/// A generic, configurable cleanup step applied to a whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformStep {
    /// Drop every column whose name contains `pattern`.
    DropColumnsContaining { pattern: String },
    /// Blank or whitespace-only text becomes null.
    BlankToNull,
    /// Trim surrounding whitespace from text cells.
    Trim,
    /// Cast columns to integers; unparseable cells become null.
    CastInt { columns: Vec<String> },
    /// Cast columns to floats; unparseable cells become null.
    CastFloat { columns: Vec<String> },
    /// Rename one column.
    Rename { from: String, to: String },
}

impl TransformStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DropColumnsContaining { .. } => "drop_columns_containing",
            Self::BlankToNull => "blank_to_null",
            Self::Trim => "trim",
            Self::CastInt { .. } => "cast_int",
            Self::CastFloat { .. } => "cast_float",
            Self::Rename { .. } => "rename",
        }
    }

    pub fn apply(&self, table: Table) -> Result<Table, ReconError> {
        match self {
            Self::DropColumnsContaining { pattern } => {
                Ok(table.drop_columns(|c| c.contains(pattern.as_str())))
            }
            Self::BlankToNull => Ok(table.map_values(|v| match v {
                Value::Text(s) if s.trim().is_empty() => Value::Null,
                other => other,
            })),
            Self::Trim => Ok(table.map_values(|v| match v {
                Value::Text(s) => Value::Text(s.trim().to_string()),
                other => other,
            })),
            Self::CastInt { columns } => self.cast(table, columns, to_int),
            Self::CastFloat { columns } => self.cast(table, columns, to_float),
            Self::Rename { from, to } => {
                let mut table = table;
                if table.has_column(to) {
                    return Err(ReconError::RenameCollision {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
                if !table.rename_column(from, to) {
                    return Err(self.missing(from));
                }
                Ok(table)
            }
        }
    }

    fn cast(
        &self,
        mut table: Table,
        columns: &[String],
        convert: fn(&Value) -> Value,
    ) -> Result<Table, ReconError> {
        for column in columns {
            let col = table.column_index(column).ok_or_else(|| self.missing(column))?;
            let mut failed = 0usize;
            table.map_column(col, |v| {
                let out = convert(&v);
                if out.is_null() && !v.is_null() {
                    failed += 1;
                }
                out
            });
            if failed > 0 {
                log::debug!("{}: {failed} cell(s) in '{column}' not castable, set to null", self.name());
            }
        }
        Ok(table)
    }

    fn missing(&self, column: &str) -> ReconError {
        ReconError::Transform {
            step: self.name().to_string(),
            reason: format!("column '{column}' not found"),
        }
    }
}

fn to_int(v: &Value) -> Value {
    match v {
        Value::Int(_) | Value::Null => v.clone(),
        Value::Float(x) if is_integral(x.into_inner()) => Value::Int(x.into_inner() as i64),
        Value::Bool(b) => Value::Int(i64::from(*b)),
        Value::Text(s) => {
            let t = s.trim();
            t.parse::<i64>()
                .ok()
                .or_else(|| {
                    parse_float(t)
                        .filter(|x| is_integral(*x))
                        .map(|x| x as i64)
                })
                .map(Value::Int)
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn is_integral(x: f64) -> bool {
    x.fract() == 0.0 && x.abs() < i64::MAX as f64
}

fn to_float(v: &Value) -> Value {
    match v {
        Value::Float(_) | Value::Null => v.clone(),
        Value::Int(i) => Value::from(*i as f64),
        Value::Text(s) => parse_float(s.trim()).map(Value::from).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            ["Radicado", "Rpta", "nota", "nota_duplicated"],
            vec![
                vec!["100".into(), "1.0".into(), "  hola ".into(), "x".into()],
                vec!["101".into(), "n/a".into(), "   ".into(), "y".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn parse_steps_from_toml() {
        #[derive(Deserialize)]
        struct Steps {
            steps: Vec<TransformStep>,
        }
        let parsed: Steps = toml::from_str(
            r#"
steps = [
  { op = "drop_columns_containing", pattern = "duplicated" },
  { op = "blank_to_null" },
  { op = "cast_int", columns = ["Radicado", "Rpta"] },
  { op = "rename", from = "a", to = "b" },
]
"#,
        )
        .unwrap();
        assert_eq!(parsed.steps.len(), 4);
        assert_eq!(
            parsed.steps[0],
            TransformStep::DropColumnsContaining { pattern: "duplicated".into() }
        );
        assert_eq!(parsed.steps[1], TransformStep::BlankToNull);
    }

    #[test]
    fn cast_int_is_lenient() {
        let step = TransformStep::CastInt { columns: vec!["Radicado".into(), "Rpta".into()] };
        let t = step.apply(sample()).unwrap();
        assert_eq!(t.value(0, "Radicado"), Some(&Value::Int(100)));
        assert_eq!(t.value(0, "Rpta"), Some(&Value::Int(1)));
        assert_eq!(t.value(1, "Rpta"), Some(&Value::Null));
    }

    #[test]
    fn cast_float_parses_text() {
        let step = TransformStep::CastFloat { columns: vec!["Rpta".into()] };
        let t = step.apply(sample()).unwrap();
        assert_eq!(t.value(0, "Rpta"), Some(&Value::from(1.0)));
        assert_eq!(t.value(1, "Rpta"), Some(&Value::Null));
    }

    #[test]
    fn trim_then_blank_to_null() {
        let t = TransformStep::Trim.apply(sample()).unwrap();
        let t = TransformStep::BlankToNull.apply(t).unwrap();
        assert_eq!(t.value(0, "nota"), Some(&Value::from("hola")));
        assert_eq!(t.value(1, "nota"), Some(&Value::Null));
    }

    #[test]
    fn drop_duplicated_columns() {
        let step = TransformStep::DropColumnsContaining { pattern: "duplicated".into() };
        let t = step.apply(sample()).unwrap();
        assert_eq!(t.columns(), ["Radicado", "Rpta", "nota"]);
    }

    #[test]
    fn cast_missing_column_errors() {
        let step = TransformStep::CastInt { columns: vec!["nope".into()] };
        let err = step.apply(sample()).unwrap_err();
        assert_eq!(err.to_string(), "transform 'cast_int' failed: column 'nope' not found");
    }

    #[test]
    fn rename_onto_existing_column_errors() {
        let step = TransformStep::Rename { from: "nota".into(), to: "Rpta".into() };
        assert!(matches!(step.apply(sample()), Err(ReconError::RenameCollision { .. })));
    }
}
