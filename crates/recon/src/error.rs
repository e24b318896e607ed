use thiserror::Error;

use crate::model::{KeyCount, Side};
use crate::registry::Layer;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty key, duplicate watched field, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Key or watched column absent from one snapshot.
    #[error("{side} snapshot: missing column '{column}'")]
    SchemaMismatch { side: Side, column: String },
    /// Key column not unique within one snapshot.
    #[error("{side} snapshot: duplicate keys: {}", describe_keys(.keys))]
    DuplicateKey { side: Side, keys: Vec<KeyCount> },
    /// Null in the key column; the row can never be joined.
    #[error("{side} snapshot: null key at row {row}")]
    NullKey { side: Side, row: usize },
    /// Keys cannot be joined (incompatible key kinds).
    #[error("join failed: {reason}")]
    Join { reason: String },
    /// No transform registered for a subject at dispatch time.
    #[error("no {layer} transform registered for subject '{subject}'")]
    UnknownSubject { layer: Layer, subject: String },
    /// A transform step could not be applied.
    #[error("transform '{step}' failed: {reason}")]
    Transform { step: String, reason: String },
    /// Rename target already names another column.
    #[error("rename '{from}' -> '{to}' collides with an existing column")]
    RenameCollision { from: String, to: String },
    /// Row width differs from the header width.
    #[error("row {row}: expected {expected} fields, found {found}")]
    RaggedRow { row: usize, expected: usize, found: usize },
}

fn describe_keys(keys: &[KeyCount]) -> String {
    keys.iter()
        .map(|k| format!("{:?} x{}", k.key.to_text().unwrap_or_default(), k.count))
        .collect::<Vec<_>>()
        .join(", ")
}
