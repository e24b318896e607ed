//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `dgrid` exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! | Code | Meaning                                        |
//! |------|------------------------------------------------|
//! | 0    | Success (schema warnings do not change this)   |
//! | 1    | General error (unspecified)                    |
//! | 2    | Usage error (bad args, missing option)         |
//! | 3    | Duplicate or null business key                |
//! | 4    | Schema mismatch (missing key/watched column)   |
//! | 5    | Parse or I/O error reading/writing files       |
//! | 6    | Keys cannot be joined (incompatible kinds)     |
//! | 7    | No transform registered for the subject        |
//! | 8    | Invalid config                                 |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in [`recon_exit_code`] / [`io_exit_code`]

use deltagrid_io::IoError;
use deltagrid_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - a failure with no more specific code, such as a report
/// that cannot be serialized. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Duplicate or null keys in either snapshot.
pub const EXIT_DUPLICATE_KEY: u8 = 3;

/// Key or watched column missing, or a transform referenced a missing column.
pub const EXIT_SCHEMA_MISMATCH: u8 = 4;

/// File could not be read, parsed or written.
pub const EXIT_PARSE: u8 = 5;

/// Old and new keys have incompatible kinds.
pub const EXIT_JOIN: u8 = 6;

/// Subject has no registered transform for a layer.
pub const EXIT_UNKNOWN_SUBJECT: u8 = 7;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 8;

pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::DuplicateKey { .. } | ReconError::NullKey { .. } => EXIT_DUPLICATE_KEY,
        ReconError::SchemaMismatch { .. } | ReconError::Transform { .. } => EXIT_SCHEMA_MISMATCH,
        ReconError::Join { .. } => EXIT_JOIN,
        ReconError::UnknownSubject { .. } => EXIT_UNKNOWN_SUBJECT,
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::RenameCollision { .. } => EXIT_INVALID_CONFIG,
        ReconError::RaggedRow { .. } => EXIT_PARSE,
    }
}

pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::Table(inner) => recon_exit_code(inner),
        IoError::UnsupportedFormat(_) => EXIT_USAGE,
        _ => EXIT_PARSE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deltagrid_recon::{Layer, Side};

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_DUPLICATE_KEY,
            EXIT_SCHEMA_MISMATCH,
            EXIT_PARSE,
            EXIT_JOIN,
            EXIT_UNKNOWN_SUBJECT,
            EXIT_INVALID_CONFIG,
        ];
        let unique: std::collections::BTreeSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn recon_errors_map_to_contract_codes() {
        assert_eq!(
            recon_exit_code(&ReconError::NullKey { side: Side::Old, row: 0 }),
            EXIT_DUPLICATE_KEY
        );
        assert_eq!(
            recon_exit_code(&ReconError::UnknownSubject {
                layer: Layer::Raw,
                subject: "x".into()
            }),
            EXIT_UNKNOWN_SUBJECT
        );
        assert_eq!(
            io_exit_code(&IoError::Table(ReconError::Join { reason: "x".into() })),
            EXIT_JOIN
        );
        assert_eq!(
            io_exit_code(&IoError::Shape { line: 2, expected: 1, found: 2 }),
            EXIT_PARSE
        );
    }
}
