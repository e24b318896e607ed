// Snapshot I/O: delimited text, Excel, JSON, data dictionaries

pub mod csv;
pub mod dictionary;
pub mod discover;
pub mod error;
pub mod format;
pub mod json;
pub mod xlsx;

pub use error::IoError;
pub use format::{read_table, write_table, FileFormat, ReadOptions};
