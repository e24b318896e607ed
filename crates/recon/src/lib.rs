//! `deltagrid-recon` — snapshot reconciliation engine.
//!
//! Pure engine crate: receives two loaded snapshots, returns the change
//! audit log and the next merged state. No CLI or IO dependencies.

pub mod config;
pub mod detect;
pub mod error;
pub mod keys;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod table;
pub mod transform;
pub mod value;

pub use config::ReconConfig;
pub use detect::{detect_changes, SequenceStamper, Stamper, SystemStamper};
pub use error::ReconError;
pub use merge::{merge_state, MergedState};
pub use model::{ChangeLog, ChangeLogEntry, ChangeType, FieldDelta, ReconSummary, Side};
pub use pipeline::{run, ReconOutput};
pub use registry::{Layer, SubjectRegistry, SubjectTransform};
pub use schema::{align, AlignmentReport, SchemaWarning};
pub use table::Table;
pub use value::Value;
