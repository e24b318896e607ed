//! Subject registry: which cleanup strategy applies to which record set.
//!
//! Lookups are explicit. An unregistered `(layer, subject)` pair fails at
//! dispatch with [`ReconError::UnknownSubject`], before any table is touched.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SubjectConfig;
use crate::error::ReconError;
use crate::table::Table;
use crate::transform::TransformStep;

/// Data layer a snapshot was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Fresh extract (becomes the new snapshot).
    Raw,
    /// Previously published table (becomes the old snapshot).
    Modeled,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Modeled => write!(f, "modeled"),
        }
    }
}

/// Cleanup strategy for one subject in one layer.
pub trait SubjectTransform {
    fn apply(&self, table: Table) -> Result<Table, ReconError>;
}

impl<F> SubjectTransform for F
where
    F: Fn(Table) -> Result<Table, ReconError>,
{
    fn apply(&self, table: Table) -> Result<Table, ReconError> {
        self(table)
    }
}

/// Ordered list of configured steps. An empty list is the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepPipeline {
    steps: Vec<TransformStep>,
}

impl StepPipeline {
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self { steps }
    }
}

impl SubjectTransform for StepPipeline {
    fn apply(&self, table: Table) -> Result<Table, ReconError> {
        self.steps.iter().try_fold(table, |t, step| step.apply(t))
    }
}

#[derive(Default)]
pub struct SubjectRegistry {
    entries: HashMap<(Layer, String), Box<dyn SubjectTransform>>,
}

impl fmt::Debug for SubjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("SubjectRegistry").field("entries", &keys).finish()
    }
}

impl SubjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register both layers of every configured subject.
    pub fn from_config(subjects: &HashMap<String, SubjectConfig>) -> Self {
        let mut registry = Self::new();
        for (name, subject) in subjects {
            registry.register(Layer::Raw, name, StepPipeline::new(subject.raw.clone()));
            registry.register(Layer::Modeled, name, StepPipeline::new(subject.modeled.clone()));
        }
        registry
    }

    /// Register (or replace) the strategy for `(layer, subject)`.
    pub fn register(
        &mut self,
        layer: Layer,
        subject: impl Into<String>,
        transform: impl SubjectTransform + 'static,
    ) {
        self.entries.insert((layer, subject.into()), Box::new(transform));
    }

    pub fn contains(&self, layer: Layer, subject: &str) -> bool {
        self.entries.contains_key(&(layer, subject.to_string()))
    }

    /// Registered subject names, sorted.
    pub fn subjects(&self) -> Vec<&str> {
        let names: BTreeSet<&str> = self.entries.keys().map(|(_, s)| s.as_str()).collect();
        names.into_iter().collect()
    }

    /// Resolve the strategy for `(layer, subject)` or fail immediately.
    pub fn dispatch(&self, layer: Layer, subject: &str) -> Result<&dyn SubjectTransform, ReconError> {
        self.entries
            .get(&(layer, subject.to_string()))
            .map(|t| t.as_ref())
            .ok_or_else(|| ReconError::UnknownSubject {
                layer,
                subject: subject.to_string(),
            })
    }

    pub fn apply(&self, layer: Layer, subject: &str, table: Table) -> Result<Table, ReconError> {
        let transform = self.dispatch(layer, subject)?;
        log::debug!("registry: applying {layer} transform for '{subject}'");
        transform.apply(table)
    }
}

/// Subject name from a snapshot file name: `20250603_creditos.csv` → `creditos`.
///
/// Takes the second `_`-separated segment of the stem; a stem without `_`
/// is returned whole.
pub fn subject_from_file_name(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    match stem.split('_').nth(1) {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => stem.to_string(),
    }
}
