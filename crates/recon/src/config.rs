use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Deserialize;

use crate::error::ReconError;
use crate::registry::subject_from_file_name;
use crate::transform::TransformStep;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    /// Business key column.
    pub key: String,
    /// Columns whose changes are logged.
    pub watched: Vec<String>,
    /// Written into every log entry. Defaults to `name`.
    #[serde(default)]
    pub source_label: Option<String>,
    /// Explicit subject; otherwise derived from the new input's file name
    /// when any subject is configured.
    #[serde(default)]
    pub subject: Option<String>,
    pub inputs: InputsConfig,
    #[serde(default)]
    pub align: AlignConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub subjects: HashMap<String, SubjectConfig>,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct InputsConfig {
    /// Previously published (modeled) snapshot.
    pub old: InputConfig,
    /// Fresh (raw) extract.
    pub new: InputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub file: String,
    /// Worksheet for XLSX inputs; first sheet when absent.
    #[serde(default)]
    pub sheet: Option<String>,
    /// CSV delimiter; sniffed when absent.
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Turn integer / float / boolean text into typed values.
    #[serde(default = "default_true")]
    pub infer_types: bool,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Align / Merge / Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlignConfig {
    /// Column-count difference tolerated without a dimension warning.
    #[serde(default)]
    pub max_column_delta: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeConfig {
    /// Old column name → new column name.
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub log: Option<String>,
    #[serde(default)]
    pub merged: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

// ---------------------------------------------------------------------------
// Subjects
// ---------------------------------------------------------------------------

/// Cleanup steps for one subject, per layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubjectConfig {
    #[serde(default)]
    pub raw: Vec<TransformStep>,
    #[serde(default)]
    pub modeled: Vec<TransformStep>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.key.trim().is_empty() {
            return Err(ReconError::ConfigValidation("key must not be empty".into()));
        }

        if self.watched.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one watched field is required".into(),
            ));
        }

        let mut seen = BTreeSet::new();
        for field in &self.watched {
            if field.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "watched field names must not be empty".into(),
                ));
            }
            if field == &self.key {
                return Err(ReconError::ConfigValidation(format!(
                    "key '{field}' cannot also be a watched field"
                )));
            }
            if !seen.insert(field.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "watched field '{field}' listed twice"
                )));
            }
        }

        let mut targets = BTreeSet::new();
        for (from, to) in &self.merge.renames {
            if from == to {
                return Err(ReconError::ConfigValidation(format!(
                    "rename '{from}' maps a column onto itself"
                )));
            }
            if !targets.insert(to.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "rename target '{to}' used by more than one column"
                )));
            }
        }

        if let Some(subject) = &self.subject {
            if subject.trim().is_empty() {
                return Err(ReconError::ConfigValidation("subject must not be empty".into()));
            }
        }

        Ok(())
    }

    pub fn source_label(&self) -> &str {
        self.source_label.as_deref().unwrap_or(&self.name)
    }

    /// Subject whose transforms apply to this run, if any.
    ///
    /// An explicit `subject` wins. Without one, the subject is derived from
    /// the new input's file name, but only when subjects are configured.
    pub fn resolved_subject(&self) -> Option<String> {
        if let Some(subject) = &self.subject {
            return Some(subject.clone());
        }
        if self.subjects.is_empty() {
            return None;
        }
        let file_name = self
            .inputs
            .new
            .file
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.inputs.new.file);
        Some(subject_from_file_name(file_name))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
