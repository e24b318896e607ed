//! End-to-end run: subject transforms → align → detect → merge.
//!
//! Each stage consumes the previous one by value and returns the next, so no
//! stage can observe a half-built result. The first fatal error ends the run.

use chrono::SecondsFormat;
use serde::Serialize;

use crate::config::ReconConfig;
use crate::detect::{detect_changes, Stamper};
use crate::error::ReconError;
use crate::merge::{merge_state, MergedState};
use crate::model::{ChangeLog, ChangeType, ReconSummary};
use crate::registry::{Layer, SubjectRegistry};
use crate::schema::{align, AlignmentReport};
use crate::table::Table;

/// Immutable inputs of one run.
#[derive(Debug, Clone)]
pub struct ReconContext<'a> {
    pub config: &'a ReconConfig,
    pub old: Table,
    pub new: Table,
}

#[derive(Debug)]
struct Aligned<'a> {
    ctx: ReconContext<'a>,
    report: AlignmentReport,
}

#[derive(Debug)]
struct Detected<'a> {
    aligned: Aligned<'a>,
    log: ChangeLog,
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize)]
pub struct ReconOutput {
    pub report: AlignmentReport,
    pub log: ChangeLog,
    #[serde(skip)]
    pub merged: MergedState,
    pub summary: ReconSummary,
}

/// Run the whole reconciliation for `config` on already-loaded snapshots.
///
/// `old` is the modeled snapshot and `new` the raw extract; the subject's
/// transforms (if any) are resolved before any table is touched.
pub fn run(
    config: &ReconConfig,
    registry: &SubjectRegistry,
    old: Table,
    new: Table,
    stamper: &mut dyn Stamper,
) -> Result<ReconOutput, ReconError> {
    config.validate()?;
    let ctx = prepare(config, registry, old, new)?;
    let aligned = align_stage(ctx)?;
    let detected = detect_stage(aligned, stamper)?;
    let output = merge_stage(detected, stamper)?;

    let s = &output.summary;
    log::info!(
        "{}: {} new, {} modified, {} deleted, {} unchanged; merged state has {} row(s)",
        s.name,
        s.new,
        s.modified,
        s.deleted,
        s.unchanged,
        s.merged_rows
    );
    Ok(output)
}

fn prepare<'a>(
    config: &'a ReconConfig,
    registry: &SubjectRegistry,
    old: Table,
    new: Table,
) -> Result<ReconContext<'a>, ReconError> {
    let Some(subject) = config.resolved_subject() else {
        return Ok(ReconContext { config, old, new });
    };

    // Both lookups before either transform runs.
    let modeled = registry.dispatch(Layer::Modeled, &subject)?;
    let raw = registry.dispatch(Layer::Raw, &subject)?;
    log::debug!("pipeline: subject '{subject}'");

    Ok(ReconContext {
        config,
        old: modeled.apply(old)?,
        new: raw.apply(new)?,
    })
}

fn align_stage(ctx: ReconContext<'_>) -> Result<Aligned<'_>, ReconError> {
    let report = align(
        &ctx.old,
        &ctx.new,
        &ctx.config.key,
        &ctx.config.watched,
        ctx.config.align.max_column_delta,
    )?;
    Ok(Aligned { ctx, report })
}

fn detect_stage<'a>(
    aligned: Aligned<'a>,
    stamper: &mut dyn Stamper,
) -> Result<Detected<'a>, ReconError> {
    let ctx = &aligned.ctx;
    let log = detect_changes(
        &ctx.old,
        &ctx.new,
        &ctx.config.key,
        &ctx.config.watched,
        ctx.config.source_label(),
        stamper,
    )?;
    Ok(Detected { aligned, log })
}

fn merge_stage(
    detected: Detected<'_>,
    stamper: &mut dyn Stamper,
) -> Result<ReconOutput, ReconError> {
    let Detected { aligned, log } = detected;
    let Aligned { ctx, report } = aligned;
    let config = ctx.config;

    let merged = merge_state(
        &ctx.old,
        &ctx.new,
        &config.key,
        &config.watched,
        &config.merge.renames,
    )?;

    let deleted = log.count(ChangeType::Deleted);
    let modified = log.count(ChangeType::Modified);
    let summary = ReconSummary {
        name: config.name.clone(),
        source_label: config.source_label().to_string(),
        old_rows: ctx.old.num_rows(),
        new_rows: ctx.new.num_rows(),
        new: log.count(ChangeType::New),
        modified,
        deleted,
        unchanged: ctx.old.num_rows() - deleted - modified,
        merged_rows: merged.table.num_rows(),
        warnings: report.warnings.clone(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        run_at: stamper.now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    Ok(ReconOutput { report, log, merged, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::SequenceStamper;
    use crate::transform::TransformStep;
    use crate::value::Value;
    use chrono::{TimeZone, Utc};

    fn config(extra: &str) -> ReconConfig {
        ReconConfig::from_toml(&format!(
            r#"
name = "estados"
key = "id"
watched = ["status"]
{extra}
[inputs.old]
file = "old.csv"

[inputs.new]
file = "20250603_creditos.csv"
"#
        ))
        .unwrap()
    }

    fn stamper() -> SequenceStamper {
        SequenceStamper::new(Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap())
    }

    fn text_table(rows: &[(&str, &str)]) -> Table {
        Table::from_rows(
            ["id", "status"],
            rows.iter().map(|(k, s)| vec![Value::from(*k), Value::from(*s)]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn summary_counts_every_class() {
        let old = text_table(&[("1", "A"), ("2", "B"), ("3", "C")]);
        let new = text_table(&[("1", "A"), ("2", "B2"), ("4", "D")]);
        let out = run(&config(""), &SubjectRegistry::new(), old, new, &mut stamper()).unwrap();

        let s = &out.summary;
        assert_eq!((s.new, s.modified, s.deleted, s.unchanged), (1, 1, 1, 1));
        assert_eq!((s.old_rows, s.new_rows, s.merged_rows), (3, 3, 3));
        assert_eq!(s.source_label, "estados");
        assert_eq!(s.run_at, "2026-01-31T12:00:00Z");
    }

    #[test]
    fn unknown_subject_fails_before_transforms() {
        let mut registry = SubjectRegistry::new();
        registry.register(Layer::Modeled, "creditos", |_: Table| -> Result<Table, ReconError> {
            panic!("modeled transform must not run when raw is missing")
        });
        let cfg = config("subject = \"creditos\"");
        let err = run(&cfg, &registry, text_table(&[]), text_table(&[]), &mut stamper())
            .unwrap_err();
        assert!(matches!(err, ReconError::UnknownSubject { layer: Layer::Raw, .. }));
    }

    #[test]
    fn subject_transforms_run_per_layer() {
        let mut registry = SubjectRegistry::new();
        registry.register(Layer::Modeled, "creditos", |t: Table| {
            TransformStep::CastInt { columns: vec!["id".into()] }.apply(t)
        });
        registry.register(Layer::Raw, "creditos", |t: Table| {
            let t = TransformStep::Trim.apply(t)?;
            TransformStep::CastInt { columns: vec!["id".into()] }.apply(t)
        });

        let old = text_table(&[("1", "A"), ("2", "B")]);
        let new = text_table(&[(" 1 ", "A"), ("2", "B")]);
        let out = run(&config("subject = \"creditos\""), &registry, old, new, &mut stamper())
            .unwrap();
        assert!(out.log.is_empty());
        assert_eq!(out.summary.unchanged, 2);
    }

    #[test]
    fn schema_mismatch_is_first_fatal_error() {
        let old = Table::new(["id", "estado"]);
        let new = text_table(&[]);
        let err = run(&config(""), &SubjectRegistry::new(), old, new, &mut stamper()).unwrap_err();
        assert!(matches!(err, ReconError::SchemaMismatch { .. }));
    }

    #[test]
    fn summary_serializes_warnings() {
        let old = Table::from_rows(["id", "status", "note"], vec![]).unwrap();
        let new = Table::from_rows(["id", "status", "note"], vec![]).unwrap();
        let out = run(&config(""), &SubjectRegistry::new(), old, new, &mut stamper()).unwrap();
        let json = serde_json::to_value(&out.summary).unwrap();
        assert_eq!(json["warnings"][0]["kind"], "column_overlap");
        assert_eq!(json["warnings"][0]["columns"][0], "note");
    }
}
