//! `dgrid run` / `dgrid validate` — config-driven snapshot reconciliation.

use std::path::{Path, PathBuf};

use deltagrid_io::csv::CsvOptions;
use deltagrid_io::{discover, json, read_table, write_table, ReadOptions};
use deltagrid_recon::config::InputConfig;
use deltagrid_recon::{
    pipeline, Layer, ReconConfig, ReconOutput, SchemaWarning, SubjectRegistry, SystemStamper,
    Table,
};

use crate::exit_codes::EXIT_INVALID_CONFIG;
use crate::CliError;

fn config_err(msg: impl Into<String>) -> CliError {
    CliError { code: EXIT_INVALID_CONFIG, message: msg.into(), hint: None }
}

/// Read and validate the config; the directory it lives in anchors relative paths.
fn load_config(config_path: &Path) -> Result<(ReconConfig, PathBuf), CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::io(format!("cannot read config {}: {e}", config_path.display()))
    })?;
    let config = ReconConfig::from_toml(&config_str)?;
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((config, base_dir))
}

/// An input naming a directory means "newest snapshot of this subject in there".
fn resolve_input(base_dir: &Path, input: &InputConfig, subject: &str) -> Result<PathBuf, CliError> {
    let path = base_dir.join(&input.file);
    if path.is_dir() {
        return Ok(discover::latest_snapshot(&path, subject)?);
    }
    Ok(path)
}

fn read_options(input: &InputConfig) -> Result<ReadOptions, CliError> {
    let delimiter = match input.delimiter {
        Some(c) if c.is_ascii() => Some(c as u8),
        Some(c) => return Err(config_err(format!("delimiter {c:?} is not a single-byte character"))),
        None => None,
    };
    Ok(ReadOptions {
        sheet: input.sheet.clone(),
        csv: CsvOptions { delimiter, infer_types: input.infer_types },
    })
}

fn load_input(path: &Path, input: &InputConfig) -> Result<Table, CliError> {
    let table = read_table(path, &read_options(input)?)?;
    log::info!(
        "loaded {}: {} row(s) x {} column(s)",
        path.display(),
        table.num_rows(),
        table.num_columns()
    );
    Ok(table)
}

pub fn cmd_run(config_path: PathBuf, json_output: bool, dry_run: bool) -> Result<(), CliError> {
    let (mut config, base_dir) = load_config(&config_path)?;

    let discovery_subject = config.subject.clone().unwrap_or_else(|| config.name.clone());
    let old_path = resolve_input(&base_dir, &config.inputs.old, &discovery_subject)?;
    let new_path = resolve_input(&base_dir, &config.inputs.new, &discovery_subject)?;
    // The subject derives from the file actually picked.
    config.inputs.new.file = new_path.to_string_lossy().into_owned();

    let old = load_input(&old_path, &config.inputs.old)?;
    let new = load_input(&new_path, &config.inputs.new)?;

    let registry = SubjectRegistry::from_config(&config.subjects);
    let output = pipeline::run(&config, &registry, old, new, &mut SystemStamper)?;

    let written = if dry_run {
        Vec::new()
    } else {
        write_outputs(&config, &base_dir, &output)?
    };

    if json_output {
        let json_str = crate::to_json(&output.summary)?;
        println!("{json_str}");
    }

    print_summary(&output, &written, dry_run);
    Ok(())
}

fn write_outputs(
    config: &ReconConfig,
    base_dir: &Path,
    output: &ReconOutput,
) -> Result<Vec<PathBuf>, CliError> {
    let mut written = Vec::new();

    if let Some(log_file) = &config.output.log {
        let path = prepare_output(base_dir, log_file)?;
        write_table(&output.log.to_table()?, &path, "log")?;
        written.push(path);
    }
    if let Some(merged_file) = &config.output.merged {
        let path = prepare_output(base_dir, merged_file)?;
        write_table(&output.merged.table, &path, &sheet_name(&config.name))?;
        written.push(path);
    }
    if let Some(summary_file) = &config.output.summary {
        let path = prepare_output(base_dir, summary_file)?;
        json::write_value(&path, &output.summary)?;
        written.push(path);
    }

    Ok(written)
}

fn prepare_output(base_dir: &Path, file: &str) -> Result<PathBuf, CliError> {
    let path = base_dir.join(file);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::io(format!("cannot create {}: {e}", parent.display())))?;
    }
    Ok(path)
}

/// Excel sheet names: at most 31 chars, none of `[]:*?/\`.
fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "merged".to_string()
    } else {
        cleaned
    }
}

fn print_summary(output: &ReconOutput, written: &[PathBuf], dry_run: bool) {
    let s = &output.summary;
    eprintln!(
        "{}: {} new, {} modified, {} deleted, {} unchanged (old {} row(s), new {} row(s))",
        s.name, s.new, s.modified, s.deleted, s.unchanged, s.old_rows, s.new_rows,
    );
    eprintln!("merged state: {} row(s)", s.merged_rows);
    for warning in &s.warnings {
        eprintln!("warning: {}", describe_warning(warning));
    }
    for path in written {
        eprintln!("wrote {}", path.display());
    }
    if dry_run {
        eprintln!("dry run: no files written");
    }
}

fn describe_warning(warning: &SchemaWarning) -> String {
    match warning {
        SchemaWarning::ColumnOverlap { columns } if columns.len() > 5 => format!(
            "{} unwatched column(s) present on both sides: {}, ...",
            columns.len(),
            columns[..5].join(", ")
        ),
        other => other.to_string(),
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, base_dir) = load_config(&config_path)?;

    for input in [&config.inputs.old, &config.inputs.new] {
        read_options(input)?;
    }

    let registry = SubjectRegistry::from_config(&config.subjects);
    if let Some(subject) = config.resolved_subject() {
        registry.dispatch(Layer::Modeled, &subject)?;
        registry.dispatch(Layer::Raw, &subject)?;
        eprintln!("subject: {subject}");
    }

    for (side, input) in [("old", &config.inputs.old), ("new", &config.inputs.new)] {
        let path = base_dir.join(&input.file);
        if !path.exists() {
            log::warn!("{side} input {} does not exist yet", path.display());
        }
    }

    eprintln!(
        "config ok: {} (key '{}', {} watched field(s))",
        config.name,
        config.key,
        config.watched.len()
    );
    Ok(())
}
