//! `dgrid align` — run only the schema check on two snapshot files.

use std::path::PathBuf;

use deltagrid_io::{dictionary, read_table, ReadOptions};
use deltagrid_recon::schema::align;

use crate::CliError;

pub struct AlignArgs {
    pub old: PathBuf,
    pub new: PathBuf,
    pub key: Option<String>,
    pub watch: Vec<String>,
    pub dictionary: Option<PathBuf>,
    pub dictionary_sheet: Option<String>,
    pub sheet: Option<String>,
    pub max_column_delta: usize,
    pub json: bool,
}

pub fn cmd_align(args: AlignArgs) -> Result<(), CliError> {
    let (key, watched) = match (&args.dictionary, args.key) {
        (Some(path), _) => {
            let dict = dictionary::load(path, args.dictionary_sheet.as_deref())?;
            (dict.key, dict.watched)
        }
        (None, Some(key)) => (key, args.watch),
        (None, None) => return Err(CliError::args("--key or --dictionary is required")),
    };
    if watched.is_empty() {
        return Err(CliError::args("no watched columns")
            .with_hint("pass --watch <COLUMN> at least once"));
    }

    let options = ReadOptions { sheet: args.sheet, ..ReadOptions::default() };
    let old = read_table(&args.old, &options)?;
    let new = read_table(&args.new, &options)?;

    let report = align(&old, &new, &key, &watched, args.max_column_delta)?;

    if args.json {
        let json_str = crate::to_json(&report)?;
        println!("{json_str}");
    }

    eprintln!(
        "aligned on '{key}' ({} watched): old {} column(s), new {} column(s), {} warning(s)",
        watched.len(),
        report.old_columns,
        report.new_columns,
        report.warnings.len()
    );
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}
