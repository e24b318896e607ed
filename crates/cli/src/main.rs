// deltagrid CLI - snapshot reconciliation from the shell

mod align;
mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use deltagrid_io::IoError;
use deltagrid_recon::ReconError;

use exit_codes::{
    io_exit_code, recon_exit_code, EXIT_ERROR, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "dgrid")]
#[command(about = "Reconcile two snapshots of a record set: change log + merged state")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  dgrid run creditos.toml
  dgrid run creditos.toml --json
  dgrid run creditos.toml --dry-run")]
    Run {
        /// Path to the config file; inputs and outputs resolve relative to it
        config: PathBuf,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Compute everything but write no output files
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse and validate a config without reading any snapshot
    #[command(after_help = "\
Examples:
  dgrid validate creditos.toml")]
    Validate {
        config: PathBuf,
    },

    /// Check that two snapshots can be reconciled (schema alignment only)
    #[command(after_help = "\
Examples:
  dgrid align old.csv new.csv --key Radicado --watch Estado --watch Rpta
  dgrid align old.xlsx new.csv --dictionary dict.xlsx --dictionary-sheet creditos --json")]
    Align {
        old: PathBuf,
        new: PathBuf,

        /// Business key column
        #[arg(long, required_unless_present = "dictionary")]
        key: Option<String>,

        /// Watched column (repeatable)
        #[arg(long = "watch", value_name = "COLUMN")]
        watch: Vec<String>,

        /// Take key and watched columns from a data dictionary (CSV or Excel)
        #[arg(long, conflicts_with_all = ["key", "watch"])]
        dictionary: Option<PathBuf>,

        /// Worksheet of an Excel dictionary
        #[arg(long, requires = "dictionary")]
        dictionary_sheet: Option<String>,

        /// Worksheet to read from Excel snapshots
        #[arg(long)]
        sheet: Option<String>,

        /// Column-count difference tolerated without a warning
        #[arg(long, default_value_t = 0)]
        max_column_delta: usize,

        /// Print the alignment report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_COMMIT_HASH"),
        ")",
        "\nengine:  deltagrid-recon ",
        env!("CARGO_PKG_VERSION"),
        "\nbuild:   ",
        env!("BUILD_PROFILE"),
    )
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, dry_run } => recon::cmd_run(config, json, dry_run),
        Commands::Validate { config } => recon::cmd_validate(config),
        Commands::Align {
            old,
            new,
            key,
            watch,
            dictionary,
            dictionary_sheet,
            sheet,
            max_column_delta,
            json,
        } => align::cmd_align(align::AlignArgs {
            old,
            new,
            key,
            watch,
            dictionary,
            dictionary_sheet,
            sheet,
            max_column_delta,
            json,
        }),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Pretty JSON for stdout reports.
pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let code = recon_exit_code(&err);
        let hint = match &err {
            ReconError::DuplicateKey { .. } | ReconError::NullKey { .. } => {
                Some("the key column must be unique and non-empty in both snapshots".to_string())
            }
            ReconError::UnknownSubject { .. } => {
                Some("add a [subjects.<name>] table to the config or set `subject`".to_string())
            }
            ReconError::Join { .. } => {
                Some("cast the key to the same type on both layers (cast_int step)".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Table(inner) => inner.into(),
            other => Self { code: io_exit_code(&other), message: other.to_string(), hint: None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn unserializable_report_is_a_general_error() {
        let report = BTreeMap::from([((1, 2), "pair keys are not JSON object keys")]);
        let err = to_json(&report).unwrap_err();
        assert_eq!(err.code, EXIT_ERROR);
        assert!(err.message.starts_with("JSON serialization error"));
    }

    #[test]
    fn io_errors_wrapping_table_errors_keep_their_code() {
        let err: CliError = IoError::Table(ReconError::Join { reason: "kinds".into() }).into();
        assert_eq!(err.code, exit_codes::EXIT_JOIN);
        assert!(err.hint.is_some());
    }
}
