// ABOUTME: Command dispatch for pg-dump, parquet, all and help
// ABOUTME: Resolves the credential once and maps the outcome to an exit code

pub mod export;

pub use export::export;

use crate::cli::{self, Cli, Commands, ParquetArgs};
use crate::config::{self, ExportConfig, Settings, DEFAULT_SCHEMA};
use crate::credentials::{self, ConnectionString, SecretPrompt};
use crate::export::{DumpOptions, ParquetOptions};
use crate::process::ProcessRunner;
use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

/// The outside world a run talks to
pub struct Runtime<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub prompt: &'a dyn SecretPrompt,
    /// Value of `DATABASE_URL`, if set
    pub env_database_url: Option<String>,
}

/// Parse `args` (program name first), run the command, return the exit code.
///
/// Arguments go through [`cli::normalize_args`] first, so unknown flags and
/// positionals after a command are ignored and `h` in a short cluster asks
/// for help. Help and version output exit 0. Unknown commands and invalid
/// flag values print clap's usage error and exit 1 before any credential is
/// resolved. Any other failure is printed once, with its context chain, and
/// exits 1.
pub async fn run<I, T>(args: I, runtime: &Runtime<'_>) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args = cli::normalize_args(args.into_iter().map(Into::into).collect());
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                EXIT_FAILURE
            } else {
                EXIT_SUCCESS
            };
        }
    };

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return EXIT_SUCCESS;
    };

    match execute(command, runtime).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_FAILURE
        }
    }
}

/// Load settings, resolve the credential, build the configuration, export.
pub async fn execute(command: Commands, runtime: &Runtime<'_>) -> Result<()> {
    let common = command.common();

    let settings = match &common.config {
        Some(path) => config::load_settings(path)?,
        None => Settings::default(),
    };

    let (database_url, source) = credentials::resolve_database_url(
        common.database_url.as_deref(),
        runtime.env_database_url.as_deref(),
        runtime.prompt,
    )?;
    tracing::debug!("Using connection string from {:?}", source);

    let config = build_config(&command, &settings, database_url);
    export(runtime.runner, &config).await
}

/// Turn a parsed command plus settings into the run's configuration.
///
/// Output directories:
/// - `pg-dump`: `--out`, else `out_dir`, else `sql-dumps`
/// - `parquet`: `--out`, else `out_dir`, else `parquet-out`
/// - `all`: `<root>/<dump_dir>` and `<root>/<parquet_dir>`, where root is
///   `--out`, else `out_dir`, else the current directory
pub fn build_config(
    command: &Commands,
    settings: &Settings,
    database_url: ConnectionString,
) -> ExportConfig {
    let out = command
        .common()
        .out
        .clone()
        .or_else(|| settings.out_dir.clone());

    match command {
        Commands::PgDump {
            skip_sql,
            skip_custom,
            ..
        } => {
            let dump = DumpOptions {
                out_dir: out.unwrap_or_else(|| PathBuf::from(config::DEFAULT_SQL_DIR)),
                skip_plain_text: *skip_sql,
                skip_custom: *skip_custom,
            };
            ExportConfig::new(database_url, Some(dump), None)
        }
        Commands::Parquet { parquet, .. } => {
            let out_dir = out.unwrap_or_else(|| PathBuf::from(config::DEFAULT_PARQUET_DIR));
            let parquet = parquet_options(parquet, settings, out_dir);
            ExportConfig::new(database_url, None, Some(parquet))
        }
        Commands::All { parquet, .. } => {
            let root = out.unwrap_or_else(|| PathBuf::from("."));
            let dump = DumpOptions {
                out_dir: root.join(settings.dump_dir()),
                skip_plain_text: false,
                skip_custom: false,
            };
            let parquet = parquet_options(parquet, settings, root.join(settings.parquet_dir()));
            ExportConfig::new(database_url, Some(dump), Some(parquet))
        }
    }
}

fn parquet_options(args: &ParquetArgs, settings: &Settings, out_dir: PathBuf) -> ParquetOptions {
    ParquetOptions {
        out_dir,
        schema: args
            .schema
            .clone()
            .or_else(|| settings.schema.clone())
            .unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
        jobs: args
            .jobs
            .map(usize::from)
            .or(settings.jobs)
            .unwrap_or(1),
        keep_going: args.keep_going || settings.keep_going.unwrap_or(false),
    }
}
