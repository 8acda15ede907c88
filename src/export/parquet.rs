// ABOUTME: Per-table Parquet export through DuckDB's postgres extension
// ABOUTME: Sequential by default, bounded concurrency and keep-going on request

use super::{discovery, script};
use crate::credentials::ConnectionString;
use crate::error::ExportError;
use crate::process::{self, Invocation, ProcessRunner, DUCKDB};
use crate::utils::sanitize_identifier;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParquetOptions {
    pub out_dir: PathBuf,
    /// Source schema, `public` unless configured otherwise
    pub schema: String,
    /// Maximum concurrent table exports; 1 keeps them strictly sequential
    pub jobs: usize,
    /// Attempt every table and report failures at the end instead of
    /// stopping at the first one
    pub keep_going: bool,
}

/// One successfully written Parquet file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableExport {
    pub table: String,
    pub path: PathBuf,
    pub duration: Duration,
}

/// Discover every base table and export each one to `<out_dir>/<table>.parquet`.
///
/// # Errors
///
/// This function will return an error if:
/// - duckdb is not on PATH
/// - Discovery fails or finds no tables
/// - The output directory cannot be created
/// - A table export fails (see [`export_tables`] for the failure policy)
pub async fn export_parquet(
    runner: &dyn ProcessRunner,
    database_url: &ConnectionString,
    options: &ParquetOptions,
) -> Result<Vec<TableExport>> {
    process::require_tool(runner, &DUCKDB)?;

    tracing::info!("Exporting database to Parquet using DuckDB...");
    let tables = discovery::discover_tables(runner, database_url, &options.schema).await?;

    let names: Vec<String> = tables.iter().map(|t| sanitize_identifier(t)).collect();
    tracing::info!("Found {} tables: {}", tables.len(), names.join(", "));

    let exports = export_tables(runner, database_url, &tables, options).await?;

    tracing::info!(
        "✅ Finished Parquet export to {}",
        options.out_dir.display()
    );
    Ok(exports)
}

/// Export the given tables, in order.
///
/// Up to `options.jobs` exports run at once and results are consumed in
/// table order. Without `keep_going` the first failure returns immediately;
/// exports not yet started never start and in-flight ones are cancelled.
/// With `keep_going` every table is attempted and any failure turns into
/// [`ExportError::TableExportsFailed`].
pub async fn export_tables(
    runner: &dyn ProcessRunner,
    database_url: &ConnectionString,
    tables: &[String],
    options: &ParquetOptions,
) -> Result<Vec<TableExport>> {
    std::fs::create_dir_all(&options.out_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            options.out_dir.display()
        )
    })?;

    let progress = ProgressBar::new(tables.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );

    let mut results = stream::iter(tables)
        .map(|table| async move {
            let result =
                export_table(runner, database_url, &options.schema, table, &options.out_dir)
                    .await;
            (table, result)
        })
        .buffered(options.jobs.max(1));

    let mut exported = Vec::with_capacity(tables.len());
    let mut failed: Vec<String> = Vec::new();

    while let Some((table, result)) = results.next().await {
        let name = sanitize_identifier(table);
        progress.inc(1);
        progress.set_message(name.clone());

        match result {
            Ok(export) => {
                progress.suspend(|| {
                    tracing::info!("  ✓ Exported {} ({:.2?})", name, export.duration)
                });
                exported.push(export);
            }
            Err(e) if !options.keep_going => {
                progress.abandon();
                return Err(e.context(format!("Failed to export table '{}'", name)));
            }
            Err(e) => {
                progress.suspend(|| tracing::error!("  ✗ {}: {:#}", name, e));
                failed.push(name);
            }
        }
    }
    progress.finish_and_clear();

    if options.keep_going {
        tracing::info!("========================================");
        tracing::info!("Parquet Export Summary");
        tracing::info!("========================================");
        tracing::info!("Total tables: {}", tables.len());
        tracing::info!("✓ Exported: {}", exported.len());
        tracing::info!("✗ Failed: {}", failed.len());
        tracing::info!("========================================");
    }

    if !failed.is_empty() {
        return Err(ExportError::TableExportsFailed {
            failed: failed.len(),
            total: tables.len(),
            tables: failed.join(", "),
        }
        .into());
    }

    Ok(exported)
}

async fn export_table(
    runner: &dyn ProcessRunner,
    database_url: &ConnectionString,
    schema: &str,
    table: &str,
    out_dir: &Path,
) -> Result<TableExport> {
    let path = out_dir.join(artifact_file_name(table));
    let invocation = Invocation::new(DUCKDB.name)
        .arg("-bail")
        .stdin(script::copy_table_script(
            database_url.expose(),
            schema,
            table,
            &path,
        ))
        .secret(database_url.expose());

    let step = format!("duckdb (export {})", sanitize_identifier(table));
    let output = process::invoke(runner, &invocation, &step).await?;

    Ok(TableExport {
        table: table.to_string(),
        path,
        duration: output.duration,
    })
}

/// `<table>.parquet`, with anything that could leave the directory replaced.
///
/// ```
/// # use schemafetcher::export::parquet::artifact_file_name;
/// assert_eq!(artifact_file_name("casts"), "casts.parquet");
/// assert_eq!(artifact_file_name("../etc/passwd"), ".._etc_passwd.parquet");
/// ```
pub fn artifact_file_name(table: &str) -> String {
    let stem: String = table
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("{}.parquet", stem)
}
