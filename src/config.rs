// ABOUTME: Export configuration and the optional TOML settings file
// ABOUTME: CLI flags override the file, the file overrides built-in defaults

use crate::credentials::ConnectionString;
use crate::export::{DumpOptions, ParquetOptions};
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Output directory of `pg-dump`, and the dump subdirectory of `all`
pub const DEFAULT_SQL_DIR: &str = "sql-dumps";
/// Output directory of `parquet`, and the Parquet subdirectory of `all`
pub const DEFAULT_PARQUET_DIR: &str = "parquet-out";
pub const DEFAULT_SCHEMA: &str = "public";

/// Settings file contents.
///
/// Every key is optional. The connection string is deliberately not a key:
/// unknown keys are rejected, so a `database_url` entry fails loudly instead
/// of being silently stored on disk and ignored.
///
/// ```toml
/// out_dir = "backups"
/// dump_dir = "sql"
/// parquet_dir = "parquet"
/// schema = "public"
/// jobs = 4
/// keep_going = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub out_dir: Option<PathBuf>,
    pub dump_dir: Option<String>,
    pub parquet_dir: Option<String>,
    pub schema: Option<String>,
    pub jobs: Option<usize>,
    pub keep_going: Option<bool>,
}

impl Settings {
    pub fn dump_dir(&self) -> &str {
        self.dump_dir.as_deref().unwrap_or(DEFAULT_SQL_DIR)
    }

    pub fn parquet_dir(&self) -> &str {
        self.parquet_dir.as_deref().unwrap_or(DEFAULT_PARQUET_DIR)
    }

    fn validate(&self) -> Result<()> {
        if self.dump_dir().trim().is_empty() || self.parquet_dir().trim().is_empty() {
            bail!("dump_dir and parquet_dir must not be empty");
        }
        if self.dump_dir() == self.parquet_dir() {
            bail!(
                "dump_dir and parquet_dir must differ (both are '{}')",
                self.dump_dir()
            );
        }
        if self.jobs == Some(0) {
            bail!("jobs must be at least 1");
        }
        if let Some(schema) = &self.schema {
            if schema.trim().is_empty() {
                bail!("schema must not be empty");
            }
        }
        Ok(())
    }
}

/// Parse settings from TOML text
pub fn parse_settings(content: &str) -> Result<Settings> {
    // Display of toml::de::Error quotes the offending line; message() does not.
    let settings: Settings = toml::from_str(content)
        .map_err(|e| anyhow!("Invalid settings file: {}", e.message()))?;
    settings.validate()?;
    Ok(settings)
}

/// Read and parse a settings file
pub fn load_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    parse_settings(&content).with_context(|| format!("In settings file {}", path.display()))
}

/// Everything one run needs, fixed before the first export step.
///
/// A `None` step is not run. When both are present the dump runs first.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    database_url: ConnectionString,
    dump: Option<DumpOptions>,
    parquet: Option<ParquetOptions>,
}

impl ExportConfig {
    pub fn new(
        database_url: ConnectionString,
        dump: Option<DumpOptions>,
        parquet: Option<ParquetOptions>,
    ) -> Self {
        Self {
            database_url,
            dump,
            parquet,
        }
    }

    pub fn database_url(&self) -> &ConnectionString {
        &self.database_url
    }

    pub fn dump(&self) -> Option<&DumpOptions> {
        self.dump.as_ref()
    }

    pub fn parquet(&self) -> Option<&ParquetOptions> {
        self.parquet.as_ref()
    }
}
