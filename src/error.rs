// ABOUTME: Typed failures the export pipeline reports to its caller
// ABOUTME: Wrapped in anyhow::Error and recovered with downcast_ref where needed

use thiserror::Error;

/// Failures with a meaning the coordinator (and tests) need to recognise.
///
/// Every message is safe to print: none of them carry the connection string.
/// Captured stderr is scrubbed of registered secrets before it lands in
/// [`ExportError::ProcessFailed`].
#[derive(Debug, Error)]
pub enum ExportError {
    /// No connection string from flags or environment, and the prompt produced nothing
    #[error(
        "Database URL is required to continue.\n\
         Pass --database-url=URL or set DATABASE_URL in the environment."
    )]
    CredentialRequired,

    /// A required external executable is not on PATH
    #[error("{tool} was not found on PATH. {hint}")]
    ToolMissing { tool: String, hint: &'static str },

    /// Discovery returned no base tables
    #[error("No tables found in the '{schema}' schema")]
    NoTablesFound { schema: String },

    /// The external program ran and exited unsuccessfully
    #[error("{step} failed ({status}): {stderr}")]
    ProcessFailed {
        step: String,
        status: String,
        stderr: String,
    },

    /// The external program could not be started at all
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// One or more tables failed while the exporter was told to keep going
    #[error("{failed} of {total} table export(s) failed: {tables}")]
    TableExportsFailed {
        failed: usize,
        total: usize,
        tables: String,
    },
}
