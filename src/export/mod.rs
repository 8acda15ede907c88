// ABOUTME: Export steps driven by the commands
// ABOUTME: pg_dump archives, DuckDB table discovery, and Parquet export

pub mod discovery;
pub mod dump;
pub mod parquet;
pub mod script;

pub use discovery::{discover_tables, parse_table_listing};
pub use dump::{run_pg_dump, DumpArtifacts, DumpOptions};
pub use parquet::{export_parquet, export_tables, ParquetOptions, TableExport};
