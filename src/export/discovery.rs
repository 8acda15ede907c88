// ABOUTME: Base-table discovery through DuckDB attached to the live database
// ABOUTME: Parses the CSV listing DuckDB prints and rejects empty results

use super::script;
use crate::credentials::ConnectionString;
use crate::error::ExportError;
use crate::process::{self, Invocation, ProcessRunner, DUCKDB};
use anyhow::Result;

/// List the base tables of `schema`, in the order DuckDB returns them.
///
/// An empty listing is an error: it almost always means the wrong schema or
/// the wrong database, and exporting nothing would hide that.
pub async fn discover_tables(
    runner: &dyn ProcessRunner,
    database_url: &ConnectionString,
    schema: &str,
) -> Result<Vec<String>> {
    tracing::info!("Discovering tables in schema '{}'...", schema);

    let invocation = Invocation::new(DUCKDB.name)
        .arg("-csv")
        .arg("-bail")
        .stdin(script::list_tables_script(database_url.expose(), schema))
        .secret(database_url.expose());
    let output = process::invoke(runner, &invocation, "duckdb (table discovery)").await?;

    let tables = parse_table_listing(&output.stdout);
    if tables.is_empty() {
        return Err(ExportError::NoTablesFound {
            schema: schema.to_string(),
        }
        .into());
    }

    Ok(tables)
}

/// Parse DuckDB's one-column CSV output: skip the header, trim, drop blanks.
///
/// ```
/// # use schemafetcher::export::discovery::parse_table_listing;
/// let tables = parse_table_listing("table_name\ncasts\n\nlinks\n");
/// assert_eq!(tables, vec!["casts", "links"]);
/// ```
pub fn parse_table_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(unquote_csv_field)
        .collect()
}

fn unquote_csv_field(field: &str) -> String {
    match field
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_engine_order() {
        let tables = parse_table_listing("table_name\nzeta\nalpha\nmid\n");
        assert_eq!(tables, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_parse_header_only_is_empty() {
        assert!(parse_table_listing("table_name\n").is_empty());
        assert!(parse_table_listing("").is_empty());
    }

    #[test]
    fn test_parse_trims_and_drops_blank_lines() {
        let tables = parse_table_listing("table_name\r\n  casts  \r\n\r\n   \r\nlinks\r\n");
        assert_eq!(tables, vec!["casts", "links"]);
    }

    #[test]
    fn test_parse_unquotes_csv_fields() {
        let tables = parse_table_listing("table_name\n\"with,comma\"\n\"say \"\"hi\"\"\"\n");
        assert_eq!(tables, vec!["with,comma", "say \"hi\""]);
    }
}
