// ABOUTME: DuckDB script generation for attaching to PostgreSQL and exporting tables
// ABOUTME: All embedded values pass through literal or identifier quoting

use std::path::Path;

/// Catalog alias the live database is attached under
pub const ATTACH_ALIAS: &str = "pg";

/// Quote a value as a SQL string literal (`'` doubled).
///
/// ```
/// # use schemafetcher::export::script::quote_literal;
/// assert_eq!(quote_literal("it's"), "'it''s'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote a value as a SQL identifier (`"` doubled).
///
/// ```
/// # use schemafetcher::export::script::quote_identifier;
/// assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
/// ```
pub fn quote_identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn attach_preamble(database_url: &str) -> String {
    format!(
        "INSTALL postgres;\n\
         LOAD postgres;\n\
         ATTACH {} AS {} (TYPE POSTGRES, READ_ONLY);\n",
        quote_literal(database_url),
        ATTACH_ALIAS
    )
}

/// Script listing the base tables (views excluded) of `schema`
pub fn list_tables_script(database_url: &str, schema: &str) -> String {
    format!(
        "{}SELECT table_name FROM information_schema.tables \
         WHERE table_catalog = {} AND table_schema = {} AND table_type = 'BASE TABLE';\n",
        attach_preamble(database_url),
        quote_literal(ATTACH_ALIAS),
        quote_literal(schema)
    )
}

/// Script copying one table into a ZSTD-compressed Parquet file
pub fn copy_table_script(database_url: &str, schema: &str, table: &str, output: &Path) -> String {
    format!(
        "{}COPY (SELECT * FROM {}.{}.{}) TO {} (FORMAT PARQUET, COMPRESSION ZSTD);\n",
        attach_preamble(database_url),
        ATTACH_ALIAS,
        quote_identifier(schema),
        quote_identifier(table),
        quote_literal(&output.to_string_lossy())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_list_tables_script() {
        let script = list_tables_script("postgres://u:p@h/db", "public");
        assert_eq!(
            script,
            "INSTALL postgres;\n\
             LOAD postgres;\n\
             ATTACH 'postgres://u:p@h/db' AS pg (TYPE POSTGRES, READ_ONLY);\n\
             SELECT table_name FROM information_schema.tables \
             WHERE table_catalog = 'pg' AND table_schema = 'public' AND table_type = 'BASE TABLE';\n"
        );
    }

    #[test]
    fn test_copy_table_script() {
        let script = copy_table_script(
            "postgres://h/db",
            "public",
            "casts",
            &PathBuf::from("out/casts.parquet"),
        );
        assert!(script.ends_with(
            "COPY (SELECT * FROM pg.\"public\".\"casts\") TO 'out/casts.parquet' \
             (FORMAT PARQUET, COMPRESSION ZSTD);\n"
        ));
    }

    #[test]
    fn test_hostile_table_name_stays_an_identifier() {
        let table = "x\"); DROP TABLE y; --";
        let script = copy_table_script("postgres://h/db", "public", table, Path::new("o.parquet"));
        assert!(script.contains("pg.\"public\".\"x\"\"); DROP TABLE y; --\")"));
    }

    #[test]
    fn test_quotes_in_url_and_path_are_escaped() {
        let script = copy_table_script(
            "postgres://u:it's@h/db",
            "public",
            "t",
            Path::new("/tmp/o'brien/t.parquet"),
        );
        assert!(script.contains("ATTACH 'postgres://u:it''s@h/db' AS pg"));
        assert!(script.contains("TO '/tmp/o''brien/t.parquet'"));
    }

    #[test]
    fn test_schema_is_a_literal_in_listing() {
        let script = list_tables_script("postgres://h/db", "sales' OR '1'='1");
        assert!(script.contains("table_schema = 'sales'' OR ''1''=''1'"));
    }
}
