//! Thin wrapper around sqlparser with dialect selection.

use crate::error::ParseError;
use crate::types::Dialect;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Parse SQL using the specified dialect.
pub fn parse_sql_with_dialect(sql: &str, dialect: Dialect) -> Result<Vec<Statement>, ParseError> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    match Parser::parse_sql(sqlparser_dialect.as_ref(), sql) {
        Ok(statements) => Ok(statements),
        Err(primary_err) => {
            // The permissive ANSI dialect still fails on Postgres-specific
            // operators (`?`, `->>`, `::`) common in warehouse SQL.
            if matches!(dialect, Dialect::Ansi) && looks_like_postgres_syntax(sql) {
                let postgres = PostgreSqlDialect {};
                if let Ok(statements) = Parser::parse_sql(&postgres, sql) {
                    return Ok(statements);
                }
            }
            Err(ParseError::from(primary_err).with_dialect(dialect))
        }
    }
}

fn looks_like_postgres_syntax(sql: &str) -> bool {
    sql.contains("::")
        || sql.contains("->")
        || sql.contains("?|")
        || sql.contains("?&")
        || sql.contains(" ? ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_select() {
        let statements = parse_sql_with_dialect("SELECT * FROM users", Dialect::Ansi).unwrap();
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn rejects_invalid_sql() {
        assert!(parse_sql_with_dialect("SELECT * FROM", Dialect::Ansi).is_err());
    }

    #[test]
    fn parses_multiple_statements() {
        let statements =
            parse_sql_with_dialect("SELECT * FROM users; SELECT * FROM orders;", Dialect::Ansi)
                .unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn parses_postgres_ilike() {
        let sql = "SELECT * FROM users WHERE name ILIKE '%test%'";
        assert!(parse_sql_with_dialect(sql, Dialect::Postgres).is_ok());
    }

    #[test]
    fn parses_snowflake_three_part_name() {
        let sql = "SELECT * FROM db.schema.table";
        assert!(parse_sql_with_dialect(sql, Dialect::Snowflake).is_ok());
    }

    #[test]
    fn parses_bigquery_backtick_name() {
        let sql = "SELECT * FROM `project.dataset.table`";
        assert!(parse_sql_with_dialect(sql, Dialect::Bigquery).is_ok());
    }

    #[test]
    fn ansi_falls_back_for_postgres_cast_operator() {
        let sql = "SELECT workspace_id::text FROM ledger.usage_line_item";
        assert!(parse_sql_with_dialect(sql, Dialect::Ansi).is_ok());
    }

    #[test]
    fn parse_error_carries_dialect() {
        let err = parse_sql_with_dialect("SELECT FROM WHERE", Dialect::Postgres).unwrap_err();
        assert_eq!(err.dialect, Some(Dialect::Postgres));
    }
}
