mod id;
mod naming;
mod span;

pub(crate) use id::{generate_column_node_id, generate_edge_id, generate_node_id};
pub(crate) use naming::{
    extract_simple_name, is_quoted_identifier, parse_canonical_name, split_qualified_identifiers,
    unquote_identifier,
};
pub(crate) use span::find_identifier_span;

use sqlparser::ast::{self as ast, Expr, Query, SetExpr};

use crate::types::StatementType;

/// Check if an expression is a simple column reference (no transformation).
pub(crate) fn is_simple_column_ref(expr: &Expr) -> bool {
    matches!(expr, Expr::Identifier(_) | Expr::CompoundIdentifier(_))
}

/// Classify a query AST into the statement-type taxonomy.
pub(crate) fn classify_query_type(query: &Query) -> StatementType {
    if query.with.is_some() {
        return StatementType::With;
    }
    match &*query.body {
        SetExpr::Select(_) => StatementType::Select,
        SetExpr::Query(inner) => classify_query_type(inner),
        SetExpr::SetOperation { op, .. } => match op {
            ast::SetOperator::Union => StatementType::Union,
            ast::SetOperator::Intersect => StatementType::Intersect,
            ast::SetOperator::Except | ast::SetOperator::Minus => StatementType::Except,
        },
        SetExpr::Values(_) => StatementType::Values,
        _ => StatementType::Select,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sql_with_dialect;
    use crate::types::Dialect;
    use rstest::rstest;
    use sqlparser::ast::Statement;

    fn first_query(sql: &str) -> Box<Query> {
        match parse_sql_with_dialect(sql, Dialect::Ansi)
            .unwrap()
            .remove(0)
        {
            Statement::Query(query) => query,
            other => panic!("expected query, got {other:?}"),
        }
    }

    #[rstest]
    #[case("SELECT 1", StatementType::Select)]
    #[case("SELECT a FROM t UNION SELECT a FROM u", StatementType::Union)]
    #[case("SELECT a FROM t INTERSECT SELECT a FROM u", StatementType::Intersect)]
    #[case("SELECT a FROM t EXCEPT SELECT a FROM u", StatementType::Except)]
    #[case("VALUES (1, 2)", StatementType::Values)]
    #[case("WITH c AS (SELECT 1) SELECT * FROM c", StatementType::With)]
    fn classifies_queries(#[case] sql: &str, #[case] expected: StatementType) {
        assert_eq!(classify_query_type(&first_query(sql)), expected);
    }
}
