//! Expression analysis for SQL AST nodes.
//!
//! `ExpressionAnalyzer` walks expressions to collect column references,
//! recurse into subqueries, detect aggregate calls, and capture filter
//! predicates for relation nodes. It borrows the parent `Analyzer` and the
//! current `StatementContext`, contributing to the statement graph as it
//! goes.

use super::context::{ColumnRef, StatementContext};
use super::Analyzer;
use crate::types::{AggregationInfo, FilterKind};
use sqlparser::ast::{self, Expr, FunctionArg, FunctionArgExpr};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Recursion cap for expression traversal; pathological nesting degrades to
/// partial extraction instead of a stack overflow.
pub(super) const MAX_RECURSION_DEPTH: usize = 100;

static AGGREGATE_FUNCTIONS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "any_value",
        "approx_count_distinct",
        "approx_distinct",
        "array_agg",
        "avg",
        "bit_and",
        "bit_or",
        "bit_xor",
        "bool_and",
        "bool_or",
        "count",
        "countif",
        "count_if",
        "every",
        "group_concat",
        "listagg",
        "max",
        "median",
        "min",
        "mode",
        "percentile_cont",
        "percentile_disc",
        "stddev",
        "stddev_pop",
        "stddev_samp",
        "string_agg",
        "sum",
        "var_pop",
        "var_samp",
        "variance",
    ]
    .into_iter()
    .collect()
});

fn is_aggregate_function(name: &str) -> bool {
    AGGREGATE_FUNCTIONS.contains(name.to_lowercase().as_str())
}

pub(crate) struct ExpressionAnalyzer<'a, 'b> {
    pub(crate) analyzer: &'a mut Analyzer<'b>,
    pub(crate) ctx: &'a mut StatementContext,
}

impl<'a, 'b> ExpressionAnalyzer<'a, 'b> {
    pub(crate) fn new(analyzer: &'a mut Analyzer<'b>, ctx: &'a mut StatementContext) -> Self {
        Self { analyzer, ctx }
    }

    /// Analyzes an expression: recurses into subqueries and validates the
    /// column references it can resolve.
    pub(crate) fn analyze(&mut self, expr: &Expr) {
        self.visit_subqueries(expr, 0);
        self.validate_column_refs(expr);
    }

    fn validate_column_refs(&mut self, expr: &Expr) {
        for col_ref in Self::extract_column_refs(expr) {
            if let Some(table) = col_ref.table.as_deref() {
                if let Some(canonical) = self.analyzer.resolve_table_alias(self.ctx, Some(table)) {
                    self.analyzer
                        .validate_column(self.ctx, &canonical, &col_ref.column);
                }
            }
        }
    }

    fn visit_subqueries(&mut self, expr: &Expr, depth: usize) {
        if depth > MAX_RECURSION_DEPTH {
            return;
        }
        let next = depth + 1;

        match expr {
            Expr::Subquery(query) | Expr::InSubquery { subquery: query, .. } => {
                self.ctx.enter_subquery();
                self.analyzer.analyze_query(self.ctx, query, None);
                self.ctx.exit_subquery();
            }
            Expr::Exists { subquery, .. } => {
                self.ctx.enter_subquery();
                self.analyzer.analyze_query(self.ctx, subquery, None);
                self.ctx.exit_subquery();
            }
            Expr::BinaryOp { left, right, .. } => {
                self.visit_subqueries(left, next);
                self.visit_subqueries(right, next);
            }
            Expr::UnaryOp { expr, .. } | Expr::Nested(expr) | Expr::Cast { expr, .. } => {
                self.visit_subqueries(expr, next);
            }
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                if let Some(op) = operand {
                    self.visit_subqueries(op, next);
                }
                for case_when in conditions {
                    self.visit_subqueries(&case_when.condition, next);
                    self.visit_subqueries(&case_when.result, next);
                }
                if let Some(el) = else_result {
                    self.visit_subqueries(el, next);
                }
            }
            Expr::InList { expr, list, .. } => {
                self.visit_subqueries(expr, next);
                for item in list {
                    self.visit_subqueries(item, next);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.visit_subqueries(expr, next);
                self.visit_subqueries(low, next);
                self.visit_subqueries(high, next);
            }
            Expr::Function(func) => {
                if let ast::FunctionArguments::List(args) = &func.args {
                    for arg in &args.args {
                        match arg {
                            FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
                            | FunctionArg::Named {
                                arg: FunctionArgExpr::Expr(e),
                                ..
                            } => self.visit_subqueries(e, next),
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Extracts all column references from an expression, including those in
    /// nested function calls, CASE arms, and binary operations. Subquery
    /// internals are excluded; they are analyzed separately.
    pub(crate) fn extract_column_refs(expr: &Expr) -> Vec<ColumnRef> {
        let mut refs = Vec::new();
        Self::collect_column_refs(expr, &mut refs, 0);
        refs
    }

    fn collect_column_refs(expr: &Expr, refs: &mut Vec<ColumnRef>, depth: usize) {
        if depth > MAX_RECURSION_DEPTH {
            return;
        }
        let next = depth + 1;

        match expr {
            Expr::Identifier(ident) => {
                refs.push(ColumnRef {
                    table: None,
                    column: ident.value.clone(),
                });
            }
            Expr::CompoundIdentifier(parts) => {
                if parts.len() >= 2 {
                    let table = parts[..parts.len() - 1]
                        .iter()
                        .map(|i| i.value.as_str())
                        .collect::<Vec<_>>()
                        .join(".");
                    let column = parts.last().unwrap().value.clone();
                    refs.push(ColumnRef {
                        table: Some(table),
                        column,
                    });
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                Self::collect_column_refs(left, refs, next);
                Self::collect_column_refs(right, refs, next);
            }
            Expr::UnaryOp { expr, .. } => {
                Self::collect_column_refs(expr, refs, next);
            }
            Expr::Function(func) => match &func.args {
                ast::FunctionArguments::List(arg_list) => {
                    for arg in &arg_list.args {
                        match arg {
                            FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
                            | FunctionArg::Named {
                                arg: FunctionArgExpr::Expr(e),
                                ..
                            } => {
                                Self::collect_column_refs(e, refs, next);
                            }
                            _ => {}
                        }
                    }
                }
                ast::FunctionArguments::Subquery(_) => {}
                ast::FunctionArguments::None => {}
            },
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                if let Some(op) = operand {
                    Self::collect_column_refs(op, refs, next);
                }
                for case_when in conditions {
                    Self::collect_column_refs(&case_when.condition, refs, next);
                    Self::collect_column_refs(&case_when.result, refs, next);
                }
                if let Some(el) = else_result {
                    Self::collect_column_refs(el, refs, next);
                }
            }
            Expr::Cast { expr, .. } => {
                Self::collect_column_refs(expr, refs, next);
            }
            Expr::Nested(inner) => {
                Self::collect_column_refs(inner, refs, next);
            }
            Expr::Subquery(_) => {}
            Expr::InList { expr, list, .. } => {
                Self::collect_column_refs(expr, refs, next);
                for item in list {
                    Self::collect_column_refs(item, refs, next);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                Self::collect_column_refs(expr, refs, next);
                Self::collect_column_refs(low, refs, next);
                Self::collect_column_refs(high, refs, next);
            }
            Expr::IsNull(e) | Expr::IsNotNull(e) => {
                Self::collect_column_refs(e, refs, next);
            }
            Expr::IsFalse(e) | Expr::IsNotFalse(e) | Expr::IsTrue(e) | Expr::IsNotTrue(e) => {
                Self::collect_column_refs(e, refs, next);
            }
            Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
                Self::collect_column_refs(expr, refs, next);
                Self::collect_column_refs(pattern, refs, next);
            }
            Expr::Tuple(exprs) => {
                for e in exprs {
                    Self::collect_column_refs(e, refs, next);
                }
            }
            Expr::Extract { expr, .. } => {
                Self::collect_column_refs(expr, refs, next);
            }
            _ => {}
        }
    }

    /// Detects an aggregate call in a SELECT-list expression. Window
    /// functions (OVER) do not aggregate the result set and are skipped.
    pub(crate) fn detect_aggregation(&self, expr: &Expr) -> Option<AggregationInfo> {
        self.find_aggregate_function(expr, 0)
    }

    fn find_aggregate_function(&self, expr: &Expr, depth: usize) -> Option<AggregationInfo> {
        if depth > MAX_RECURSION_DEPTH {
            return None;
        }
        let next = depth + 1;

        match expr {
            Expr::Function(func) => self.check_function_for_aggregate(func, next),
            Expr::BinaryOp { left, right, .. } => self
                .find_aggregate_function(left, next)
                .or_else(|| self.find_aggregate_function(right, next)),
            Expr::UnaryOp { expr, .. } | Expr::Nested(expr) | Expr::Cast { expr, .. } => {
                self.find_aggregate_function(expr, next)
            }
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                if let Some(op) = operand {
                    if let Some(agg) = self.find_aggregate_function(op, next) {
                        return Some(agg);
                    }
                }
                for case_when in conditions {
                    if let Some(agg) = self.find_aggregate_function(&case_when.condition, next) {
                        return Some(agg);
                    }
                    if let Some(agg) = self.find_aggregate_function(&case_when.result, next) {
                        return Some(agg);
                    }
                }
                else_result
                    .as_ref()
                    .and_then(|el| self.find_aggregate_function(el, next))
            }
            _ => None,
        }
    }

    fn check_function_for_aggregate(
        &self,
        func: &ast::Function,
        depth: usize,
    ) -> Option<AggregationInfo> {
        let func_name = func.name.to_string();

        if is_aggregate_function(&func_name) && func.over.is_none() {
            let is_distinct = matches!(
                &func.args,
                ast::FunctionArguments::List(args)
                    if args.duplicate_treatment == Some(ast::DuplicateTreatment::Distinct)
            );

            let filter_expression = func.filter.as_ref().map(|f| f.to_string());

            let order_by = if !func.within_group.is_empty() {
                Some(
                    func.within_group
                        .iter()
                        .map(|o| o.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                )
            } else if let ast::FunctionArguments::List(args) = &func.args {
                args.clauses.iter().find_map(|clause| {
                    if let ast::FunctionArgumentClause::OrderBy(order_by) = clause {
                        Some(
                            order_by
                                .iter()
                                .map(|o| o.to_string())
                                .collect::<Vec<_>>()
                                .join(", "),
                        )
                    } else {
                        None
                    }
                })
            } else {
                None
            };

            return Some(AggregationInfo {
                function: func_name.to_uppercase(),
                is_distinct,
                filter_expression,
                order_by,
            });
        }

        // Not an aggregate itself; look for one nested in the arguments.
        if let ast::FunctionArguments::List(arg_list) = &func.args {
            for arg in &arg_list.args {
                let expr = match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
                    | FunctionArg::Named {
                        arg: FunctionArgExpr::Expr(e),
                        ..
                    } => Some(e),
                    _ => None,
                };
                if let Some(e) = expr {
                    if let Some(agg) = self.find_aggregate_function(e, depth) {
                        return Some(agg);
                    }
                }
            }
        }
        None
    }

    /// Derives an output column name from an expression.
    pub(crate) fn derive_column_name(expr: &Expr, index: usize) -> String {
        match expr {
            Expr::Identifier(ident) => ident.value.clone(),
            Expr::CompoundIdentifier(parts) => parts
                .last()
                .map(|i| i.value.clone())
                .unwrap_or_else(|| format!("col_{index}")),
            Expr::Function(func) => func.name.to_string().to_lowercase(),
            _ => format!("col_{index}"),
        }
    }

    /// Captures filter predicates from a WHERE/HAVING/QUALIFY expression and
    /// queues them on the relations they constrain.
    ///
    /// The expression is split on top-level ANDs so each relation node only
    /// carries the predicates that reference its columns. Predicates whose
    /// columns cannot be attributed fall back to every relation in scope.
    pub(crate) fn capture_filter_predicates(&mut self, expr: &Expr, kind: FilterKind) {
        let predicates = Self::split_by_and(expr);

        for predicate in predicates {
            let column_refs = Self::extract_column_refs(predicate);

            let mut affected: Vec<String> = Vec::new();
            for col_ref in &column_refs {
                if let Some(canonical) = self.analyzer.resolve_column_relation_quietly(
                    self.ctx,
                    col_ref.table.as_deref(),
                    &col_ref.column,
                ) {
                    if !affected.contains(&canonical) {
                        affected.push(canonical);
                    }
                }
            }

            if affected.is_empty() && !column_refs.is_empty() {
                affected = self.ctx.relations_in_current_scope();
            }

            let filter_text = predicate.to_string();
            let span = self.analyzer.find_exact_span(&filter_text);
            for canonical in &affected {
                self.ctx
                    .add_filter_for_relation(canonical, filter_text.clone(), span, kind);
            }
        }
    }

    /// Splits an expression on top-level AND into individual predicates.
    fn split_by_and(expr: &Expr) -> Vec<&Expr> {
        let mut predicates = Vec::new();
        Self::collect_and_predicates(expr, &mut predicates);
        predicates
    }

    fn collect_and_predicates<'c>(expr: &'c Expr, predicates: &mut Vec<&'c Expr>) {
        match expr {
            Expr::BinaryOp {
                left,
                op: ast::BinaryOperator::And,
                right,
            } => {
                Self::collect_and_predicates(left, predicates);
                Self::collect_and_predicates(right, predicates);
            }
            _ => predicates.push(expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sql_with_dialect;
    use crate::types::Dialect;
    use sqlparser::ast::{SelectItem, SetExpr, Statement};

    fn projection_exprs(sql: &str) -> Vec<Expr> {
        let statements = parse_sql_with_dialect(sql, Dialect::Ansi).unwrap();
        let Statement::Query(query) = &statements[0] else {
            panic!("expected query");
        };
        let SetExpr::Select(select) = &*query.body else {
            panic!("expected select");
        };
        select
            .projection
            .iter()
            .map(|item| match item {
                SelectItem::UnnamedExpr(expr) => expr.clone(),
                SelectItem::ExprWithAlias { expr, .. } => expr.clone(),
                other => panic!("unexpected projection item {other:?}"),
            })
            .collect()
    }

    #[test]
    fn collects_bare_and_qualified_refs() {
        let exprs = projection_exprs("SELECT a + b, t.c FROM t");
        let refs = ExpressionAnalyzer::extract_column_refs(&exprs[0]);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].column, "a");
        assert!(refs[0].table.is_none());

        let refs = ExpressionAnalyzer::extract_column_refs(&exprs[1]);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].table.as_deref(), Some("t"));
        assert_eq!(refs[0].column, "c");
    }

    #[test]
    fn collects_refs_through_functions_and_case() {
        let exprs =
            projection_exprs("SELECT CASE WHEN x > 0 THEN upper(y) ELSE z END AS v FROM t");
        let refs = ExpressionAnalyzer::extract_column_refs(&exprs[0]);
        let columns: Vec<&str> = refs.iter().map(|r| r.column.as_str()).collect();
        assert_eq!(columns, vec!["x", "y", "z"]);
    }

    #[test]
    fn derives_column_names() {
        let exprs = projection_exprs("SELECT id, t.name, count(x), 1 + 2 FROM t");
        assert_eq!(ExpressionAnalyzer::derive_column_name(&exprs[0], 0), "id");
        assert_eq!(ExpressionAnalyzer::derive_column_name(&exprs[1], 1), "name");
        assert_eq!(
            ExpressionAnalyzer::derive_column_name(&exprs[2], 2),
            "count"
        );
        assert_eq!(
            ExpressionAnalyzer::derive_column_name(&exprs[3], 3),
            "col_3"
        );
    }

    #[test]
    fn aggregate_function_table_is_case_insensitive() {
        assert!(is_aggregate_function("SUM"));
        assert!(is_aggregate_function("Count"));
        assert!(is_aggregate_function("string_agg"));
        assert!(!is_aggregate_function("upper"));
    }
}
