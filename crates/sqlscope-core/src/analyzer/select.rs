//! Query walking: CTEs, set operations, FROM/JOIN traversal, projections,
//! and filter capture.
//!
//! `QueryWalker` drives one query expression (and everything nested in it)
//! against a statement context. Data flows into `target`: the virtual
//! output node for a plain SELECT, the created relation for CTAS/VIEW, the
//! target table for INSERT, or a CTE node for CTE bodies.

use super::context::StatementContext;
use super::expression::ExpressionAnalyzer;
use super::helpers::{generate_edge_id, generate_node_id, is_simple_column_ref};
use super::query::OutputColumnParams;
use super::Analyzer;
use crate::types::{issue_codes, Edge, FilterKind, Issue, Node};
use sqlparser::ast::{self, Query, Select, SelectItem, SetExpr, TableFactor, TableWithJoins};

pub(crate) struct QueryWalker<'a, 'b> {
    pub(crate) analyzer: &'a mut Analyzer<'b>,
    pub(crate) ctx: &'a mut StatementContext,
    target: Option<String>,
}

impl<'a, 'b> QueryWalker<'a, 'b> {
    pub(crate) fn new(
        analyzer: &'a mut Analyzer<'b>,
        ctx: &'a mut StatementContext,
        target: Option<String>,
    ) -> Self {
        Self {
            analyzer,
            ctx,
            target,
        }
    }

    pub(crate) fn walk_query(&mut self, query: &Query) {
        if let Some(with) = &query.with {
            self.walk_with(with);
        }
        self.walk_set_expr(&query.body);
    }

    /// Walks a WITH list. Each CTE is visible to later siblings; a
    /// recursive CTE is additionally visible to its own body.
    fn walk_with(&mut self, with: &ast::With) {
        for cte in &with.cte_tables {
            let surface = cte.alias.name.value.clone();
            let folded = self.analyzer.schema.normalize_table_name(&surface);

            let node_id = generate_node_id("cte", &folded);
            let mut node = Node::cte(node_id.clone(), surface.clone())
                .with_qualified_name(folded.clone())
                .with_canonical_name(super::helpers::parse_canonical_name(&folded));
            if with.recursive {
                node = node.recursive();
            }
            if let Some(span) = self.analyzer.find_span(&surface) {
                node = node.with_span(span);
            }
            self.ctx.add_node(node);

            if with.recursive {
                self.ctx.recursive_ctes.insert(folded.clone());
                self.ctx
                    .cte_definitions
                    .insert(folded.clone(), node_id.clone());
                let mut issue = Issue::info(
                    issue_codes::RECURSIVE_CTE_SELF_REF,
                    format!("Recursive CTE '{surface}' references itself"),
                )
                .with_statement(self.ctx.statement_index);
                if let Some(span) = self.analyzer.find_span(&surface) {
                    issue = issue.with_span(span);
                }
                self.analyzer.push_issue(issue);
            }

            self.ctx.enter_cte();
            let checkpoint = self.ctx.projection_checkpoint();
            {
                let mut body_walker =
                    QueryWalker::new(self.analyzer, self.ctx, Some(node_id.clone()));
                body_walker.walk_query(&cte.query);
            }
            let mut columns = self.ctx.take_output_columns_since(checkpoint);
            self.ctx.exit_cte();

            // A column alias list on the CTE renames its outputs positionally.
            for (column, alias) in columns.iter_mut().zip(cte.alias.columns.iter()) {
                column.name = self.analyzer.schema.normalize_identifier(&alias.name.value);
            }

            self.ctx
                .cte_definitions
                .insert(folded.clone(), node_id.clone());
            self.ctx.cte_columns.insert(folded, columns);
        }
    }

    pub(crate) fn walk_set_expr(&mut self, set_expr: &SetExpr) {
        match set_expr {
            SetExpr::Select(select) => self.walk_select(select),
            SetExpr::Query(query) => self.walk_query(query),
            SetExpr::SetOperation {
                op, left, right, ..
            } => {
                let op_name = match op {
                    ast::SetOperator::Union => "UNION",
                    ast::SetOperator::Intersect => "INTERSECT",
                    ast::SetOperator::Except | ast::SetOperator::Minus => "EXCEPT",
                };
                self.ctx.last_operation = Some(op_name.to_string());
                self.walk_set_expr(left);
                self.ctx.last_operation = Some(op_name.to_string());
                self.walk_set_expr(right);
                self.ctx.last_operation = None;
            }
            SetExpr::Values(values) => self.walk_values(values),
            _ => {}
        }
    }

    fn walk_values(&mut self, values: &ast::Values) {
        let mut expr_analyzer = ExpressionAnalyzer::new(self.analyzer, self.ctx);
        for row in &values.rows {
            for expr in row {
                expr_analyzer.analyze(expr);
            }
        }
    }

    fn walk_select(&mut self, select: &Select) {
        self.ctx.push_scope();

        for table_with_joins in &select.from {
            self.walk_table_with_joins(table_with_joins);
        }

        self.walk_projection(select);

        if let Some(where_clause) = &select.selection {
            let mut ea = ExpressionAnalyzer::new(self.analyzer, self.ctx);
            ea.analyze(where_clause);
            if ea.analyzer.opts.collect_filters {
                ea.capture_filter_predicates(where_clause, FilterKind::Where);
            }
        }

        match &select.group_by {
            ast::GroupByExpr::Expressions(exprs, _) => {
                let mut ea = ExpressionAnalyzer::new(self.analyzer, self.ctx);
                for group_by in exprs {
                    ea.analyze(group_by);
                }
            }
            ast::GroupByExpr::All(_) => {}
        }

        if let Some(having) = &select.having {
            let mut ea = ExpressionAnalyzer::new(self.analyzer, self.ctx);
            ea.analyze(having);
            if ea.analyzer.opts.collect_filters {
                ea.capture_filter_predicates(having, FilterKind::Having);
            }
        }

        if let Some(qualify) = &select.qualify {
            let mut ea = ExpressionAnalyzer::new(self.analyzer, self.ctx);
            ea.analyze(qualify);
            if ea.analyzer.opts.collect_filters {
                ea.capture_filter_predicates(qualify, FilterKind::Qualify);
            }
        }

        self.ctx.pop_scope();
    }

    fn walk_projection(&mut self, select: &Select) {
        for (idx, item) in select.projection.iter().enumerate() {
            match item {
                SelectItem::UnnamedExpr(expr) => {
                    let name = ExpressionAnalyzer::derive_column_name(expr, idx);
                    self.add_projection_column(expr, name);
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    self.add_projection_column(expr, alias.value.clone());
                }
                SelectItem::QualifiedWildcard(kind, options) => {
                    let qualifier = kind.to_string();
                    let qualifier = qualifier.trim_end_matches(".*").to_string();
                    self.analyzer.expand_wildcard(
                        self.ctx,
                        Some(&qualifier),
                        options,
                        self.target.as_deref(),
                    );
                }
                SelectItem::Wildcard(options) => {
                    self.analyzer
                        .expand_wildcard(self.ctx, None, options, self.target.as_deref());
                }
            }
        }
    }

    fn add_projection_column(&mut self, expr: &ast::Expr, name: String) {
        let sources = ExpressionAnalyzer::extract_column_refs(expr);
        let aggregation = {
            let ea = ExpressionAnalyzer::new(self.analyzer, self.ctx);
            ea.detect_aggregation(expr)
        };
        let expr_text = if is_simple_column_ref(expr) {
            None
        } else {
            Some(expr.to_string())
        };

        // Subqueries in the projection contribute their own relations.
        {
            let mut ea = ExpressionAnalyzer::new(self.analyzer, self.ctx);
            ea.analyze(expr);
        }

        self.analyzer.add_output_column(
            self.ctx,
            OutputColumnParams {
                name,
                sources,
                expression: expr_text,
                data_type: None,
                target_node: self.target.clone(),
                approximate: false,
                aggregation,
            },
        );
    }

    pub(crate) fn walk_table_with_joins(&mut self, table_with_joins: &TableWithJoins) {
        let mut previous = self.walk_table_factor(&table_with_joins.relation);

        for join in &table_with_joins.joins {
            let (join_type, join_condition) = Analyzer::convert_join_operator(&join.join_operator);
            self.ctx.current_join_info.join_type = join_type;
            self.ctx.current_join_info.join_condition = join_condition.clone();
            self.ctx.join_count += 1;

            let joined = self.walk_table_factor(&join.relation);

            // Relation-to-relation join dependency (left → right).
            if let (Some((_, left_id)), Some((joined_canonical, joined_id))) =
                (previous.as_ref(), joined.as_ref())
            {
                let edge_id = generate_edge_id("join_dependency", left_id, joined_id);
                if !self.ctx.edge_ids.contains(&edge_id) {
                    let mut edge = Edge::join_dependency(
                        edge_id,
                        left_id.clone(),
                        joined_id.clone(),
                    );
                    edge.join_type = join_type;
                    edge.join_condition = join_condition.clone();
                    self.ctx.add_edge(edge);
                }

                if self.analyzer.opts.collect_filters {
                    if let Some(condition) = &join_condition {
                        let span = self.analyzer.find_exact_span(condition);
                        self.ctx.add_filter_for_relation(
                            joined_canonical,
                            condition.clone(),
                            span,
                            FilterKind::On,
                        );
                    }
                }
            }

            if joined.is_some() {
                previous = joined;
            }

            self.ctx.current_join_info.join_type = None;
            self.ctx.current_join_info.join_condition = None;
        }
    }

    /// Walks one table factor. Returns `(canonical, node_id)` for plain
    /// relation references; derived tables and nested joins return `None`.
    pub(crate) fn walk_table_factor(
        &mut self,
        table_factor: &TableFactor,
    ) -> Option<(String, String)> {
        match table_factor {
            TableFactor::Table { name, alias, .. } => {
                let table_name = name.to_string();
                let resolved = self.analyzer.add_source_relation(
                    self.ctx,
                    &table_name,
                    self.target.as_deref(),
                );
                if let (Some(a), Some((canonical, _))) = (alias, resolved.as_ref()) {
                    self.ctx
                        .register_alias_in_scope(a.name.value.clone(), canonical.clone());
                }
                resolved
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                self.ctx.enter_subquery();
                let checkpoint = self.ctx.projection_checkpoint();
                {
                    let mut sub_walker = QueryWalker::new(self.analyzer, self.ctx, None);
                    sub_walker.walk_query(subquery);
                }
                let columns = self.ctx.take_output_columns_since(checkpoint);
                self.ctx.exit_subquery();

                if let Some(a) = alias {
                    let alias_name = a.name.value.clone();
                    let folded = self.analyzer.schema.normalize_identifier(&alias_name);
                    self.ctx.cte_columns.insert(folded, columns);
                    self.ctx.register_subquery_alias_in_scope(alias_name);
                }
                None
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                self.walk_table_with_joins(table_with_joins);
                None
            }
            TableFactor::Pivot { table, alias, .. }
            | TableFactor::Unpivot { table, alias, .. } => {
                let inner = self.walk_table_factor(table);
                if let Some(a) = alias {
                    self.ctx
                        .register_subquery_alias_in_scope(a.name.value.clone());
                }
                inner
            }
            _ => None,
        }
    }
}
