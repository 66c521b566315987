//! Shared graph-building operations: relation resolution and node creation,
//! output-column emission, and wildcard expansion.
//!
//! These sit on `Analyzer` so the SELECT walker, the expression analyzer,
//! and the DML/DDL handlers all build the graph through one code path.

use super::context::{ColumnRef, OutputColumn, StatementContext};
use super::expression::ExpressionAnalyzer;
use super::helpers::{
    extract_simple_name, generate_column_node_id, generate_edge_id, parse_canonical_name,
};
use super::Analyzer;
use crate::types::{issue_codes, AggregationInfo, Edge, EdgeType, Issue, JoinType, Node, NodeType};
use sqlparser::ast::{self, WildcardAdditionalOptions};
use std::collections::{HashMap, HashSet};

/// Parameters for emitting one output column.
pub(super) struct OutputColumnParams {
    pub(super) name: String,
    pub(super) sources: Vec<ColumnRef>,
    pub(super) expression: Option<String>,
    pub(super) data_type: Option<String>,
    pub(super) target_node: Option<String>,
    pub(super) approximate: bool,
    pub(super) aggregation: Option<AggregationInfo>,
}

impl<'a> Analyzer<'a> {
    /// Adds a source relation to the graph, resolving it against CTEs, the
    /// schema index, and relations produced by earlier statements.
    ///
    /// Returns the canonical name and node ID; used by every FROM-entry,
    /// join operand, and DML target.
    pub(super) fn add_source_relation(
        &mut self,
        ctx: &mut StatementContext,
        table_name: &str,
        target_node: Option<&str>,
    ) -> Option<(String, String)> {
        let folded = self.schema.normalize_table_name(table_name);

        // CTE bindings shadow schema tables of the same name.
        if let Some(cte_id) = ctx.cte_definitions.get(&folded).cloned() {
            self.apply_join_metadata_to_existing_node(ctx, &cte_id);
            ctx.register_relation_in_scope(folded.clone(), cte_id.clone());
            self.create_source_edge(ctx, &folded, &cte_id, target_node);
            return Some((folded, cte_id));
        }

        let resolution = self.schema.canonicalize_table_reference(table_name);
        let canonical = resolution.canonical.clone();
        if canonical.is_empty() {
            return None;
        }

        let (node_id, node_type) = self.tracker.relation_identity(&canonical);
        let resolved = resolution.matched || self.tracker.was_produced(&canonical);

        if !ctx.node_ids.contains(&node_id) {
            self.create_relation_node(ctx, table_name, &canonical, &node_id, node_type, resolved);
        } else {
            self.apply_join_metadata_to_existing_node(ctx, &node_id);
        }

        ctx.register_relation_in_scope(canonical.clone(), node_id.clone());
        self.create_source_edge(ctx, &canonical, &node_id, target_node);

        Some((canonical, node_id))
    }

    fn create_relation_node(
        &mut self,
        ctx: &mut StatementContext,
        surface: &str,
        canonical: &str,
        node_id: &str,
        node_type: NodeType,
        resolved: bool,
    ) {
        if !resolved {
            let mut issue = Issue::warning(
                issue_codes::UNKNOWN_TABLE,
                format!("Table '{canonical}' is not in scope and not present in the schema"),
            )
            .with_statement(ctx.statement_index);
            if let Some(span) = self.find_span(canonical) {
                issue = issue.with_span(span);
            }
            self.push_issue(issue);
        }

        let mut node = match node_type {
            NodeType::View => Node::view(node_id.to_string(), extract_simple_name(surface)),
            _ => Node::table(node_id.to_string(), extract_simple_name(surface)),
        }
        .with_qualified_name(canonical);
        if resolved {
            node = node.with_canonical_name(parse_canonical_name(canonical));
        }
        if let Some(span) = self.find_span(canonical) {
            node = node.with_span(span);
        }
        node.join_type = ctx.current_join_info.join_type;
        node.join_condition = ctx.current_join_info.join_condition.clone();

        ctx.add_node(node);
    }

    /// Copies pending join metadata onto a node that already exists (a CTE
    /// or a relation referenced a second time, now as a join operand).
    fn apply_join_metadata_to_existing_node(&self, ctx: &mut StatementContext, node_id: &str) {
        let join_type = ctx.current_join_info.join_type;
        let join_condition = ctx.current_join_info.join_condition.clone();

        if join_type.is_none() && join_condition.is_none() {
            return;
        }

        if let Some(node) = ctx.node_mut(node_id) {
            if node.join_type.is_none() {
                node.join_type = join_type;
            }
            if node.join_condition.is_none() {
                node.join_condition = join_condition;
            }
        }
    }

    /// Emits a relation-level data-flow edge into `target_node`, used for
    /// CTE bodies and DDL/DML targets. The virtual output node never
    /// receives relation-level edges; column-level lineage covers it. A
    /// self-edge is only kept for recursive CTEs, where it is explicitly
    /// marked.
    fn create_source_edge(
        &mut self,
        ctx: &mut StatementContext,
        canonical: &str,
        source_id: &str,
        target_node: Option<&str>,
    ) {
        let Some(target) = target_node else { return };
        if ctx.output_node_id.as_deref() == Some(target) {
            return;
        }

        let recursive_self_ref = source_id == target;
        if recursive_self_ref && !ctx.recursive_ctes.contains(canonical) {
            return;
        }

        let edge_id = generate_edge_id("data_flow", source_id, target);
        if ctx.edge_ids.contains(&edge_id) {
            return;
        }

        let mut edge = Edge::data_flow(edge_id, source_id.to_string(), target.to_string());
        if recursive_self_ref {
            edge = edge.with_operation("RECURSIVE");
        } else if let Some(op) = ctx.last_operation.as_deref() {
            edge = edge.with_operation(op);
        }
        ctx.add_edge(edge);
    }

    /// Creates column nodes plus ownership edges for every schema column of
    /// a relation. Used for DML targets so target columns exist up front.
    pub(super) fn add_relation_columns_from_schema(
        &mut self,
        ctx: &mut StatementContext,
        canonical: &str,
        relation_node_id: &str,
    ) {
        let Some(entry) = self.schema.get(canonical) else {
            return;
        };
        let columns: Vec<(String, Option<String>)> = entry
            .table
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.data_type.clone()))
            .collect();

        for (name, _data_type) in columns {
            self.ensure_source_column(ctx, canonical, relation_node_id, &name);
        }
    }

    /// Creates (or finds) the column node of `canonical`.`column` with its
    /// ownership edge, returning the column node ID.
    pub(super) fn ensure_source_column(
        &mut self,
        ctx: &mut StatementContext,
        canonical: &str,
        relation_node_id: &str,
        column: &str,
    ) -> String {
        // CTE output columns already have nodes; reuse them.
        if let Some(cte_cols) = ctx.cte_columns.get(canonical) {
            let folded = self.schema.normalize_identifier(column);
            if let Some(col) = cte_cols.iter().find(|c| c.name == folded) {
                return col.node_id.clone();
            }
        }

        let folded = self.schema.normalize_identifier(column);
        let col_node_id = generate_column_node_id(Some(relation_node_id), &folded);

        if !ctx.node_ids.contains(&col_node_id) {
            let mut node = Node::column(col_node_id.clone(), column)
                .with_qualified_name(format!("{canonical}.{folded}"));
            if self.schema.is_known(canonical) {
                node = node.with_canonical_name(
                    parse_canonical_name(canonical).with_column(folded.clone()),
                );
            }
            if self.opts.propagate_tags {
                node.tags = self.schema.column_tags(canonical, column);
            }
            ctx.add_node(node);
        }

        let edge_id = generate_edge_id("ownership", relation_node_id, &col_node_id);
        if !ctx.edge_ids.contains(&edge_id) {
            ctx.add_edge(Edge::ownership(
                edge_id,
                relation_node_id.to_string(),
                col_node_id.clone(),
            ));
        }

        col_node_id
    }

    /// Emits one output column: its node, the ownership edge from the
    /// owning node, and data-flow/derivation edges from each source column.
    pub(super) fn add_output_column(
        &mut self,
        ctx: &mut StatementContext,
        mut params: OutputColumnParams,
    ) {
        // An INSERT column list renames projections positionally.
        if let Some(target_name) = ctx.next_target_column(params.target_node.as_deref()) {
            params.name = target_name;
        }

        let normalized_name = self.schema.normalize_identifier(&params.name);
        let node_id = generate_column_node_id(params.target_node.as_deref(), &normalized_name);

        let mut col_node = Node::column(node_id.clone(), normalized_name.clone());
        if let Some(expr) = &params.expression {
            col_node = col_node.with_expression(expr.clone());
        }
        if let Some(aggregation) = params.aggregation.clone() {
            col_node = col_node.with_aggregation(aggregation);
        }
        ctx.add_node(col_node);

        if let Some(target) = &params.target_node {
            let edge_id = generate_edge_id("ownership", target, &node_id);
            if !ctx.edge_ids.contains(&edge_id) {
                ctx.add_edge(Edge::ownership(edge_id, target.clone(), node_id.clone()));
            }
        }

        for source in &params.sources {
            let Some(canonical) =
                self.resolve_column_relation(ctx, source.table.as_deref(), &source.column)
            else {
                continue;
            };

            let relation_node_id = ctx
                .relation_node_ids
                .get(&canonical)
                .cloned()
                .or_else(|| ctx.cte_definitions.get(&canonical).cloned())
                .unwrap_or_else(|| self.tracker.relation_node_id(&canonical));

            self.validate_column(ctx, &canonical, &source.column);

            let source_col_id =
                self.ensure_source_column(ctx, &canonical, &relation_node_id, &source.column);

            // A column projected onto itself (recursive CTE) adds nothing.
            if source_col_id == node_id {
                continue;
            }

            let edge_type = if params.expression.is_some() {
                EdgeType::Derivation
            } else {
                EdgeType::DataFlow
            };
            let type_key = match edge_type {
                EdgeType::Derivation => "derivation",
                _ => "data_flow",
            };
            let flow_edge_id = generate_edge_id(type_key, &source_col_id, &node_id);
            if !ctx.edge_ids.contains(&flow_edge_id) {
                let mut edge = Edge::new(flow_edge_id, source_col_id, node_id.clone(), edge_type);
                if let Some(expr) = &params.expression {
                    edge = edge.with_expression(expr.clone());
                }
                if params.approximate {
                    edge = edge.approximate();
                }
                ctx.add_edge(edge);
            }
        }

        ctx.output_columns.push(OutputColumn {
            name: normalized_name,
            data_type: params.data_type,
            node_id,
        });
    }

    /// Resolves the relation owning a bare or qualified column reference,
    /// recording `UNKNOWN_COLUMN`/`AMBIGUOUS_COLUMN` issues.
    pub(super) fn resolve_column_relation(
        &mut self,
        ctx: &StatementContext,
        qualifier: Option<&str>,
        column: &str,
    ) -> Option<String> {
        match self.resolve_column_relation_inner(ctx, qualifier, column) {
            Ok(canonical) => canonical,
            Err(issue) => {
                self.push_issue(issue);
                None
            }
        }
    }

    /// Like [`Self::resolve_column_relation`] but never records issues.
    /// Filter capture uses this so predicates do not double-report columns
    /// the projection already flagged.
    pub(super) fn resolve_column_relation_quietly(
        &self,
        ctx: &StatementContext,
        qualifier: Option<&str>,
        column: &str,
    ) -> Option<String> {
        self.resolve_column_relation_inner(ctx, qualifier, column)
            .unwrap_or(None)
    }

    fn resolve_column_relation_inner(
        &self,
        ctx: &StatementContext,
        qualifier: Option<&str>,
        column: &str,
    ) -> Result<Option<String>, Issue> {
        if qualifier.is_some() {
            return Ok(self.resolve_table_alias(ctx, qualifier));
        }

        let relations = ctx.relations_in_current_scope();

        // With a single visible relation, the column is assumed to belong to
        // it; schema validation reports a missing column separately.
        if relations.len() == 1 {
            return Ok(Some(relations[0].clone()));
        }

        let folded = self.schema.normalize_identifier(column);
        let mut candidates: Vec<String> = Vec::new();
        for canonical in &relations {
            if let Some(cte_cols) = ctx.cte_columns.get(canonical) {
                if cte_cols.iter().any(|c| c.name == folded) {
                    candidates.push(canonical.clone());
                    continue;
                }
            }
            if self.schema.table_has_column(canonical, column) {
                candidates.push(canonical.clone());
            }
        }

        match candidates.len() {
            1 => Ok(candidates.into_iter().next()),
            0 => {
                let mut issue = Issue::warning(
                    issue_codes::UNKNOWN_COLUMN,
                    format!("Column '{column}' not found on any visible relation"),
                )
                .with_statement(ctx.statement_index);
                if let Some(span) = self.find_span(column) {
                    issue = issue.with_span(span);
                }
                Err(issue)
            }
            _ => {
                let mut sorted = candidates;
                sorted.sort();
                let mut issue = Issue::warning(
                    issue_codes::AMBIGUOUS_COLUMN,
                    format!(
                        "Column '{}' matches multiple visible relations: {}",
                        column,
                        sorted.join(", ")
                    ),
                )
                .with_statement(ctx.statement_index);
                if let Some(span) = self.find_span(column) {
                    issue = issue.with_span(span);
                }
                Err(issue)
            }
        }
    }

    /// Resolves an alias or surface name to a canonical relation name,
    /// walking scopes innermost-to-outermost.
    pub(super) fn resolve_table_alias(
        &self,
        ctx: &StatementContext,
        qualifier: Option<&str>,
    ) -> Option<String> {
        let q = qualifier?;

        for scope in ctx.scope_stack.iter().rev() {
            if let Some(canonical) = scope.aliases.get(q) {
                return Some(canonical.clone());
            }
        }

        if let Some(canonical) = ctx.table_aliases.get(q) {
            return Some(canonical.clone());
        }

        let folded = self.schema.normalize_table_name(q);
        if ctx.cte_definitions.contains_key(&folded) {
            return Some(folded);
        }
        if ctx.subquery_aliases.contains(q) {
            // Derived-table alias with no canonical name.
            return None;
        }

        Some(self.schema.canonicalize_table_reference(q).canonical)
    }

    /// Expands `*` / `t.*` over the visible relations in FROM order.
    ///
    /// EXCEPT/EXCLUDE prune the expansion set and REPLACE rewrites matching
    /// columns into derivations, both only when the dialect parsed them.
    /// Relations with no known column list produce a `WILDCARD_NO_SCHEMA`
    /// info issue and an approximate relation-level edge so the graph shape
    /// survives.
    pub(super) fn expand_wildcard(
        &mut self,
        ctx: &mut StatementContext,
        qualifier: Option<&str>,
        options: &WildcardAdditionalOptions,
        target_node: Option<&str>,
    ) {
        let relations: Vec<String> = if let Some(q) = qualifier {
            self.resolve_table_alias(ctx, Some(q)).into_iter().collect()
        } else {
            ctx.relations_in_current_scope()
        };

        let excluded = self.wildcard_exclusions(options);
        let replacements = self.wildcard_replacements(options);

        for canonical in relations {
            let columns = match self.known_columns(ctx, &canonical) {
                Some(columns) if self.opts.resolve_wildcards => columns,
                Some(_) => {
                    // Expansion disabled by request; keep the shape only.
                    self.add_approximate_wildcard_edge(ctx, &canonical, target_node);
                    continue;
                }
                None => {
                    self.report_unexpanded_wildcard(ctx, &canonical, target_node);
                    continue;
                }
            };

            for (column, data_type) in columns {
                let folded = self.schema.normalize_identifier(&column);
                if excluded.contains(&folded) {
                    continue;
                }

                if let Some(replacement) = replacements.get(&folded) {
                    let sources = ExpressionAnalyzer::extract_column_refs(replacement);
                    self.add_output_column(
                        ctx,
                        OutputColumnParams {
                            name: column,
                            sources,
                            expression: Some(replacement.to_string()),
                            data_type,
                            target_node: target_node.map(|t| t.to_string()),
                            approximate: false,
                            aggregation: None,
                        },
                    );
                    continue;
                }

                self.add_output_column(
                    ctx,
                    OutputColumnParams {
                        name: column.clone(),
                        sources: vec![ColumnRef {
                            table: Some(canonical.clone()),
                            column,
                        }],
                        expression: None,
                        data_type,
                        target_node: target_node.map(|t| t.to_string()),
                        approximate: false,
                        aggregation: None,
                    },
                );
            }
        }
    }

    /// The column list of a relation, from CTE output columns or the schema.
    fn known_columns(
        &self,
        ctx: &StatementContext,
        canonical: &str,
    ) -> Option<Vec<(String, Option<String>)>> {
        if let Some(cte_cols) = ctx.cte_columns.get(canonical) {
            if !cte_cols.is_empty() {
                return Some(
                    cte_cols
                        .iter()
                        .map(|c| (c.name.clone(), c.data_type.clone()))
                        .collect(),
                );
            }
        }

        self.schema.get(canonical).and_then(|entry| {
            let columns: Vec<(String, Option<String>)> = entry
                .table
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.data_type.clone()))
                .collect();
            (!columns.is_empty()).then_some(columns)
        })
    }

    fn report_unexpanded_wildcard(
        &mut self,
        ctx: &mut StatementContext,
        canonical: &str,
        target_node: Option<&str>,
    ) {
        let mut issue = Issue::info(
            issue_codes::WILDCARD_NO_SCHEMA,
            format!("Cannot expand '*' for '{canonical}': column list unknown without schema"),
        )
        .with_statement(ctx.statement_index);
        if let Some(span) = self.find_span(canonical) {
            issue = issue.with_span(span);
        }
        self.push_issue(issue);

        self.add_approximate_wildcard_edge(ctx, canonical, target_node);
    }

    /// Preserves graph shape when a wildcard is not expanded: one
    /// relation-level edge marked approximate.
    fn add_approximate_wildcard_edge(
        &mut self,
        ctx: &mut StatementContext,
        canonical: &str,
        target_node: Option<&str>,
    ) {
        let Some(target) = target_node else { return };
        if let Some(source_node_id) = ctx.relation_node_ids.get(canonical).cloned() {
            let edge_id = generate_edge_id("data_flow", &source_node_id, target);
            if !ctx.edge_ids.contains(&edge_id) {
                ctx.add_edge(
                    Edge::data_flow(edge_id, source_node_id, target.to_string()).approximate(),
                );
            }
        }
    }

    fn wildcard_exclusions(&self, options: &WildcardAdditionalOptions) -> HashSet<String> {
        let mut excluded = HashSet::new();

        if let Some(except) = &options.opt_except {
            excluded.insert(self.schema.normalize_identifier(&except.first_element.value));
            for ident in &except.additional_elements {
                excluded.insert(self.schema.normalize_identifier(&ident.value));
            }
        }

        if let Some(exclude) = &options.opt_exclude {
            match exclude {
                ast::ExcludeSelectItem::Single(ident) => {
                    excluded.insert(self.schema.normalize_identifier(&ident.value));
                }
                ast::ExcludeSelectItem::Multiple(idents) => {
                    for ident in idents {
                        excluded.insert(self.schema.normalize_identifier(&ident.value));
                    }
                }
            }
        }

        excluded
    }

    fn wildcard_replacements(
        &self,
        options: &WildcardAdditionalOptions,
    ) -> HashMap<String, ast::Expr> {
        let mut replacements = HashMap::new();
        if let Some(replace) = &options.opt_replace {
            for item in &replace.items {
                replacements.insert(
                    self.schema.normalize_identifier(&item.column_name.value),
                    item.expr.clone(),
                );
            }
        }
        replacements
    }

    /// Converts an AST join operator to the wire `JoinType` plus condition.
    pub(super) fn convert_join_operator(
        op: &ast::JoinOperator,
    ) -> (Option<JoinType>, Option<String>) {
        match op {
            ast::JoinOperator::Join(constraint) | ast::JoinOperator::Inner(constraint) => (
                Some(JoinType::Inner),
                Self::extract_join_condition(constraint),
            ),
            ast::JoinOperator::Left(constraint) | ast::JoinOperator::LeftOuter(constraint) => (
                Some(JoinType::Left),
                Self::extract_join_condition(constraint),
            ),
            ast::JoinOperator::Right(constraint) | ast::JoinOperator::RightOuter(constraint) => (
                Some(JoinType::Right),
                Self::extract_join_condition(constraint),
            ),
            ast::JoinOperator::FullOuter(constraint) => (
                Some(JoinType::Full),
                Self::extract_join_condition(constraint),
            ),
            ast::JoinOperator::CrossJoin(_) => (Some(JoinType::Cross), None),
            ast::JoinOperator::Semi(constraint) | ast::JoinOperator::LeftSemi(constraint) => (
                Some(JoinType::LeftSemi),
                Self::extract_join_condition(constraint),
            ),
            ast::JoinOperator::RightSemi(constraint) => (
                Some(JoinType::RightSemi),
                Self::extract_join_condition(constraint),
            ),
            ast::JoinOperator::Anti(constraint) | ast::JoinOperator::LeftAnti(constraint) => (
                Some(JoinType::LeftAnti),
                Self::extract_join_condition(constraint),
            ),
            ast::JoinOperator::RightAnti(constraint) => (
                Some(JoinType::RightAnti),
                Self::extract_join_condition(constraint),
            ),
            ast::JoinOperator::CrossApply => (Some(JoinType::CrossApply), None),
            ast::JoinOperator::OuterApply => (Some(JoinType::OuterApply), None),
            ast::JoinOperator::AsOf { constraint, .. } => (
                Some(JoinType::AsOf),
                Self::extract_join_condition(constraint),
            ),
            ast::JoinOperator::StraightJoin(constraint) => (
                Some(JoinType::Inner),
                Self::extract_join_condition(constraint),
            ),
        }
    }

    fn extract_join_condition(constraint: &ast::JoinConstraint) -> Option<String> {
        match constraint {
            ast::JoinConstraint::On(expr) => Some(expr.to_string()),
            ast::JoinConstraint::Using(columns) => {
                let col_names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
                Some(format!("USING ({})", col_names.join(", ")))
            }
            ast::JoinConstraint::Natural => Some("NATURAL".to_string()),
            ast::JoinConstraint::None => None,
        }
    }
}
