//! Statement dispatch, DML analysis, and per-statement finalization.
//!
//! Classifies each parsed statement, routes it to the right extractor, and
//! finalizes the statement graph: attaching collected filters, propagating
//! tags, imposing the canonical node/edge order, and computing counts.

use super::context::StatementContext;
use super::expression::ExpressionAnalyzer;
use super::helpers::{classify_query_type, extract_simple_name, is_simple_column_ref};
use super::query::OutputColumnParams;
use super::select::QueryWalker;
use super::{complexity, tags, Analyzer};
use crate::types::{
    issue_codes, EdgeType, FilterKind, Issue, NodeType, Span, StatementLineage, StatementType,
};
use sqlparser::ast::{
    self, Assignment, AssignmentTarget, Expr, FromTable, Statement, TableFactor, TableWithJoins,
};

impl<'a> Analyzer<'a> {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, statement), fields(index))
    )]
    pub(super) fn analyze_statement(
        &mut self,
        index: usize,
        statement: &Statement,
        source_name: Option<String>,
        span: Span,
    ) -> StatementLineage {
        let mut ctx = StatementContext::new(index);

        let statement_type = match statement {
            Statement::Query(query) => {
                let output = ctx.ensure_output_node();
                let mut walker = QueryWalker::new(self, &mut ctx, Some(output));
                walker.walk_query(query);
                classify_query_type(query)
            }
            Statement::Insert(insert) => {
                self.analyze_insert(&mut ctx, insert);
                StatementType::Insert
            }
            Statement::CreateTable(create) => {
                if let Some(query) = &create.query {
                    self.analyze_create_table_as(&mut ctx, &create.name, query, create.temporary);
                } else {
                    self.analyze_create_table(
                        &mut ctx,
                        &create.name,
                        &create.columns,
                        &create.constraints,
                        create.temporary,
                    );
                }
                StatementType::CreateTable
            }
            Statement::CreateView {
                name,
                query,
                temporary,
                ..
            } => {
                self.analyze_create_view(&mut ctx, name, query, *temporary);
                StatementType::CreateView
            }
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                ..
            } => {
                self.analyze_update(&mut ctx, table, assignments, from, selection);
                StatementType::Update
            }
            Statement::Delete(delete) => {
                self.analyze_delete(&mut ctx, &delete.from, &delete.using, &delete.selection);
                StatementType::Delete
            }
            other => {
                // DROP is still honored for implied-schema bookkeeping even
                // though it classifies as OTHER like everything else here.
                if let Statement::Drop {
                    object_type, names, ..
                } = other
                {
                    self.analyze_drop(object_type, names);
                }
                self.push_issue(
                    Issue::warning(
                        issue_codes::UNSUPPORTED_STATEMENT,
                        "Statement type is not supported for lineage analysis",
                    )
                    .with_statement(index)
                    .with_span(span),
                );
                StatementType::Other
            }
        };

        self.finalize_statement(ctx, index, statement_type, source_name, span)
    }

    fn finalize_statement(
        &mut self,
        mut ctx: StatementContext,
        index: usize,
        statement_type: StatementType,
        source_name: Option<String>,
        span: Span,
    ) -> StatementLineage {
        self.apply_pending_filters(&mut ctx);

        if self.opts.propagate_tags {
            tags::propagate_statement_tags(&mut ctx);
            self.carry_tags_into_implied_schema(&ctx);
        }

        impose_canonical_order(&mut ctx);

        let column_count = ctx
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Column)
            .count();
        let complexity_score = complexity::calculate_complexity(
            complexity::ComplexityInputs {
                join_count: ctx.join_count,
                node_count: ctx.nodes.len(),
                cte_depth: ctx.max_cte_depth,
                subquery_depth: ctx.max_subquery_depth,
                column_count,
            },
            &self.opts.complexity_weights,
        );

        StatementLineage {
            statement_index: index,
            statement_type,
            source_name,
            nodes: ctx.nodes,
            edges: ctx.edges,
            join_count: ctx.join_count,
            complexity_score,
            span,
        }
    }

    fn apply_pending_filters(&mut self, ctx: &mut StatementContext) {
        let mut pending: Vec<(String, Vec<crate::types::FilterPredicate>)> =
            ctx.pending_filters.drain().collect();
        pending.sort_by(|a, b| a.0.cmp(&b.0));

        for (canonical, filters) in pending {
            if let Some(node) = ctx
                .nodes
                .iter_mut()
                .find(|n| n.qualified_name.as_deref() == Some(&canonical))
            {
                node.filters.extend(filters);
            }
        }
    }

    /// Copies propagated tags on a created relation's columns into its
    /// implied schema entry so later statements keep propagating them.
    fn carry_tags_into_implied_schema(&mut self, ctx: &StatementContext) {
        let Some((canonical, node_id)) = ctx.created_relation.clone() else {
            return;
        };

        let owned: Vec<(String, Vec<String>)> = ctx
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Ownership && e.from == node_id)
            .filter_map(|e| {
                let node = ctx.nodes.iter().find(|n| n.id == e.to)?;
                let names: Vec<String> = node.tags.iter().map(|t| t.name.clone()).collect();
                (!names.is_empty()).then(|| (node.label.clone(), names))
            })
            .collect();

        for (column, classifications) in owned {
            self.schema
                .add_classifications(&canonical, &column, &classifications);
        }
    }

    fn analyze_insert(&mut self, ctx: &mut StatementContext, insert: &ast::Insert) {
        let target_name = insert.table.to_string();
        let canonical = self.schema.normalize_table_name(&target_name);
        let (node_id, _) = self.tracker.relation_identity(&canonical);

        let mut node = crate::types::Node::table(node_id.clone(), extract_simple_name(&target_name))
            .with_qualified_name(canonical.clone());
        if self.schema.is_known(&canonical) || self.tracker.was_produced(&canonical) {
            node = node.with_canonical_name(super::helpers::parse_canonical_name(&canonical));
        }
        if let Some(span) = self.find_span(&canonical) {
            node = node.with_span(span);
        }
        ctx.add_node(node);
        ctx.relation_node_ids.insert(canonical.clone(), node_id.clone());

        self.tracker.record_produced(&canonical, ctx.statement_index);
        ctx.created_relation = Some((canonical.clone(), node_id.clone()));

        if !insert.columns.is_empty() {
            let names: Vec<String> = insert
                .columns
                .iter()
                .map(|c| self.schema.normalize_identifier(&c.value))
                .collect();
            ctx.set_target_columns(&node_id, names);
        }
        self.add_relation_columns_from_schema(ctx, &canonical, &node_id);

        if let Some(source) = &insert.source {
            let mut walker = QueryWalker::new(self, ctx, Some(node_id));
            walker.walk_query(source);
        }
    }

    fn analyze_update(
        &mut self,
        ctx: &mut StatementContext,
        table: &TableWithJoins,
        assignments: &[Assignment],
        from: &Option<ast::UpdateTableFromKind>,
        selection: &Option<Expr>,
    ) {
        ctx.push_scope();

        // The target and its joins (MySQL style) go through the standard
        // join walk so join-dependency edges, join metadata, and ON filters
        // come out the same as in a SELECT; likewise any FROM sources
        // (Postgres style).
        {
            let mut walker = QueryWalker::new(self, ctx, None);
            walker.walk_table_with_joins(table);
            if let Some(from_kind) = from {
                match from_kind {
                    ast::UpdateTableFromKind::BeforeSet(tables)
                    | ast::UpdateTableFromKind::AfterSet(tables) => {
                        for t in tables {
                            walker.walk_table_with_joins(t);
                        }
                    }
                }
            }
        }

        // Recover the target relation: the main factor of `table`, now
        // registered under its canonical name.
        let target_node_id = if let TableFactor::Table { name, .. } = &table.relation {
            let surface = name.to_string();
            let folded = self.schema.normalize_table_name(&surface);
            let canonical = if ctx.cte_definitions.contains_key(&folded) {
                folded
            } else {
                self.schema.canonicalize_table_reference(&surface).canonical
            };
            let node_id = ctx
                .relation_node_ids
                .get(&canonical)
                .cloned()
                .unwrap_or_else(|| self.tracker.relation_node_id(&canonical));

            self.tracker.record_produced(&canonical, ctx.statement_index);
            self.add_relation_columns_from_schema(ctx, &canonical, &node_id);
            Some(node_id)
        } else {
            None
        };

        // SET a = expr wires expr's columns into the target column.
        for assignment in assignments {
            let column_name = match &assignment.target {
                AssignmentTarget::ColumnName(name) => extract_simple_name(&name.to_string()),
                AssignmentTarget::Tuple(names) => names
                    .first()
                    .map(|n| extract_simple_name(&n.to_string()))
                    .unwrap_or_default(),
            };
            if column_name.is_empty() {
                continue;
            }

            let sources = ExpressionAnalyzer::extract_column_refs(&assignment.value);
            let expr_text = if is_simple_column_ref(&assignment.value) {
                None
            } else {
                Some(assignment.value.to_string())
            };
            {
                let mut ea = ExpressionAnalyzer::new(self, ctx);
                ea.analyze(&assignment.value);
            }
            self.add_output_column(
                ctx,
                OutputColumnParams {
                    name: column_name,
                    sources,
                    expression: expr_text,
                    data_type: None,
                    target_node: target_node_id.clone(),
                    approximate: false,
                    aggregation: None,
                },
            );
        }

        if let Some(expr) = selection {
            let mut ea = ExpressionAnalyzer::new(self, ctx);
            ea.analyze(expr);
            if ea.analyzer.opts.collect_filters {
                ea.capture_filter_predicates(expr, FilterKind::Where);
            }
        }

        ctx.pop_scope();
    }

    fn analyze_delete(
        &mut self,
        ctx: &mut StatementContext,
        from: &FromTable,
        using: &Option<Vec<TableWithJoins>>,
        selection: &Option<Expr>,
    ) {
        ctx.push_scope();

        let tables = match from {
            FromTable::WithFromKeyword(ts) | FromTable::WithoutKeyword(ts) => ts,
        };

        {
            let mut walker = QueryWalker::new(self, ctx, None);
            for t in tables {
                walker.walk_table_with_joins(t);
            }
            if let Some(using_tables) = using {
                for t in using_tables {
                    walker.walk_table_with_joins(t);
                }
            }
        }

        if let Some(expr) = selection {
            let mut ea = ExpressionAnalyzer::new(self, ctx);
            ea.analyze(expr);
            if ea.analyzer.opts.collect_filters {
                ea.capture_filter_predicates(expr, FilterKind::Where);
            }
        }

        ctx.pop_scope();
    }

    fn analyze_drop(&mut self, object_type: &ast::ObjectType, names: &[ast::ObjectName]) {
        if !self.schema.allow_implied()
            || !matches!(object_type, ast::ObjectType::Table | ast::ObjectType::View)
        {
            return;
        }

        for name in names {
            let canonical = self.schema.normalize_table_name(&name.to_string());
            self.schema.remove_implied(&canonical);
            self.tracker.remove(&canonical);
        }
    }
}

/// Imposes the canonical output order: relation nodes in first-appearance
/// order, then the output node, then column nodes in declaration order;
/// edges grouped ownership → data_flow → derivation → join_dependency and
/// sorted by `(from, to)` within each group.
fn impose_canonical_order(ctx: &mut StatementContext) {
    let nodes = std::mem::take(&mut ctx.nodes);
    let (mut relations, rest): (Vec<_>, Vec<_>) =
        nodes.into_iter().partition(|n| n.node_type.is_relation());
    let (outputs, columns): (Vec<_>, Vec<_>) = rest
        .into_iter()
        .partition(|n| n.node_type == NodeType::Output);
    relations.extend(outputs);
    relations.extend(columns);
    ctx.nodes = relations;

    ctx.edges
        .sort_by(|a, b| (a.edge_type, &a.from, &a.to).cmp(&(b.edge_type, &b.from, &b.to)));
}
