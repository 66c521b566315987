//! DDL analysis: CREATE TABLE, CREATE TABLE AS, and CREATE VIEW.
//!
//! Created relations are marked `metadata.isCreated` and registered as
//! implied schema (columns from the column defs or the SELECT projection)
//! so later statements in the workload resolve against them.

use super::context::StatementContext;
use super::helpers::{extract_simple_name, parse_canonical_name};
use super::schema_registry::build_column_schemas;
use super::select::QueryWalker;
use super::Analyzer;
use crate::types::{ColumnSchema, Node, NodeType};
use serde_json::json;
use sqlparser::ast::{ColumnDef, ObjectName, Query, TableConstraint};
use std::collections::HashMap;

impl<'a> Analyzer<'a> {
    /// Creates the node for a DDL-created relation and records it with the
    /// tracker and context.
    fn create_target_relation(
        &mut self,
        ctx: &mut StatementContext,
        name: &ObjectName,
        node_type: NodeType,
    ) -> (String, String) {
        let surface = name.to_string();
        let canonical = self.schema.normalize_table_name(&surface);

        if node_type == NodeType::View {
            self.tracker
                .record_view_produced(&canonical, ctx.statement_index);
        } else {
            self.tracker.record_produced(&canonical, ctx.statement_index);
        }
        let (node_id, _) = self.tracker.relation_identity(&canonical);

        let mut metadata = HashMap::new();
        metadata.insert("isCreated".to_string(), json!(true));

        let mut node = match node_type {
            NodeType::View => Node::view(node_id.clone(), extract_simple_name(&surface)),
            _ => Node::table(node_id.clone(), extract_simple_name(&surface)),
        }
        .with_qualified_name(canonical.clone())
        .with_canonical_name(parse_canonical_name(&canonical))
        .with_metadata(metadata);
        if let Some(span) = self.find_span(&canonical) {
            node = node.with_span(span);
        }
        ctx.add_node(node);
        ctx.relation_node_ids
            .insert(canonical.clone(), node_id.clone());
        ctx.created_relation = Some((canonical.clone(), node_id.clone()));

        (canonical, node_id)
    }

    pub(super) fn analyze_create_table_as(
        &mut self,
        ctx: &mut StatementContext,
        name: &ObjectName,
        query: &Query,
        temporary: bool,
    ) {
        let (canonical, node_id) = self.create_target_relation(ctx, name, NodeType::Table);

        let checkpoint = ctx.projection_checkpoint();
        {
            let mut walker = QueryWalker::new(self, ctx, Some(node_id));
            walker.walk_query(query);
        }
        let projection = ctx.take_output_columns_since(checkpoint);

        let mut seen = std::collections::HashSet::new();
        let columns: Vec<ColumnSchema> = projection
            .iter()
            .filter(|col| seen.insert(col.name.clone()))
            .map(|col| ColumnSchema {
                name: col.name.clone(),
                data_type: col.data_type.clone(),
                is_primary_key: None,
                foreign_key: None,
                classifications: Vec::new(),
            })
            .collect();

        self.register_implied(ctx, &canonical, columns, temporary);
    }

    pub(super) fn analyze_create_table(
        &mut self,
        ctx: &mut StatementContext,
        name: &ObjectName,
        columns: &[ColumnDef],
        constraints: &[TableConstraint],
        temporary: bool,
    ) {
        let (canonical, node_id) = self.create_target_relation(ctx, name, NodeType::Table);

        let column_schemas = build_column_schemas(columns, constraints);
        self.register_implied(ctx, &canonical, column_schemas, temporary);

        // Column nodes exist up front so later statements' edges can land.
        self.add_relation_columns_from_schema(ctx, &canonical, &node_id);
    }

    pub(super) fn analyze_create_view(
        &mut self,
        ctx: &mut StatementContext,
        name: &ObjectName,
        query: &Query,
        temporary: bool,
    ) {
        let (canonical, node_id) = self.create_target_relation(ctx, name, NodeType::View);

        let checkpoint = ctx.projection_checkpoint();
        {
            let mut walker = QueryWalker::new(self, ctx, Some(node_id));
            walker.walk_query(query);
        }
        let projection = ctx.take_output_columns_since(checkpoint);

        let mut seen = std::collections::HashSet::new();
        let columns: Vec<ColumnSchema> = projection
            .iter()
            .filter(|col| seen.insert(col.name.clone()))
            .map(|col| ColumnSchema {
                name: col.name.clone(),
                data_type: col.data_type.clone(),
                is_primary_key: None,
                foreign_key: None,
                classifications: Vec::new(),
            })
            .collect();

        self.register_implied(ctx, &canonical, columns, temporary);
    }

    fn register_implied(
        &mut self,
        ctx: &StatementContext,
        canonical: &str,
        columns: Vec<ColumnSchema>,
        temporary: bool,
    ) {
        if let Some(mut issue) =
            self.schema
                .register_implied(canonical, columns, temporary, ctx.statement_index)
        {
            if let Some(span) = self.find_span(canonical) {
                issue = issue.with_span(span);
            }
            self.push_issue(issue);
        }
    }
}
