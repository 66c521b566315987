//! Response types for the SQL lineage analysis API.
//!
//! The JSON shape of [`AnalyzeResult`] is a semver-stable wire format
//! consumed by downstream viewers and exporters. New fields may be added;
//! existing fields never change meaning. Absent optionals serialize as
//! absent, not null.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::common::{Issue, Span, Summary};
use super::request::{ForeignKeyRef, SchemaOrigin};

/// The result of analyzing SQL for data lineage.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    /// Per-statement lineage graphs, in source order
    pub statements: Vec<StatementLineage>,

    /// All issues encountered during analysis
    pub issues: Vec<Issue>,

    /// Summary statistics
    pub summary: Summary,

    /// Effective schema used during analysis (imported + implied)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_schema: Option<ResolvedSchema>,

    /// Cross-statement lineage graph with unified relation identity
    pub global_lineage: GlobalLineage,
}

/// Classification of a statement for lineage purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    CreateView,
    With,
    Union,
    Intersect,
    Except,
    Values,
    Other,
}

/// Lineage information for a single SQL statement.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementLineage {
    /// Zero-based index of the statement across all inputs
    pub statement_index: usize,

    /// Statement classification
    pub statement_type: StatementType,

    /// Source name (file path or script identifier) this statement came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    /// All nodes in the lineage graph for this statement
    pub nodes: Vec<Node>,

    /// All edges connecting nodes in the lineage graph
    pub edges: Vec<Edge>,

    /// Number of JOIN operations in the statement
    pub join_count: usize,

    /// Complexity score (1-100) derived from the statement structure
    pub complexity_score: u8,

    /// Span of the statement in its source
    pub span: Span,
}

/// The type of a node in the lineage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// A base table
    Table,
    /// A view
    View,
    /// A common table expression
    Cte,
    /// A column of a relation or of the output
    Column,
    /// Virtual result relation of a SELECT-like statement
    Output,
}

impl NodeType {
    /// True for nodes that can own columns and participate in joins.
    pub fn is_relation(&self) -> bool {
        matches!(self, NodeType::Table | NodeType::View | NodeType::Cte)
    }
}

/// A node in the lineage graph.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Stable content-derived ID, unique within the statement
    pub id: String,

    /// Node type
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Surface token as written in the SQL
    pub label: String,

    /// Dotted qualified name after normalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,

    /// Canonical identity; only set once resolution succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_name: Option<CanonicalName>,

    /// SQL expression text for computed columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    /// Source location in the original SQL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,

    /// Aggregation details for aggregated output columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationInfo>,

    /// Classification tags on this column
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ColumnTag>,

    /// Extensible metadata (e.g. `isCreated` on DDL-created relations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,

    /// Filter predicates that constrain this relation's rows
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterPredicate>,

    /// For joined relations: how this relation was joined in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<JoinType>,

    /// For joined relations: the ON/USING predicate text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_condition: Option<String>,

    /// For CTE nodes: true when declared WITH RECURSIVE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
}

impl Node {
    fn new(id: String, node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            id,
            node_type,
            label: label.into(),
            qualified_name: None,
            canonical_name: None,
            expression: None,
            span: None,
            aggregation: None,
            tags: Vec::new(),
            metadata: None,
            filters: Vec::new(),
            join_type: None,
            join_condition: None,
            recursive: None,
        }
    }

    pub fn table(id: String, label: impl Into<String>) -> Self {
        Self::new(id, NodeType::Table, label)
    }

    pub fn view(id: String, label: impl Into<String>) -> Self {
        Self::new(id, NodeType::View, label)
    }

    pub fn cte(id: String, label: impl Into<String>) -> Self {
        Self::new(id, NodeType::Cte, label)
    }

    pub fn column(id: String, label: impl Into<String>) -> Self {
        Self::new(id, NodeType::Column, label)
    }

    pub fn output(id: String, label: impl Into<String>) -> Self {
        Self::new(id, NodeType::Output, label)
    }

    pub fn with_qualified_name(mut self, name: impl Into<String>) -> Self {
        self.qualified_name = Some(name.into());
        self
    }

    pub fn with_canonical_name(mut self, name: CanonicalName) -> Self {
        self.canonical_name = Some(name);
        self
    }

    pub fn with_expression(mut self, expr: impl Into<String>) -> Self {
        self.expression = Some(expr.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationInfo) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = Some(join_type);
        self
    }

    pub fn with_join_condition(mut self, condition: impl Into<String>) -> Self {
        self.join_condition = Some(condition.into());
        self
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = Some(true);
        self
    }
}

/// The type of an edge in the lineage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Relation owns column (relation → column)
    Ownership,
    /// Value flows unchanged, a plain projection (source → target column)
    DataFlow,
    /// Value flows through an expression; carries the expression text
    Derivation,
    /// Relation participates in a join with the other endpoint
    JoinDependency,
}

/// An edge connecting two nodes in the lineage graph.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Stable content-derived ID
    pub id: String,

    /// Source node ID
    pub from: String,

    /// Target node ID
    pub to: String,

    /// Edge type
    #[serde(rename = "type")]
    pub edge_type: EdgeType,

    /// Transformation expression, exact source text slice (derivation edges)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    /// Operation label ('UNION', 'RECURSIVE', ...) when relevant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,

    /// Join type (join_dependency edges)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<JoinType>,

    /// ON/USING predicate text (join_dependency edges)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_condition: Option<String>,

    /// True when this edge represents approximate lineage (e.g. a wildcard
    /// that could not be expanded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approximate: Option<bool>,
}

impl Edge {
    pub fn new(id: String, from: String, to: String, edge_type: EdgeType) -> Self {
        Self {
            id,
            from,
            to,
            edge_type,
            expression: None,
            operation: None,
            join_type: None,
            join_condition: None,
            approximate: None,
        }
    }

    pub fn ownership(id: String, from: String, to: String) -> Self {
        Self::new(id, from, to, EdgeType::Ownership)
    }

    pub fn data_flow(id: String, from: String, to: String) -> Self {
        Self::new(id, from, to, EdgeType::DataFlow)
    }

    pub fn derivation(id: String, from: String, to: String) -> Self {
        Self::new(id, from, to, EdgeType::Derivation)
    }

    pub fn join_dependency(id: String, from: String, to: String) -> Self {
        Self::new(id, from, to, EdgeType::JoinDependency)
    }

    pub fn with_expression(mut self, expr: impl Into<String>) -> Self {
        self.expression = Some(expr.into());
        self
    }

    pub fn with_operation(mut self, op: impl Into<String>) -> Self {
        self.operation = Some(op.into());
        self
    }

    pub fn with_join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = Some(join_type);
        self
    }

    pub fn with_join_condition(mut self, condition: impl Into<String>) -> Self {
        self.join_condition = Some(condition.into());
        self
    }

    pub fn approximate(mut self) -> Self {
        self.approximate = Some(true);
        self
    }
}

/// The type of SQL JOIN operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    LeftSemi,
    RightSemi,
    LeftAnti,
    RightAnti,
    CrossApply,
    OuterApply,
    AsOf,
}

/// A filter predicate constraining a relation's rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterPredicate {
    /// The SQL expression text of the predicate
    pub expression: String,

    /// Location of the predicate in the source, when found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,

    /// Which clause the predicate appears in
    pub kind: FilterKind,
}

/// The clause a filter predicate was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Where,
    Having,
    Qualify,
    On,
}

/// Aggregation details for an aggregated output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AggregationInfo {
    /// Aggregate function name, uppercase (SUM, COUNT, ...)
    pub function: String,

    /// Whether DISTINCT was specified
    pub is_distinct: bool,

    /// FILTER (WHERE ...) expression, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,

    /// WITHIN GROUP / ORDER BY text, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

/// A classification tag on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnTag {
    pub name: String,
    pub source: TagSource,
    /// RFC 3339 timestamp carried through from the caller; the engine never
    /// stamps wall-clock time itself, which would break determinism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// How a tag arrived on a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    /// From supplied schema classifications
    Imported,
    /// Attached by the caller
    User,
    /// Received along a lineage edge
    Propagated,
}

/// The canonical `(catalog?, schema?, name)` identity of a relation, with an
/// optional column part for column-level global nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl CanonicalName {
    pub fn table(catalog: Option<String>, schema: Option<String>, name: String) -> Self {
        Self {
            catalog,
            schema,
            name,
            column: None,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn to_qualified_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref cat) = self.catalog {
            parts.push(cat.as_str());
        }
        if let Some(ref sch) = self.schema {
            parts.push(sch.as_str());
        }
        parts.push(&self.name);
        if let Some(ref col) = self.column {
            parts.push(col.as_str());
        }
        parts.join(".")
    }
}

/// Cross-statement lineage graph with unified relation identity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GlobalLineage {
    pub nodes: Vec<GlobalNode>,
    pub edges: Vec<GlobalEdge>,
}

/// A relation (or, opt-in, a column) unified across statements.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalNode {
    /// Stable ID derived from the canonical identity
    pub id: String,

    /// Node type
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Human-readable label
    pub label: String,

    /// Canonical identity used for unification
    pub canonical_name: CanonicalName,

    /// Every statement-local node that contributed to this global node
    pub statement_refs: Vec<StatementRef>,
}

/// Pointer from a global node back into a statement graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementRef {
    pub statement_index: usize,
    pub node_id: String,
}

/// An edge between global nodes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}

/// The effective schema used during analysis (imported + implied).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSchema {
    pub tables: Vec<ResolvedSchemaTable>,
}

/// A table in the resolved schema with origin metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSchemaTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    pub columns: Vec<ResolvedColumnSchema>,

    /// Origin of this table's schema information
    pub origin: SchemaOrigin,

    /// For implied tables: which statement created it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_statement_index: Option<usize>,

    /// True if this is a temporary table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporary: Option<bool>,
}

/// A column in the resolved schema.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedColumnSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_primary_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::common::Span;

    #[test]
    fn analyze_result_serializes_wire_names() {
        let result = AnalyzeResult {
            statements: vec![StatementLineage {
                statement_index: 0,
                statement_type: StatementType::Select,
                source_name: None,
                nodes: vec![Node::table("tbl_123".into(), "users")
                    .with_qualified_name("public.users")],
                edges: vec![],
                join_count: 0,
                complexity_score: 1,
                span: Span::new(0, 19),
            }],
            issues: vec![],
            summary: Summary::default(),
            resolved_schema: None,
            global_lineage: GlobalLineage::default(),
        };

        let json = serde_json::to_value(&result).unwrap();
        let statement = &json["statements"][0];
        assert_eq!(statement["statementType"], "SELECT");
        assert_eq!(statement["nodes"][0]["type"], "table");
        assert_eq!(statement["nodes"][0]["qualifiedName"], "public.users");
        // Absent optionals must be absent, not null.
        assert!(statement["nodes"][0].get("canonicalName").is_none());

        let round: AnalyzeResult = serde_json::from_value(json).unwrap();
        assert_eq!(round.statements[0].nodes[0].node_type, NodeType::Table);
    }

    #[test]
    fn canonical_name_qualified_string() {
        let name = CanonicalName::table(
            Some("catalog".to_string()),
            Some("schema".to_string()),
            "table".to_string(),
        );
        assert_eq!(name.to_qualified_string(), "catalog.schema.table");

        let simple = CanonicalName::table(None, None, "users".to_string());
        assert_eq!(simple.to_qualified_string(), "users");

        let column = simple.with_column("id");
        assert_eq!(column.to_qualified_string(), "users.id");
    }

    #[test]
    fn edge_type_ranks_follow_canonical_order() {
        assert!(EdgeType::Ownership < EdgeType::DataFlow);
        assert!(EdgeType::DataFlow < EdgeType::Derivation);
        assert!(EdgeType::Derivation < EdgeType::JoinDependency);
    }

    #[test]
    fn statement_type_screams() {
        let json = serde_json::to_string(&StatementType::CreateTable).unwrap();
        assert_eq!(json, "\"CREATE_TABLE\"");
    }
}
