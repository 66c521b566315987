//! Types for the SQL lineage analysis API.
//!
//! Requests carry SQL source, a dialect, and optional schema metadata;
//! responses carry per-statement lineage graphs, the unified global graph,
//! issues, and summary statistics. The response shape is the stable wire
//! contract consumed by viewers and exporters.

mod common;
mod request;
mod response;

pub use common::{issue_codes, CaseSensitivity, Issue, IssueCount, Severity, Span, Summary, TagFlow};
pub use request::{
    AnalysisOptions, AnalyzeRequest, ColumnSchema, ComplexityWeights, DdlSchema, Dialect,
    FileSource, ForeignKeyRef, SchemaInput, SchemaMetadata, SchemaNamespaceHint, SchemaOrigin,
    SchemaTable,
};
pub use response::{
    AggregationInfo, AnalyzeResult, CanonicalName, ColumnTag, Edge, EdgeType, FilterKind,
    FilterPredicate, GlobalEdge, GlobalLineage, GlobalNode, JoinType, Node, NodeType,
    ResolvedColumnSchema, ResolvedSchema, ResolvedSchemaTable, StatementLineage, StatementRef,
    StatementType, TagSource,
};
