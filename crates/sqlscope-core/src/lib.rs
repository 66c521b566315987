//! Core SQL lineage analysis engine.
//!
//! `sqlscope-core` turns SQL source text into a structured lineage
//! description: per statement, the relations it reads and writes, the
//! columns it owns, data-flow and derivation relationships between columns,
//! join structure, filter predicates, and diagnostics anchored to source
//! spans — plus a global graph in which the same logical relation is
//! unified across statements.
//!
//! The entry point is [`analyze`]; it never fails as a function call, all
//! failures surface as issues inside the result.
//!
//! ```
//! use sqlscope_core::{analyze, AnalyzeRequest, Dialect};
//!
//! let result = analyze(&AnalyzeRequest::new(
//!     "SELECT id, name FROM users",
//!     Dialect::Postgres,
//! ));
//! assert_eq!(result.statements.len(), 1);
//! ```

pub mod analyzer;
pub mod error;
pub mod parser;
pub mod position;
pub mod splitter;
pub mod types;

pub use analyzer::{analyze, analyze_many};
pub use error::ParseError;
pub use parser::parse_sql_with_dialect;
pub use position::{line_column_to_offset, offset_to_line_column, LineColumn};
pub use splitter::{split_statements, SplitResult, SplitStatement};

pub use types::{
    issue_codes, AggregationInfo, AnalysisOptions, AnalyzeRequest, AnalyzeResult, CanonicalName,
    CaseSensitivity, ColumnSchema, ColumnTag, ComplexityWeights, DdlSchema, Dialect, Edge,
    EdgeType, FileSource, FilterKind, FilterPredicate, ForeignKeyRef, GlobalEdge, GlobalLineage,
    GlobalNode, Issue, IssueCount, JoinType, Node, NodeType, ResolvedColumnSchema, ResolvedSchema,
    ResolvedSchemaTable, SchemaInput, SchemaMetadata, SchemaNamespaceHint, SchemaOrigin,
    SchemaTable, Severity, Span, StatementLineage, StatementRef, StatementType, Summary, TagFlow,
    TagSource,
};
