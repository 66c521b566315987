//! Common types shared between request and response.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Case sensitivity for identifier normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaseSensitivity {
    /// Use dialect default
    #[default]
    Dialect,
    /// Lowercase normalization (Postgres, ANSI)
    Lower,
    /// Uppercase normalization (Snowflake)
    Upper,
    /// Case-sensitive as-is (BigQuery)
    Exact,
}

/// A byte range in the source SQL string, half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Byte offset from start of the source (inclusive)
    pub start: usize,
    /// Byte offset from start of the source (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Shifts both offsets by `base`, re-anchoring a chunk-relative span
    /// onto the full source buffer.
    pub fn offset(self, base: usize) -> Self {
        Self {
            start: self.start + base,
            end: self.end + base,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// An issue encountered during analysis (error, warning, or info).
///
/// Issues are the only failure channel of the engine: no stage raises,
/// every stage records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Severity level
    pub severity: Severity,

    /// Machine-readable issue code
    pub code: String,

    /// Human-readable message
    pub message: String,

    /// Location in the source SQL where the issue occurred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,

    /// Which statement index this issue relates to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_index: Option<usize>,

    /// Source file name where the issue occurred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
}

impl Issue {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    fn new(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            span: None,
            statement_index: None,
            source_name: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_statement(mut self, index: usize) -> Self {
        self.statement_index = Some(index);
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }
}

/// Summary statistics for the analysis result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Number of statements analyzed
    pub statement_count: usize,

    /// Distinct relations (tables, views, CTEs) in the global lineage
    pub table_count: usize,

    /// Column nodes across all statements
    pub column_count: usize,

    /// Total JOIN operations across all statements
    pub join_count: usize,

    /// Highest per-statement complexity score (1-100, 0 when no statements)
    pub complexity_score: u8,

    /// Issue counts by severity
    pub issue_count: IssueCount,

    /// Quick check: true if any error-severity issue was recorded
    pub has_errors: bool,

    /// Per-classification data flows, when tag propagation is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_flows: Option<Vec<TagFlow>>,
}

/// Counts of issues by severity level.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct IssueCount {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

/// The spread of one classification tag across the analyzed workload.
///
/// `sources` are qualified columns where the tag originates (imported or
/// user-supplied); `targets` are columns that received it by propagation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TagFlow {
    pub tag: String,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
}

/// Machine-readable issue codes.
pub mod issue_codes {
    /// String or comment not closed before end of input.
    pub const UNTERMINATED_LITERAL: &str = "UNTERMINATED_LITERAL";
    /// Unexpected token; span points at the token.
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    /// Reference to a relation not in scope or schema.
    pub const UNKNOWN_TABLE: &str = "UNKNOWN_TABLE";
    /// Column not found on any visible relation.
    pub const UNKNOWN_COLUMN: &str = "UNKNOWN_COLUMN";
    /// Bare column matches multiple visible relations.
    pub const AMBIGUOUS_COLUMN: &str = "AMBIGUOUS_COLUMN";
    /// Supplied schema disagrees with structure inferred from DDL.
    pub const SCHEMA_CONFLICT: &str = "SCHEMA_CONFLICT";
    /// Wildcard expansion skipped because no column list is known.
    pub const WILDCARD_NO_SCHEMA: &str = "WILDCARD_NO_SCHEMA";
    /// Emitted once per recursive CTE.
    pub const RECURSIVE_CTE_SELF_REF: &str = "RECURSIVE_CTE_SELF_REF";
    /// Statement classified as OTHER.
    pub const UNSUPPORTED_STATEMENT: &str = "UNSUPPORTED_STATEMENT";
}
