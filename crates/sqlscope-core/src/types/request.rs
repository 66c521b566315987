//! Request types for the SQL lineage analysis API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::CaseSensitivity;

/// A request to analyze SQL for data lineage.
///
/// This is the main entry point for the analysis API. It accepts SQL source
/// text along with a dialect and optional schema metadata to produce lineage
/// graphs. Analysis is a pure function of the request: no I/O, no state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// The SQL code to analyze (UTF-8, multi-statement supported)
    #[serde(default)]
    pub sql: String,

    /// Optional list of source files to analyze, processed before `sql`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileSource>>,

    /// SQL dialect
    pub dialect: Dialect,

    /// Optional source name (file path or script identifier) for the inline SQL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    /// Optional schema for accurate table and column resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaInput>,

    /// Optional analysis options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<AnalysisOptions>,
}

impl AnalyzeRequest {
    /// Convenience constructor for a plain SQL request with no schema.
    pub fn new(sql: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            sql: sql.into(),
            files: None,
            dialect,
            source_name: None,
            schema: None,
            options: None,
        }
    }
}

/// A named SQL source file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileSource {
    pub name: String,
    pub content: String,
}

/// SQL dialect for parsing and analysis.
///
/// The dialect controls tokenization (quoting styles, literal flavors),
/// accepted statement forms, and unquoted-identifier case folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Snowflake,
    Bigquery,
    #[default]
    Ansi,
}

impl Dialect {
    pub fn to_sqlparser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        use sqlparser::dialect::{
            BigQueryDialect, GenericDialect, PostgreSqlDialect, SnowflakeDialect,
        };
        match self {
            Self::Postgres => Box::new(PostgreSqlDialect {}),
            Self::Snowflake => Box::new(SnowflakeDialect {}),
            Self::Bigquery => Box::new(BigQueryDialect {}),
            // GenericDialect accepts the ANSI core plus the operator soup
            // real warehouse SQL uses; the strict AnsiDialect rejects too much.
            Self::Ansi => Box::new(GenericDialect {}),
        }
    }

    /// Unquoted-identifier folding for this dialect.
    pub fn default_case_sensitivity(&self) -> CaseSensitivity {
        match self {
            Dialect::Postgres => CaseSensitivity::Lower,
            Dialect::Snowflake => CaseSensitivity::Upper,
            Dialect::Bigquery => CaseSensitivity::Exact,
            Dialect::Ansi => CaseSensitivity::Lower,
        }
    }
}

/// Schema supplied with an analysis request.
///
/// Accepts three JSON shapes: a bare array of tables, `{ "ddl": "..." }`
/// (resolved by parsing the DDL with the request dialect), or a full
/// metadata object with namespace defaults and a search path.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SchemaInput {
    Tables(Vec<SchemaTable>),
    Ddl(DdlSchema),
    Metadata(SchemaMetadata),
}

/// Schema expressed as DDL text (`CREATE TABLE ...` statements).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DdlSchema {
    pub ddl: String,
}

/// Full schema metadata with namespace defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    /// Default catalog applied to unqualified identifiers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_catalog: Option<String>,

    /// Default schema applied to unqualified identifiers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,

    /// Ordered list mirroring database search_path behavior
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_path: Option<Vec<SchemaNamespaceHint>>,

    /// Override for identifier normalization (default 'dialect')
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitivity: Option<CaseSensitivity>,

    /// Canonical table representations
    #[serde(default)]
    pub tables: Vec<SchemaTable>,

    /// When false, DDL in the workload does not register implied schema
    #[serde(default = "default_allow_implied", skip_serializing_if = "is_true")]
    pub allow_implied: bool,
}

fn default_allow_implied() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNamespaceHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    pub schema: String,
}

/// One table of the supplied or inferred schema.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
    /// Whether this entry was supplied by the caller or inferred from DDL
    #[serde(default)]
    pub origin: SchemaOrigin,
}

/// The origin of a schema entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemaOrigin {
    /// User-provided schema
    #[default]
    Imported,
    /// Inferred from DDL in the workload
    Implied,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_primary_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
    /// Classification labels (e.g. PII) that seed tag propagation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<String>,
}

impl ColumnSchema {
    /// A column with just a name, the common case in hand-written schemas.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            is_primary_key: None,
            foreign_key: None,
            classifications: Vec::new(),
        }
    }
}

/// Reference to the column a foreign key points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// Options controlling the analysis behavior.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    /// Expand `*` / `t.*` against known column lists (default: true when a
    /// schema is supplied)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_wildcards: Option<bool>,

    /// Propagate column classifications along lineage edges (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagate_tags: Option<bool>,

    /// Collect WHERE/HAVING/QUALIFY/ON predicates onto relation nodes
    /// (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect_filters: Option<bool>,

    /// Unify columns in the global lineage graph (default: false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unify_columns: Option<bool>,

    /// Override the complexity-score weights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_weights: Option<ComplexityWeights>,
}

/// Weights for the complexity score formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityWeights {
    pub joins: f64,
    pub nodes: f64,
    pub cte_depth: f64,
    pub subq_depth: f64,
    pub columns: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_request_round_trips() {
        let request = AnalyzeRequest::new("SELECT * FROM users", Dialect::Postgres);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"dialect\":\"postgres\""));

        let deserialized: AnalyzeRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.dialect, Dialect::Postgres);
    }

    #[test]
    fn dialect_case_sensitivity_defaults() {
        assert_eq!(
            Dialect::Postgres.default_case_sensitivity(),
            CaseSensitivity::Lower
        );
        assert_eq!(
            Dialect::Snowflake.default_case_sensitivity(),
            CaseSensitivity::Upper
        );
        assert_eq!(
            Dialect::Bigquery.default_case_sensitivity(),
            CaseSensitivity::Exact
        );
        assert_eq!(
            Dialect::Ansi.default_case_sensitivity(),
            CaseSensitivity::Lower
        );
    }

    #[test]
    fn schema_input_accepts_table_array() {
        let json = r#"[
            { "name": "users", "columns": [{ "name": "id" }, { "name": "email", "dataType": "varchar" }] }
        ]"#;
        let schema: SchemaInput = serde_json::from_str(json).unwrap();
        match schema {
            SchemaInput::Tables(tables) => {
                assert_eq!(tables.len(), 1);
                assert_eq!(tables[0].columns.len(), 2);
                assert_eq!(tables[0].origin, SchemaOrigin::Imported);
            }
            other => panic!("expected table array, got {other:?}"),
        }
    }

    #[test]
    fn schema_input_accepts_ddl_object() {
        let json = r#"{ "ddl": "CREATE TABLE users (id INT)" }"#;
        let schema: SchemaInput = serde_json::from_str(json).unwrap();
        assert!(matches!(schema, SchemaInput::Ddl(_)));
    }

    #[test]
    fn schema_input_accepts_metadata_object() {
        let json = r#"{
            "defaultSchema": "public",
            "tables": [{ "name": "users", "columns": [{ "name": "id" }] }]
        }"#;
        let schema: SchemaInput = serde_json::from_str(json).unwrap();
        match schema {
            SchemaInput::Metadata(meta) => {
                assert_eq!(meta.default_schema.as_deref(), Some("public"));
                assert!(meta.allow_implied);
            }
            other => panic!("expected metadata, got {other:?}"),
        }
    }

    #[test]
    fn classification_list_round_trips() {
        let json = r#"{ "name": "email", "classifications": ["PII"] }"#;
        let column: ColumnSchema = serde_json::from_str(json).unwrap();
        assert_eq!(column.classifications, vec!["PII".to_string()]);
    }
}
