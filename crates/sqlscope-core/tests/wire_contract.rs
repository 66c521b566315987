//! Guards on the serialized shape of `AnalyzeResult`.
//!
//! Downstream viewers and exporters depend on these field names and types
//! exactly; changes here are breaking changes to the wire format.

use sqlscope_core::{
    analyze, AnalyzeRequest, AnalyzeResult, ColumnSchema, Dialect, SchemaInput, SchemaTable,
};

fn users_schema() -> SchemaInput {
    SchemaInput::Tables(vec![SchemaTable {
        catalog: None,
        schema: None,
        name: "users".to_string(),
        columns: vec![
            ColumnSchema::named("id"),
            ColumnSchema::named("name"),
        ],
        origin: Default::default(),
    }])
}

#[test]
fn result_serializes_camel_case_fields() {
    let mut request = AnalyzeRequest::new("SELECT id, name FROM users", Dialect::Postgres);
    request.schema = Some(users_schema());

    let result = analyze(&request);
    let json = serde_json::to_value(&result).unwrap();

    // Top level.
    assert!(json.get("statements").is_some());
    assert!(json.get("issues").is_some());
    assert!(json.get("summary").is_some());
    assert!(json.get("globalLineage").is_some());
    assert!(json.get("resolvedSchema").is_some());

    // Summary.
    let summary = &json["summary"];
    for field in [
        "statementCount",
        "tableCount",
        "columnCount",
        "joinCount",
        "complexityScore",
        "issueCount",
        "hasErrors",
    ] {
        assert!(summary.get(field).is_some(), "summary.{field} missing");
    }
    assert!(summary["issueCount"].get("errors").is_some());

    // Statement.
    let statement = &json["statements"][0];
    for field in [
        "statementIndex",
        "statementType",
        "nodes",
        "edges",
        "joinCount",
        "complexityScore",
        "span",
    ] {
        assert!(statement.get(field).is_some(), "statement.{field} missing");
    }
    assert_eq!(statement["statementType"], "SELECT");
    assert!(statement["span"].get("start").is_some());

    // Nodes use `type`, not `nodeType`.
    let node = &statement["nodes"][0];
    assert!(node.get("type").is_some());
    assert!(node.get("id").is_some());
    assert!(node.get("label").is_some());

    // Edges use `type`, `from`, `to`.
    let edge = &statement["edges"][0];
    assert!(edge.get("type").is_some());
    assert!(edge.get("from").is_some());
    assert!(edge.get("to").is_some());

    // Global lineage.
    let global_node = &json["globalLineage"]["nodes"][0];
    assert!(global_node.get("canonicalName").is_some());
    let refs = global_node["statementRefs"].as_array().unwrap();
    assert!(refs[0].get("statementIndex").is_some());
    assert!(refs[0].get("nodeId").is_some());
}

#[test]
fn absent_optionals_are_absent_not_null() {
    let result = analyze(&AnalyzeRequest::new("SELECT 1", Dialect::Ansi));
    let json = serde_json::to_value(&result).unwrap();

    // No schema supplied: the key must be missing entirely.
    assert!(json.get("resolvedSchema").is_none());

    let statement = &json["statements"][0];
    assert!(statement.get("sourceName").is_none());

    for node in statement["nodes"].as_array().unwrap() {
        for optional in ["qualifiedName", "canonicalName", "joinType", "recursive"] {
            if let Some(value) = node.get(optional) {
                assert!(!value.is_null(), "{optional} serialized as null");
            }
        }
        // Empty collections are skipped, not emitted as [].
        assert!(node.get("filters").is_none() || !node["filters"].as_array().unwrap().is_empty());
        assert!(node.get("tags").is_none() || !node["tags"].as_array().unwrap().is_empty());
    }
}

#[test]
fn result_round_trips_through_serde() {
    let mut request = AnalyzeRequest::new(
        "WITH a AS (SELECT id FROM users) SELECT id FROM a",
        Dialect::Postgres,
    );
    request.schema = Some(users_schema());

    let result = analyze(&request);
    let json = serde_json::to_string(&result).unwrap();
    let round: AnalyzeResult = serde_json::from_str(&json).unwrap();

    assert_eq!(round.statements.len(), result.statements.len());
    assert_eq!(
        round.statements[0].nodes.len(),
        result.statements[0].nodes.len()
    );
    assert_eq!(
        round.global_lineage.nodes.len(),
        result.global_lineage.nodes.len()
    );
    assert_eq!(round.summary.statement_count, result.summary.statement_count);
}

#[test]
fn issue_codes_are_screaming_snake_strings() {
    let result = analyze(&AnalyzeRequest::new("SELECT c FROM missing_table", Dialect::Ansi));
    let json = serde_json::to_value(&result).unwrap();

    let issue = &json["issues"][0];
    assert_eq!(issue["code"], "UNKNOWN_TABLE");
    assert_eq!(issue["severity"], "warning");
    assert!(issue.get("statementIndex").is_some());
}
