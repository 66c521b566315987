//! Schema index and identifier canonicalization.
//!
//! The registry holds the effective schema for one analysis: tables imported
//! from the request (as a list, full metadata, or parsed DDL) plus tables
//! implied by DDL inside the workload. It owns identifier folding for the
//! dialect, canonical-name construction with default-namespace/search-path
//! fallback, column validation, and the PK/FK/classification accessors.
//!
//! The registry is read-mostly: implied capture and classification merging
//! are the only mutations after seeding, and both happen between statements.

use super::helpers::{is_quoted_identifier, split_qualified_identifiers, unquote_identifier};
use crate::parser::parse_sql_with_dialect;
use crate::types::{
    issue_codes, CaseSensitivity, ColumnSchema, ColumnTag, Dialect, ForeignKeyRef, Issue,
    SchemaInput, SchemaMetadata, SchemaOrigin, SchemaTable, TagSource,
};
use sqlparser::ast::{ColumnDef, ColumnOption, ColumnOptionDef, Statement, TableConstraint};
use std::collections::{HashMap, HashSet};

/// One table known to the registry.
#[derive(Debug, Clone)]
pub(crate) struct SchemaTableEntry {
    pub(crate) table: SchemaTable,
    pub(crate) origin: SchemaOrigin,
    /// For implied tables: the statement that created them
    pub(crate) source_statement_index: Option<usize>,
    pub(crate) temporary: bool,
}

#[derive(Debug, Clone)]
struct SearchPathEntry {
    catalog: Option<String>,
    schema: String,
}

/// The outcome of canonicalizing a table reference.
#[derive(Debug, Clone)]
pub(crate) struct TableResolution {
    /// Normalized dotted name, best-effort even when unmatched
    pub(crate) canonical: String,
    /// True when the name matched a registry entry
    pub(crate) matched: bool,
}

pub(crate) struct SchemaRegistry {
    entries: HashMap<String, SchemaTableEntry>,
    default_catalog: Option<String>,
    default_schema: Option<String>,
    search_path: Vec<SearchPathEntry>,
    case: CaseSensitivity,
    allow_implied: bool,
}

impl SchemaRegistry {
    /// Builds the registry from the request's schema input. DDL-shaped
    /// schemas are parsed with the request dialect; parse failures surface
    /// as issues and the rest of the DDL still seeds the index.
    pub(crate) fn new(schema: Option<&SchemaInput>, dialect: Dialect) -> (Self, Vec<Issue>) {
        let mut issues = Vec::new();

        let metadata = match schema {
            None => SchemaMetadata::default(),
            Some(SchemaInput::Tables(tables)) => SchemaMetadata {
                tables: tables.clone(),
                ..SchemaMetadata::default()
            },
            Some(SchemaInput::Metadata(meta)) => meta.clone(),
            Some(SchemaInput::Ddl(_)) => SchemaMetadata::default(),
        };

        let case = metadata
            .case_sensitivity
            .filter(|c| *c != CaseSensitivity::Dialect)
            .unwrap_or_else(|| dialect.default_case_sensitivity());

        let mut registry = Self {
            entries: HashMap::new(),
            default_catalog: None,
            default_schema: None,
            search_path: Vec::new(),
            case,
            allow_implied: metadata.allow_implied,
        };

        registry.default_catalog = metadata
            .default_catalog
            .as_deref()
            .map(|c| registry.normalize_identifier(c));
        registry.default_schema = metadata
            .default_schema
            .as_deref()
            .map(|s| registry.normalize_identifier(s));
        if let Some(search_path) = &metadata.search_path {
            registry.search_path = search_path
                .iter()
                .map(|hint| SearchPathEntry {
                    catalog: hint.catalog.as_deref().map(|c| registry.normalize_identifier(c)),
                    schema: registry.normalize_identifier(&hint.schema),
                })
                .collect();
        } else if let Some(default_schema) = registry.default_schema.clone() {
            registry.search_path = vec![SearchPathEntry {
                catalog: registry.default_catalog.clone(),
                schema: default_schema,
            }];
        }

        for table in &metadata.tables {
            registry.insert_imported(table.clone());
        }

        if let Some(SchemaInput::Ddl(ddl)) = schema {
            issues.extend(registry.seed_from_ddl(&ddl.ddl, dialect));
        }

        (registry, issues)
    }

    fn insert_imported(&mut self, mut table: SchemaTable) {
        table.origin = SchemaOrigin::Imported;
        let key = self.schema_table_key(&table);
        self.entries.insert(
            key,
            SchemaTableEntry {
                table,
                origin: SchemaOrigin::Imported,
                source_statement_index: None,
                temporary: false,
            },
        );
    }

    /// Parses `CREATE TABLE` statements out of schema DDL and registers each
    /// as an imported table.
    fn seed_from_ddl(&mut self, ddl: &str, dialect: Dialect) -> Vec<Issue> {
        let mut issues = Vec::new();

        let statements = match parse_sql_with_dialect(ddl, dialect) {
            Ok(statements) => statements,
            Err(err) => {
                issues.push(Issue::error(
                    issue_codes::PARSE_ERROR,
                    format!("Failed to parse schema DDL: {err}"),
                ));
                return issues;
            }
        };

        for statement in &statements {
            if let Statement::CreateTable(create) = statement {
                let columns = build_column_schemas(&create.columns, &create.constraints);
                let name = create.name.to_string();
                let canonical = self.normalize_table_name(&name);
                let table = self.schema_table_from_canonical(&canonical, columns);
                self.insert_imported(table);
            }
        }

        issues
    }

    fn schema_table_from_canonical(
        &self,
        canonical: &str,
        columns: Vec<ColumnSchema>,
    ) -> SchemaTable {
        let parts = split_qualified_identifiers(canonical);
        let (catalog, schema, name) = match parts.len() {
            3 => (
                Some(parts[0].clone()),
                Some(parts[1].clone()),
                parts[2].clone(),
            ),
            2 => (None, Some(parts[0].clone()), parts[1].clone()),
            1 => (None, None, parts[0].clone()),
            _ => (None, None, canonical.to_string()),
        };
        SchemaTable {
            catalog,
            schema,
            name,
            columns,
            origin: SchemaOrigin::Imported,
        }
    }

    pub(crate) fn allow_implied(&self) -> bool {
        self.allow_implied
    }

    pub(crate) fn get(&self, canonical: &str) -> Option<&SchemaTableEntry> {
        self.entries.get(canonical)
    }

    pub(crate) fn is_known(&self, canonical: &str) -> bool {
        self.entries.contains_key(canonical)
    }

    pub(crate) fn all_entries(&self) -> impl Iterator<Item = &SchemaTableEntry> {
        self.entries.values()
    }

    /// Registers a table implied by workload DDL. Returns a
    /// `SCHEMA_CONFLICT` issue when the implied structure disagrees with an
    /// imported entry (the imported entry wins).
    pub(crate) fn register_implied(
        &mut self,
        canonical: &str,
        columns: Vec<ColumnSchema>,
        temporary: bool,
        statement_index: usize,
    ) -> Option<Issue> {
        if !self.allow_implied {
            return None;
        }

        if let Some(existing) = self.entries.get(canonical) {
            if existing.origin == SchemaOrigin::Imported {
                if self.columns_conflict(&existing.table.columns, &columns) {
                    return Some(
                        Issue::warning(
                            issue_codes::SCHEMA_CONFLICT,
                            format!(
                                "DDL for '{canonical}' disagrees with the imported schema; keeping the imported definition"
                            ),
                        )
                        .with_statement(statement_index),
                    );
                }
                return None;
            }
        }

        let table = self.schema_table_from_canonical(canonical, columns);
        self.entries.insert(
            canonical.to_string(),
            SchemaTableEntry {
                table: SchemaTable {
                    origin: SchemaOrigin::Implied,
                    ..table
                },
                origin: SchemaOrigin::Implied,
                source_statement_index: Some(statement_index),
                temporary,
            },
        );
        None
    }

    fn columns_conflict(&self, imported: &[ColumnSchema], implied: &[ColumnSchema]) -> bool {
        if implied.is_empty() || imported.is_empty() {
            return false;
        }
        let imported_names: HashSet<String> = imported
            .iter()
            .map(|c| self.normalize_identifier(&c.name))
            .collect();
        let implied_names: HashSet<String> = implied
            .iter()
            .map(|c| self.normalize_identifier(&c.name))
            .collect();
        imported_names != implied_names
    }

    /// Removes an implied entry (for DROP); imported entries are untouched.
    pub(crate) fn remove_implied(&mut self, canonical: &str) {
        if let Some(entry) = self.entries.get(canonical) {
            if entry.origin == SchemaOrigin::Implied {
                self.entries.remove(canonical);
            }
        }
    }

    /// Merges classifications onto a column of an existing entry. Used to
    /// carry propagated tags into implied tables so later statements keep
    /// propagating them.
    pub(crate) fn add_classifications(
        &mut self,
        canonical: &str,
        column: &str,
        classifications: &[String],
    ) {
        let folded = self.normalize_identifier(column);
        if let Some(entry) = self.entries.get_mut(canonical) {
            if let Some(col) = entry
                .table
                .columns
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(&folded))
            {
                for tag in classifications {
                    if !col.classifications.contains(tag) {
                        col.classifications.push(tag.clone());
                    }
                }
            }
        }
    }

    pub(crate) fn schema_table_key(&self, table: &SchemaTable) -> String {
        let mut parts = Vec::new();
        if let Some(catalog) = &table.catalog {
            parts.push(catalog.clone());
        }
        if let Some(schema) = &table.schema {
            parts.push(schema.clone());
        }
        parts.push(table.name.clone());
        self.normalize_table_name(&parts.join("."))
    }

    /// Canonicalizes a table reference against the registry, consulting the
    /// search path and default namespace for bare names and the default
    /// catalog for two-part names.
    pub(crate) fn canonicalize_table_reference(&self, name: &str) -> TableResolution {
        let parts = split_qualified_identifiers(name);
        if parts.is_empty() {
            return TableResolution {
                canonical: String::new(),
                matched: false,
            };
        }

        let normalized: Vec<String> = parts
            .into_iter()
            .map(|part| self.normalize_identifier(&part))
            .collect();

        match normalized.len() {
            len if len >= 3 => {
                let canonical = normalized.join(".");
                let matched = self.entries.contains_key(&canonical);
                TableResolution { canonical, matched }
            }
            2 => {
                let canonical = normalized.join(".");
                if self.entries.contains_key(&canonical) {
                    return TableResolution {
                        canonical,
                        matched: true,
                    };
                }
                if let Some(default_catalog) = &self.default_catalog {
                    let with_catalog = format!("{default_catalog}.{canonical}");
                    if self.entries.contains_key(&with_catalog) {
                        return TableResolution {
                            canonical: with_catalog,
                            matched: true,
                        };
                    }
                }
                TableResolution {
                    canonical,
                    matched: false,
                }
            }
            _ => {
                let table_only = normalized[0].clone();

                if self.entries.contains_key(&table_only) {
                    return TableResolution {
                        canonical: table_only,
                        matched: true,
                    };
                }

                if let Some(candidate) = self.resolve_via_search_path(&table_only) {
                    return TableResolution {
                        canonical: candidate,
                        matched: true,
                    };
                }

                if let Some(schema) = &self.default_schema {
                    let canonical = if let Some(catalog) = &self.default_catalog {
                        format!("{catalog}.{schema}.{table_only}")
                    } else {
                        format!("{schema}.{table_only}")
                    };
                    let matched = self.entries.contains_key(&canonical);
                    return TableResolution { canonical, matched };
                }

                TableResolution {
                    canonical: table_only,
                    matched: false,
                }
            }
        }
    }

    fn resolve_via_search_path(&self, table: &str) -> Option<String> {
        for entry in &self.search_path {
            let canonical = match (&entry.catalog, &entry.schema) {
                (Some(catalog), schema) => format!("{catalog}.{schema}.{table}"),
                (None, schema) => format!("{schema}.{table}"),
            };

            if self.entries.contains_key(&canonical) {
                return Some(canonical);
            }
        }
        None
    }

    /// Folds one identifier part per the effective case rules. Quoted parts
    /// are unquoted and never folded.
    pub(crate) fn normalize_identifier(&self, name: &str) -> String {
        if is_quoted_identifier(name) {
            unquote_identifier(name)
        } else {
            match self.case {
                CaseSensitivity::Lower | CaseSensitivity::Dialect => name.to_lowercase(),
                CaseSensitivity::Upper => name.to_uppercase(),
                CaseSensitivity::Exact => name.to_string(),
            }
        }
    }

    /// Folds every part of a dotted name.
    pub(crate) fn normalize_table_name(&self, name: &str) -> String {
        let parts = split_qualified_identifiers(name);
        if parts.is_empty() {
            return String::new();
        }

        let normalized: Vec<String> = parts
            .into_iter()
            .map(|part| self.normalize_identifier(&part))
            .collect();

        normalized.join(".")
    }

    /// Validates that `column` exists on a known table. Unknown tables never
    /// warn here — their `UNKNOWN_TABLE` issue already covers them.
    pub(crate) fn validate_column(
        &self,
        canonical: &str,
        column: &str,
        statement_index: usize,
    ) -> Option<Issue> {
        let entry = self.entries.get(canonical)?;
        if entry.table.columns.is_empty() {
            return None;
        }

        let folded = self.normalize_identifier(column);
        let found = entry
            .table
            .columns
            .iter()
            .any(|c| self.normalize_identifier(&c.name) == folded);

        (!found).then(|| {
            Issue::warning(
                issue_codes::UNKNOWN_COLUMN,
                format!("Column '{column}' not found on '{canonical}'"),
            )
            .with_statement(statement_index)
        })
    }

    /// Looks up a column's schema definition on a known table.
    pub(crate) fn column(&self, canonical: &str, column: &str) -> Option<&ColumnSchema> {
        let folded = self.normalize_identifier(column);
        self.entries.get(canonical)?.table.columns.iter().find(|c| {
            self.normalize_identifier(&c.name) == folded
        })
    }

    /// True when a known table exposes the column.
    pub(crate) fn table_has_column(&self, canonical: &str, column: &str) -> bool {
        self.column(canonical, column).is_some()
    }

    /// Classification tags of a column, as imported-source tags.
    pub(crate) fn column_tags(&self, canonical: &str, column: &str) -> Vec<ColumnTag> {
        self.column(canonical, column)
            .map(|c| {
                c.classifications
                    .iter()
                    .map(|name| ColumnTag {
                        name: name.clone(),
                        source: TagSource::Imported,
                        updated_at: None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Primary-key column names of a known table.
    pub(crate) fn primary_key_columns(&self, canonical: &str) -> Vec<String> {
        self.entries
            .get(canonical)
            .map(|entry| {
                entry
                    .table
                    .columns
                    .iter()
                    .filter(|c| c.is_primary_key == Some(true))
                    .map(|c| c.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Foreign keys of a known table as `(column, target)` pairs.
    pub(crate) fn foreign_keys(&self, canonical: &str) -> Vec<(String, ForeignKeyRef)> {
        self.entries
            .get(canonical)
            .map(|entry| {
                entry
                    .table
                    .columns
                    .iter()
                    .filter_map(|c| c.foreign_key.clone().map(|fk| (c.name.clone(), fk)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Extract inline PRIMARY KEY / FOREIGN KEY constraints from column options.
fn extract_column_constraints(
    options: &[ColumnOptionDef],
) -> (Option<bool>, Option<ForeignKeyRef>) {
    let mut is_pk = None;
    let mut fk_ref = None;

    for opt in options {
        match &opt.option {
            ColumnOption::Unique { is_primary, .. } if *is_primary => {
                is_pk = Some(true);
            }
            ColumnOption::ForeignKey {
                foreign_table,
                referred_columns,
                ..
            } => {
                // A bare `REFERENCES orders` has no target column; skip it.
                if let Some(col) = referred_columns.first() {
                    fk_ref = Some(ForeignKeyRef {
                        table: foreign_table.to_string(),
                        column: col.value.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    (is_pk, fk_ref)
}

/// Column names of a table-level composite PRIMARY KEY.
fn table_level_pk_columns(constraints: &[TableConstraint]) -> Vec<String> {
    let mut pk_columns = Vec::new();
    for constraint in constraints {
        if let TableConstraint::PrimaryKey { columns, .. } = constraint {
            // IndexColumn wraps an OrderByExpr; its display is the column name.
            pk_columns.extend(columns.iter().map(|c| c.column.expr.to_string()));
        }
    }
    pk_columns
}

/// Column -> target pairs from table-level FOREIGN KEY constraints, covering
/// both the bare and the `CONSTRAINT name FOREIGN KEY ...` forms.
fn table_level_fk_columns(constraints: &[TableConstraint]) -> Vec<(String, ForeignKeyRef)> {
    let mut fk_columns = Vec::new();
    for constraint in constraints {
        if let TableConstraint::ForeignKey {
            columns,
            foreign_table,
            referred_columns,
            ..
        } = constraint
        {
            // Constrained columns pair with referenced columns positionally;
            // a `REFERENCES t` without a column list yields no pairs, like
            // the inline form.
            for (column, referred) in columns.iter().zip(referred_columns.iter()) {
                fk_columns.push((
                    column.value.clone(),
                    ForeignKeyRef {
                        table: foreign_table.to_string(),
                        column: referred.value.clone(),
                    },
                ));
            }
        }
    }
    fk_columns
}

/// Build column schemas from DDL column definitions plus table constraints.
pub(crate) fn build_column_schemas(
    columns: &[ColumnDef],
    table_constraints: &[TableConstraint],
) -> Vec<ColumnSchema> {
    let pk_column_names = table_level_pk_columns(table_constraints);
    let pk_columns_set: HashSet<&str> = pk_column_names.iter().map(|s| s.as_str()).collect();
    let fk_columns = table_level_fk_columns(table_constraints);
    let fk_by_column: HashMap<&str, &ForeignKeyRef> = fk_columns
        .iter()
        .map(|(column, fk)| (column.as_str(), fk))
        .collect();

    columns
        .iter()
        .map(|c| {
            let (is_pk, fk_ref) = extract_column_constraints(&c.options);
            let is_primary_key =
                if is_pk.unwrap_or(false) || pk_columns_set.contains(c.name.value.as_str()) {
                    Some(true)
                } else {
                    None
                };
            // An inline REFERENCES wins over a table-level constraint on the
            // same column.
            let foreign_key = fk_ref.or_else(|| {
                fk_by_column
                    .get(c.name.value.as_str())
                    .map(|fk| (*fk).clone())
            });
            ColumnSchema {
                name: c.name.value.clone(),
                data_type: Some(c.data_type.to_string()),
                is_primary_key,
                foreign_key,
                classifications: Vec::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables_input(tables: Vec<SchemaTable>) -> SchemaInput {
        SchemaInput::Tables(tables)
    }

    fn table(schema: Option<&str>, name: &str, columns: &[&str]) -> SchemaTable {
        SchemaTable {
            catalog: None,
            schema: schema.map(|s| s.to_string()),
            name: name.to_string(),
            columns: columns.iter().map(|c| ColumnSchema::named(*c)).collect(),
            origin: SchemaOrigin::Imported,
        }
    }

    #[test]
    fn lowercases_unquoted_identifiers_by_default() {
        let (registry, _) = SchemaRegistry::new(None, Dialect::Postgres);
        assert_eq!(registry.normalize_identifier("Users"), "users");
        assert_eq!(registry.normalize_identifier("\"Users\""), "Users");
    }

    #[test]
    fn snowflake_uppercases() {
        let (registry, _) = SchemaRegistry::new(None, Dialect::Snowflake);
        assert_eq!(registry.normalize_identifier("users"), "USERS");
    }

    #[test]
    fn bigquery_preserves_case() {
        let (registry, _) = SchemaRegistry::new(None, Dialect::Bigquery);
        assert_eq!(registry.normalize_identifier("Users"), "Users");
    }

    #[test]
    fn canonicalizes_bare_name_against_tables() {
        let input = tables_input(vec![table(None, "users", &["id"])]);
        let (registry, _) = SchemaRegistry::new(Some(&input), Dialect::Postgres);

        let res = registry.canonicalize_table_reference("users");
        assert!(res.matched);
        assert_eq!(res.canonical, "users");

        let res = registry.canonicalize_table_reference("missing");
        assert!(!res.matched);
    }

    #[test]
    fn default_schema_qualifies_bare_names() {
        let input = SchemaInput::Metadata(SchemaMetadata {
            default_schema: Some("public".to_string()),
            tables: vec![table(Some("public"), "users", &["id"])],
            ..SchemaMetadata::default()
        });
        let (registry, _) = SchemaRegistry::new(Some(&input), Dialect::Postgres);

        let res = registry.canonicalize_table_reference("users");
        assert!(res.matched);
        assert_eq!(res.canonical, "public.users");
    }

    #[test]
    fn search_path_resolves_in_order() {
        let input = SchemaInput::Metadata(SchemaMetadata {
            search_path: Some(vec![
                crate::types::SchemaNamespaceHint {
                    catalog: None,
                    schema: "first".to_string(),
                },
                crate::types::SchemaNamespaceHint {
                    catalog: None,
                    schema: "second".to_string(),
                },
            ]),
            tables: vec![
                table(Some("second"), "users", &["id"]),
                table(Some("first"), "orders", &["id"]),
            ],
            ..SchemaMetadata::default()
        });
        let (registry, _) = SchemaRegistry::new(Some(&input), Dialect::Postgres);

        assert_eq!(
            registry.canonicalize_table_reference("orders").canonical,
            "first.orders"
        );
        assert_eq!(
            registry.canonicalize_table_reference("users").canonical,
            "second.users"
        );
    }

    #[test]
    fn ddl_schema_seeds_imported_tables() {
        let input = SchemaInput::Ddl(crate::types::DdlSchema {
            ddl: "CREATE TABLE raw.orders (id INT PRIMARY KEY, amt NUMERIC);".to_string(),
        });
        let (registry, issues) = SchemaRegistry::new(Some(&input), Dialect::Postgres);
        assert!(issues.is_empty());

        let entry = registry.get("raw.orders").expect("table registered");
        assert_eq!(entry.origin, SchemaOrigin::Imported);
        assert_eq!(entry.table.columns.len(), 2);
        assert_eq!(registry.primary_key_columns("raw.orders"), vec!["id"]);
    }

    #[test]
    fn ddl_schema_captures_table_level_foreign_keys() {
        let input = SchemaInput::Ddl(crate::types::DdlSchema {
            ddl: "CREATE TABLE orders (\
                      id INT PRIMARY KEY, \
                      customer_id INT, \
                      FOREIGN KEY (customer_id) REFERENCES customers(id)\
                  );"
            .to_string(),
        });
        let (registry, issues) = SchemaRegistry::new(Some(&input), Dialect::Postgres);
        assert!(issues.is_empty());

        let fks = registry.foreign_keys("orders");
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].0, "customer_id");
        assert_eq!(
            fks[0].1,
            ForeignKeyRef {
                table: "customers".to_string(),
                column: "id".to_string(),
            }
        );
    }

    #[test]
    fn ddl_schema_captures_named_composite_foreign_keys() {
        let input = SchemaInput::Ddl(crate::types::DdlSchema {
            ddl: "CREATE TABLE line_items (\
                      order_id INT, \
                      line_no INT, \
                      CONSTRAINT fk_order FOREIGN KEY (order_id, line_no) \
                          REFERENCES orders(id, seq)\
                  );"
            .to_string(),
        });
        let (registry, issues) = SchemaRegistry::new(Some(&input), Dialect::Postgres);
        assert!(issues.is_empty());

        // Constrained columns pair with referenced columns positionally.
        let fks = registry.foreign_keys("line_items");
        assert_eq!(fks.len(), 2);
        assert_eq!(fks[0].0, "order_id");
        assert_eq!(fks[0].1.column, "id");
        assert_eq!(fks[1].0, "line_no");
        assert_eq!(fks[1].1.column, "seq");
    }

    #[test]
    fn inline_references_wins_over_table_level() {
        let input = SchemaInput::Ddl(crate::types::DdlSchema {
            ddl: "CREATE TABLE payments (\
                      order_id INT REFERENCES orders(id), \
                      FOREIGN KEY (order_id) REFERENCES archive_orders(id)\
                  );"
            .to_string(),
        });
        let (registry, _) = SchemaRegistry::new(Some(&input), Dialect::Postgres);

        let fks = registry.foreign_keys("payments");
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].1.table, "orders");
    }

    #[test]
    fn bad_ddl_schema_reports_parse_error() {
        let input = SchemaInput::Ddl(crate::types::DdlSchema {
            ddl: "CREATE TABLE raw.orders (".to_string(),
        });
        let (_, issues) = SchemaRegistry::new(Some(&input), Dialect::Postgres);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, issue_codes::PARSE_ERROR);
    }

    #[test]
    fn implied_registration_and_conflict() {
        let input = tables_input(vec![table(None, "users", &["id", "name"])]);
        let (mut registry, _) = SchemaRegistry::new(Some(&input), Dialect::Postgres);

        // Fresh table registers as implied.
        assert!(registry
            .register_implied("staging", vec![ColumnSchema::named("x")], false, 0)
            .is_none());
        assert_eq!(registry.get("staging").unwrap().origin, SchemaOrigin::Implied);

        // Matching columns: no conflict.
        assert!(registry
            .register_implied(
                "users",
                vec![ColumnSchema::named("id"), ColumnSchema::named("name")],
                false,
                1
            )
            .is_none());

        // Disagreeing columns: conflict, imported wins.
        let issue = registry
            .register_implied("users", vec![ColumnSchema::named("other")], false, 2)
            .expect("conflict issue");
        assert_eq!(issue.code, issue_codes::SCHEMA_CONFLICT);
        assert_eq!(registry.get("users").unwrap().origin, SchemaOrigin::Imported);
    }

    #[test]
    fn remove_implied_spares_imported() {
        let input = tables_input(vec![table(None, "users", &["id"])]);
        let (mut registry, _) = SchemaRegistry::new(Some(&input), Dialect::Postgres);
        registry.register_implied("staging", vec![], false, 0);

        registry.remove_implied("staging");
        registry.remove_implied("users");

        assert!(registry.get("staging").is_none());
        assert!(registry.get("users").is_some());
    }

    #[test]
    fn validates_columns_case_insensitively() {
        let input = tables_input(vec![table(None, "users", &["id", "Name"])]);
        let (registry, _) = SchemaRegistry::new(Some(&input), Dialect::Postgres);

        assert!(registry.validate_column("users", "NAME", 0).is_none());
        let issue = registry.validate_column("users", "missing", 0).unwrap();
        assert_eq!(issue.code, issue_codes::UNKNOWN_COLUMN);
        // Unknown tables never produce column issues.
        assert!(registry.validate_column("ghost", "missing", 0).is_none());
    }

    #[test]
    fn classifications_become_imported_tags() {
        let mut t = table(None, "users", &[]);
        t.columns.push(ColumnSchema {
            name: "email".to_string(),
            data_type: None,
            is_primary_key: None,
            foreign_key: None,
            classifications: vec!["PII".to_string()],
        });
        let input = tables_input(vec![t]);
        let (registry, _) = SchemaRegistry::new(Some(&input), Dialect::Postgres);

        let tags = registry.column_tags("users", "email");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "PII");
        assert_eq!(tags[0].source, TagSource::Imported);
    }
}
