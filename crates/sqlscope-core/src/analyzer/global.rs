//! Global lineage unification and result assembly.
//!
//! Relation nodes from every statement are grouped by their case-folded
//! canonical key; each group becomes one `GlobalNode` whose type is the most
//! specific in the group (table > view > cte). Statement-local column edges
//! are promoted to relation level by quotienting through ownership, then
//! de-duplicated. Column-level unification is opt-in.

use super::helpers::{generate_column_node_id, generate_edge_id, generate_node_id, parse_canonical_name};
use super::{tags, Analyzer};
use crate::types::{
    AnalyzeResult, EdgeType, GlobalEdge, GlobalLineage, GlobalNode, Issue, IssueCount, NodeType,
    ResolvedColumnSchema, ResolvedSchema, ResolvedSchemaTable, Severity, StatementRef, Summary,
};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Most-specific-wins ordering for group types.
fn type_rank(node_type: NodeType) -> u8 {
    match node_type {
        NodeType::Table => 0,
        NodeType::View => 1,
        NodeType::Cte => 2,
        NodeType::Column | NodeType::Output => 3,
    }
}

fn type_prefix(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Table => "table",
        NodeType::View => "view",
        NodeType::Cte => "cte",
        NodeType::Column => "column",
        NodeType::Output => "output",
    }
}

#[derive(Default)]
struct RelationGroup {
    /// Original-case canonical string of the first contributor
    canonical: String,
    label: String,
    best_rank: u8,
    refs: Vec<StatementRef>,
}

impl<'a> Analyzer<'a> {
    pub(super) fn build_result(&self) -> AnalyzeResult {
        let global_lineage = self.build_global_lineage();
        let summary = self.build_summary(&global_lineage);
        let resolved_schema = self.build_resolved_schema();
        let issues = finalize_issues(self.issues.clone());

        AnalyzeResult {
            statements: self.statements.clone(),
            issues,
            summary,
            resolved_schema,
            global_lineage,
        }
    }

    fn build_global_lineage(&self) -> GlobalLineage {
        // Group relation nodes by folded canonical key.
        let mut groups: BTreeMap<String, RelationGroup> = BTreeMap::new();
        // (statement index, local node id) -> group key
        let mut local_to_key: HashMap<(usize, String), String> = HashMap::new();

        for statement in &self.statements {
            for node in &statement.nodes {
                if !node.node_type.is_relation() {
                    continue;
                }
                let canonical = node
                    .qualified_name
                    .clone()
                    .unwrap_or_else(|| node.label.clone());
                let key = canonical.to_lowercase();

                let group = groups.entry(key.clone()).or_insert_with(|| RelationGroup {
                    canonical: canonical.clone(),
                    label: node.label.clone(),
                    best_rank: type_rank(node.node_type),
                    refs: Vec::new(),
                });
                group.best_rank = group.best_rank.min(type_rank(node.node_type));
                group.refs.push(StatementRef {
                    statement_index: statement.statement_index,
                    node_id: node.id.clone(),
                });
                local_to_key.insert((statement.statement_index, node.id.clone()), key);
            }
        }

        let mut nodes = Vec::with_capacity(groups.len());
        let mut key_to_global: HashMap<String, (String, NodeType)> = HashMap::new();
        for (key, group) in &groups {
            let node_type = match group.best_rank {
                0 => NodeType::Table,
                1 => NodeType::View,
                _ => NodeType::Cte,
            };
            let id = generate_node_id(type_prefix(node_type), key);
            key_to_global.insert(key.clone(), (id.clone(), node_type));

            let mut refs = group.refs.clone();
            refs.sort_by(|a, b| {
                (a.statement_index, &a.node_id).cmp(&(b.statement_index, &b.node_id))
            });

            nodes.push(GlobalNode {
                id,
                node_type,
                label: group.label.clone(),
                canonical_name: parse_canonical_name(&group.canonical),
                statement_refs: refs,
            });
        }

        let mut edges: Vec<GlobalEdge> = Vec::new();
        let mut seen_edges: HashSet<(String, String, EdgeType)> = HashSet::new();

        for statement in &self.statements {
            // Column id -> owning relation's group key, via ownership edges.
            let mut column_owner: HashMap<&str, &str> = HashMap::new();
            for edge in &statement.edges {
                if edge.edge_type == EdgeType::Ownership
                    && local_to_key
                        .contains_key(&(statement.statement_index, edge.from.clone()))
                {
                    column_owner.insert(edge.to.as_str(), edge.from.as_str());
                }
            }

            let global_of = |local: &str| -> Option<&(String, NodeType)> {
                local_to_key
                    .get(&(statement.statement_index, local.to_string()))
                    .and_then(|key| key_to_global.get(key))
            };

            for edge in &statement.edges {
                if !matches!(edge.edge_type, EdgeType::DataFlow | EdgeType::Derivation) {
                    continue;
                }

                // Relation-level edges map directly; column-level edges are
                // promoted through their owners.
                let from_global = global_of(&edge.from).or_else(|| {
                    column_owner
                        .get(edge.from.as_str())
                        .and_then(|owner| global_of(owner))
                });
                let to_global = global_of(&edge.to).or_else(|| {
                    column_owner
                        .get(edge.to.as_str())
                        .and_then(|owner| global_of(owner))
                });

                let (Some((from_id, _)), Some((to_id, _))) = (from_global, to_global) else {
                    continue;
                };
                if from_id == to_id {
                    continue;
                }
                if seen_edges.insert((from_id.clone(), to_id.clone(), edge.edge_type)) {
                    let type_key = match edge.edge_type {
                        EdgeType::Derivation => "derivation",
                        _ => "data_flow",
                    };
                    edges.push(GlobalEdge {
                        id: generate_edge_id(type_key, from_id, to_id),
                        from: from_id.clone(),
                        to: to_id.clone(),
                        edge_type: edge.edge_type,
                    });
                }
            }
        }

        if self.opts.unify_columns {
            self.unify_columns(&local_to_key, &key_to_global, &mut nodes, &mut edges);
        }

        edges.sort_by(|a, b| (a.edge_type, &a.from, &a.to).cmp(&(b.edge_type, &b.from, &b.to)));

        GlobalLineage { nodes, edges }
    }

    /// Opt-in column-level unification: one global column node per
    /// `(relation group, folded column name)`, with ownership edges and
    /// column-to-column flow edges between unified columns.
    fn unify_columns(
        &self,
        local_to_key: &HashMap<(usize, String), String>,
        key_to_global: &HashMap<String, (String, NodeType)>,
        nodes: &mut Vec<GlobalNode>,
        edges: &mut Vec<GlobalEdge>,
    ) {
        #[derive(Default)]
        struct ColumnGroup {
            label: String,
            owner_canonical: String,
            refs: Vec<StatementRef>,
        }

        // (relation global id, folded column label) -> group
        let mut columns: BTreeMap<(String, String), ColumnGroup> = BTreeMap::new();
        // (statement index, local column id) -> global column key
        let mut local_column_key: HashMap<(usize, String), (String, String)> = HashMap::new();

        for statement in &self.statements {
            let mut owner_of: HashMap<&str, &str> = HashMap::new();
            for edge in &statement.edges {
                if edge.edge_type == EdgeType::Ownership {
                    owner_of.insert(edge.to.as_str(), edge.from.as_str());
                }
            }

            for node in &statement.nodes {
                if node.node_type != NodeType::Column {
                    continue;
                }
                let Some(owner_local) = owner_of.get(node.id.as_str()) else {
                    continue;
                };
                let Some(owner_key) =
                    local_to_key.get(&(statement.statement_index, owner_local.to_string()))
                else {
                    continue;
                };
                let Some((owner_global, _)) = key_to_global.get(owner_key) else {
                    continue;
                };

                let folded = node.label.to_lowercase();
                let key = (owner_global.clone(), folded);
                let group = columns.entry(key.clone()).or_insert_with(|| ColumnGroup {
                    label: node.label.clone(),
                    owner_canonical: owner_key.clone(),
                    refs: Vec::new(),
                });
                group.refs.push(StatementRef {
                    statement_index: statement.statement_index,
                    node_id: node.id.clone(),
                });
                local_column_key
                    .insert((statement.statement_index, node.id.clone()), key);
            }
        }

        let mut column_global_ids: HashMap<(String, String), String> = HashMap::new();
        for ((owner_global, folded), group) in &columns {
            let id = generate_column_node_id(Some(owner_global), folded);
            column_global_ids.insert((owner_global.clone(), folded.clone()), id.clone());

            let mut refs = group.refs.clone();
            refs.sort_by(|a, b| {
                (a.statement_index, &a.node_id).cmp(&(b.statement_index, &b.node_id))
            });

            nodes.push(GlobalNode {
                id: id.clone(),
                node_type: NodeType::Column,
                label: group.label.clone(),
                canonical_name: parse_canonical_name(&group.owner_canonical)
                    .with_column(folded.clone()),
                statement_refs: refs,
            });

            edges.push(GlobalEdge {
                id: generate_edge_id("ownership", owner_global, &id),
                from: owner_global.clone(),
                to: id.clone(),
                edge_type: EdgeType::Ownership,
            });
        }

        let mut seen: HashSet<(String, String, EdgeType)> = HashSet::new();
        for statement in &self.statements {
            for edge in &statement.edges {
                if !matches!(edge.edge_type, EdgeType::DataFlow | EdgeType::Derivation) {
                    continue;
                }
                let from = local_column_key
                    .get(&(statement.statement_index, edge.from.clone()))
                    .and_then(|key| column_global_ids.get(key));
                let to = local_column_key
                    .get(&(statement.statement_index, edge.to.clone()))
                    .and_then(|key| column_global_ids.get(key));

                let (Some(from_id), Some(to_id)) = (from, to) else {
                    continue;
                };
                if from_id == to_id {
                    continue;
                }
                if seen.insert((from_id.clone(), to_id.clone(), edge.edge_type)) {
                    let type_key = match edge.edge_type {
                        EdgeType::Derivation => "derivation",
                        _ => "data_flow",
                    };
                    edges.push(GlobalEdge {
                        id: generate_edge_id(type_key, from_id, to_id),
                        from: from_id.clone(),
                        to: to_id.clone(),
                        edge_type: edge.edge_type,
                    });
                }
            }
        }
    }

    fn build_summary(&self, global_lineage: &GlobalLineage) -> Summary {
        let error_count = self
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        let warning_count = self
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count();
        let info_count = self
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Info)
            .count();

        let table_count = global_lineage
            .nodes
            .iter()
            .filter(|n| n.node_type.is_relation())
            .count();

        let column_count: usize = self
            .statements
            .iter()
            .map(|s| {
                s.nodes
                    .iter()
                    .filter(|n| n.node_type == NodeType::Column)
                    .count()
            })
            .sum();

        let join_count: usize = self.statements.iter().map(|s| s.join_count).sum();
        let complexity_score = self
            .statements
            .iter()
            .map(|s| s.complexity_score)
            .max()
            .unwrap_or(0);

        let tag_flows = if self.opts.propagate_tags {
            let flows = tags::collect_tag_flows(&self.statements);
            (!flows.is_empty()).then_some(flows)
        } else {
            None
        };

        Summary {
            statement_count: self.statements.len(),
            table_count,
            column_count,
            join_count,
            complexity_score,
            issue_count: IssueCount {
                errors: error_count,
                warnings: warning_count,
                infos: info_count,
            },
            has_errors: error_count > 0,
            tag_flows,
        }
    }

    fn build_resolved_schema(&self) -> Option<ResolvedSchema> {
        let mut tables: Vec<ResolvedSchemaTable> = self
            .schema
            .all_entries()
            .map(|entry| ResolvedSchemaTable {
                catalog: entry.table.catalog.clone(),
                schema: entry.table.schema.clone(),
                name: entry.table.name.clone(),
                columns: entry
                    .table
                    .columns
                    .iter()
                    .map(|col| ResolvedColumnSchema {
                        name: col.name.clone(),
                        data_type: col.data_type.clone(),
                        is_primary_key: col.is_primary_key,
                        foreign_key: col.foreign_key.clone(),
                        classifications: col.classifications.clone(),
                    })
                    .collect(),
                origin: entry.origin,
                source_statement_index: entry.source_statement_index,
                temporary: entry.temporary.then_some(true),
            })
            .collect();

        if tables.is_empty() {
            return None;
        }

        tables.sort_by(|a, b| {
            (&a.catalog, &a.schema, &a.name).cmp(&(&b.catalog, &b.schema, &b.name))
        });
        Some(ResolvedSchema { tables })
    }
}

/// De-duplicates and orders issues: `(code, span, message)` de-dup, then
/// `(statementIndex, span.start, severity)` ascending with absent fields
/// first.
pub(super) fn finalize_issues(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen: HashSet<(String, Option<(usize, usize)>, String)> = HashSet::new();
    let mut unique: Vec<Issue> = Vec::with_capacity(issues.len());

    for issue in issues {
        let key = (
            issue.code.clone(),
            issue.span.map(|s| (s.start, s.end)),
            issue.message.clone(),
        );
        if seen.insert(key) {
            unique.push(issue);
        }
    }

    unique.sort_by_key(|issue| {
        (
            issue.statement_index.map(|i| i as i64).unwrap_or(-1),
            issue.span.map(|s| s.start as i64).unwrap_or(-1),
            issue.severity,
        )
    });

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{issue_codes, Span};

    #[test]
    fn issues_dedupe_on_code_span_message() {
        let issue = Issue::warning(issue_codes::UNKNOWN_TABLE, "Table 'x' is unknown")
            .with_span(Span::new(5, 6))
            .with_statement(0);
        let issues = finalize_issues(vec![issue.clone(), issue.clone()]);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn issues_order_by_statement_span_severity() {
        let a = Issue::info(issue_codes::WILDCARD_NO_SCHEMA, "a")
            .with_statement(1)
            .with_span(Span::new(40, 41));
        let b = Issue::error(issue_codes::PARSE_ERROR, "b")
            .with_statement(0)
            .with_span(Span::new(10, 11));
        let c = Issue::error(issue_codes::UNTERMINATED_LITERAL, "c");
        let d = Issue::warning(issue_codes::UNKNOWN_TABLE, "d")
            .with_statement(0)
            .with_span(Span::new(10, 12));

        let sorted = finalize_issues(vec![a, b, c, d]);
        assert_eq!(sorted[0].code, issue_codes::UNTERMINATED_LITERAL);
        assert_eq!(sorted[1].code, issue_codes::PARSE_ERROR);
        assert_eq!(sorted[2].code, issue_codes::UNKNOWN_TABLE);
        assert_eq!(sorted[3].code, issue_codes::WILDCARD_NO_SCHEMA);
    }
}
