//! Per-statement analysis state.
//!
//! A [`StatementContext`] holds the node/edge arenas being built for one
//! statement plus the resolution state the walkers need: the scope stack,
//! CTE registry, join bookkeeping, pending filters, and nesting depths for
//! the complexity score. Everything here is released once the statement's
//! `StatementLineage` is finalized.

use crate::analyzer::helpers::generate_node_id;
use crate::types::{Edge, FilterKind, FilterPredicate, JoinType, Node, Span};
use std::collections::{HashMap, HashSet};

/// One scope level for name resolution. Each SELECT body, subquery, and CTE
/// body gets its own scope; lookup walks innermost-to-outermost.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    /// Relations visible in this scope's FROM/JOIN clauses, in appearance
    /// order. Maps canonical name -> node ID.
    pub(crate) relations: Vec<(String, String)>,
    /// Aliases introduced in this scope (alias -> canonical name).
    pub(crate) aliases: HashMap<String, String>,
    /// Derived-table aliases with no canonical name.
    pub(crate) subquery_aliases: HashSet<String>,
}

impl Scope {
    pub(crate) fn relation_canonicals(&self) -> Vec<String> {
        self.relations.iter().map(|(c, _)| c.clone()).collect()
    }
}

/// Join metadata for the table factor currently being visited.
#[derive(Debug, Clone, Default)]
pub(crate) struct JoinInfo {
    pub(crate) join_type: Option<JoinType>,
    pub(crate) join_condition: Option<String>,
}

/// An output column recorded for the current projection.
#[derive(Debug, Clone)]
pub(crate) struct OutputColumn {
    /// Alias or derived name for the column
    pub(crate) name: String,
    /// Inferred data type, when known from schema expansion
    pub(crate) data_type: Option<String>,
    /// Node ID of the column
    pub(crate) node_id: String,
}

/// A reference to a source column inside an expression.
#[derive(Debug, Clone)]
pub(crate) struct ColumnRef {
    /// Table name or alias qualifier, when written
    pub(crate) table: Option<String>,
    /// Column name
    pub(crate) column: String,
}

/// Context for analyzing a single statement.
pub(crate) struct StatementContext {
    pub(crate) statement_index: usize,
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) node_ids: HashSet<String>,
    pub(crate) edge_ids: HashSet<String>,
    /// Virtual result node of a SELECT-like statement
    pub(crate) output_node_id: Option<String>,
    /// CTE name (normalized) -> node ID
    pub(crate) cte_definitions: HashMap<String, String>,
    /// CTE name -> output columns of its body
    pub(crate) cte_columns: HashMap<String, Vec<OutputColumn>>,
    /// Names of CTEs declared WITH RECURSIVE (normalized)
    pub(crate) recursive_ctes: HashSet<String>,
    /// Alias -> canonical name, statement-wide fallback map
    pub(crate) table_aliases: HashMap<String, String>,
    /// Derived-table aliases, statement-wide fallback set
    pub(crate) subquery_aliases: HashSet<String>,
    /// Scope stack; the last element is the innermost scope
    pub(crate) scope_stack: Vec<Scope>,
    /// Relation canonical name -> node ID, statement-wide registry
    pub(crate) relation_node_ids: HashMap<String, String>,
    /// Join metadata for the factor currently being visited
    pub(crate) current_join_info: JoinInfo,
    /// Operation label for the next relation-level edge ('UNION', ...)
    pub(crate) last_operation: Option<String>,
    /// Output columns of the projection currently being analyzed
    pub(crate) output_columns: Vec<OutputColumn>,
    /// Filter predicates to attach to relation nodes at finalize
    pub(crate) pending_filters: HashMap<String, Vec<FilterPredicate>>,
    /// Join operations seen while walking this statement
    pub(crate) join_count: usize,
    /// Explicit column list of an INSERT target, consumed positionally
    pub(crate) target_column_names: Vec<String>,
    target_column_cursor: usize,
    /// The node whose projection consumes `target_column_names`
    pub(crate) target_column_node: Option<String>,
    /// The relation this statement creates, when it is DDL
    pub(crate) created_relation: Option<(String, String)>,
    /// Current and maximum WITH nesting while walking
    cte_depth: usize,
    pub(crate) max_cte_depth: usize,
    /// Current and maximum subquery nesting while walking
    subquery_depth: usize,
    pub(crate) max_subquery_depth: usize,
}

impl StatementContext {
    pub(crate) fn new(statement_index: usize) -> Self {
        Self {
            statement_index,
            nodes: Vec::new(),
            edges: Vec::new(),
            node_ids: HashSet::new(),
            edge_ids: HashSet::new(),
            output_node_id: None,
            cte_definitions: HashMap::new(),
            cte_columns: HashMap::new(),
            recursive_ctes: HashSet::new(),
            table_aliases: HashMap::new(),
            subquery_aliases: HashSet::new(),
            scope_stack: Vec::new(),
            relation_node_ids: HashMap::new(),
            current_join_info: JoinInfo::default(),
            last_operation: None,
            output_columns: Vec::new(),
            pending_filters: HashMap::new(),
            join_count: 0,
            target_column_names: Vec::new(),
            target_column_cursor: 0,
            target_column_node: None,
            created_relation: None,
            cte_depth: 0,
            max_cte_depth: 0,
            subquery_depth: 0,
            max_subquery_depth: 0,
        }
    }

    /// Adds a node unless one with the same ID already exists. Returns the ID.
    pub(crate) fn add_node(&mut self, node: Node) -> String {
        let id = node.id.clone();
        if self.node_ids.insert(id.clone()) {
            self.nodes.push(node);
        }
        id
    }

    /// Adds an edge unless one with the same ID already exists.
    pub(crate) fn add_edge(&mut self, edge: Edge) {
        let id = edge.id.clone();
        if self.edge_ids.insert(id) {
            self.edges.push(edge);
        }
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Creates the virtual `output` node for a SELECT-like statement.
    pub(crate) fn ensure_output_node(&mut self) -> String {
        if let Some(id) = &self.output_node_id {
            return id.clone();
        }
        let id = generate_node_id("output", &format!("statement_{}", self.statement_index));
        self.add_node(Node::output(id.clone(), "output"));
        self.output_node_id = Some(id.clone());
        id
    }

    pub(crate) fn push_scope(&mut self) {
        self.scope_stack.push(Scope::default());
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    pub(crate) fn current_scope_mut(&mut self) -> Option<&mut Scope> {
        self.scope_stack.last_mut()
    }

    /// Registers a relation in the statement registry and the current scope.
    pub(crate) fn register_relation_in_scope(&mut self, canonical: String, node_id: String) {
        self.relation_node_ids
            .insert(canonical.clone(), node_id.clone());

        if let Some(scope) = self.current_scope_mut() {
            if !scope.relations.iter().any(|(c, _)| c == &canonical) {
                scope.relations.push((canonical, node_id));
            }
        }
    }

    pub(crate) fn register_alias_in_scope(&mut self, alias: String, canonical: String) {
        self.table_aliases.insert(alias.clone(), canonical.clone());
        if let Some(scope) = self.current_scope_mut() {
            scope.aliases.insert(alias, canonical);
        }
    }

    pub(crate) fn register_subquery_alias_in_scope(&mut self, alias: String) {
        self.subquery_aliases.insert(alias.clone());
        if let Some(scope) = self.current_scope_mut() {
            scope.subquery_aliases.insert(alias);
        }
    }

    /// Relations visible for bare-column resolution, innermost scope first.
    pub(crate) fn relations_in_current_scope(&self) -> Vec<String> {
        if let Some(scope) = self.scope_stack.last() {
            scope.relation_canonicals()
        } else {
            let mut all: Vec<String> = self.relation_node_ids.keys().cloned().collect();
            all.sort();
            all
        }
    }

    pub(crate) fn add_filter_for_relation(
        &mut self,
        canonical: &str,
        expression: String,
        span: Option<Span>,
        kind: FilterKind,
    ) {
        let filters = self.pending_filters.entry(canonical.to_string()).or_default();
        let predicate = FilterPredicate {
            expression,
            span,
            kind,
        };
        if !filters.contains(&predicate) {
            filters.push(predicate);
        }
    }

    /// Sets the explicit target column list of an INSERT, tied to the node
    /// whose projection should consume it.
    pub(crate) fn set_target_columns(&mut self, node_id: &str, names: Vec<String>) {
        self.target_column_names = names;
        self.target_column_cursor = 0;
        self.target_column_node = Some(node_id.to_string());
    }

    /// Consumes the next INSERT target column name when `target` is the node
    /// the column list was declared for.
    pub(crate) fn next_target_column(&mut self, target: Option<&str>) -> Option<String> {
        if target != self.target_column_node.as_deref() {
            return None;
        }
        let name = self.target_column_names.get(self.target_column_cursor)?;
        self.target_column_cursor += 1;
        Some(name.clone())
    }

    /// Marks where the current projection begins so the caller can take just
    /// the columns a nested query produced.
    pub(crate) fn projection_checkpoint(&self) -> usize {
        self.output_columns.len()
    }

    pub(crate) fn take_output_columns_since(&mut self, checkpoint: usize) -> Vec<OutputColumn> {
        self.output_columns.split_off(checkpoint.min(self.output_columns.len()))
    }

    pub(crate) fn enter_cte(&mut self) {
        self.cte_depth += 1;
        self.max_cte_depth = self.max_cte_depth.max(self.cte_depth);
    }

    pub(crate) fn exit_cte(&mut self) {
        self.cte_depth = self.cte_depth.saturating_sub(1);
    }

    pub(crate) fn enter_subquery(&mut self) {
        self.subquery_depth += 1;
        self.max_subquery_depth = self.max_subquery_depth.max(self.subquery_depth);
    }

    pub(crate) fn exit_subquery(&mut self) {
        self.subquery_depth = self.subquery_depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_nodes_are_ignored() {
        let mut ctx = StatementContext::new(0);
        ctx.add_node(Node::table("t1".into(), "users"));
        ctx.add_node(Node::table("t1".into(), "users"));
        assert_eq!(ctx.nodes.len(), 1);
    }

    #[test]
    fn output_node_is_created_once() {
        let mut ctx = StatementContext::new(3);
        let first = ctx.ensure_output_node();
        let second = ctx.ensure_output_node();
        assert_eq!(first, second);
        assert_eq!(ctx.nodes.len(), 1);
    }

    #[test]
    fn scope_relations_keep_from_order() {
        let mut ctx = StatementContext::new(0);
        ctx.push_scope();
        ctx.register_relation_in_scope("users".into(), "t1".into());
        ctx.register_relation_in_scope("orders".into(), "t2".into());
        ctx.register_relation_in_scope("users".into(), "t1".into());
        assert_eq!(ctx.relations_in_current_scope(), vec!["users", "orders"]);
    }

    #[test]
    fn depth_counters_track_maximum() {
        let mut ctx = StatementContext::new(0);
        ctx.enter_subquery();
        ctx.enter_subquery();
        ctx.exit_subquery();
        ctx.enter_subquery();
        ctx.exit_subquery();
        ctx.exit_subquery();
        assert_eq!(ctx.max_subquery_depth, 2);
    }

    #[test]
    fn insert_target_columns_consume_positionally() {
        let mut ctx = StatementContext::new(0);
        ctx.set_target_columns("tgt", vec!["a".into(), "b".into()]);
        // Projections for other targets do not consume the list.
        assert_eq!(ctx.next_target_column(Some("other")), None);
        assert_eq!(ctx.next_target_column(Some("tgt")).as_deref(), Some("a"));
        assert_eq!(ctx.next_target_column(Some("tgt")).as_deref(), Some("b"));
        assert_eq!(ctx.next_target_column(Some("tgt")), None);
    }
}
