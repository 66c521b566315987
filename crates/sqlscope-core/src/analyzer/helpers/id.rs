//! Deterministic ID generation for nodes and edges.
//!
//! IDs are content hashes, so the same relation or column produces the same
//! ID in every statement and across reanalysis of the same input.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Generate a deterministic node ID based on type and name.
pub(crate) fn generate_node_id(node_type: &str, name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    node_type.hash(&mut hasher);
    name.hash(&mut hasher);
    let hash = hasher.finish();

    format!("{node_type}_{hash:016x}")
}

/// Generate a deterministic edge ID; the edge type participates so parallel
/// edges of different types between the same endpoints stay distinct.
pub(crate) fn generate_edge_id(edge_type: &str, from: &str, to: &str) -> String {
    let mut hasher = DefaultHasher::new();
    edge_type.hash(&mut hasher);
    from.hash(&mut hasher);
    to.hash(&mut hasher);
    let hash = hasher.finish();

    format!("edge_{hash:016x}")
}

/// Generate a deterministic column node ID scoped to its owning relation.
pub(crate) fn generate_column_node_id(parent_id: Option<&str>, column_name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    "column".hash(&mut hasher);
    if let Some(parent) = parent_id {
        parent.hash(&mut hasher);
    }
    column_name.hash(&mut hasher);
    let hash = hasher.finish();

    format!("column_{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_stable_and_distinct() {
        assert_eq!(
            generate_node_id("table", "public.users"),
            generate_node_id("table", "public.users")
        );
        assert_ne!(
            generate_node_id("table", "public.users"),
            generate_node_id("view", "public.users")
        );
    }

    #[test]
    fn edge_ids_distinguish_type_and_direction() {
        let a = generate_edge_id("data_flow", "n1", "n2");
        assert_eq!(a, generate_edge_id("data_flow", "n1", "n2"));
        assert_ne!(a, generate_edge_id("data_flow", "n2", "n1"));
        assert_ne!(a, generate_edge_id("ownership", "n1", "n2"));
    }

    #[test]
    fn column_ids_scope_to_parent() {
        assert_ne!(
            generate_column_node_id(Some("table_a"), "id"),
            generate_column_node_id(Some("table_b"), "id")
        );
    }
}
