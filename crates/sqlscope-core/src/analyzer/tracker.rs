//! Producer/consumer tracking across statements.
//!
//! Records which statements create relations (CREATE TABLE, CTAS, CREATE
//! VIEW, INSERT targets) and which read them, and keeps the view/table
//! distinction so node identity stays consistent across the whole workload.
//! One tracker lives for the duration of an analysis pass.

use super::helpers::generate_node_id;
use crate::types::NodeType;
use std::collections::{HashMap, HashSet};

pub(crate) struct RelationTracker {
    /// Canonical name -> statement index that last produced it
    produced: HashMap<String, usize>,
    /// Canonical names produced via CREATE VIEW
    produced_views: HashSet<String>,
}

impl RelationTracker {
    pub(crate) fn new() -> Self {
        Self {
            produced: HashMap::new(),
            produced_views: HashSet::new(),
        }
    }

    /// Records that a table was produced. The latest producer wins.
    pub(crate) fn record_produced(&mut self, canonical: &str, statement_index: usize) {
        self.produced.insert(canonical.to_string(), statement_index);
    }

    /// Records that a view was produced.
    pub(crate) fn record_view_produced(&mut self, canonical: &str, statement_index: usize) {
        self.produced_views.insert(canonical.to_string());
        self.record_produced(canonical, statement_index);
    }

    /// True when an earlier statement created this relation.
    pub(crate) fn was_produced(&self, canonical: &str) -> bool {
        self.produced.contains_key(canonical)
    }

    /// Removes a relation from tracking (DROP).
    pub(crate) fn remove(&mut self, canonical: &str) {
        self.produced.remove(canonical);
        self.produced_views.remove(canonical);
    }

    /// Node ID and type for a relation, honoring the view distinction.
    pub(crate) fn relation_identity(&self, canonical: &str) -> (String, NodeType) {
        if self.produced_views.contains(canonical) {
            (generate_node_id("view", canonical), NodeType::View)
        } else {
            (generate_node_id("table", canonical), NodeType::Table)
        }
    }

    pub(crate) fn relation_node_id(&self, canonical: &str) -> String {
        self.relation_identity(canonical).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_producers() {
        let mut tracker = RelationTracker::new();
        tracker.record_produced("staging.raw", 0);
        assert!(tracker.was_produced("staging.raw"));
        assert!(!tracker.was_produced("external.src"));
    }

    #[test]
    fn latest_producer_wins() {
        let mut tracker = RelationTracker::new();
        tracker.record_produced("staging.data", 0);
        tracker.record_produced("staging.data", 2);
        assert!(tracker.was_produced("staging.data"));
    }

    #[test]
    fn views_get_view_identity() {
        let mut tracker = RelationTracker::new();
        tracker.record_produced("public.t", 0);
        tracker.record_view_produced("public.v", 1);

        let (table_id, table_type) = tracker.relation_identity("public.t");
        assert!(table_id.starts_with("table_"));
        assert_eq!(table_type, NodeType::Table);

        let (view_id, view_type) = tracker.relation_identity("public.v");
        assert!(view_id.starts_with("view_"));
        assert_eq!(view_type, NodeType::View);
    }

    #[test]
    fn unknown_relations_default_to_table() {
        let tracker = RelationTracker::new();
        let (_, node_type) = tracker.relation_identity("never.seen");
        assert_eq!(node_type, NodeType::Table);
    }

    #[test]
    fn remove_clears_both_maps() {
        let mut tracker = RelationTracker::new();
        tracker.record_view_produced("public.v", 0);
        tracker.remove("public.v");
        assert!(!tracker.was_produced("public.v"));
        let (_, node_type) = tracker.relation_identity("public.v");
        assert_eq!(node_type, NodeType::Table);
    }
}
