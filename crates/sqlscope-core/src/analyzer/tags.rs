//! Classification tag propagation.
//!
//! Source columns receive tags from schema classifications when their nodes
//! are created; this pass carries them transitively along data-flow and
//! derivation edges, marking every received tag `source: propagated`.
//! Cross-statement propagation falls out of implied-schema capture: a
//! created relation's tagged columns become classifications on its implied
//! entry, which seeds the next statement's source columns.

use super::context::StatementContext;
use crate::types::{ColumnTag, EdgeType, TagFlow, TagSource};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Propagates tags along the statement's flow edges to a fixed point.
pub(super) fn propagate_statement_tags(ctx: &mut StatementContext) {
    let flow_edges: Vec<(String, String)> = ctx
        .edges
        .iter()
        .filter(|e| matches!(e.edge_type, EdgeType::DataFlow | EdgeType::Derivation))
        .map(|e| (e.from.clone(), e.to.clone()))
        .collect();

    if flow_edges.is_empty() {
        return;
    }

    let node_index: HashMap<String, usize> = ctx
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();

    // Tag sets converge, so iteration is bounded by the longest path; the
    // cap guards degenerate cycles.
    let max_rounds = ctx.nodes.len().max(1);
    for _ in 0..max_rounds {
        let mut changed = false;

        for (from, to) in &flow_edges {
            let (Some(&from_idx), Some(&to_idx)) = (node_index.get(from), node_index.get(to))
            else {
                continue;
            };
            if from_idx == to_idx {
                continue;
            }

            let inherited: Vec<ColumnTag> = ctx.nodes[from_idx]
                .tags
                .iter()
                .map(|tag| ColumnTag {
                    name: tag.name.clone(),
                    source: TagSource::Propagated,
                    updated_at: tag.updated_at.clone(),
                })
                .collect();

            let target = &mut ctx.nodes[to_idx];
            for tag in inherited {
                if !target.tags.iter().any(|t| t.name == tag.name) {
                    target.tags.push(tag);
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }
}

/// Aggregates per-tag flows across all statements for the summary: where
/// each tag originates and which columns received it by propagation.
pub(super) fn collect_tag_flows(statements: &[crate::types::StatementLineage]) -> Vec<TagFlow> {
    let mut sources: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut targets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for statement in statements {
        for node in &statement.nodes {
            for tag in &node.tags {
                let qualified = node
                    .qualified_name
                    .clone()
                    .unwrap_or_else(|| node.label.clone());
                match tag.source {
                    TagSource::Propagated => {
                        targets.entry(tag.name.clone()).or_default().insert(qualified);
                    }
                    TagSource::Imported | TagSource::User => {
                        sources.entry(tag.name.clone()).or_default().insert(qualified);
                    }
                }
            }
        }
    }

    let mut names: BTreeSet<String> = sources.keys().cloned().collect();
    names.extend(targets.keys().cloned());

    names
        .into_iter()
        .map(|tag| TagFlow {
            sources: sources
                .get(&tag)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default(),
            targets: targets
                .get(&tag)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default(),
            tag,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::helpers::{generate_column_node_id, generate_edge_id};
    use crate::types::{Edge, Node};

    fn tagged(mut node: Node, name: &str, source: TagSource) -> Node {
        node.tags.push(ColumnTag {
            name: name.to_string(),
            source,
            updated_at: None,
        });
        node
    }

    #[test]
    fn tags_flow_transitively() {
        let mut ctx = StatementContext::new(0);
        let a = generate_column_node_id(Some("t"), "a");
        let b = generate_column_node_id(Some("t"), "b");
        let c = generate_column_node_id(Some("t"), "c");

        ctx.add_node(tagged(
            Node::column(a.clone(), "a"),
            "PII",
            TagSource::Imported,
        ));
        ctx.add_node(Node::column(b.clone(), "b"));
        ctx.add_node(Node::column(c.clone(), "c"));
        ctx.add_edge(Edge::data_flow(
            generate_edge_id("data_flow", &a, &b),
            a.clone(),
            b.clone(),
        ));
        ctx.add_edge(Edge::derivation(
            generate_edge_id("derivation", &b, &c),
            b.clone(),
            c.clone(),
        ));

        propagate_statement_tags(&mut ctx);

        let b_node = ctx.nodes.iter().find(|n| n.id == b).unwrap();
        assert_eq!(b_node.tags.len(), 1);
        assert_eq!(b_node.tags[0].source, TagSource::Propagated);

        let c_node = ctx.nodes.iter().find(|n| n.id == c).unwrap();
        assert_eq!(c_node.tags.len(), 1);
        assert_eq!(c_node.tags[0].name, "PII");
    }

    #[test]
    fn propagation_is_idempotent_and_additive() {
        let mut ctx = StatementContext::new(0);
        let a = generate_column_node_id(Some("t"), "a");
        let b = generate_column_node_id(Some("t"), "b");

        ctx.add_node(tagged(
            Node::column(a.clone(), "a"),
            "PII",
            TagSource::Imported,
        ));
        ctx.add_node(tagged(
            Node::column(b.clone(), "b"),
            "SECRET",
            TagSource::User,
        ));
        ctx.add_edge(Edge::data_flow(
            generate_edge_id("data_flow", &a, &b),
            a,
            b.clone(),
        ));

        propagate_statement_tags(&mut ctx);
        propagate_statement_tags(&mut ctx);

        let b_node = ctx.nodes.iter().find(|n| n.id == b).unwrap();
        // Existing tags survive; the propagated one arrives once.
        assert_eq!(b_node.tags.len(), 2);
        assert!(b_node.tags.iter().any(|t| t.name == "SECRET"));
        assert!(b_node
            .tags
            .iter()
            .any(|t| t.name == "PII" && t.source == TagSource::Propagated));
    }

    #[test]
    fn cycles_terminate() {
        let mut ctx = StatementContext::new(0);
        let a = generate_column_node_id(Some("t"), "a");
        let b = generate_column_node_id(Some("t"), "b");

        ctx.add_node(tagged(
            Node::column(a.clone(), "a"),
            "PII",
            TagSource::Imported,
        ));
        ctx.add_node(Node::column(b.clone(), "b"));
        ctx.add_edge(Edge::data_flow(
            generate_edge_id("data_flow", &a, &b),
            a.clone(),
            b.clone(),
        ));
        ctx.add_edge(Edge::data_flow(
            generate_edge_id("data_flow", &b, &a),
            b,
            a,
        ));

        propagate_statement_tags(&mut ctx);
    }
}
