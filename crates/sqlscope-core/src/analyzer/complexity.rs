//! Complexity score calculation for SQL statements.
//!
//! The score is `clamp(1, 100, round(w1·joins + w2·ln(nodes+1) + w3·cteDepth
//! + w4·subqDepth + w5·columns/10))`, deterministic for a given AST. The
//! weights are tuning constants, overridable per request.

use crate::types::ComplexityWeights;

const JOIN_WEIGHT: f64 = 10.0;
const NODE_WEIGHT: f64 = 6.0;
const CTE_DEPTH_WEIGHT: f64 = 8.0;
const SUBQUERY_DEPTH_WEIGHT: f64 = 7.0;
const COLUMN_WEIGHT: f64 = 1.0;

impl Default for ComplexityWeights {
    fn default() -> Self {
        Self {
            joins: JOIN_WEIGHT,
            nodes: NODE_WEIGHT,
            cte_depth: CTE_DEPTH_WEIGHT,
            subq_depth: SUBQUERY_DEPTH_WEIGHT,
            columns: COLUMN_WEIGHT,
        }
    }
}

/// Structural counts feeding the complexity score.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ComplexityInputs {
    pub(crate) join_count: usize,
    pub(crate) node_count: usize,
    pub(crate) cte_depth: usize,
    pub(crate) subquery_depth: usize,
    pub(crate) column_count: usize,
}

/// Computes the bounded 1..100 score.
pub(crate) fn calculate_complexity(inputs: ComplexityInputs, weights: &ComplexityWeights) -> u8 {
    let raw = weights.joins * inputs.join_count as f64
        + weights.nodes * ((inputs.node_count + 1) as f64).ln()
        + weights.cte_depth * inputs.cte_depth as f64
        + weights.subq_depth * inputs.subquery_depth as f64
        + weights.columns * inputs.column_count as f64 / 10.0;

    (raw.round() as i64).clamp(1, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(inputs: ComplexityInputs) -> u8 {
        calculate_complexity(inputs, &ComplexityWeights::default())
    }

    #[test]
    fn trivial_statement_scores_minimum() {
        assert_eq!(score(ComplexityInputs::default()), 1);
    }

    #[test]
    fn single_table_select_stays_low() {
        let s = score(ComplexityInputs {
            join_count: 0,
            node_count: 4,
            cte_depth: 0,
            subquery_depth: 0,
            column_count: 3,
        });
        assert!((1..=15).contains(&s), "score {s} out of expected band");
    }

    #[test]
    fn joins_dominate() {
        let without = score(ComplexityInputs {
            node_count: 6,
            ..Default::default()
        });
        let with = score(ComplexityInputs {
            join_count: 2,
            node_count: 6,
            ..Default::default()
        });
        assert!(with >= without + 19, "two joins should add ~20 points");
    }

    #[test]
    fn score_caps_at_100() {
        let s = score(ComplexityInputs {
            join_count: 50,
            node_count: 500,
            cte_depth: 10,
            subquery_depth: 10,
            column_count: 1000,
        });
        assert_eq!(s, 100);
    }

    #[test]
    fn custom_weights_change_the_score() {
        let inputs = ComplexityInputs {
            join_count: 3,
            node_count: 10,
            ..Default::default()
        };
        let default_score = score(inputs);
        let heavy = ComplexityWeights {
            joins: 30.0,
            ..ComplexityWeights::default()
        };
        assert!(calculate_complexity(inputs, &heavy) > default_score);
    }

    #[test]
    fn deterministic_for_equal_inputs() {
        let inputs = ComplexityInputs {
            join_count: 2,
            node_count: 17,
            cte_depth: 1,
            subquery_depth: 2,
            column_count: 23,
        };
        assert_eq!(score(inputs), score(inputs));
    }
}
