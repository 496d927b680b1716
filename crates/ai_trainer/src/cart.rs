//! CART (Classification and Regression Tree) builder
//!
//! Implements deterministic exact-greedy regression tree construction
//! on second-order gradient statistics.

use carbon_ai_core::gbdt::{Node, Tree};
use std::cmp::Ordering;

use crate::deterministic::SplitTieBreaker;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Minimum hessian sum required in each child
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    /// Minimum gain required to keep a split
    pub gamma: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 1,
            min_child_weight: 1.0,
            lambda: 1.0,
            gamma: 0.0,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: f64, gain: f64, position: usize, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, position, node_id),
        }
    }

    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain
            || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// A built tree plus the total split gain credited to each feature
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub tree: Tree,
    pub feature_gain: Vec<f64>,
}

/// Build a regression tree using exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<f64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(features.len(), gradients.len());
        debug_assert_eq!(features.len(), hessians.len());

        let feature_count = features.first().map(|f| f.len()).unwrap_or(0);

        Self {
            config,
            features,
            gradients,
            hessians,
            feature_count,
        }
    }

    /// Build a tree over the given rows, splitting only on `columns`.
    /// `weight` is the shrinkage stored on the tree.
    pub fn build(&self, rows: &[usize], columns: &[usize], weight: f64) -> BuiltTree {
        let mut nodes = Vec::new();
        let mut feature_gain = vec![0.0; self.feature_count];

        self.build_node(rows, columns, 0, &mut nodes, &mut feature_gain);

        BuiltTree {
            tree: Tree::new(nodes, weight),
            feature_gain,
        }
    }

    /// Recursively build tree nodes in pre-order; returns this node's index
    fn build_node(
        &self,
        rows: &[usize],
        columns: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        feature_gain: &mut [f64],
    ) -> i32 {
        let node_id = nodes.len();
        let current_idx = node_id as i32;

        // Check stopping conditions
        if depth >= self.config.max_depth || rows.len() < 2 * self.config.min_samples_leaf.max(1) {
            nodes.push(Node::leaf(current_idx, self.calculate_leaf_value(rows)));
            return current_idx;
        }

        let split = match self.find_best_split(rows, columns, node_id) {
            Some(s) => s,
            None => {
                nodes.push(Node::leaf(current_idx, self.calculate_leaf_value(rows)));
                return current_idx;
            }
        };

        let (left_rows, right_rows) = self.split_samples(rows, split.feature_idx, split.threshold);

        // Reserve space for current node
        nodes.push(Node::internal(
            current_idx,
            split.feature_idx as i32,
            split.threshold,
            -1,
            -1,
        ));
        feature_gain[split.feature_idx] += split.gain;

        let left_idx = self.build_node(&left_rows, columns, depth + 1, nodes, feature_gain);
        let right_idx = self.build_node(&right_rows, columns, depth + 1, nodes, feature_gain);

        let node = &mut nodes[current_idx as usize];
        node.left = left_idx;
        node.right = right_idx;

        current_idx
    }

    /// Find best split by scanning each feature in sorted order
    fn find_best_split(
        &self,
        rows: &[usize],
        columns: &[usize],
        node_id: usize,
    ) -> Option<SplitCandidate> {
        let (g_total, h_total) = self.sum_gradients_hessians(rows);
        let parent_score = self.score(g_total, h_total);
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut best_split: Option<SplitCandidate> = None;
        let mut sorted: Vec<usize> = rows.to_vec();

        for &feature_idx in columns {
            sorted.sort_by(|&a, &b| {
                self.features[a][feature_idx]
                    .partial_cmp(&self.features[b][feature_idx])
                    .unwrap_or(Ordering::Equal)
                    .then(a.cmp(&b))
            });

            let mut g_left = 0.0;
            let mut h_left = 0.0;

            for position in 0..sorted.len() - 1 {
                let row = sorted[position];
                g_left += self.gradients[row];
                h_left += self.hessians[row];

                let value = self.features[row][feature_idx];
                let next_value = self.features[sorted[position + 1]][feature_idx];
                if value >= next_value {
                    continue;
                }

                let n_left = position + 1;
                let n_right = sorted.len() - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let g_right = g_total - g_left;
                let h_right = h_total - h_left;
                if h_left < self.config.min_child_weight || h_right < self.config.min_child_weight {
                    continue;
                }

                let gain = 0.5
                    * (self.score(g_left, h_left) + self.score(g_right, h_right) - parent_score)
                    - self.config.gamma;
                if gain <= 0.0 || gain.is_nan() {
                    continue;
                }

                let mut threshold = value + (next_value - value) / 2.0;
                if threshold >= next_value {
                    threshold = value;
                }

                let candidate = SplitCandidate::new(feature_idx, threshold, gain, position, node_id);
                best_split = match best_split {
                    Some(current) if !candidate.beats(&current) => Some(current),
                    _ => Some(candidate),
                };
            }
        }

        best_split
    }

    /// Structure score G²/(H+λ)
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.lambda)
    }

    /// Split samples based on threshold
    fn split_samples(
        &self,
        rows: &[usize],
        feature_idx: usize,
        threshold: f64,
    ) -> (Vec<usize>, Vec<usize>) {
        rows.iter()
            .partition(|&&row| self.features[row][feature_idx] <= threshold)
    }

    /// Sum gradients and hessians for a set of samples
    fn sum_gradients_hessians(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &row| {
            (g + self.gradients[row], h + self.hessians[row])
        })
    }

    /// Optimal leaf value: -G/(H+λ)
    fn calculate_leaf_value(&self, rows: &[usize]) -> f64 {
        let (sum_g, sum_h) = self.sum_gradients_hessians(rows);
        let denom = sum_h + self.config.lambda;

        if denom <= 0.0 {
            return 0.0;
        }

        -sum_g / denom
    }
}
