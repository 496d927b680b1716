//! Decision tree structures for GBDT inference
//!
//! Nodes live in a flat vector; node 0 is the root and children are
//! addressed by index.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into feature vector
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1` indicates this is a leaf
/// - `leaf` contains the prediction value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Split threshold; samples with `value <= threshold` go left
    pub threshold: f64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
        }
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    /// Get the leaf value if this is a leaf node
    pub fn leaf_value(&self) -> Option<f64> {
        self.leaf
    }
}

/// A single regression tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Shrinkage applied to this tree's leaf values
    pub weight: f64,
}

impl Tree {
    /// Create a new tree with the given nodes and weight
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Evaluate this tree on a feature vector and return the raw leaf value
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }

        let mut idx = 0usize;

        loop {
            if idx >= self.nodes.len() {
                return 0.0; // Invalid tree structure
            }

            let node = &self.nodes[idx];

            if node.is_leaf() {
                return node.leaf_value().unwrap_or(0.0);
            }

            let feature_idx = node.feature_idx as usize;
            if feature_idx >= features.len() {
                return 0.0; // Invalid feature index
            }

            let feature_value = features[feature_idx];

            idx = if feature_value <= node.threshold {
                if node.left < 0 || node.left as usize >= self.nodes.len() {
                    return 0.0;
                }
                node.left as usize
            } else {
                if node.right < 0 || node.right as usize >= self.nodes.len() {
                    return 0.0;
                }
                node.right as usize
            };
        }
    }

    /// Get the root node
    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Number of leaves in the tree
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Validate tree structure
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        if !self.weight.is_finite() {
            return Err(format!("Tree weight is not finite: {}", self.weight));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_leaf() {
                if node.left < 0 || node.left as usize >= self.nodes.len() {
                    return Err(format!("Node {} has invalid left child: {}", i, node.left));
                }

                if node.right < 0 || node.right as usize >= self.nodes.len() {
                    return Err(format!(
                        "Node {} has invalid right child: {}",
                        i, node.right
                    ));
                }

                // Children are always emitted after their parent
                if node.left as usize <= i || node.right as usize <= i {
                    return Err(format!("Node {i} points backwards in the node list"));
                }

                if node.feature_idx < 0 {
                    return Err(format!(
                        "Internal node {} has invalid feature index: {}",
                        i, node.feature_idx
                    ));
                }

                if !node.threshold.is_finite() {
                    return Err(format!("Internal node {i} has a non-finite threshold"));
                }
            } else {
                match node.leaf {
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                    Some(v) if !v.is_finite() => {
                        return Err(format!("Leaf node {i} has a non-finite value"))
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(())
    }

    /// Highest feature index referenced by a split, if any
    pub fn max_feature_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|n| !n.is_leaf())
            .map(|n| n.feature_idx as usize)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 1, 2),
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            1.0,
        )
    }

    #[test]
    fn test_node_creation() {
        let internal = Node::internal(0, 3, 12.5, 1, 2);
        assert_eq!(internal.id, 0);
        assert_eq!(internal.feature_idx, 3);
        assert_eq!(internal.threshold, 12.5);
        assert!(!internal.is_leaf());

        let leaf = Node::leaf(1, -2.34);
        assert_eq!(leaf.feature_idx, -1);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.leaf_value(), Some(-2.34));
    }

    #[test]
    fn test_tree_evaluation() {
        let tree = stump();

        assert_eq!(tree.evaluate(&[30.0]), 100.0);
        assert_eq!(tree.evaluate(&[50.0]), 100.0); // Equal goes left
        assert_eq!(tree.evaluate(&[60.0]), 200.0);
    }

    #[test]
    fn test_missing_feature_evaluates_to_zero() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[]), 0.0);
    }

    #[test]
    fn test_tree_validation() {
        assert!(stump().validate().is_ok());

        let invalid_tree = Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 5, 2), // left=5 is out of bounds
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            1.0,
        );
        assert!(invalid_tree.validate().is_err());

        let nan_leaf = Tree::new(vec![Node::leaf(0, f64::NAN)], 1.0);
        assert!(nan_leaf.validate().is_err());
    }

    #[test]
    fn test_leaf_count_and_max_feature() {
        let tree = stump();
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.max_feature_index(), Some(0));

        let single = Tree::new(vec![Node::leaf(0, 1.0)], 1.0);
        assert_eq!(single.max_feature_index(), None);
    }
}
