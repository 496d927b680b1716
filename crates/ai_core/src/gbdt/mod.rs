//! Gradient Boosted Decision Tree (GBDT) inference engine
//!
//! An ensemble is a base score plus a list of regression trees, each
//! scaled by its shrinkage weight:
//!
//! ```json
//! {
//!   "base_score": 42.5,
//!   "feature_count": 2,
//!   "trees": [
//!     {
//!       "nodes": [
//!         {"id":0,"left":1,"right":2,"feature_idx":1,"threshold":0.25,"leaf":null},
//!         {"id":1,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":-3.5},
//!         {"id":2,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":4.0}
//!       ],
//!       "weight": 0.1
//!     }
//!   ],
//!   "version": 1
//! }
//! ```
//!
//! # Usage
//!
//! ```rust
//! use carbon_ai_core::gbdt::{Model, Node, Tree};
//!
//! let tree = Tree::new(
//!     vec![
//!         Node::internal(0, 0, 50.0, 1, 2),
//!         Node::leaf(1, 100.0),
//!         Node::leaf(2, 200.0),
//!     ],
//!     1.0,
//! );
//!
//! let model = Model::new(vec![tree], 0.0, 1);
//! assert_eq!(model.score(&[30.0]), 100.0);
//! ```
//!
//! Traversal sends a sample left when `value <= threshold`. Serialization
//! goes through canonical JSON so that identical ensembles hash identically.

pub mod model;
pub mod tree;

pub use model::{model_hash_hex, Model, ModelError, MODEL_FORMAT_VERSION};
pub use tree::{Node, Tree};
