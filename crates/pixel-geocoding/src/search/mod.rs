//! Inverse lookup strategies: estimator-seeded window search and the
//! exhaustive quad-tree search it falls back to.

mod quad_tree;
mod window;

pub use quad_tree::{BestMatch, QuadTreeSearch, QUAD_TREE_EPS};
pub use window::{LocalWindowSearch, SearchState, MAX_SEARCH_CYCLES};
