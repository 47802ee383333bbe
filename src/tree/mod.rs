//! Workspace tree: path operations, nodes, and the immutable tree model.

pub mod model;
pub mod node;
pub mod path;

pub use model::Tree;
pub use node::Node;
