//! L1 — the tree-based genetic-programming expression evaluator (spec
//! §2 L1, §4.3).

mod tree;

pub use tree::{traverse, GpTree, FN_ADD, FN_DIV, FN_MUL, FN_SUB};
