/// Data model for the PackView reference tree.
///
/// Re-exports the arena-allocated tree structure and supporting types.
pub mod reference;
pub mod reference_tree;

pub use reference::{EnumerationState, NodeIndex, Reference, ReferenceKey, ReferenceKind};
pub use reference_tree::{Readiness, ReferenceTree};
