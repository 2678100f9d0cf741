/// Arena-backed reference tree.
///
/// All references live in a single `Vec<Reference>`. Relationships use
/// `NodeIndex` (a thin `u32` wrapper) rather than heap pointers; a parent
/// owns its children through the arena, children only hold the index of
/// their parent.
use super::reference::{EnumerationState, NodeIndex, Reference, ReferenceKey};
use std::collections::HashMap;

/// Whether a reference may be dispatched for enumeration right now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Waiting on the parent or on hard references. `prerequisites` lists
    /// the hard references that nobody has submitted yet.
    Blocked { prerequisites: Vec<NodeIndex> },
}

/// The complete reference tree for one reload generation.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTree {
    nodes: Vec<Reference>,
    roots: Vec<NodeIndex>,
}

impl ReferenceTree {
    pub fn with_capacity(estimated_nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(estimated_nodes),
            roots: Vec::new(),
        }
    }

    /// Allocate a new node in the arena and return its index.
    pub fn add_node(&mut self, node: Reference) -> NodeIndex {
        let idx = NodeIndex::new(self.nodes.len());
        self.nodes.push(node);
        idx
    }

    /// Add a group root to the tree.
    pub fn add_root(&mut self, node: Reference) -> NodeIndex {
        debug_assert!(node.parent.is_none(), "roots have no parent");
        let idx = self.add_node(node);
        self.roots.push(idx);
        idx
    }

    /// Append `child` to the ordered children of `parent`.
    pub fn add_child(&mut self, parent: NodeIndex, child: NodeIndex) {
        self.nodes[child.idx()].parent = Some(parent);
        self.nodes[parent.idx()].children.push(child);
    }

    /// Map from equality key to index for the current children of `parent`.
    pub fn child_keys(&self, parent: NodeIndex) -> HashMap<ReferenceKey, NodeIndex> {
        self.nodes[parent.idx()]
            .children
            .iter()
            .map(|&c| (self.nodes[c.idx()].key(), c))
            .collect()
    }

    /// Decide whether `index` can be enumerated now.
    ///
    /// A reference is ready once its parent is `Enumerated` (roots have no
    /// parent). A virtual reference additionally needs every hard reference
    /// behind it to be terminal, since its children are merged from theirs.
    pub fn readiness(&self, index: NodeIndex) -> Readiness {
        let node = &self.nodes[index.idx()];
        let parent_ready = node
            .parent
            .map_or(true, |p| self.nodes[p.idx()].state == EnumerationState::Enumerated);

        let mut hard_ready = true;
        let mut prerequisites = Vec::new();
        for &hard in node.hard_references() {
            let state = self.nodes[hard.idx()].state;
            if state.is_terminal() {
                continue;
            }
            hard_ready = false;
            if state == EnumerationState::NotEnumerated {
                prerequisites.push(hard);
            }
        }

        if parent_ready && hard_ready {
            Readiness::Ready
        } else {
            Readiness::Blocked { prerequisites }
        }
    }

    /// The hard reference presented for a virtual node: the last override.
    /// Non-virtual nodes present themselves.
    pub fn effective_hard(&self, index: NodeIndex) -> NodeIndex {
        self.nodes[index.idx()]
            .hard_references()
            .last()
            .copied()
            .unwrap_or(index)
    }

    #[inline]
    pub fn node(&self, index: NodeIndex) -> &Reference {
        &self.nodes[index.idx()]
    }

    #[inline]
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Reference {
        &mut self.nodes[index.idx()]
    }

    #[inline]
    pub fn get(&self, index: NodeIndex) -> Option<&Reference> {
        self.nodes.get(index.idx())
    }

    #[inline]
    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.nodes[index.idx()].children
    }

    #[inline]
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    /// Total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReferenceKind;
    use crate::package::PackageGroupId;
    use compact_str::CompactString;

    const GROUP: PackageGroupId = PackageGroupId(0);

    /// root (virtual) -> container -> [base.mpq, patch.mpq]
    fn group_tree() -> (ReferenceTree, NodeIndex, NodeIndex, NodeIndex) {
        let mut tree = ReferenceTree::with_capacity(8);
        let root = tree.add_root(Reference::new_group_root(GROUP, "Classic"));
        let container = tree.add_node(Reference::new_container(GROUP, "Packages", root));
        tree.add_child(root, container);
        let base = tree.add_node(Reference::new_package(GROUP, "base.mpq", container));
        tree.add_child(container, base);
        let patch = tree.add_node(Reference::new_package(GROUP, "patch.mpq", container));
        tree.add_child(container, patch);
        tree.node_mut(root).kind = ReferenceKind::Virtual {
            hard: vec![base, patch],
        };
        (tree, root, base, patch)
    }

    #[test]
    fn children_keep_insertion_order() {
        let (tree, root, base, patch) = group_tree();
        let container = tree.children(root)[0];
        assert_eq!(tree.children(container), &[base, patch]);
        assert_eq!(tree.node(base).parent, Some(container));
        assert_eq!(tree.roots(), &[root]);
    }

    #[test]
    fn package_under_enumerated_container_is_ready() {
        let (tree, _, base, _) = group_tree();
        assert_eq!(tree.readiness(base), Readiness::Ready);
    }

    #[test]
    fn virtual_waits_for_hard_references() {
        let (mut tree, root, base, patch) = group_tree();
        assert_eq!(
            tree.readiness(root),
            Readiness::Blocked {
                prerequisites: vec![base, patch]
            }
        );

        tree.node_mut(base).state = EnumerationState::Enumerated;
        tree.node_mut(patch).state = EnumerationState::Enumerating;
        assert_eq!(
            tree.readiness(root),
            Readiness::Blocked {
                prerequisites: vec![]
            }
        );

        tree.node_mut(patch).state = EnumerationState::Failed;
        assert_eq!(tree.readiness(root), Readiness::Ready);
    }

    #[test]
    fn child_of_unenumerated_parent_is_blocked() {
        let (mut tree, _, base, _) = group_tree();
        let dir = tree.add_node(Reference::new_dir(
            GROUP,
            CompactString::new("base.mpq"),
            CompactString::new("Interface\\"),
            CompactString::new("Interface\\"),
            base,
        ));
        tree.add_child(base, dir);
        assert!(matches!(tree.readiness(dir), Readiness::Blocked { .. }));

        tree.node_mut(base).state = EnumerationState::Enumerated;
        assert_eq!(tree.readiness(dir), Readiness::Ready);
    }

    #[test]
    fn effective_hard_is_last_override() {
        let (tree, root, _, patch) = group_tree();
        assert_eq!(tree.effective_hard(root), patch);
        assert_eq!(tree.effective_hard(patch), patch);
    }
}
