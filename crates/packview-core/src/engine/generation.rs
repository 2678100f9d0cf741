/// One reload generation: a reference tree plus the package-group snapshot
/// it was built from.
///
/// Reload never mutates a live generation. It builds a new one and swaps the
/// engine's `Arc<Generation>` pointer, so an enumeration task keeps reading
/// the snapshot it was dispatched with until it finishes.
use crate::model::{NodeIndex, ReferenceTree};
use crate::package::PackageGroupSet;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::ReferenceHandle;

/// Cooperative cancellation flag shared with every task of a generation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct Generation {
    pub id: u64,
    pub tree: RwLock<ReferenceTree>,
    pub groups: Arc<PackageGroupSet>,
    pub cancel: CancelToken,
}

impl Generation {
    pub fn new(id: u64, tree: ReferenceTree, groups: PackageGroupSet) -> Self {
        Self {
            id,
            tree: RwLock::new(tree),
            groups: Arc::new(groups),
            cancel: CancelToken::default(),
        }
    }

    /// The generation an engine holds before its first reload.
    pub fn empty() -> Self {
        Self::new(0, ReferenceTree::default(), PackageGroupSet::default())
    }

    #[inline]
    pub fn handle(&self, index: NodeIndex) -> ReferenceHandle {
        ReferenceHandle {
            generation: self.id,
            index,
        }
    }

    /// Index of `handle` in this generation's tree, or `None` if it belongs
    /// to another generation or is out of range.
    pub fn resolve(&self, handle: ReferenceHandle) -> Option<NodeIndex> {
        (handle.generation == self.id && handle.index.idx() < self.tree.read().len())
            .then_some(handle.index)
    }
}
