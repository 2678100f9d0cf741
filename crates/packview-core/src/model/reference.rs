/// A single node in the arena-allocated reference tree.
///
/// References are stored in a flat `Vec<Reference>`. Parent links are plain
/// indices, so a child never keeps its ancestors alive and ownership of the
/// tree stays strictly top-down.
use crate::package::PackageGroupId;
use compact_str::CompactString;

/// Lightweight index into the arena `Vec<Reference>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Create a new `NodeIndex` from a `usize`, panicking in debug builds if it exceeds `u32::MAX`.
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// Return the index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Enumeration progress of a reference.
///
/// `NotEnumerated → Enumerating → Enumerated | Failed`. `Enumerated` is never
/// left short of a reload; `Failed` only via an explicit retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnumerationState {
    NotEnumerated,
    /// Accepted into the work queue, or claimed by reload.
    Enumerating,
    Enumerated,
    /// The listfile scan could not run (e.g. missing listfile).
    Failed,
}

impl EnumerationState {
    /// `true` for states no enumeration task will move out of.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Enumerated | Self::Failed)
    }
}

/// What a reference stands for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Bound to one concrete package.
    Hard,
    /// One logical path realised by several hard references.
    ///
    /// `hard[0]` is the primary reference; later entries override earlier
    /// ones for presentation.
    Virtual { hard: Vec<NodeIndex> },
    /// The implicit container holding a group's package references.
    Container,
}

/// Identity of a reference: owning group, package and case-folded path.
///
/// Two references with equal keys are the same node. Used to deduplicate
/// children and to match paths across packages.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReferenceKey {
    pub group: PackageGroupId,
    pub package: CompactString,
    pub path: CompactString,
}

/// A file, directory, package or group root in the tree.
#[derive(Clone, Debug)]
pub struct Reference {
    pub group: PackageGroupId,

    /// Package name. Empty for group roots, containers and virtual nodes.
    pub package: CompactString,

    /// Segment relative to the parent, e.g. `"FrameXML\"` or `"Bar.xml"`.
    /// Directory segments keep their trailing separator.
    pub name: CompactString,

    /// Full path within the package, original case preserved.
    /// Empty for package roots and group roots.
    pub path: CompactString,

    pub kind: ReferenceKind,

    pub is_dir: bool,

    pub state: EnumerationState,

    /// Non-owning parent link. `None` for group roots.
    pub parent: Option<NodeIndex>,

    /// Ordered, duplicate-free children, filled by the enumerator.
    pub children: Vec<NodeIndex>,

    /// Why the last enumeration failed, when `state == Failed`.
    pub failure: Option<String>,
}

impl Reference {
    #[allow(clippy::too_many_arguments)]
    fn base(
        group: PackageGroupId,
        package: CompactString,
        name: CompactString,
        path: CompactString,
        kind: ReferenceKind,
        is_dir: bool,
        state: EnumerationState,
        parent: Option<NodeIndex>,
    ) -> Self {
        Self {
            group,
            package,
            name,
            path,
            kind,
            is_dir,
            state,
            parent,
            children: Vec::new(),
            failure: None,
        }
    }

    /// Virtual root of a package group, claimed (`Enumerating`) from birth.
    pub fn new_group_root(group: PackageGroupId, name: &str) -> Self {
        Self::base(
            group,
            CompactString::default(),
            CompactString::new(name),
            CompactString::default(),
            ReferenceKind::Virtual { hard: Vec::new() },
            true,
            EnumerationState::Enumerating,
            None,
        )
    }

    /// The packages container under a group root. Its children are created
    /// up-front by reload, so it is born `Enumerated`.
    pub fn new_container(group: PackageGroupId, name: &str, parent: NodeIndex) -> Self {
        Self::base(
            group,
            CompactString::default(),
            CompactString::new(name),
            CompactString::default(),
            ReferenceKind::Container,
            true,
            EnumerationState::Enumerated,
            Some(parent),
        )
    }

    /// Hard reference to the root of one package.
    pub fn new_package(group: PackageGroupId, package: &str, parent: NodeIndex) -> Self {
        Self::base(
            group,
            CompactString::new(package),
            CompactString::new(package),
            CompactString::default(),
            ReferenceKind::Hard,
            true,
            EnumerationState::NotEnumerated,
            Some(parent),
        )
    }

    /// Hard directory discovered inside a package.
    pub fn new_dir(
        group: PackageGroupId,
        package: CompactString,
        name: CompactString,
        path: CompactString,
        parent: NodeIndex,
    ) -> Self {
        Self::base(
            group,
            package,
            name,
            path,
            ReferenceKind::Hard,
            true,
            EnumerationState::NotEnumerated,
            Some(parent),
        )
    }

    /// Hard file discovered inside a package. Files have no children, so
    /// they are `Enumerated` on creation.
    pub fn new_file(
        group: PackageGroupId,
        package: CompactString,
        name: CompactString,
        path: CompactString,
        parent: NodeIndex,
    ) -> Self {
        Self::base(
            group,
            package,
            name,
            path,
            ReferenceKind::Hard,
            false,
            EnumerationState::Enumerated,
            Some(parent),
        )
    }

    /// Virtual counterpart of the hard reference `primary`.
    pub fn new_virtual(primary: &Reference, primary_idx: NodeIndex, parent: NodeIndex) -> Self {
        let state = if primary.is_dir {
            EnumerationState::NotEnumerated
        } else {
            EnumerationState::Enumerated
        };
        Self::base(
            primary.group,
            CompactString::default(),
            primary.name.clone(),
            primary.path.clone(),
            ReferenceKind::Virtual {
                hard: vec![primary_idx],
            },
            primary.is_dir,
            state,
            Some(parent),
        )
    }

    /// The equality key of this reference.
    pub fn key(&self) -> ReferenceKey {
        ReferenceKey {
            group: self.group,
            package: self.package.clone(),
            path: fold_case(&self.path),
        }
    }

    /// The key a virtual counterpart of this reference would have.
    pub fn virtual_key(&self) -> ReferenceKey {
        ReferenceKey {
            group: self.group,
            package: CompactString::default(),
            path: fold_case(&self.path),
        }
    }

    #[inline]
    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, ReferenceKind::Virtual { .. })
    }

    /// Hard references behind a virtual node; empty for other kinds.
    pub fn hard_references(&self) -> &[NodeIndex] {
        match &self.kind {
            ReferenceKind::Virtual { hard } => hard,
            _ => &[],
        }
    }
}

/// ASCII case fold used for listfile path matching.
pub fn fold_case(path: &str) -> CompactString {
    CompactString::new(path.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(package: &str, path: &str) -> Reference {
        Reference::new_dir(
            PackageGroupId(0),
            CompactString::new(package),
            CompactString::new(path),
            CompactString::new(path),
            NodeIndex(0),
        )
    }

    #[test]
    fn identity_ignores_path_case() {
        let a = dir("base.mpq", "Interface\\");
        let b = dir("base.mpq", "INTERFACE\\");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn identity_includes_package() {
        let a = dir("base.mpq", "Interface\\");
        let b = dir("patch.mpq", "Interface\\");
        assert_ne!(a.key(), b.key());
        assert_eq!(a.virtual_key(), b.virtual_key());
    }

    #[test]
    fn files_are_born_enumerated() {
        let file = Reference::new_file(
            PackageGroupId(0),
            CompactString::new("base.mpq"),
            CompactString::new("Readme.txt"),
            CompactString::new("Readme.txt"),
            NodeIndex(0),
        );
        assert_eq!(file.state, EnumerationState::Enumerated);
        assert!(!file.is_dir);
    }

    #[test]
    fn virtual_counterpart_copies_state_by_kind() {
        let d = dir("base.mpq", "World\\");
        let v = Reference::new_virtual(&d, NodeIndex(7), NodeIndex(1));
        assert_eq!(v.state, EnumerationState::NotEnumerated);
        assert_eq!(v.hard_references(), &[NodeIndex(7)]);
        assert!(v.package.is_empty());
    }
}
