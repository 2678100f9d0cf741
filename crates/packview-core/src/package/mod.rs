/// Package groups and their listfiles.
///
/// A package group is one installation: a root location plus an ordered set
/// of packages (archives), each with the listfile of paths it contains. The
/// engine only ever reads an immutable [`PackageGroupSet`] snapshot; reload
/// builds a new snapshot and swaps it in whole.
pub mod listfile_dir;

pub use listfile_dir::ListfileDirectory;

use crate::error::PackageError;
use compact_str::CompactString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory separator used by every listfile path.
pub const SEPARATOR: char = '\\';

/// Identifier of a package group within one tree generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageGroupId(pub u32);

impl PackageGroupId {
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "PackageGroupId overflow");
        Self(index as u32)
    }

    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PackageGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The ordered, immutable list of paths contained in one package.
///
/// Cloning is a refcount bump, so enumeration tasks can hold a listfile
/// without borrowing the snapshot.
#[derive(Clone, Debug, Default)]
pub struct Listfile(Arc<[CompactString]>);

impl Listfile {
    /// Build a listfile from raw paths, normalising `/` to [`SEPARATOR`].
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths: Vec<CompactString> = paths
            .into_iter()
            .map(|p| CompactString::new(p.as_ref().replace('/', "\\")))
            .collect();
        Self(paths.into())
    }

    #[inline]
    pub fn paths(&self) -> &[CompactString] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One archive inside a package group.
#[derive(Clone, Debug)]
pub struct Package {
    pub name: CompactString,
    /// `None` when the listfile could not be extracted for this archive.
    pub listfile: Option<Listfile>,
}

/// A named collection of packages sharing one enumeration namespace.
///
/// Package order is precedence order: later packages override earlier ones
/// when the merged view is presented.
#[derive(Clone, Debug)]
pub struct PackageGroup {
    pub id: PackageGroupId,
    pub root: PathBuf,
    pub packages: Vec<Package>,
}

impl PackageGroup {
    pub fn new(id: PackageGroupId, root: PathBuf) -> Self {
        Self {
            id,
            root,
            packages: Vec::new(),
        }
    }

    /// Append a package (builder style, used by sources and tests).
    pub fn with_package(mut self, name: &str, listfile: Option<Listfile>) -> Self {
        self.packages.push(Package {
            name: CompactString::new(name),
            listfile,
        });
        self
    }

    /// Look up the listfile for `package` (exact name match).
    pub fn listfile(&self, package: &str) -> Option<&Listfile> {
        self.packages
            .iter()
            .find(|p| p.name == package)
            .and_then(|p| p.listfile.as_ref())
    }

    /// Display name of the group: the last component of its root.
    pub fn display_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.to_string_lossy().into_owned())
    }
}

/// Immutable snapshot of every package group for one tree generation.
#[derive(Clone, Debug, Default)]
pub struct PackageGroupSet {
    groups: Vec<PackageGroup>,
}

impl PackageGroupSet {
    pub fn new(groups: Vec<PackageGroup>) -> Self {
        debug_assert!(
            groups.iter().enumerate().all(|(i, g)| g.id.idx() == i),
            "package group ids must match their position"
        );
        Self { groups }
    }

    #[inline]
    pub fn group(&self, id: PackageGroupId) -> Option<&PackageGroup> {
        self.groups.get(id.idx())
    }

    pub fn groups(&self) -> &[PackageGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Builds a package group from a configured root directory.
///
/// Archive I/O and listfile extraction live behind this trait; the engine
/// only consumes the resulting name → listfile mapping.
pub trait PackageSource: Send + Sync {
    fn open_group(&self, id: PackageGroupId, root: &Path) -> Result<PackageGroup, PackageError>;
}
