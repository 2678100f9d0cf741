/// Enumerator: turns one reference's slice of a listfile into its
/// immediate children.
///
/// Discovery is one level deep: a directory child is created
/// `NotEnumerated` and is only expanded when someone submits it.
///
/// The listfile scan runs without any tree lock. Children are committed
/// under a single write lock per enumeration, and the node becomes
/// `Enumerated` only after the full scan has been committed.
use super::generation::{CancelToken, Generation};
use crate::error::EnumerationError;
use crate::model::reference::fold_case;
use crate::model::{EnumerationState, NodeIndex, Reference, ReferenceKind};
use crate::package::{Listfile, SEPARATOR};
use compact_str::CompactString;
use std::collections::HashSet;
use tracing::{debug, warn};

/// How often the scan loop checks the cancel token.
const CANCEL_CHECK_INTERVAL: usize = 1_000;

/// One immediate child found by [`list_children`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    /// Segment relative to the scanned path; directories keep the trailing separator.
    pub name: CompactString,
    pub is_dir: bool,
}

/// Scan `listfile` for the immediate children of `prefix`.
///
/// Paths are matched case-insensitively against `prefix`; the remainder after
/// the prefix decides the child:
/// - `"Sub\rest"` yields directory `"Sub\"`
/// - `"File.ext"` yields file `"File.ext"`
/// - an empty remainder, or one starting with the separator, is skipped
///
/// Children are deduplicated case-insensitively, keeping the first-seen
/// spelling, and returned in listfile order.
pub fn list_children(
    listfile: &Listfile,
    prefix: &str,
    cancel: &CancelToken,
) -> Result<Vec<ListingEntry>, EnumerationError> {
    let mut seen: HashSet<CompactString> = HashSet::new();
    let mut entries = Vec::new();

    for (i, path) in listfile.paths().iter().enumerate() {
        if i % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(EnumerationError::Cancelled);
        }

        // ASCII case folding keeps byte lengths, so the prefix length is
        // also the split point in `path`. `get` rejects non-char boundaries.
        let matches = path
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if !matches {
            continue;
        }
        let remainder = &path[prefix.len()..];

        let entry = match remainder.find(SEPARATOR) {
            Some(0) => continue,
            Some(pos) => ListingEntry {
                name: CompactString::new(&remainder[..=pos]),
                is_dir: true,
            },
            None if remainder.is_empty() => continue,
            None => ListingEntry {
                name: CompactString::new(remainder),
                is_dir: false,
            },
        };

        if seen.insert(fold_case(&entry.name)) {
            entries.push(entry);
        }
    }

    Ok(entries)
}

pub struct Enumerator<'a> {
    generation: &'a Generation,
}

impl<'a> Enumerator<'a> {
    pub fn new(generation: &'a Generation) -> Self {
        Self { generation }
    }

    /// Expand `index` and return the children it created, in order.
    ///
    /// Enumerating an `Enumerated` node is a no-op returning no children.
    /// A missing listfile or unknown group marks the node `Failed`.
    /// Cancellation leaves the node as it was.
    pub fn enumerate(&self, index: NodeIndex) -> Result<Vec<NodeIndex>, EnumerationError> {
        let (kind, state) = {
            let tree = self.generation.tree.read();
            let node = tree.get(index).ok_or(EnumerationError::Stale)?;
            (node.kind.clone(), node.state)
        };

        if state == EnumerationState::Enumerated {
            debug!("Reference {index:?} already enumerated, skipping");
            return Ok(Vec::new());
        }
        if self.generation.cancel.is_cancelled() {
            return Err(EnumerationError::Cancelled);
        }

        match kind {
            ReferenceKind::Hard => self.enumerate_hard(index),
            ReferenceKind::Virtual { hard } => Ok(self.merge_virtual(index, &hard)),
            ReferenceKind::Container => {
                self.generation.tree.write().node_mut(index).state = EnumerationState::Enumerated;
                Ok(Vec::new())
            }
        }
    }

    fn enumerate_hard(&self, index: NodeIndex) -> Result<Vec<NodeIndex>, EnumerationError> {
        let (group, package, prefix) = {
            let tree = self.generation.tree.read();
            let node = tree.node(index);
            (node.group, node.package.clone(), node.path.clone())
        };

        let listfile = self
            .generation
            .groups
            .group(group)
            .ok_or(EnumerationError::UnknownGroup(group))
            .and_then(|g| {
                g.listfile(&package)
                    .cloned()
                    .ok_or_else(|| EnumerationError::MissingListfile {
                        group,
                        package: package.clone(),
                    })
            });
        let listfile = match listfile {
            Ok(l) => l,
            Err(err) => {
                self.fail(index, &err);
                return Err(err);
            }
        };

        let listing = list_children(&listfile, &prefix, &self.generation.cancel)?;

        let mut tree = self.generation.tree.write();
        if self.generation.cancel.is_cancelled() {
            return Err(EnumerationError::Cancelled);
        }
        if tree.node(index).state == EnumerationState::Enumerated {
            return Ok(Vec::new());
        }

        let mut existing = tree.child_keys(index);
        let mut discovered = Vec::with_capacity(listing.len());
        for entry in listing {
            let mut path = prefix.clone();
            path.push_str(&entry.name);
            let child = if entry.is_dir {
                Reference::new_dir(group, package.clone(), entry.name, path, index)
            } else {
                Reference::new_file(group, package.clone(), entry.name, path, index)
            };

            let key = child.key();
            if existing.contains_key(&key) {
                continue;
            }
            let child_idx = tree.add_node(child);
            tree.add_child(index, child_idx);
            existing.insert(key, child_idx);
            discovered.push(child_idx);
        }

        let node = tree.node_mut(index);
        node.state = EnumerationState::Enumerated;
        node.failure = None;
        debug!(
            "Enumerated {package}:{prefix:?} -> {} new children",
            discovered.len()
        );
        Ok(discovered)
    }

    /// Merge the children of every hard reference behind a virtual node.
    ///
    /// Hard references are visited primary first, then overrides in
    /// precedence order. The first hard child with a given path creates the
    /// virtual child; later ones are appended to its override list.
    fn merge_virtual(&self, index: NodeIndex, hard: &[NodeIndex]) -> Vec<NodeIndex> {
        let mut tree = self.generation.tree.write();
        if tree.node(index).state == EnumerationState::Enumerated {
            return Vec::new();
        }

        let mut existing = tree.child_keys(index);
        let mut discovered = Vec::new();
        for &hard_idx in hard {
            match tree.node(hard_idx).state {
                EnumerationState::Enumerated => {}
                EnumerationState::Failed => {
                    debug!("Skipping failed hard reference {hard_idx:?} while merging {index:?}");
                    continue;
                }
                state => {
                    warn!("Merging {index:?} while hard reference {hard_idx:?} is {state:?}");
                    continue;
                }
            }

            let hard_children = tree.children(hard_idx).to_vec();
            for child in hard_children {
                let key = tree.node(child).virtual_key();
                match existing.get(&key) {
                    Some(&virtual_idx) => {
                        if let ReferenceKind::Virtual { hard } = &mut tree.node_mut(virtual_idx).kind {
                            if !hard.contains(&child) {
                                hard.push(child);
                            }
                        }
                    }
                    None => {
                        let virtual_child = Reference::new_virtual(tree.node(child), child, index);
                        let virtual_idx = tree.add_node(virtual_child);
                        tree.add_child(index, virtual_idx);
                        existing.insert(key, virtual_idx);
                        discovered.push(virtual_idx);
                    }
                }
            }
        }

        tree.node_mut(index).state = EnumerationState::Enumerated;
        discovered
    }

    fn fail(&self, index: NodeIndex, err: &EnumerationError) {
        let mut tree = self.generation.tree.write();
        let node = tree.node_mut(index);
        node.state = EnumerationState::Failed;
        node.failure = Some(err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReferenceTree;
    use crate::package::{PackageGroup, PackageGroupId, PackageGroupSet};
    use std::path::PathBuf;

    const GROUP: PackageGroupId = PackageGroupId(0);

    fn listing(paths: &[&str], prefix: &str) -> Vec<ListingEntry> {
        list_children(&Listfile::new(paths), prefix, &CancelToken::default()).unwrap()
    }

    fn dir(name: &str) -> ListingEntry {
        ListingEntry {
            name: CompactString::new(name),
            is_dir: true,
        }
    }

    fn file(name: &str) -> ListingEntry {
        ListingEntry {
            name: CompactString::new(name),
            is_dir: false,
        }
    }

    /// Group root -> container -> one package per `(name, listfile)`, with
    /// every package already `Enumerating` as the scheduler would leave it.
    fn generation(packages: &[(&str, Option<&[&str]>)]) -> (Generation, NodeIndex, Vec<NodeIndex>) {
        let mut group = PackageGroup::new(GROUP, PathBuf::from("Classic"));
        let mut tree = ReferenceTree::with_capacity(16);
        let root = tree.add_root(Reference::new_group_root(GROUP, "Classic"));
        let container = tree.add_node(Reference::new_container(GROUP, "Packages", root));
        tree.add_child(root, container);

        let mut hard = Vec::new();
        for (name, paths) in packages {
            group = group.with_package(name, paths.map(Listfile::new));
            let idx = tree.add_node(Reference::new_package(GROUP, name, container));
            tree.add_child(container, idx);
            tree.node_mut(idx).state = EnumerationState::Enumerating;
            hard.push(idx);
        }
        tree.node_mut(root).kind = ReferenceKind::Virtual { hard: hard.clone() };

        (
            Generation::new(1, tree, PackageGroupSet::new(vec![group])),
            root,
            hard,
        )
    }

    #[test]
    fn nested_paths_yield_one_directory() {
        let entries = listing(&["Interface\\Glue.blp", "Interface\\FrameXML\\Bar.xml"], "");
        assert_eq!(entries, vec![dir("Interface\\")]);
    }

    #[test]
    fn plain_path_yields_file() {
        assert_eq!(listing(&["Readme.txt"], ""), vec![file("Readme.txt")]);
    }

    #[test]
    fn prefix_matches_case_insensitively_and_keeps_case() {
        let entries = listing(
            &["INTERFACE\\Glue.blp", "interface\\FrameXML\\Bar.xml", "World\\a.adt"],
            "Interface\\",
        );
        assert_eq!(entries, vec![file("Glue.blp"), dir("FrameXML\\")]);
    }

    #[test]
    fn empty_remainder_and_empty_segment_are_skipped() {
        let entries = listing(
            &["Interface\\", "Interface\\\\Odd.txt", "Interface\\Glue.blp"],
            "Interface\\",
        );
        assert_eq!(entries, vec![file("Glue.blp")]);
    }

    #[test]
    fn children_dedupe_ignoring_case() {
        let entries = listing(&["Sound\\a.wav", "SOUND\\b.wav", "x.txt", "X.TXT"], "");
        assert_eq!(entries, vec![dir("Sound\\"), file("x.txt")]);
    }

    #[test]
    fn cancelled_scan_returns_cancelled() {
        let cancel = CancelToken::default();
        cancel.cancel();
        let result = list_children(&Listfile::new(["a.txt"]), "", &cancel);
        assert_eq!(result, Err(EnumerationError::Cancelled));
    }

    #[test]
    fn hard_enumeration_creates_children_with_states() {
        let paths: &[&str] = &["Interface\\Glue.blp", "Readme.txt"];
        let (generation, _, hard) = generation(&[("base.mpq", Some(paths))]);
        let discovered = Enumerator::new(&generation).enumerate(hard[0]).unwrap();

        let tree = generation.tree.read();
        assert_eq!(tree.node(hard[0]).state, EnumerationState::Enumerated);
        assert_eq!(tree.children(hard[0]), discovered.as_slice());

        let interface = tree.node(discovered[0]);
        assert_eq!(interface.path, "Interface\\");
        assert_eq!(interface.state, EnumerationState::NotEnumerated);
        assert_eq!(interface.parent, Some(hard[0]));

        let readme = tree.node(discovered[1]);
        assert_eq!(readme.path, "Readme.txt");
        assert_eq!(readme.state, EnumerationState::Enumerated);
    }

    #[test]
    fn nested_directory_paths_accumulate() {
        let paths: &[&str] = &["Interface\\FrameXML\\Bar.xml"];
        let (generation, _, hard) = generation(&[("base.mpq", Some(paths))]);
        let enumerator = Enumerator::new(&generation);
        let interface = enumerator.enumerate(hard[0]).unwrap()[0];
        generation.tree.write().node_mut(interface).state = EnumerationState::Enumerating;

        let framexml = enumerator.enumerate(interface).unwrap()[0];
        assert_eq!(generation.tree.read().node(framexml).path, "Interface\\FrameXML\\");
        assert_eq!(generation.tree.read().node(framexml).name, "FrameXML\\");
    }

    #[test]
    fn enumerated_node_is_not_mutated_again() {
        let paths: &[&str] = &["a.txt", "b.txt"];
        let (generation, _, hard) = generation(&[("base.mpq", Some(paths))]);
        let enumerator = Enumerator::new(&generation);
        enumerator.enumerate(hard[0]).unwrap();
        let before = generation.tree.read().children(hard[0]).to_vec();

        assert!(enumerator.enumerate(hard[0]).unwrap().is_empty());
        assert_eq!(generation.tree.read().children(hard[0]), before.as_slice());
        assert_eq!(generation.tree.read().len(), 5);
    }

    #[test]
    fn missing_listfile_marks_failed() {
        let (generation, _, hard) = generation(&[("patch.mpq", None)]);
        let err = Enumerator::new(&generation).enumerate(hard[0]).unwrap_err();
        assert!(matches!(err, EnumerationError::MissingListfile { .. }));

        let tree = generation.tree.read();
        assert_eq!(tree.node(hard[0]).state, EnumerationState::Failed);
        assert!(tree.node(hard[0]).failure.is_some());
        assert!(tree.children(hard[0]).is_empty());
    }

    #[test]
    fn virtual_merge_collects_overrides() {
        let base: &[&str] = &["Interface\\Glue.blp", "Readme.txt"];
        let patch: &[&str] = &["interface\\Patched.blp", "Credits.txt"];
        let (generation, root, hard) =
            generation(&[("base.mpq", Some(base)), ("patch.mpq", Some(patch))]);
        let enumerator = Enumerator::new(&generation);
        for &h in &hard {
            enumerator.enumerate(h).unwrap();
        }

        let merged = enumerator.enumerate(root).unwrap();
        let tree = generation.tree.read();
        let names: Vec<&str> = merged.iter().map(|&i| tree.node(i).name.as_str()).collect();
        assert_eq!(names, vec!["Interface\\", "Readme.txt", "Credits.txt"]);

        let interface = tree.node(merged[0]);
        assert!(interface.is_virtual());
        assert_eq!(interface.state, EnumerationState::NotEnumerated);
        assert_eq!(interface.hard_references().len(), 2);
        assert_eq!(tree.node(tree.effective_hard(merged[0])).package, "patch.mpq");

        assert_eq!(tree.node(root).state, EnumerationState::Enumerated);
        // Container plus three merged children.
        assert_eq!(tree.children(root).len(), 4);
    }

    #[test]
    fn virtual_merge_skips_failed_packages() {
        let base: &[&str] = &["Readme.txt"];
        let (generation, root, hard) = generation(&[("base.mpq", Some(base)), ("broken.mpq", None)]);
        let enumerator = Enumerator::new(&generation);
        enumerator.enumerate(hard[0]).unwrap();
        assert!(enumerator.enumerate(hard[1]).is_err());

        let merged = enumerator.enumerate(root).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(generation.tree.read().node(root).state, EnumerationState::Enumerated);
    }
}
