/// Reload: rebuilds package groups and the reference tree from the
/// configured root directories, then seeds the scheduler.
///
/// The new tree and package-group snapshot are built off to the side and
/// swapped in as one generation, so in-flight tasks of the old generation
/// never observe a half-built mapping. The old generation is cancelled.
use super::progress::EngineEvent;
use super::queues::WaitEntry;
use super::{Generation, Shared};
use crate::config::root_set;
use crate::error::EngineError;
use crate::model::{NodeIndex, Reference, ReferenceKind, ReferenceTree};
use crate::package::{PackageGroupId, PackageGroupSet, PackageSource};
use compact_str::CompactString;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Display name of the implicit container holding a group's packages.
pub const PACKAGES_CONTAINER: &str = "Packages";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Another reload was already running; this request was ignored.
    Busy,
    /// The configured roots match the last reload; nothing changed.
    Unchanged,
    Reloaded { groups: usize, packages: usize },
}

/// What reload must announce and submit for one group once the new
/// generation is live.
struct GroupSeed {
    group: PackageGroupId,
    location: PathBuf,
    root: NodeIndex,
    packages: Vec<(CompactString, NodeIndex)>,
}

/// Clears the re-entrancy flag when reload returns, early or not.
struct ReloadGuard<'a>(&'a AtomicBool);

impl Drop for ReloadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Shared {
    pub(super) fn reload(&self) -> Result<ReloadOutcome, EngineError> {
        if self
            .reloading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Reload already in progress, ignoring request");
            return Ok(ReloadOutcome::Busy);
        }
        let _guard = ReloadGuard(&self.reloading);
        let start = Instant::now();

        let configured = self.config.root_directories()?;
        let configured_set = root_set(&configured);
        if self.cached_roots.lock().as_ref() == Some(&configured_set) {
            debug!("Package directories unchanged, skipping reload");
            return Ok(ReloadOutcome::Unchanged);
        }

        self.groups_loaded.store(false, Ordering::SeqCst);
        let id = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let (generation, seeds) = build_generation(id, &configured, self.source.as_ref());
        let generation = Arc::new(generation);

        {
            let mut work = self.work.lock();
            let mut wait = self.wait.lock();
            let mut results = self.results.lock();
            let mut current = self.generation.write();
            current.cancel.cancel();
            *current = Arc::clone(&generation);
            work.clear();
            wait.clear();
            results.clear();
        }

        let groups = seeds.len();
        let mut packages = 0usize;
        for seed in seeds {
            let root = generation.handle(seed.root);
            self.emit(EngineEvent::PackageGroupAdded {
                group: seed.group,
                root,
                location: seed.location,
            });

            for (package, index) in seed.packages {
                let reference = generation.handle(index);
                self.emit(EngineEvent::PackageEnumerated {
                    group: seed.group,
                    package,
                    reference,
                });
                let _ = self.submit(reference);
                packages += 1;
            }

            // The root was born `Enumerating`; it merges its packages once
            // every one of them is terminal.
            self.wait.lock().push(WaitEntry {
                handle: root,
                claimed: true,
            });
        }

        *self.cached_roots.lock() = Some(configured_set);
        self.groups_loaded.store(true, Ordering::SeqCst);

        let duration = start.elapsed();
        self.emit(EngineEvent::ReloadComplete {
            groups,
            packages,
            duration,
        });
        self.wake();
        info!("Reloaded {groups} package groups with {packages} packages in {duration:?}");

        Ok(ReloadOutcome::Reloaded { groups, packages })
    }
}

/// Build the tree for every existing, distinct configured root.
///
/// ```text
/// <group root>      virtual, Enumerating, hard = [package roots]
///   Packages        container, Enumerated
///     base.mpq      hard, NotEnumerated
///     patch.mpq     hard, NotEnumerated
/// ```
///
/// Missing roots are skipped silently; roots whose source fails are
/// skipped with a warning.
fn build_generation(
    id: u64,
    roots: &[PathBuf],
    source: &dyn PackageSource,
) -> (Generation, Vec<GroupSeed>) {
    let mut tree = ReferenceTree::with_capacity(roots.len() * 64);
    let mut groups = Vec::new();
    let mut seeds = Vec::new();
    let mut seen: HashSet<&PathBuf> = HashSet::new();

    for root in roots {
        if !seen.insert(root) {
            continue;
        }
        if !root.is_dir() {
            debug!("Skipping missing package directory {}", root.display());
            continue;
        }

        let group_id = PackageGroupId::new(groups.len());
        let group = match source.open_group(group_id, root) {
            Ok(group) => group,
            Err(err) => {
                warn!("Skipping package directory {}: {err}", root.display());
                continue;
            }
        };

        let root_idx = tree.add_root(Reference::new_group_root(group_id, &group.display_name()));
        let container = tree.add_node(Reference::new_container(
            group_id,
            PACKAGES_CONTAINER,
            root_idx,
        ));
        tree.add_child(root_idx, container);

        let mut packages = Vec::with_capacity(group.packages.len());
        for package in &group.packages {
            let idx = tree.add_node(Reference::new_package(group_id, &package.name, container));
            tree.add_child(container, idx);
            packages.push((package.name.clone(), idx));
        }
        tree.node_mut(root_idx).kind = ReferenceKind::Virtual {
            hard: packages.iter().map(|(_, idx)| *idx).collect(),
        };

        seeds.push(GroupSeed {
            group: group_id,
            location: root.clone(),
            root: root_idx,
            packages,
        });
        groups.push(group);
    }

    (
        Generation::new(id, tree, PackageGroupSet::new(groups)),
        seeds,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PackageError;
    use crate::model::EnumerationState;
    use crate::package::{Listfile, PackageGroup};
    use std::path::Path;

    struct TwoPackages;

    impl PackageSource for TwoPackages {
        fn open_group(&self, id: PackageGroupId, root: &Path) -> Result<PackageGroup, PackageError> {
            Ok(PackageGroup::new(id, root.to_path_buf())
                .with_package("base.mpq", Some(Listfile::new(["a.txt"])))
                .with_package("patch.mpq", Some(Listfile::new(["b.txt"]))))
        }
    }

    #[test]
    fn builds_one_group_per_distinct_existing_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        let roots = vec![a.clone(), tmp.path().join("missing"), b, a];

        let (generation, seeds) = build_generation(7, &roots, &TwoPackages);
        assert_eq!(seeds.len(), 2);
        assert_eq!(generation.groups.len(), 2);
        assert_eq!(generation.id, 7);

        let tree = generation.tree.read();
        assert_eq!(tree.roots().len(), 2);
        for seed in &seeds {
            let root = tree.node(seed.root);
            assert_eq!(root.state, EnumerationState::Enumerating);
            assert_eq!(root.hard_references().len(), 2);

            let container = tree.children(seed.root)[0];
            assert_eq!(tree.node(container).name, PACKAGES_CONTAINER);
            assert_eq!(tree.children(container).len(), 2);
        }
        // 2 groups x (root + container + 2 packages)
        assert_eq!(tree.len(), 8);
    }

    #[test]
    fn group_ids_stay_dense_when_roots_are_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let b = tmp.path().join("b");
        std::fs::create_dir_all(&b).unwrap();
        let roots = vec![tmp.path().join("missing"), b];

        let (generation, seeds) = build_generation(1, &roots, &TwoPackages);
        assert_eq!(seeds[0].group, PackageGroupId(0));
        assert!(generation.groups.group(PackageGroupId(0)).is_some());
    }
}
