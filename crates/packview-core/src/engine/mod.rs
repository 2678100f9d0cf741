/// Engine module: schedules and runs reference enumeration.
///
/// One dedicated scheduler thread moves references through two queues:
/// - **Work queue:** references ready to enumerate now (FIFO).
/// - **Wait queue:** references whose parent (or, for virtual references,
///   whose hard references) have not finished yet.
///
/// Ready work is dispatched to a bounded `rayon` pool. Each finished task
/// appends its discoveries to the results buffer and wakes the scheduler,
/// which then promotes any waiting references it unblocked. The scheduler
/// sleeps on a crossbeam channel between wakes instead of polling.
///
/// The tree and package-group snapshot live in an `Arc<Generation>` that
/// reload replaces in one pointer swap.
pub mod enumerator;
pub mod generation;
pub mod progress;
pub mod queues;
mod reload;

pub use generation::{CancelToken, Generation};
pub use progress::EngineEvent;
pub use reload::{ReloadOutcome, PACKAGES_CONTAINER};

use crate::config::{root_set, ConfigSource, EngineConfig, JsonConfigFile};
use crate::error::{ConfigError, EngineError, EnumerationError};
use crate::model::{EnumerationState, NodeIndex, Readiness, Reference};
use crate::package::{ListfileDirectory, PackageGroupSet, PackageSource};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use enumerator::Enumerator;
use parking_lot::{Mutex, RwLock};
use queues::{InFlight, ResultsBuffer, WaitEntry, WaitQueue, WorkQueue};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Longest the scheduler sleeps without a wake signal.
///
/// Every state change that can unblock work sends a wake, so this tick only
/// bounds the damage of a lost signal.
pub const IDLE_TICK: Duration = Duration::from_millis(250);

/// Identifies a reference in one reload generation.
///
/// Handles from an older generation are rejected everywhere as stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReferenceHandle {
    pub generation: u64,
    pub index: NodeIndex,
}

/// What happened to a [`Engine::submit_work`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    /// Accepted into the work queue; the reference is now `Enumerating`.
    Queued,
    /// Parked in the wait queue until its dependencies finish.
    Waiting,
    /// Dropped. Never an error for the caller, only a diagnostic.
    Rejected(Rejection),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    AlreadyQueued,
    AlreadyWaiting,
    /// The reference is not `NotEnumerated`.
    NotPending(EnumerationState),
    Stale,
}

/// Which scheduler queue currently holds a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueMembership {
    Work,
    Wait,
    Neither,
}

/// State shared between the engine handle, the scheduler thread and the
/// enumeration tasks.
///
/// Lock order: `work` → `wait` → `results` → `generation` → tree.
struct Shared {
    config: Arc<dyn ConfigSource>,
    source: Arc<dyn PackageSource>,

    generation: RwLock<Arc<Generation>>,
    next_generation: AtomicU64,

    work: Mutex<WorkQueue>,
    wait: Mutex<WaitQueue>,
    results: Mutex<ResultsBuffer>,

    /// Root set of the last successful reload. `None` before the first one.
    cached_roots: Mutex<Option<BTreeSet<PathBuf>>>,

    groups_loaded: AtomicBool,
    running: AtomicBool,
    reloading: AtomicBool,

    in_flight: InFlight,
    pool: rayon::ThreadPool,
    worker_limit: usize,

    wake_tx: Sender<()>,
    events_tx: Sender<EngineEvent>,
}

/// Handle to the enumeration engine.
///
/// Dropping the engine stops the scheduler and waits for in-flight tasks.
pub struct Engine {
    shared: Arc<Shared>,
    wake_rx: Receiver<()>,
    /// Receiver for package-group, package and failure notifications.
    pub events_rx: Receiver<EngineEvent>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Create a stopped engine with an empty tree.
    ///
    /// `events_rx` holds at most `options.event_channel_capacity` events.
    /// The engine never blocks on it: events that do not fit are dropped
    /// with a warning, so the per-group and per-package notifications are
    /// only complete for a consumer that drains between reloads.
    pub fn new(
        config: Arc<dyn ConfigSource>,
        source: Arc<dyn PackageSource>,
        options: &EngineConfig,
    ) -> Result<Self, EngineError> {
        let worker_limit = options.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_limit)
            .thread_name(|i| format!("packview-enum-{i}"))
            .build()?;

        // Capacity 1: pending wakes coalesce into one.
        let (wake_tx, wake_rx) = crossbeam_channel::bounded::<()>(1);
        let (events_tx, events_rx) =
            crossbeam_channel::bounded::<EngineEvent>(options.event_channel_capacity.max(1));

        let shared = Arc::new(Shared {
            config,
            source,
            generation: RwLock::new(Arc::new(Generation::empty())),
            next_generation: AtomicU64::new(1),
            work: Mutex::new(WorkQueue::default()),
            wait: Mutex::new(WaitQueue::default()),
            results: Mutex::new(ResultsBuffer::default()),
            cached_roots: Mutex::new(None),
            groups_loaded: AtomicBool::new(false),
            running: AtomicBool::new(false),
            reloading: AtomicBool::new(false),
            in_flight: InFlight::default(),
            pool,
            worker_limit,
            wake_tx,
            events_tx,
        });

        Ok(Self {
            shared,
            wake_rx,
            events_rx,
            thread: Mutex::new(None),
        })
    }

    /// Engine reading roots from a JSON config file and packages from
    /// archive directories with listfile sidecars.
    pub fn from_config_file(path: &Path) -> Result<Self, EngineError> {
        let options = EngineConfig::load(path)?;
        let source = ListfileDirectory::new(&options.archive_extensions);
        Self::new(
            Arc::new(JsonConfigFile::new(path)),
            Arc::new(source),
            &options,
        )
    }

    /// Start the scheduler thread. No-op if it is already running.
    pub fn start(&self) {
        let mut slot = self.thread.lock();
        if slot.is_some() {
            debug!("Scheduler already running");
            return;
        }

        self.shared.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let wake_rx = self.wake_rx.clone();
        match thread::Builder::new()
            .name("packview-scheduler".into())
            .spawn(move || shared.run_scheduler(wake_rx))
        {
            Ok(handle) => *slot = Some(handle),
            Err(err) => {
                self.shared.running.store(false, Ordering::SeqCst);
                error!("Failed to spawn scheduler thread: {err}");
            }
        }
    }

    /// Stop dequeuing, join the scheduler thread, then wait for every task
    /// that was already dispatched. Their results still reach the buffer.
    pub fn stop(&self) {
        let mut slot = self.thread.lock();
        let Some(handle) = slot.take() else {
            return;
        };

        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.wake();
        if handle.join().is_err() {
            warn!("Scheduler thread panicked");
        }
        self.shared.in_flight.wait_idle();
        info!(
            "Engine stopped with {} references still queued",
            self.work_queue_len()
        );
    }

    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Rebuild package groups and the tree if the configured roots changed.
    pub fn reload(&self) -> Result<ReloadOutcome, EngineError> {
        self.shared.reload()
    }

    /// Compare the configured roots with those of the last reload.
    pub fn has_package_directory_changed(&self) -> Result<bool, ConfigError> {
        let configured = root_set(&self.shared.config.root_directories()?);
        Ok(self.shared.cached_roots.lock().as_ref() != Some(&configured))
    }

    /// Request enumeration of `handle`.
    pub fn submit_work(&self, handle: ReferenceHandle) -> Submission {
        self.shared.submit(handle)
    }

    /// Make a `Failed` reference submittable again. Returns `false` if the
    /// reference is stale or not `Failed`.
    ///
    /// A retry reads the same package-group snapshot as the failed attempt,
    /// so a missing listfile fails again until a reload picks up a new one.
    /// Virtual references that already merged without the failed reference
    /// are not re-merged when a retry succeeds.
    pub fn clear_failure(&self, handle: ReferenceHandle) -> bool {
        let generation = self.shared.current_generation();
        let Some(index) = generation.resolve(handle) else {
            return false;
        };
        let mut tree = generation.tree.write();
        let node = tree.node_mut(index);
        if node.state != EnumerationState::Failed {
            return false;
        }
        node.state = EnumerationState::NotEnumerated;
        node.failure = None;
        true
    }

    // ── Results buffer ──────────────────────────────────────────────

    pub fn last_completed_work_order(&self) -> Option<ReferenceHandle> {
        self.shared.results.lock().last()
    }

    pub fn completed_work_order_count(&self) -> usize {
        self.shared.results.lock().len()
    }

    /// Remove `handle` from the results buffer. Returns `false` if absent.
    pub fn mark_work_order_as_consumed(&self, handle: ReferenceHandle) -> bool {
        self.shared.results.lock().consume(handle)
    }

    /// Take every pending result, oldest first.
    pub fn drain_completed(&self) -> Vec<ReferenceHandle> {
        self.shared.results.lock().drain()
    }

    // ── Tree inspection ─────────────────────────────────────────────

    /// Snapshot of a reference, or `None` if the handle is stale.
    pub fn reference(&self, handle: ReferenceHandle) -> Option<Reference> {
        let generation = self.shared.current_generation();
        let index = generation.resolve(handle)?;
        let tree = generation.tree.read();
        Some(tree.node(index).clone())
    }

    pub fn children(&self, handle: ReferenceHandle) -> Vec<ReferenceHandle> {
        let generation = self.shared.current_generation();
        let Some(index) = generation.resolve(handle) else {
            return Vec::new();
        };
        let tree = generation.tree.read();
        tree.children(index)
            .iter()
            .map(|&c| generation.handle(c))
            .collect()
    }

    /// Group roots of the current tree, in configuration order.
    pub fn roots(&self) -> Vec<ReferenceHandle> {
        let generation = self.shared.current_generation();
        let tree = generation.tree.read();
        tree.roots().iter().map(|&r| generation.handle(r)).collect()
    }

    /// The hard reference presented for `handle` (the last override for
    /// virtual references, the reference itself otherwise).
    pub fn effective_hard(&self, handle: ReferenceHandle) -> Option<ReferenceHandle> {
        let generation = self.shared.current_generation();
        let index = generation.resolve(handle)?;
        let tree = generation.tree.read();
        Some(generation.handle(tree.effective_hard(index)))
    }

    /// Package-group snapshot of the current tree.
    pub fn package_groups(&self) -> Arc<PackageGroupSet> {
        Arc::clone(&self.shared.current_generation().groups)
    }

    // ── Scheduler inspection ────────────────────────────────────────

    pub fn queue_membership(&self, handle: ReferenceHandle) -> QueueMembership {
        let work = self.shared.work.lock();
        if work.contains(&handle) {
            return QueueMembership::Work;
        }
        if self.shared.wait.lock().contains(&handle) {
            return QueueMembership::Wait;
        }
        QueueMembership::Neither
    }

    pub fn work_queue_len(&self) -> usize {
        self.shared.work.lock().len()
    }

    pub fn wait_queue_len(&self) -> usize {
        self.shared.wait.lock().len()
    }

    /// Dispatched tasks that have not finished.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.count()
    }

    /// `true` once reload has finished seeding the scheduler.
    pub fn groups_loaded(&self) -> bool {
        self.shared.groups_loaded.load(Ordering::SeqCst)
    }

    /// `true` when nothing is queued, waiting or running.
    pub fn is_idle(&self) -> bool {
        let work = self.shared.work.lock();
        let wait = self.shared.wait.lock();
        work.is_empty() && wait.is_empty() && self.shared.in_flight.count() == 0
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decrements the in-flight count and wakes the scheduler when a task ends,
/// including by panic.
struct TaskGuard<'a>(&'a Shared);

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.end();
        self.0.wake();
    }
}

impl Shared {
    fn current_generation(&self) -> Arc<Generation> {
        Arc::clone(&self.generation.read())
    }

    fn wake(&self) {
        // Full means a wake is already pending.
        let _ = self.wake_tx.try_send(());
    }

    fn emit(&self, event: EngineEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!("Event channel full, dropping {event:?}"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn run_scheduler(self: Arc<Self>, wake_rx: Receiver<()>) {
        info!("Scheduler started with {} workers", self.worker_limit);
        while self.running.load(Ordering::SeqCst) {
            self.promote_ready();
            self.dispatch_ready();
            match wake_rx.recv_timeout(IDLE_TICK) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("Scheduler stopped");
    }

    /// Pop ready work in FIFO order while workers are free.
    fn dispatch_ready(self: &Arc<Self>) {
        if !self.groups_loaded.load(Ordering::SeqCst) {
            return;
        }

        loop {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            if self.in_flight.count() >= self.worker_limit {
                return;
            }

            // Read under `work`: reload swaps the generation while holding it.
            let (generation, handle) = {
                let mut work = self.work.lock();
                let generation = self.current_generation();
                let Some(handle) = work.pop() else {
                    return;
                };
                if handle.generation < generation.id {
                    debug!("Dropping stale work {handle:?}");
                    continue;
                }
                self.in_flight.begin();
                (generation, handle)
            };

            let shared = Arc::clone(self);
            self.pool.spawn(move || shared.run_task(&generation, handle));
        }
    }

    fn run_task(&self, generation: &Generation, handle: ReferenceHandle) {
        let _guard = TaskGuard(self);
        if generation.cancel.is_cancelled() {
            debug!("Skipping {handle:?}: generation cancelled");
            return;
        }

        match Enumerator::new(generation).enumerate(handle.index) {
            Ok(discovered) => self.publish(generation, discovered),
            Err(err @ (EnumerationError::Cancelled | EnumerationError::Stale)) => {
                debug!("Enumeration of {handle:?} abandoned: {err}");
            }
            Err(err) => {
                warn!("Enumeration of {handle:?} failed: {err}");
                self.emit(EngineEvent::EnumerationFailed {
                    reference: handle,
                    error: err,
                });
            }
        }
    }

    /// Append one task's discoveries as a single batch, unless a reload has
    /// replaced the generation in the meantime.
    fn publish(&self, generation: &Generation, discovered: Vec<NodeIndex>) {
        if discovered.is_empty() {
            return;
        }
        let mut results = self.results.lock();
        if self.generation.read().id != generation.id {
            return;
        }
        results.extend(discovered.into_iter().map(|i| generation.handle(i)));
    }

    /// Move every waiting reference whose dependencies finished to the work
    /// queue. Both queue locks are held, so a promoted reference is never
    /// observed in neither queue.
    fn promote_ready(&self) {
        let mut work = self.work.lock();
        let mut wait = self.wait.lock();
        let generation = self.current_generation();

        let ready = {
            let tree = generation.tree.read();
            wait.take_where(|entry| {
                entry.handle.generation < generation.id
                    || tree.readiness(entry.handle.index) == Readiness::Ready
            })
        };
        if ready.is_empty() {
            return;
        }

        let mut promoted = 0usize;
        for entry in ready {
            if entry.handle.generation < generation.id {
                continue;
            }
            let accepted = if entry.claimed {
                work.push(entry.handle)
            } else {
                matches!(
                    Self::admit(&mut work, &mut wait, &generation, entry.handle).0,
                    Submission::Queued
                )
            };
            if accepted {
                promoted += 1;
            }
        }
        debug!("Promoted {promoted} waiting references");
    }

    fn submit(&self, handle: ReferenceHandle) -> Submission {
        let (generation, outcome, prerequisites) = {
            let mut work = self.work.lock();
            let mut wait = self.wait.lock();
            let generation = self.current_generation();
            let (outcome, prerequisites) = Self::admit(&mut work, &mut wait, &generation, handle);
            (generation, outcome, prerequisites)
        };

        match &outcome {
            Submission::Queued => self.wake(),
            Submission::Waiting => {
                for prerequisite in prerequisites {
                    let _ = self.submit(generation.handle(prerequisite));
                }
            }
            Submission::Rejected(reason) => debug!("Submission of {handle:?} dropped: {reason:?}"),
        }
        outcome
    }

    /// The submission rule, applied with both queue locks held.
    ///
    /// A `NotEnumerated` reference that is ready is moved to `Enumerating`
    /// and queued before the locks are released, leaving the wait queue if
    /// it was parked there. One that is blocked is
    /// parked in the wait queue; its unsubmitted hard references are
    /// returned so the caller can submit them after unlocking.
    fn admit(
        work: &mut WorkQueue,
        wait: &mut WaitQueue,
        generation: &Generation,
        handle: ReferenceHandle,
    ) -> (Submission, Vec<NodeIndex>) {
        if handle.generation != generation.id {
            return (Submission::Rejected(Rejection::Stale), Vec::new());
        }
        if work.contains(&handle) {
            return (Submission::Rejected(Rejection::AlreadyQueued), Vec::new());
        }

        let mut tree = generation.tree.write();
        let state = match tree.get(handle.index) {
            Some(node) => node.state,
            None => return (Submission::Rejected(Rejection::Stale), Vec::new()),
        };
        if state != EnumerationState::NotEnumerated {
            return (Submission::Rejected(Rejection::NotPending(state)), Vec::new());
        }

        match tree.readiness(handle.index) {
            Readiness::Ready => {
                tree.node_mut(handle.index).state = EnumerationState::Enumerating;
                wait.remove(&handle);
                work.push(handle);
                (Submission::Queued, Vec::new())
            }
            Readiness::Blocked { prerequisites } => {
                let entry = WaitEntry {
                    handle,
                    claimed: false,
                };
                if wait.push(entry) {
                    (Submission::Waiting, prerequisites)
                } else {
                    (Submission::Rejected(Rejection::AlreadyWaiting), Vec::new())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharedRoots;
    use crate::error::PackageError;
    use crate::package::{Listfile, PackageGroup, PackageGroupId};
    use std::collections::HashMap;

    /// Package source backed by a map from root path to packages.
    struct MemorySource(HashMap<PathBuf, Vec<(&'static str, Option<Vec<&'static str>>)>>);

    impl PackageSource for MemorySource {
        fn open_group(&self, id: PackageGroupId, root: &Path) -> Result<PackageGroup, PackageError> {
            let mut group = PackageGroup::new(id, root.to_path_buf());
            for (name, paths) in self.0.get(root).cloned().unwrap_or_default() {
                group = group.with_package(name, paths.map(Listfile::new));
            }
            Ok(group)
        }
    }

    /// Stopped engine over one existing root with the given packages.
    fn engine(packages: Vec<(&'static str, Option<Vec<&'static str>>)>) -> (Engine, tempfile::TempDir) {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        let source = MemorySource(HashMap::from([(root.clone(), packages)]));
        let engine = Engine::new(
            Arc::new(SharedRoots::new(vec![root])),
            Arc::new(source),
            &EngineConfig {
                worker_threads: Some(2),
                ..EngineConfig::default()
            },
        )
        .unwrap();
        (engine, tmp)
    }

    /// Add an `Interface\` directory under `package` without enumerating it.
    fn attach_interface_dir(engine: &Engine, package: ReferenceHandle) -> ReferenceHandle {
        let generation = engine.shared.current_generation();
        let mut tree = generation.tree.write();
        let group = tree.node(package.index).group;
        let idx = tree.add_node(Reference::new_dir(
            group,
            "base.mpq".into(),
            "Interface\\".into(),
            "Interface\\".into(),
            package.index,
        ));
        tree.add_child(package.index, idx);
        generation.handle(idx)
    }

    fn package_handles(engine: &Engine) -> Vec<ReferenceHandle> {
        let root = engine.roots()[0];
        let container = engine.children(root)[0];
        engine.children(container)
    }

    #[test]
    fn reload_seeds_packages_and_parks_root() {
        let (engine, _tmp) = engine(vec![("base.mpq", Some(vec!["a.txt"]))]);
        assert!(matches!(engine.reload().unwrap(), ReloadOutcome::Reloaded { .. }));

        let root = engine.roots()[0];
        assert_eq!(engine.reference(root).unwrap().state, EnumerationState::Enumerating);
        assert_eq!(engine.queue_membership(root), QueueMembership::Wait);

        let packages = package_handles(&engine);
        assert_eq!(packages.len(), 1);
        assert_eq!(engine.queue_membership(packages[0]), QueueMembership::Work);
        assert_eq!(
            engine.reference(packages[0]).unwrap().state,
            EnumerationState::Enumerating
        );
        assert!(engine.groups_loaded());
    }

    #[test]
    fn duplicate_submission_is_rejected() {
        let (engine, _tmp) = engine(vec![("base.mpq", Some(vec!["a.txt"]))]);
        engine.reload().unwrap();
        let package = package_handles(&engine)[0];

        assert_eq!(
            engine.submit_work(package),
            Submission::Rejected(Rejection::AlreadyQueued)
        );
        assert_eq!(engine.work_queue_len(), 1);
    }

    #[test]
    fn stale_handle_is_rejected_after_reload() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        let roots = SharedRoots::new(vec![a.clone()]);
        let source = MemorySource(HashMap::from([
            (a.clone(), vec![("base.mpq", Some(vec!["x.txt"]))]),
            (b.clone(), vec![("other.mpq", Some(vec!["y.txt"]))]),
        ]));
        let engine = Engine::new(
            Arc::new(roots.clone()),
            Arc::new(source),
            &EngineConfig::default(),
        )
        .unwrap();

        engine.reload().unwrap();
        let old_root = engine.roots()[0];
        roots.set(vec![b]);
        engine.reload().unwrap();

        assert!(engine.reference(old_root).is_none());
        assert_eq!(
            engine.submit_work(old_root),
            Submission::Rejected(Rejection::Stale)
        );
        assert_eq!(engine.reference(engine.roots()[0]).unwrap().name, "b");
    }

    #[test]
    fn clear_failure_only_applies_to_failed() {
        let (engine, _tmp) = engine(vec![("base.mpq", Some(vec!["a.txt"]))]);
        engine.reload().unwrap();
        let package = package_handles(&engine)[0];
        assert!(!engine.clear_failure(package));
    }

    #[test]
    fn child_of_enumerating_parent_waits_for_it() {
        let (engine, _tmp) = engine(vec![("base.mpq", Some(vec!["Interface\\Glue.blp"]))]);
        engine.reload().unwrap();
        let package = package_handles(&engine)[0];

        // Attach the directory by hand while the package is still queued.
        let dir = attach_interface_dir(&engine, package);

        assert_eq!(engine.submit_work(dir), Submission::Waiting);
        assert_eq!(engine.queue_membership(dir), QueueMembership::Wait);
        assert_eq!(engine.reference(dir).unwrap().state, EnumerationState::NotEnumerated);

        engine.start();
        let deadline = std::time::Instant::now() + Duration::from_secs(30);
        while !engine.is_idle() {
            assert!(std::time::Instant::now() < deadline, "engine never went idle");
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(engine.reference(dir).unwrap().state, EnumerationState::Enumerated);
        // The package's own enumeration found the same directory and kept ours.
        assert_eq!(engine.children(package), vec![dir]);
        assert_eq!(engine.children(dir).len(), 1);
    }

    #[test]
    fn resubmitting_a_ready_waiting_reference_moves_it_to_work() {
        let (engine, _tmp) = engine(vec![("base.mpq", Some(vec!["Interface\\Glue.blp"]))]);
        engine.reload().unwrap();
        let package = package_handles(&engine)[0];
        let dir = attach_interface_dir(&engine, package);
        assert_eq!(engine.submit_work(dir), Submission::Waiting);

        // The parent finishes, but the scheduler has not promoted yet.
        engine
            .shared
            .current_generation()
            .tree
            .write()
            .node_mut(package.index)
            .state = EnumerationState::Enumerated;

        assert_eq!(engine.submit_work(dir), Submission::Queued);
        assert_eq!(engine.queue_membership(dir), QueueMembership::Work);
        assert!(!engine.shared.wait.lock().contains(&dir));
        assert_eq!(engine.wait_queue_len(), 1, "only the group root is parked");
    }
}
