//! Scheduler queues: work queue, wait queue, results buffer and the
//! in-flight task counter.
//!
//! None of these types lock internally; the engine wraps each one in its
//! own `parking_lot::Mutex`.

use super::ReferenceHandle;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};

/// FIFO of references ready to enumerate now, with O(1) membership checks.
#[derive(Debug, Default)]
pub struct WorkQueue {
    order: VecDeque<ReferenceHandle>,
    members: HashSet<ReferenceHandle>,
}

impl WorkQueue {
    /// Append `handle`. Returns `false` if it was already queued.
    pub fn push(&mut self, handle: ReferenceHandle) -> bool {
        if !self.members.insert(handle) {
            return false;
        }
        self.order.push_back(handle);
        true
    }

    pub fn pop(&mut self) -> Option<ReferenceHandle> {
        let handle = self.order.pop_front()?;
        self.members.remove(&handle);
        Some(handle)
    }

    #[inline]
    pub fn contains(&self, handle: &ReferenceHandle) -> bool {
        self.members.contains(handle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

/// A reference blocked on its parent or on its hard references.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitEntry {
    pub handle: ReferenceHandle,
    /// Already moved to `Enumerating` by reload; goes straight to the work
    /// queue once ready instead of through the submission rule.
    pub claimed: bool,
}

/// References waiting for a dependency to finish, in arrival order.
#[derive(Debug, Default)]
pub struct WaitQueue {
    entries: Vec<WaitEntry>,
}

impl WaitQueue {
    /// Append `entry`. Returns `false` if its handle is already waiting.
    pub fn push(&mut self, entry: WaitEntry) -> bool {
        if self.contains(&entry.handle) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn contains(&self, handle: &ReferenceHandle) -> bool {
        self.entries.iter().any(|e| e.handle == *handle)
    }

    /// Remove `handle` if it is waiting. Returns `true` if it was.
    pub fn remove(&mut self, handle: &ReferenceHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != *handle);
        self.entries.len() != before
    }

    /// Remove and return every entry matching `ready`, preserving order.
    pub fn take_where<F>(&mut self, mut ready: F) -> Vec<WaitEntry>
    where
        F: FnMut(&WaitEntry) -> bool,
    {
        let mut taken = Vec::new();
        self.entries.retain(|entry| {
            if ready(entry) {
                taken.push(*entry);
                false
            } else {
                true
            }
        });
        taken
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Append-only record of newly discovered references, drained by the consumer.
#[derive(Debug, Default)]
pub struct ResultsBuffer {
    items: Vec<ReferenceHandle>,
}

impl ResultsBuffer {
    /// Append one enumeration's discoveries as a single ordered batch.
    pub fn extend<I: IntoIterator<Item = ReferenceHandle>>(&mut self, batch: I) {
        self.items.extend(batch);
    }

    #[inline]
    pub fn last(&self) -> Option<ReferenceHandle> {
        self.items.last().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove `handle` by identity. Searches from the back, where the
    /// consumer usually takes from.
    pub fn consume(&mut self, handle: ReferenceHandle) -> bool {
        match self.items.iter().rposition(|h| *h == handle) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Take everything, oldest first.
    pub fn drain(&mut self) -> Vec<ReferenceHandle> {
        std::mem::take(&mut self.items)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Number of dispatched enumeration tasks that have not finished yet.
#[derive(Debug, Default)]
pub struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    pub fn begin(&self) {
        *self.count.lock() += 1;
    }

    pub fn end(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Block until every dispatched task has finished.
    pub fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}
