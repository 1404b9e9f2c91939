#![forbid(unsafe_code)]

//! Branch-scoped dirty tracking with at-most-once watcher fan-out.
//!
//! # Design
//!
//! [`DirtyTracker`] accumulates the names of top-level branches touched since
//! the last pass and owns a table of watch registrations. A pass
//! ([`DirtyTracker::clean_all_dirty`]) takes a snapshot of the dirty set,
//! selects every watcher whose [`Interest`] intersects it, invokes each
//! selected watcher once, and then drops the snapshot.
//!
//! Watch callbacks are owned by their [`WatchHandle`]; the table only holds
//! `Weak` references. Dropping a handle unregisters the watcher immediately,
//! including in the middle of a pass that already selected it.
//!
//! # Invariants
//!
//! 1. Within one pass every watcher fires at most once, no matter how many
//!    of its branches are dirty.
//! 2. A watcher whose interest is disjoint from the snapshot never fires.
//! 3. The snapshot is taken before any callback runs, and taking it empties
//!    the live set. From inside a callback, [`DirtyTracker::is_dirty`] and
//!    [`DirtyTracker::dirty_branches`] report only branches marked since the
//!    pass began; the branches being notified are in [`PassReport::dirty`]
//!    once the pass returns. Branches marked by a callback are handled by
//!    the next pass, which may be a nested pass started by a re-entrant
//!    commit.
//! 4. Every pass discards its snapshot, including branches nobody watched.
//! 5. Watchers registered during a pass are not part of that pass.
//!
//! # Failure Modes
//!
//! - **Runaway re-entrancy**: a watcher that commits on every notification
//!   nests passes without bound. Nesting deeper than the configured maximum
//!   panics with the offending depth.
//! - **Callback panic**: propagates to the committer; the pass depth is
//!   restored during unwinding.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use ahash::AHashSet;

use crate::error::TrackerError;

type CallbackRc = Rc<dyn Fn()>;
type CallbackWeak = Weak<dyn Fn()>;

/// Default maximum nesting of re-entrant passes.
pub const DEFAULT_MAX_PASS_DEPTH: usize = 32;

/// Identifier of one watch registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

impl WatchId {
    /// Raw numeric id.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Which branches a watcher cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interest {
    /// Every branch.
    All,
    /// A fixed set of branch names.
    Branches(BTreeSet<String>),
}

impl Interest {
    /// Interest in the given branch names.
    pub fn branches<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::Branches(names.into_iter().map(Into::into).collect())
    }

    /// Whether this interest overlaps the dirty set.
    #[must_use]
    pub fn intersects(&self, dirty: &AHashSet<String>) -> bool {
        match self {
            Self::All => !dirty.is_empty(),
            Self::Branches(names) => names.iter().any(|name| dirty.contains(name)),
        }
    }
}

struct WatchEntry {
    id: WatchId,
    interest: Interest,
    callback: CallbackWeak,
}

struct TrackerInner {
    dirty: AHashSet<String>,
    watchers: Vec<WatchEntry>,
    next_id: u64,
    generation: u64,
    depth: usize,
    max_depth: usize,
}

/// Summary of one [`DirtyTracker::clean_all_dirty`] pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassReport {
    /// Sequence number of the pass, starting at 1.
    pub generation: u64,
    /// Nesting depth of the pass; 1 for a top-level pass.
    pub depth: usize,
    /// The dirty snapshot the pass was driven by, sorted.
    pub dirty: Vec<String>,
    /// Number of watcher callbacks invoked.
    pub notified: usize,
}

/// Accumulates dirty branches and notifies interested watchers once per pass.
///
/// Cloning a `DirtyTracker` creates a new handle to the **same** table.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use arbor_runtime::dirty::DirtyTracker;
///
/// let tracker = DirtyTracker::new();
/// let hits = Rc::new(Cell::new(0));
/// let h = Rc::clone(&hits);
/// let _watch = tracker.watch(["fruit", "animal"], move || h.set(h.get() + 1)).unwrap();
///
/// tracker.mark_branch_dirty("fruit");
/// tracker.mark_branch_dirty("animal");
/// tracker.clean_all_dirty();
/// assert_eq!(hits.get(), 1);
/// assert!(tracker.dirty_branches().is_empty());
/// ```
#[derive(Clone)]
pub struct DirtyTracker {
    inner: Rc<RefCell<TrackerInner>>,
}

impl DirtyTracker {
    /// An empty tracker with the default pass depth limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_PASS_DEPTH)
    }

    /// An empty tracker allowing at most `max_depth` nested passes.
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(TrackerInner {
                dirty: AHashSet::new(),
                watchers: Vec::new(),
                next_id: 0,
                generation: 0,
                depth: 0,
                max_depth: max_depth.max(1),
            })),
        }
    }

    /// Add `branch` to the dirty set. Returns `false` if it was already dirty.
    pub fn mark_branch_dirty(&self, branch: impl Into<String>) -> bool {
        let branch = branch.into();
        let inserted = self.inner.borrow_mut().dirty.insert(branch.clone());
        if inserted {
            tracing::trace!(branch = %branch, "branch marked dirty");
        }
        inserted
    }

    /// Whether `branch` is in the live dirty set.
    #[must_use]
    pub fn is_dirty(&self, branch: &str) -> bool {
        self.inner.borrow().dirty.contains(branch)
    }

    /// The live dirty set, sorted.
    #[must_use]
    pub fn dirty_branches(&self) -> Vec<String> {
        let mut branches: Vec<String> = self.inner.borrow().dirty.iter().cloned().collect();
        branches.sort();
        branches
    }

    /// Watch a non-empty set of branches.
    ///
    /// # Errors
    ///
    /// [`TrackerError::EmptyBranchSet`] if `branches` yields nothing.
    pub fn watch<S: Into<String>>(
        &self,
        branches: impl IntoIterator<Item = S>,
        callback: impl Fn() + 'static,
    ) -> Result<WatchHandle, TrackerError> {
        self.watch_interest(&Interest::branches(branches), callback)
    }

    /// Watch every branch.
    pub fn watch_all(&self, callback: impl Fn() + 'static) -> WatchHandle {
        self.register(Interest::All, Rc::new(callback))
    }

    /// Watch according to an [`Interest`].
    ///
    /// # Errors
    ///
    /// [`TrackerError::EmptyBranchSet`] for `Interest::Branches` with no names.
    pub fn watch_interest(
        &self,
        interest: &Interest,
        callback: impl Fn() + 'static,
    ) -> Result<WatchHandle, TrackerError> {
        if matches!(interest, Interest::Branches(names) if names.is_empty()) {
            return Err(TrackerError::EmptyBranchSet);
        }
        Ok(self.register(interest.clone(), Rc::new(callback)))
    }

    fn register(&self, interest: Interest, callback: CallbackRc) -> WatchHandle {
        let mut inner = self.inner.borrow_mut();
        let id = WatchId(inner.next_id);
        inner.next_id += 1;
        tracing::trace!(watch = %id, interest = ?interest, "watch registered");
        inner.watchers.push(WatchEntry {
            id,
            interest,
            callback: Rc::downgrade(&callback),
        });
        WatchHandle {
            id,
            tracker: Rc::downgrade(&self.inner),
            _callback: callback,
        }
    }

    /// Number of live watch registrations.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner
            .borrow()
            .watchers
            .iter()
            .filter(|w| w.callback.strong_count() > 0)
            .count()
    }

    /// Number of passes run so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    /// Notify every watcher interested in the dirty set once, then clear it.
    ///
    /// The live set is moved into the pass snapshot before the first
    /// callback, so callbacks observe an empty dirty set (plus whatever they
    /// mark themselves).
    ///
    /// # Panics
    ///
    /// Panics if passes nest deeper than the configured maximum.
    pub fn clean_all_dirty(&self) -> PassReport {
        let (snapshot, targets, generation, depth) = {
            let mut inner = self.inner.borrow_mut();
            assert!(
                inner.depth < inner.max_depth,
                "dirty tracker passes nested {} deep; a watcher is committing on every notification",
                inner.depth + 1
            );
            inner.depth += 1;
            inner.generation += 1;
            let snapshot = mem::take(&mut inner.dirty);
            inner.watchers.retain(|w| w.callback.strong_count() > 0);
            let targets: Vec<(WatchId, CallbackWeak)> = inner
                .watchers
                .iter()
                .filter(|w| w.interest.intersects(&snapshot))
                .map(|w| (w.id, Weak::clone(&w.callback)))
                .collect();
            (snapshot, targets, inner.generation, inner.depth)
        };
        let _depth = DepthGuard { inner: &self.inner };

        let span = tracing::debug_span!(
            "tracker.pass",
            generation,
            depth,
            dirty = snapshot.len(),
            selected = targets.len()
        );
        let _enter = span.enter();

        let mut notified = 0;
        for (id, callback) in targets {
            let Some(callback) = callback.upgrade() else {
                tracing::trace!(watch = %id, "watcher released mid-pass, skipped");
                continue;
            };
            callback();
            notified += 1;
        }

        let mut dirty: Vec<String> = snapshot.into_iter().collect();
        dirty.sort();
        tracing::debug!(notified, "tracker pass complete");
        PassReport {
            generation,
            depth,
            dirty,
            notified,
        }
    }
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DirtyTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("DirtyTracker")
            .field("dirty", &inner.dirty.len())
            .field("watchers", &inner.watchers.len())
            .field("generation", &inner.generation)
            .field("depth", &inner.depth)
            .finish()
    }
}

/// Restores the pass depth when a pass ends, including by unwinding.
struct DepthGuard<'a> {
    inner: &'a Rc<RefCell<TrackerInner>>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            inner.depth = inner.depth.saturating_sub(1);
        }
    }
}

/// RAII guard for a watch registration.
///
/// Dropping the handle (or calling [`unwatch`](Self::unwatch)) removes the
/// registration; the callback will not run again, even if the current pass
/// already selected it.
#[must_use = "dropping a WatchHandle unregisters the watcher"]
pub struct WatchHandle {
    id: WatchId,
    tracker: Weak<RefCell<TrackerInner>>,
    _callback: CallbackRc,
}

impl WatchHandle {
    /// The registration id.
    #[must_use]
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Unregister now. Same as dropping the handle.
    pub fn unwatch(self) {}
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        let Some(inner) = self.tracker.upgrade() else {
            return;
        };
        // A busy table prunes the dead entry on its next pass instead.
        if let Ok(mut inner) = inner.try_borrow_mut() {
            inner.watchers.retain(|w| w.id != self.id);
            tracing::trace!(watch = %self.id, "watch released");
        }
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle").field("id", &self.id).finish()
    }
}
