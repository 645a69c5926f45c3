//! The cancellation graph.
//!
//! A [`Lifetime`] is the scope of an async operation. It holds nested child
//! lifetimes, stop-hooks, and the destructors of state pinned to it (see
//! [`crate::state`]). Stopping a lifetime is idempotent and tears the scope
//! down in a fixed order: children first (each stopped and joined), then
//! stop-hooks, then owned state, then joiners are signaled.
//!
//! Handles are cheap to clone and safe to share across threads. Parent
//! handles own their children strongly; the child's auto-erase back-reference
//! is weak, so the graph cannot leak through the parent/child cycle.

use core::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

static NEXT_LIFETIME_ID: AtomicU64 = AtomicU64::new(1);

/// A unique identifier for a lifetime, used for ordering and log correlation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LifetimeId(u64);

impl fmt::Debug for LifetimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LifetimeId({})", self.0)
    }
}

impl fmt::Display for LifetimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Routes a lifetime's stop teardown onto an executor of the caller's choice.
///
/// Installed with [`Lifetime::bind_defer`]; the default routing runs the
/// teardown inline on whichever thread called `stop`.
pub type DeferRunner = Arc<dyn Fn(Box<dyn FnOnce() + Send>) + Send + Sync>;

type Hook = Box<dyn FnOnce() + Send>;

struct Lists {
    children: Vec<Lifetime>,
    hooks: Vec<Hook>,
    destructors: Vec<Hook>,
    defer: Option<DeferRunner>,
    teardown_thread: Option<ThreadId>,
    torn_down: bool,
}

struct Inner {
    id: LifetimeId,
    stopped: AtomicBool,
    lists: Mutex<Lists>,
    joiners: Condvar,
}

/// A cancellation scope node.
///
/// See the [module documentation](self) for the teardown protocol.
#[derive(Clone)]
pub struct Lifetime {
    inner: Arc<Inner>,
}

/// A non-owning handle to a [`Lifetime`].
#[derive(Clone)]
pub struct WeakLifetime {
    inner: Weak<Inner>,
}

impl WeakLifetime {
    /// Upgrades to a strong handle if the lifetime is still referenced.
    #[must_use]
    pub fn upgrade(&self) -> Option<Lifetime> {
        self.inner.upgrade().map(|inner| Lifetime { inner })
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifetime {
    /// Creates a fresh, unstopped lifetime.
    #[must_use]
    pub fn new() -> Self {
        let id = LifetimeId(NEXT_LIFETIME_ID.fetch_add(1, Ordering::Relaxed));
        trace!(lifetime = %id, "new lifetime");
        Self {
            inner: Arc::new(Inner {
                id,
                stopped: AtomicBool::new(false),
                lists: Mutex::new(Lists {
                    children: Vec::new(),
                    hooks: Vec::new(),
                    destructors: Vec::new(),
                    defer: None,
                    teardown_thread: None,
                    torn_down: false,
                }),
                joiners: Condvar::new(),
            }),
        }
    }

    /// Returns this lifetime's identifier.
    #[must_use]
    pub fn id(&self) -> LifetimeId {
        self.inner.id
    }

    /// Returns a non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakLifetime {
        WeakLifetime {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    ///
    /// Monotonic: once true, never false again. Work scoped to this lifetime
    /// polls this to exit loops.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Nests `child` inside this lifetime.
    ///
    /// Stopping this lifetime stops `child`. When `child` stops on its own it
    /// erases itself from this lifetime through a weak back-reference. If
    /// this lifetime is already stopped, `child` is stopped immediately.
    ///
    /// # Panics
    ///
    /// Panics when `child` is this lifetime itself; self-nesting is a
    /// programmer bug.
    pub fn insert(&self, child: &Lifetime) {
        assert!(
            self.id() != child.id(),
            "lifetime {} inserted into itself",
            self.id()
        );
        if self.is_stopped() {
            child.stop();
            return;
        }
        self.inner.lists.lock().children.push(child.clone());

        // Unnest when the child stops first. Both ends are weak so the hook
        // keeps neither side alive.
        let parent = self.downgrade();
        let child_weak = child.downgrade();
        child.on_stop(move || {
            if let (Some(parent), Some(child)) = (parent.upgrade(), child_weak.upgrade()) {
                parent.erase(&child);
            }
        });
    }

    /// Removes `child` from this lifetime without stopping it.
    ///
    /// # Panics
    ///
    /// Panics when `child` is this lifetime itself.
    pub fn erase(&self, child: &Lifetime) {
        assert!(
            self.id() != child.id(),
            "lifetime {} erased from itself",
            self.id()
        );
        if self.is_stopped() {
            return;
        }
        self.inner
            .lists
            .lock()
            .children
            .retain(|c| c.id() != child.id());
    }

    /// Registers a hook to run when this lifetime stops.
    ///
    /// If the lifetime is already stopped the hook runs immediately on the
    /// calling thread.
    pub fn on_stop(&self, hook: impl FnOnce() + Send + 'static) {
        {
            let mut lists = self.inner.lists.lock();
            if !self.is_stopped() {
                lists.hooks.push(Box::new(hook));
                return;
            }
        }
        hook();
    }

    /// Registers a destructor entry for state owned by this lifetime.
    ///
    /// Returns false when the lifetime is already stopped, in which case the
    /// entry was not recorded and the caller should release the state itself.
    pub(crate) fn push_destructor(&self, destructor: Hook) -> bool {
        let mut lists = self.inner.lists.lock();
        if self.is_stopped() {
            return false;
        }
        lists.destructors.push(destructor);
        true
    }

    /// Installs an alternative execution routing for the stop protocol.
    ///
    /// When present, `stop` hands the teardown thunk to `runner` instead of
    /// running it inline; contexts use this to serialize teardown with data
    /// callbacks on their strand. No-op on a stopped lifetime. The routing is
    /// cleared at the end of teardown.
    pub fn bind_defer(&self, runner: DeferRunner) {
        let mut lists = self.inner.lists.lock();
        if self.is_stopped() {
            return;
        }
        lists.defer = Some(runner);
    }

    /// Stops this lifetime.
    ///
    /// The first call flips the stopped flag and routes the teardown through
    /// the installed defer routing (inline when none). Re-entrant and repeat
    /// calls are no-ops.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        trace!(lifetime = %self.id(), "lifetime stopped");
        let runner = self.inner.lists.lock().defer.clone();
        match runner {
            Some(run) => {
                let this = self.clone();
                run(Box::new(move || this.teardown()));
            }
            None => self.teardown(),
        }
    }

    /// Blocks until this lifetime's stop teardown has signaled completion.
    ///
    /// Calling `join` before `stop` waits for a future stop. Calling it from
    /// the thread currently executing this lifetime's teardown returns
    /// immediately instead of deadlocking.
    pub fn join(&self) {
        let mut lists = self.inner.lists.lock();
        if lists.torn_down {
            return;
        }
        if lists.teardown_thread == Some(thread::current().id()) {
            return;
        }
        while !lists.torn_down {
            self.inner.joiners.wait(&mut lists);
        }
    }

    fn teardown(&self) {
        self.inner.lists.lock().teardown_thread = Some(thread::current().id());

        // Children first. Drained one at a time so no callback ever runs
        // under the list lock.
        loop {
            let child = self.inner.lists.lock().children.pop();
            let Some(child) = child else { break };
            child.stop();
            child.join();
        }

        let hooks = mem::take(&mut self.inner.lists.lock().hooks);
        for hook in hooks.into_iter().rev() {
            hook();
        }

        let destructors = mem::take(&mut self.inner.lists.lock().destructors);
        for destructor in destructors.into_iter().rev() {
            destructor();
        }

        {
            let mut lists = self.inner.lists.lock();
            lists.defer = None;
            lists.teardown_thread = None;
            lists.torn_down = true;
        }
        self.inner.joiners.notify_all();
        trace!(lifetime = %self.id(), "lifetime torn down");
    }
}

impl PartialEq for Lifetime {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Lifetime {}

impl PartialOrd for Lifetime {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lifetime {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.id().cmp(&other.id())
    }
}

impl core::hash::Hash for Lifetime {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("id", &self.id())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
