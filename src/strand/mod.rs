//! Strands: serial, time-ordered executors bound to a lifetime.
//!
//! A strand is the unit of serialization in the scheduler: every action
//! deferred onto one strand happens-before the next, in deadline order with
//! FIFO tie-breaking. Actions are observers whose value is a [`Rescheduler`]
//! handle; an action that calls [`Rescheduler::reschedule`] from its `next`
//! is re-queued at the new deadline (self-defer), otherwise the strand
//! delivers its `complete`.
//!
//! Three implementations live in the submodules: the [immediate
//! strand](immediate::ImmediateStrand) that blocks the caller inline, the
//! [run-loop](run_loop::RunLoop) draining a deadline heap, and the [thread
//! strand](thread::ThreadStrand) running a run-loop on a detached worker.
//! [`StrandFactory::shared`] coalesces derived strands onto one underlying
//! strand.

pub mod immediate;
pub mod run_loop;
pub mod shared;
pub mod thread;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Failure;
use crate::lifetime::Lifetime;
use crate::observer::{self, DynObserver, Observer, ObserverExt as _};
use crate::time::{ClockHandle, Time};

pub use immediate::ImmediateStrand;
pub use run_loop::RunLoop;
pub use thread::ThreadStrand;

/// An action scheduled on a strand: an erased observer receiving the
/// rescheduling handle on its next channel.
pub type Action = DynObserver<Rescheduler, Failure>;

/// Handle passed to a scheduled action; lets the action re-queue itself.
#[derive(Clone, Default)]
pub struct Rescheduler {
    at: Arc<Mutex<Option<Time>>>,
}

impl Rescheduler {
    /// Creates a handle with no pending reschedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the action run again at `at`.
    pub fn reschedule(&self, at: Time) {
        *self.at.lock() = Some(at);
    }

    /// Consumes the requested deadline, if any. Strand implementations call
    /// this after dispatching an action to decide between re-queueing it
    /// and delivering its completion.
    pub fn take(&self) -> Option<Time> {
        self.at.lock().take()
    }
}

/// A serial time-ordered executor bound to a lifetime.
///
/// Once the lifetime stops, no further action is invoked (invariant: a
/// strand never runs a scheduled observer after its own lifetime stops).
pub trait Strand: Send + Sync {
    /// The current instant on this strand's clock.
    fn now(&self) -> Time;

    /// Schedules `action` to run no earlier than `at`.
    fn defer_at(&self, at: Time, action: Action);

    /// The lifetime governing this strand.
    fn lifetime(&self) -> &Lifetime;
}

/// A shared strand handle.
pub type DynStrand = Arc<dyn Strand>;

impl<S: Strand + ?Sized> Strand for Arc<S> {
    fn now(&self) -> Time {
        (**self).now()
    }

    fn defer_at(&self, at: Time, action: Action) {
        (**self).defer_at(at, action);
    }

    fn lifetime(&self) -> &Lifetime {
        (**self).lifetime()
    }
}

/// A cloneable strand constructor: maps a lifetime to a new strand.
///
/// Producer factories and the multi-strand operators accept one of these;
/// the `immediate` flag drives the observe-on and shared-strand fast paths.
#[derive(Clone)]
pub struct StrandFactory {
    make: Arc<dyn Fn(Lifetime) -> DynStrand + Send + Sync>,
    immediate: bool,
}

impl core::fmt::Debug for StrandFactory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StrandFactory")
            .field("immediate", &self.immediate)
            .finish_non_exhaustive()
    }
}

impl StrandFactory {
    /// A factory producing immediate strands over `clock`.
    #[must_use]
    pub fn immediate(clock: ClockHandle) -> Self {
        Self {
            make: Arc::new(move |lifetime| {
                Arc::new(ImmediateStrand::new(lifetime, clock.clone())) as DynStrand
            }),
            immediate: true,
        }
    }

    /// A factory spawning a run-loop worker thread per strand.
    #[must_use]
    pub fn thread(clock: ClockHandle) -> Self {
        Self {
            make: Arc::new(move |lifetime| {
                Arc::new(ThreadStrand::spawn(lifetime, clock.clone())) as DynStrand
            }),
            immediate: false,
        }
    }

    /// A factory from an arbitrary constructor.
    #[must_use]
    pub fn from_fn(f: impl Fn(Lifetime) -> DynStrand + Send + Sync + 'static) -> Self {
        Self {
            make: Arc::new(f),
            immediate: false,
        }
    }

    /// Builds a strand governed by `lifetime`.
    #[must_use]
    pub fn make(&self, lifetime: Lifetime) -> DynStrand {
        (self.make)(lifetime)
    }

    /// True when this factory produces immediate strands; such strands
    /// execute inline, so posting onto them is a no-op worth skipping.
    #[must_use]
    pub const fn is_immediate(&self) -> bool {
        self.immediate
    }
}

/// Wraps a one-shot thunk as an [`Action`] that runs it on first dispatch.
pub(crate) fn once_action(f: impl FnOnce() + Send + 'static) -> Action {
    let slot = Arc::new(Mutex::new(Some(f)));
    observer::from_fns::<Rescheduler, Failure, _, _, _>(
        Lifetime::new(),
        move |_resched| {
            if let Some(f) = slot.lock().take() {
                f();
            }
        },
        |_err| {},
        || {},
    )
    .into_dyn()
}

/// Like [`once_action`], but the thunk is guaranteed to run: if the strand
/// drops the action without dispatching it (queue cleared at stop), the
/// thunk runs on the dropping thread instead. Lifetime teardown is routed
/// through these, and teardown must never be lost.
pub(crate) fn guaranteed_action(f: impl FnOnce() + Send + 'static) -> Action {
    struct Guard<F: FnOnce()> {
        f: Option<F>,
    }

    impl<F: FnOnce()> Guard<F> {
        fn run(&mut self) {
            if let Some(f) = self.f.take() {
                f();
            }
        }
    }

    impl<F: FnOnce()> Drop for Guard<F> {
        fn drop(&mut self) {
            self.run();
        }
    }

    let guard = Arc::new(Mutex::new(Guard { f: Some(f) }));
    observer::from_fns::<Rescheduler, Failure, _, _, _>(
        Lifetime::new(),
        move |_resched| guard.lock().run(),
        |_err| {},
        || {},
    )
    .into_dyn()
}

/// Schedules `action` to run as soon as possible.
pub fn defer<S: Strand + ?Sized>(strand: &S, action: Action) {
    strand.defer_at(strand.now(), action);
}

/// Schedules `action` to run no earlier than `at`.
pub fn defer_at<S: Strand + ?Sized>(strand: &S, at: Time, action: Action) {
    strand.defer_at(at, action);
}

/// Schedules `action` to run after `delay`.
pub fn defer_after<S: Strand + ?Sized>(strand: &S, delay: Duration, action: Action) {
    strand.defer_at(strand.now() + delay, action);
}

/// Emits monotonically increasing counts into `out` at `initial + n·period`.
///
/// Upstream errors reaching the periodic action are forwarded downstream
/// (`ErrorPolicy::Pass`); use [`defer_periodic_with_policy`] to choose.
pub fn defer_periodic<S, O>(strand: &S, initial: Time, period: Duration, out: O)
where
    S: Strand + ?Sized,
    O: Observer<Value = u64, Error = Failure> + Clone + Send + Sync + 'static,
{
    defer_periodic_with_policy(strand, initial, period, out, observer::ErrorPolicy::Pass);
}

/// [`defer_periodic`] with an explicit error policy for the periodic stage.
pub fn defer_periodic_with_policy<S, O>(
    strand: &S,
    initial: Time,
    period: Duration,
    out: O,
    policy: observer::ErrorPolicy,
) where
    S: Strand + ?Sized,
    O: Observer<Value = u64, Error = Failure> + Clone + Send + Sync + 'static,
{
    let ticker = Arc::new(Mutex::new((0u64, initial)));
    let lifetime = out.lifetime().clone();
    let action = observer::delegating_full(
        out,
        lifetime,
        move |out: &O, resched: Rescheduler| {
            if out.lifetime().is_stopped() {
                return;
            }
            let mut slot = ticker.lock();
            let (count, target) = &mut *slot;
            let emit = *count;
            *count += 1;
            *target = *target + period;
            let next_at = *target;
            drop(slot);
            out.next(emit);
            resched.reschedule(next_at);
        },
        move |out: &O, err| policy.route(out, err),
        |_out: &O| {},
    );
    strand.defer_at(initial, action.into_dyn());
}
