//! The binding environment threaded through pipeline composition.
//!
//! A [`Context`] carries the lifetime a program runs under, the strand
//! factory used to derive executors, the clock, one held strand created at
//! construction, and an optional user payload. Operators that move work
//! between executors rebind with [`Context::with_lifetime`] or
//! [`Context::with_strand_factory`]; both produce a fresh strand from the
//! factory, as rebinding always did in the original design.
//!
//! Constructing a context installs a defer routing on its lifetime so that
//! stop teardown is posted onto the held strand — stop callbacks run
//! serialized with data callbacks. The posted thunk is guaranteed: if the
//! strand is already stopped (or stops before dispatch), the teardown runs
//! on the thread that drops the queued action instead of being lost.

use std::any::Any;
use std::sync::Arc;

use tracing::trace;

use crate::lifetime::Lifetime;
use crate::strand::{defer, guaranteed_action, Action, DynStrand, Strand, StrandFactory};
use crate::time::{ClockHandle, MonotonicClock, Time};

/// Lifetime + strand factory + clock + held strand + optional payload.
#[derive(Clone)]
pub struct Context {
    lifetime: Lifetime,
    factory: StrandFactory,
    clock: ClockHandle,
    strand: DynStrand,
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl Context {
    /// Creates a context under `lifetime`, deriving one strand from
    /// `factory` and routing `lifetime`'s stop teardown onto it.
    #[must_use]
    pub fn new(lifetime: Lifetime, factory: StrandFactory, clock: ClockHandle) -> Self {
        let strand = factory.make(Lifetime::new());
        lifetime.insert(strand.lifetime());

        let defer_target = strand.clone();
        lifetime.bind_defer(Arc::new(move |thunk| {
            defer(&defer_target, guaranteed_action(thunk));
        }));
        trace!(lifetime = %lifetime.id(), "context created");

        Self {
            lifetime,
            factory,
            clock,
            strand,
            payload: None,
        }
    }

    /// Creates a root context under a fresh lifetime.
    #[must_use]
    pub fn root(factory: StrandFactory, clock: ClockHandle) -> Self {
        Self::new(Lifetime::new(), factory, clock)
    }

    /// Creates a root context over an immediate strand and a monotonic
    /// clock — the default environment for starting a pipeline.
    #[must_use]
    pub fn immediate() -> Self {
        let clock = MonotonicClock::handle();
        Self::root(StrandFactory::immediate(clock.clone()), clock)
    }

    /// Attaches a user payload visible to every stage bound with this
    /// context (and with contexts rebound from it).
    #[must_use]
    pub fn with_payload<T: Send + Sync + 'static>(mut self, payload: T) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    /// Returns the payload if one of type `T` was attached.
    #[must_use]
    pub fn payload<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.payload.clone()?.downcast::<T>().ok()
    }

    /// The lifetime this context's program runs under.
    #[must_use]
    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    /// The factory used to derive strands.
    #[must_use]
    pub fn factory(&self) -> &StrandFactory {
        &self.factory
    }

    /// The clock strands schedule against.
    #[must_use]
    pub fn clock(&self) -> &ClockHandle {
        &self.clock
    }

    /// The strand held by this context.
    #[must_use]
    pub fn strand(&self) -> &DynStrand {
        &self.strand
    }

    /// The current instant on the held strand's clock.
    #[must_use]
    pub fn now(&self) -> Time {
        self.strand.now()
    }

    /// Schedules `action` on the held strand.
    pub fn defer_at(&self, at: Time, action: Action) {
        self.strand.defer_at(at, action);
    }

    /// Clones this context under a new lifetime (fresh strand, same
    /// factory, clock, and payload).
    #[must_use]
    pub fn with_lifetime(&self, lifetime: Lifetime) -> Self {
        let mut ctx = Self::new(lifetime, self.factory.clone(), self.clock.clone());
        ctx.payload = self.payload.clone();
        ctx
    }

    /// Clones this context under a new lifetime, swapping the strand
    /// factory. This is how work moves between executors.
    #[must_use]
    pub fn with_strand_factory(&self, lifetime: Lifetime, factory: StrandFactory) -> Self {
        let mut ctx = Self::new(lifetime, factory, self.clock.clone());
        ctx.payload = self.payload.clone();
        ctx
    }
}

impl Strand for Context {
    fn now(&self) -> Time {
        self.strand.now()
    }

    fn defer_at(&self, at: Time, action: Action) {
        self.strand.defer_at(at, action);
    }

    fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }
}
