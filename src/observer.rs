//! Push sinks and their termination discipline.
//!
//! An observer is a sink bound to a [`Lifetime`] with three channels:
//! `next` for values, `error` and `complete` for the two terminal signals.
//! The discipline, implemented once here and inherited by every operator:
//!
//! - after either terminal signal fires, the observer's lifetime is stopped;
//! - every channel is a no-op once the lifetime is stopped, so at most one
//!   terminal signal is ever delivered;
//! - a panic inside a user `next` callback is captured and routed through
//!   the error channel;
//! - a panic inside an `error` or `complete` callback is a discipline
//!   violation and aborts the process.
//!
//! Two concrete flavors exist: the typed closure observers built by
//! [`from_fns`]/[`terminal`]/[`delegating`] (zero-cost, monomorphized into
//! the operator chain) and the erased [`DynObserver`] used at pipeline stage
//! boundaries. Delegating observers carry a downstream observer that is
//! handed to each callback, which lets operators re-emit without capturing
//! the downstream in every closure.

use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process;
use std::sync::Arc;

use tracing::error;

use crate::error::{FromPanic, PanicPayload};
use crate::lifetime::Lifetime;

/// A push sink bound to a lifetime.
pub trait Observer {
    /// The value type delivered on the next channel.
    type Value;
    /// The error type delivered on the error channel.
    type Error;

    /// The lifetime governing this observer.
    fn lifetime(&self) -> &Lifetime;

    /// Delivers a value. No-op once the lifetime is stopped.
    fn next(&self, value: Self::Value);

    /// Delivers the error terminal. Stops the lifetime.
    fn error(&self, error: Self::Error);

    /// Delivers the completion terminal. Stops the lifetime.
    fn complete(&self);
}

/// What a stage does with an upstream error or completion it relays.
///
/// `Pass` is the default everywhere a knob is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Treat the signal as a bug: abort the process.
    Fail,
    /// Forward to the downstream observer.
    #[default]
    Pass,
    /// Drop the signal.
    Ignore,
    /// Drop the signal (alias kept for stage-local configuration).
    Skip,
}

impl ErrorPolicy {
    /// Routes `err` toward `downstream` according to the policy.
    pub fn route<D: Observer>(self, downstream: &D, err: D::Error) {
        match self {
            Self::Fail => {
                error!("error reached a fail-policy stage; aborting");
                process::abort();
            }
            Self::Pass => downstream.error(err),
            Self::Ignore | Self::Skip => {}
        }
    }
}

/// Runs a terminal callback; a panic inside it aborts the process.
fn terminal_guard(channel: &'static str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!(channel, "terminal callback panicked; aborting");
        process::abort();
    }
}

/// A typed observer storing its callbacks directly.
pub struct FnObserver<V, E, N, EF, CF> {
    lifetime: Lifetime,
    on_next: N,
    on_error: EF,
    on_complete: CF,
    marker: PhantomData<fn(V, E)>,
}

impl<V, E, N: Clone, EF: Clone, CF: Clone> Clone for FnObserver<V, E, N, EF, CF> {
    fn clone(&self) -> Self {
        Self {
            lifetime: self.lifetime.clone(),
            on_next: self.on_next.clone(),
            on_error: self.on_error.clone(),
            on_complete: self.on_complete.clone(),
            marker: PhantomData,
        }
    }
}

impl<V, E, N, EF, CF> Observer for FnObserver<V, E, N, EF, CF>
where
    E: FromPanic,
    N: Fn(V),
    EF: Fn(E),
    CF: Fn(),
{
    type Value = V;
    type Error = E;

    fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    fn next(&self, value: V) {
        if self.lifetime.is_stopped() {
            return;
        }
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (self.on_next)(value))) {
            self.error(E::from_panic(PanicPayload::new(payload)));
        }
    }

    fn error(&self, err: E) {
        if self.lifetime.is_stopped() {
            return;
        }
        terminal_guard("error", || (self.on_error)(err));
        self.lifetime.stop();
    }

    fn complete(&self) {
        if self.lifetime.is_stopped() {
            return;
        }
        terminal_guard("complete", || (self.on_complete)());
        self.lifetime.stop();
    }
}

/// A typed observer that hands a downstream delegatee to its callbacks.
pub struct DelegatingObserver<V, E, D, N, EF, CF> {
    delegate: D,
    lifetime: Lifetime,
    on_next: N,
    on_error: EF,
    on_complete: CF,
    marker: PhantomData<fn(V, E)>,
}

impl<V, E, D: Clone, N: Clone, EF: Clone, CF: Clone> Clone
    for DelegatingObserver<V, E, D, N, EF, CF>
{
    fn clone(&self) -> Self {
        Self {
            delegate: self.delegate.clone(),
            lifetime: self.lifetime.clone(),
            on_next: self.on_next.clone(),
            on_error: self.on_error.clone(),
            on_complete: self.on_complete.clone(),
            marker: PhantomData,
        }
    }
}

impl<V, E, D, N, EF, CF> Observer for DelegatingObserver<V, E, D, N, EF, CF>
where
    E: FromPanic,
    N: Fn(&D, V),
    EF: Fn(&D, E),
    CF: Fn(&D),
{
    type Value = V;
    type Error = E;

    fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    fn next(&self, value: V) {
        if self.lifetime.is_stopped() {
            return;
        }
        if let Err(payload) =
            catch_unwind(AssertUnwindSafe(|| (self.on_next)(&self.delegate, value)))
        {
            self.error(E::from_panic(PanicPayload::new(payload)));
        }
    }

    fn error(&self, err: E) {
        if self.lifetime.is_stopped() {
            return;
        }
        terminal_guard("error", || (self.on_error)(&self.delegate, err));
        self.lifetime.stop();
    }

    fn complete(&self) {
        if self.lifetime.is_stopped() {
            return;
        }
        terminal_guard("complete", || (self.on_complete)(&self.delegate));
        self.lifetime.stop();
    }
}

/// Builds a typed observer from explicit callbacks.
pub fn from_fns<V, E, N, EF, CF>(
    lifetime: Lifetime,
    next: N,
    error: EF,
    complete: CF,
) -> FnObserver<V, E, N, EF, CF>
where
    E: FromPanic,
    N: Fn(V),
    EF: Fn(E),
    CF: Fn(),
{
    FnObserver {
        lifetime,
        on_next: next,
        on_error: error,
        on_complete: complete,
        marker: PhantomData,
    }
}

/// Builds a terminal observer: unexpected errors abort, completion is silent.
pub fn terminal<V, E, N>(
    lifetime: Lifetime,
    next: N,
) -> FnObserver<V, E, N, impl Fn(E) + Clone + Send + Sync + 'static, impl Fn() + Clone + Send + Sync + 'static>
where
    E: FromPanic,
    N: Fn(V),
{
    from_fns(
        lifetime,
        next,
        |_err: E| {
            error!("unhandled pipeline error reached a terminal observer; aborting");
            process::abort();
        },
        || {},
    )
}

/// Builds a delegating observer from explicit callbacks.
pub fn delegating_full<V, E, D, N, EF, CF>(
    delegate: D,
    lifetime: Lifetime,
    next: N,
    error: EF,
    complete: CF,
) -> DelegatingObserver<V, E, D, N, EF, CF>
where
    E: FromPanic,
    D: Observer,
    N: Fn(&D, V),
    EF: Fn(&D, E),
    CF: Fn(&D),
{
    DelegatingObserver {
        delegate,
        lifetime,
        on_next: next,
        on_error: error,
        on_complete: complete,
        marker: PhantomData,
    }
}

/// Builds a delegating observer that forwards errors and completion
/// downstream (the default for chained stages).
pub fn delegating<V, E, D, N>(
    delegate: D,
    lifetime: Lifetime,
    next: N,
) -> DelegatingObserver<
    V,
    E,
    D,
    N,
    impl Fn(&D, E) + Clone + Send + Sync + 'static,
    impl Fn(&D) + Clone + Send + Sync + 'static,
>
where
    E: FromPanic,
    D: Observer<Error = E>,
    N: Fn(&D, V),
{
    delegating_full(
        delegate,
        lifetime,
        next,
        |d: &D, e: E| d.error(e),
        |d: &D| d.complete(),
    )
}

/// An observer that is one of two concrete flavors.
///
/// Lets a fast path and a general path of one operator return a single
/// concrete type without erasing either side.
#[derive(Clone)]
pub enum EitherObserver<A, B> {
    /// The first flavor.
    Left(A),
    /// The second flavor.
    Right(B),
}

impl<A, B> Observer for EitherObserver<A, B>
where
    A: Observer,
    B: Observer<Value = A::Value, Error = A::Error>,
{
    type Value = A::Value;
    type Error = A::Error;

    fn lifetime(&self) -> &Lifetime {
        match self {
            Self::Left(a) => a.lifetime(),
            Self::Right(b) => b.lifetime(),
        }
    }

    fn next(&self, value: Self::Value) {
        match self {
            Self::Left(a) => a.next(value),
            Self::Right(b) => b.next(value),
        }
    }

    fn error(&self, err: Self::Error) {
        match self {
            Self::Left(a) => a.error(err),
            Self::Right(b) => b.error(err),
        }
    }

    fn complete(&self) {
        match self {
            Self::Left(a) => a.complete(),
            Self::Right(b) => b.complete(),
        }
    }
}

/// Object-safe core used by the erased observer flavor.
trait RawObserver<V, E>: Send + Sync {
    fn raw_next(&self, value: V);
    fn raw_error(&self, err: E);
    fn raw_complete(&self);
}

impl<O> RawObserver<O::Value, O::Error> for O
where
    O: Observer + Send + Sync,
{
    fn raw_next(&self, value: O::Value) {
        self.next(value);
    }

    fn raw_error(&self, err: O::Error) {
        self.error(err);
    }

    fn raw_complete(&self) {
        self.complete();
    }
}

/// The erased observer flavor used at pipeline stage boundaries.
pub struct DynObserver<V, E> {
    lifetime: Lifetime,
    inner: Arc<dyn RawObserver<V, E>>,
}

impl<V, E> Clone for DynObserver<V, E> {
    fn clone(&self) -> Self {
        Self {
            lifetime: self.lifetime.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<V, E> Observer for DynObserver<V, E> {
    type Value = V;
    type Error = E;

    fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    fn next(&self, value: V) {
        self.inner.raw_next(value);
    }

    fn error(&self, err: E) {
        self.inner.raw_error(err);
    }

    fn complete(&self) {
        self.inner.raw_complete();
    }
}

/// Erasure adapter available on every observer.
pub trait ObserverExt: Observer + Sized {
    /// Erases the concrete observer type.
    fn into_dyn(self) -> DynObserver<Self::Value, Self::Error>
    where
        Self: Send + Sync + 'static,
        Self::Value: 'static,
        Self::Error: 'static,
    {
        DynObserver {
            lifetime: self.lifetime().clone(),
            inner: Arc::new(self),
        }
    }
}

impl<O: Observer> ObserverExt for O {}
