//! The composition algebra: five producer/consumer kinds and a starter.
//!
//! Every pipeline is assembled from pure values of six kinds. Composing two
//! of them always yields exactly one kind, per this table:
//!
//! | left | right | result | method |
//! |---|---|---|---|
//! | `Observable` | `Lifter` | `Observable` | [`ObservableExt::lift`] |
//! | `Observable` | `Subscriber` | `Starter` | [`ObservableExt::subscribe`] |
//! | `Observable` | `Adaptor` | `Observable` | [`ObservableExt::adapt`] |
//! | `Observable` | `Terminator` | `Starter` | [`ObservableExt::terminate`] |
//! | `Lifter` | `Subscriber` | `Subscriber` | [`LifterExt::apply`] |
//! | `Lifter` | `Lifter` | `Lifter` | [`LifterExt::then`] |
//! | `Lifter` | `Adaptor` | `Adaptor` | [`LifterExt::then_adapt`] |
//! | `Adaptor` | `Lifter` | `Adaptor` | [`AdaptorExt::then_lift`] |
//! | `Adaptor` | `Subscriber` | `Terminator` | [`AdaptorExt::fuse`] |
//! | `Adaptor` | `Adaptor` | `Adaptor` | [`AdaptorExt::then`] |
//! | `Starter` | `Context` | `Lifetime` | [`Starter::start`] |
//! | any kind | — | erased kind | `into_dyn` |
//!
//! A [`Starter`] is the only thing that can become a running computation,
//! and running one requires a [`Context`]. Chains of concrete operators
//! monomorphize into one call chain; erasure happens only at explicit
//! `into_dyn` boundaries (see [`boxed`]).

pub mod boxed;
pub mod compose;

use std::marker::PhantomData;

use crate::context::Context;
use crate::lifetime::Lifetime;
use crate::observer::Observer;

pub use boxed::{DynAdaptor, DynLifter, DynObservable, DynStarter, DynSubscriber, DynTerminator};
pub use compose::{
    Adapted, AdaptedLifter, Applied, ChainedAdaptor, ChainedLifter, Fused, Lifted, LiftedAdaptor,
    Subscribed, Terminated,
};

/// A producer recipe: binds a consumer recipe into a startable program.
pub trait Observable: Clone + Send + Sync + Sized + 'static {
    /// The value type this producer emits.
    type Value;
    /// The error type this producer may emit.
    type Error;

    /// Binds `subscriber` to this producer, yielding a startable program.
    fn bind<S>(self, subscriber: S) -> impl Starter + Send + 'static
    where
        S: Subscriber<Value = Self::Value, Error = Self::Error>;
}

/// A consumer recipe: given a context, yields the observer to push into.
pub trait Subscriber: Clone + Send + Sync + Sized + 'static {
    /// The value type this consumer accepts.
    type Value;
    /// The error type this consumer accepts.
    type Error;

    /// Builds the observer for one binding.
    fn create(
        self,
        ctx: &Context,
    ) -> impl Observer<Value = Self::Value, Error = Self::Error> + Clone + Send + Sync + 'static + use<Self>;
}

/// A subscriber transformer: wraps the sink side of a pipeline stage.
pub trait Lifter: Clone + Send + Sync + Sized + 'static {
    /// The value type the lifted subscriber accepts (upstream side).
    type In;
    /// The value type the inner subscriber accepts (downstream side).
    type Out;
    /// The error type carried through the stage.
    type Error;

    /// Wraps `subscriber`, yielding the upstream-facing subscriber.
    fn lift<S>(self, subscriber: S) -> impl Subscriber<Value = Self::In, Error = Self::Error>
    where
        S: Subscriber<Value = Self::Out, Error = Self::Error>;
}

/// An observable transformer: wraps the source side of a pipeline stage.
pub trait Adaptor: Clone + Send + Sync + Sized + 'static {
    /// The value type of the source being adapted.
    type In;
    /// The value type of the adapted source.
    type Out;
    /// The error type carried through the stage.
    type Error;

    /// Wraps `source`, yielding the adapted producer.
    fn adapt<O>(self, source: O) -> impl Observable<Value = Self::Out, Error = Self::Error>
    where
        O: Observable<Value = Self::In, Error = Self::Error>;
}

/// An adaptor fused to a subscriber; composes with an observable into a
/// startable program.
pub trait Terminator: Clone + Send + Sync + Sized + 'static {
    /// The value type of the source this terminator consumes.
    type Value;
    /// The error type of the source this terminator consumes.
    type Error;

    /// Consumes `source`, yielding a startable program.
    fn terminate<O>(self, source: O) -> impl Starter + Send + 'static
    where
        O: Observable<Value = Self::Value, Error = Self::Error>;
}

/// A bound program. Starting it builds the observer chain, runs the
/// producer, and returns the context's lifetime.
pub trait Starter: Sized {
    /// Runs the program under `ctx`. Invoke at most once per context.
    fn start(self, ctx: &Context) -> Lifetime;
}

/// A subscriber built from a closure over the binding context.
pub struct FnSubscriber<F, O> {
    create: F,
    marker: PhantomData<fn() -> O>,
}

impl<F: Clone, O> Clone for FnSubscriber<F, O> {
    fn clone(&self) -> Self {
        Self {
            create: self.create.clone(),
            marker: PhantomData,
        }
    }
}

impl<F, O> FnSubscriber<F, O>
where
    F: FnOnce(&Context) -> O + Clone + Send + Sync + 'static,
    O: Observer + Clone + Send + Sync + 'static,
{
    /// Wraps `create` as a subscriber.
    pub fn new(create: F) -> Self {
        Self {
            create,
            marker: PhantomData,
        }
    }
}

impl<F, O> Subscriber for FnSubscriber<F, O>
where
    F: FnOnce(&Context) -> O + Clone + Send + Sync + 'static,
    O: Observer + Clone + Send + Sync + 'static,
{
    type Value = O::Value;
    type Error = O::Error;

    fn create(
        self,
        ctx: &Context,
    ) -> impl Observer<Value = Self::Value, Error = Self::Error> + Clone + Send + Sync + 'static + use<F, O>
    {
        (self.create)(ctx)
    }
}

/// A starter built from a closure over the starting context.
pub struct FnStarter<F> {
    start: F,
}

impl<F> FnStarter<F>
where
    F: FnOnce(&Context) -> Lifetime,
{
    /// Wraps `start` as a starter.
    pub fn new(start: F) -> Self {
        Self { start }
    }
}

impl<F> Starter for FnStarter<F>
where
    F: FnOnce(&Context) -> Lifetime,
{
    fn start(self, ctx: &Context) -> Lifetime {
        (self.start)(ctx)
    }
}

/// Compositions available on every observable.
pub trait ObservableExt: Observable {
    /// `Observable | Lifter -> Observable`.
    fn lift<L>(self, lifter: L) -> Lifted<Self, L>
    where
        L: Lifter<In = Self::Value, Error = Self::Error>,
    {
        Lifted::new(self, lifter)
    }

    /// `Observable | Adaptor -> Observable`.
    fn adapt<A>(self, adaptor: A) -> Adapted<Self, A>
    where
        A: Adaptor<In = Self::Value, Error = Self::Error>,
    {
        Adapted::new(self, adaptor)
    }

    /// `Observable | Subscriber -> Starter`.
    fn subscribe<S>(self, subscriber: S) -> Subscribed<Self, S>
    where
        S: Subscriber<Value = Self::Value, Error = Self::Error>,
    {
        Subscribed::new(self, subscriber)
    }

    /// `Observable | Terminator -> Starter`.
    fn terminate<T>(self, terminator: T) -> Terminated<Self, T>
    where
        T: Terminator<Value = Self::Value, Error = Self::Error>,
    {
        Terminated::new(self, terminator)
    }

    /// Erases the concrete observable type.
    fn into_dyn(self) -> DynObservable<Self::Value, Self::Error>
    where
        Self::Value: 'static,
        Self::Error: 'static,
    {
        DynObservable::from_observable(self)
    }
}

impl<T: Observable> ObservableExt for T {}

/// Erasure available on every subscriber.
pub trait SubscriberExt: Subscriber {
    /// Erases the concrete subscriber type.
    fn into_dyn(self) -> DynSubscriber<Self::Value, Self::Error>
    where
        Self::Value: 'static,
        Self::Error: 'static,
    {
        DynSubscriber::from_subscriber(self)
    }
}

impl<T: Subscriber> SubscriberExt for T {}

/// Compositions available on every lifter.
pub trait LifterExt: Lifter {
    /// `Lifter | Lifter -> Lifter`.
    fn then<L>(self, next: L) -> ChainedLifter<Self, L>
    where
        L: Lifter<In = Self::Out, Error = Self::Error>,
    {
        ChainedLifter::new(self, next)
    }

    /// `Lifter | Subscriber -> Subscriber`.
    fn apply<S>(self, subscriber: S) -> Applied<Self, S>
    where
        S: Subscriber<Value = Self::Out, Error = Self::Error>,
    {
        Applied::new(self, subscriber)
    }

    /// `Lifter | Adaptor -> Adaptor`.
    fn then_adapt<A>(self, adaptor: A) -> LiftedAdaptor<Self, A>
    where
        A: Adaptor<In = Self::Out, Error = Self::Error>,
    {
        LiftedAdaptor::new(self, adaptor)
    }

    /// Erases the concrete lifter type.
    fn into_dyn(self) -> DynLifter<Self::In, Self::Out, Self::Error>
    where
        Self::In: 'static,
        Self::Out: 'static,
        Self::Error: 'static,
    {
        DynLifter::from_lifter(self)
    }
}

impl<T: Lifter> LifterExt for T {}

/// Compositions available on every adaptor.
pub trait AdaptorExt: Adaptor {
    /// `Adaptor | Adaptor -> Adaptor`.
    fn then<A>(self, next: A) -> ChainedAdaptor<Self, A>
    where
        A: Adaptor<In = Self::Out, Error = Self::Error>,
    {
        ChainedAdaptor::new(self, next)
    }

    /// `Adaptor | Lifter -> Adaptor`.
    fn then_lift<L>(self, lifter: L) -> AdaptedLifter<Self, L>
    where
        L: Lifter<In = Self::Out, Error = Self::Error>,
    {
        AdaptedLifter::new(self, lifter)
    }

    /// `Adaptor | Subscriber -> Terminator`.
    fn fuse<S>(self, subscriber: S) -> Fused<Self, S>
    where
        S: Subscriber<Value = Self::Out, Error = Self::Error>,
    {
        Fused::new(self, subscriber)
    }

    /// Erases the concrete adaptor type.
    fn into_dyn(self) -> DynAdaptor<Self::In, Self::Out, Self::Error>
    where
        Self::In: 'static,
        Self::Out: 'static,
        Self::Error: 'static,
    {
        DynAdaptor::from_adaptor(self)
    }
}

impl<T: Adaptor> AdaptorExt for T {}

/// Erasure available on every terminator.
pub trait TerminatorExt: Terminator {
    /// Erases the concrete terminator type.
    fn into_dyn(self) -> DynTerminator<Self::Value, Self::Error>
    where
        Self::Value: 'static,
        Self::Error: 'static,
    {
        DynTerminator::from_terminator(self)
    }
}

impl<T: Terminator> TerminatorExt for T {}

/// Erasure available on every starter.
pub trait StarterExt: Starter {
    /// Erases the concrete starter type.
    fn into_dyn(self) -> DynStarter
    where
        Self: Send + 'static,
    {
        DynStarter::from_starter(self)
    }
}

impl<T: Starter> StarterExt for T {}
