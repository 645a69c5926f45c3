//! Type-erased pipeline kinds.
//!
//! Every kind can be erased at a stage boundary, trading the monomorphized
//! fast path for a nameable type. Each erased form stores a callable that
//! closes over the concrete value, and re-implements its kind trait, so
//! erased and concrete stages compose freely in both directions.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::Context;
use crate::lifetime::Lifetime;
use crate::observer::{DynObserver, Observer, ObserverExt as _};

use super::{Adaptor, Lifter, Observable, Starter, StarterExt as _, Subscriber, Terminator};

/// An erased subscriber.
pub struct DynSubscriber<V: 'static, E: 'static> {
    inner: Arc<dyn Fn(&Context) -> DynObserver<V, E> + Send + Sync>,
}

impl<V, E> Clone for DynSubscriber<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: 'static, E: 'static> DynSubscriber<V, E> {
    /// Erases `subscriber`.
    #[must_use]
    pub fn from_subscriber<S>(subscriber: S) -> Self
    where
        S: Subscriber<Value = V, Error = E>,
    {
        Self {
            inner: Arc::new(move |ctx| subscriber.clone().create(ctx).into_dyn()),
        }
    }
}

impl<V: 'static, E: 'static> Subscriber for DynSubscriber<V, E> {
    type Value = V;
    type Error = E;

    fn create(
        self,
        ctx: &Context,
    ) -> impl Observer<Value = V, Error = E> + Clone + Send + Sync + 'static + use<V, E> {
        (self.inner)(ctx)
    }
}

/// An erased starter.
///
/// Starting it a second time is a programmer bug (a starter runs at most
/// once per context) and panics.
#[derive(Clone)]
pub struct DynStarter {
    inner: Arc<Mutex<Option<Box<dyn FnOnce(&Context) -> Lifetime + Send>>>>,
}

impl DynStarter {
    /// Erases `starter`.
    #[must_use]
    pub fn from_starter<S>(starter: S) -> Self
    where
        S: Starter + Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Some(Box::new(move |ctx: &Context| {
                starter.start(ctx)
            })))),
        }
    }
}

impl Starter for DynStarter {
    fn start(self, ctx: &Context) -> Lifetime {
        let start = self
            .inner
            .lock()
            .take()
            .expect("erased starter driven more than once");
        start(ctx)
    }
}

/// An erased observable.
pub struct DynObservable<V: 'static, E: 'static> {
    inner: Arc<dyn Fn(DynSubscriber<V, E>) -> DynStarter + Send + Sync>,
}

impl<V, E> Clone for DynObservable<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: 'static, E: 'static> DynObservable<V, E> {
    /// Erases `source`.
    #[must_use]
    pub fn from_observable<O>(source: O) -> Self
    where
        O: Observable<Value = V, Error = E>,
    {
        Self {
            inner: Arc::new(move |subscriber| source.clone().bind(subscriber).into_dyn()),
        }
    }
}

impl<V: 'static, E: 'static> Observable for DynObservable<V, E> {
    type Value = V;
    type Error = E;

    fn bind<S>(self, subscriber: S) -> impl Starter + Send + 'static
    where
        S: Subscriber<Value = V, Error = E>,
    {
        (self.inner)(DynSubscriber::from_subscriber(subscriber))
    }
}

/// An erased lifter.
pub struct DynLifter<In: 'static, Out: 'static, E: 'static> {
    inner: Arc<dyn Fn(DynSubscriber<Out, E>) -> DynSubscriber<In, E> + Send + Sync>,
}

impl<In, Out, E> Clone for DynLifter<In, Out, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<In: 'static, Out: 'static, E: 'static> DynLifter<In, Out, E> {
    /// Erases `lifter`.
    #[must_use]
    pub fn from_lifter<L>(lifter: L) -> Self
    where
        L: Lifter<In = In, Out = Out, Error = E>,
    {
        Self {
            inner: Arc::new(move |subscriber| {
                DynSubscriber::from_subscriber(lifter.clone().lift(subscriber))
            }),
        }
    }
}

impl<In: 'static, Out: 'static, E: 'static> Lifter for DynLifter<In, Out, E> {
    type In = In;
    type Out = Out;
    type Error = E;

    fn lift<S>(self, subscriber: S) -> impl Subscriber<Value = In, Error = E>
    where
        S: Subscriber<Value = Out, Error = E>,
    {
        (self.inner)(DynSubscriber::from_subscriber(subscriber))
    }
}

/// An erased terminator.
pub struct DynTerminator<V: 'static, E: 'static> {
    inner: Arc<dyn Fn(DynObservable<V, E>) -> DynStarter + Send + Sync>,
}

impl<V, E> Clone for DynTerminator<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: 'static, E: 'static> DynTerminator<V, E> {
    /// Erases `terminator`.
    #[must_use]
    pub fn from_terminator<T>(terminator: T) -> Self
    where
        T: Terminator<Value = V, Error = E>,
    {
        Self {
            inner: Arc::new(move |source| terminator.clone().terminate(source).into_dyn()),
        }
    }
}

impl<V: 'static, E: 'static> Terminator for DynTerminator<V, E> {
    type Value = V;
    type Error = E;

    fn terminate<O>(self, source: O) -> impl Starter + Send + 'static
    where
        O: Observable<Value = V, Error = E>,
    {
        (self.inner)(DynObservable::from_observable(source))
    }
}

/// An erased adaptor.
pub struct DynAdaptor<In: 'static, Out: 'static, E: 'static> {
    inner: Arc<dyn Fn(DynObservable<In, E>) -> DynObservable<Out, E> + Send + Sync>,
}

impl<In, Out, E> Clone for DynAdaptor<In, Out, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<In: 'static, Out: 'static, E: 'static> DynAdaptor<In, Out, E> {
    /// Erases `adaptor`.
    #[must_use]
    pub fn from_adaptor<A>(adaptor: A) -> Self
    where
        A: Adaptor<In = In, Out = Out, Error = E>,
    {
        Self {
            inner: Arc::new(move |source| {
                DynObservable::from_observable(adaptor.clone().adapt(source))
            }),
        }
    }
}

impl<In: 'static, Out: 'static, E: 'static> Adaptor for DynAdaptor<In, Out, E> {
    type In = In;
    type Out = Out;
    type Error = E;

    fn adapt<O>(self, source: O) -> impl Observable<Value = Out, Error = E>
    where
        O: Observable<Value = In, Error = E>,
    {
        (self.inner)(DynObservable::from_observable(source))
    }
}
