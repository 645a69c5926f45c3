//! Pointwise transformation.

use std::marker::PhantomData;

use tracing::trace;

use crate::context::Context;
use crate::error::FromPanic;
use crate::lifetime::Lifetime;
use crate::observer::{self, Observer};
use crate::pipeline::{FnSubscriber, Lifter, Subscriber};

/// See [`map`].
pub struct Map<V, W, E, F> {
    f: F,
    marker: PhantomData<fn(V, W, E)>,
}

impl<V, W, E, F: Clone> Clone for Map<V, W, E, F> {
    fn clone(&self) -> Self {
        Self {
            f: self.f.clone(),
            marker: PhantomData,
        }
    }
}

/// A lifter emitting `f(v)` for each input value.
#[must_use]
pub fn map<V, W, E, F>(f: F) -> Map<V, W, E, F>
where
    F: Fn(V) -> W + Clone + Send + Sync + 'static,
{
    Map {
        f,
        marker: PhantomData,
    }
}

impl<V, W, E, F> Lifter for Map<V, W, E, F>
where
    V: 'static,
    W: 'static,
    E: FromPanic + 'static,
    F: Fn(V) -> W + Clone + Send + Sync + 'static,
{
    type In = V;
    type Out = W;
    type Error = E;

    fn lift<S>(self, subscriber: S) -> impl Subscriber<Value = V, Error = E>
    where
        S: Subscriber<Value = W, Error = E>,
    {
        trace!("map bound to subscriber");
        FnSubscriber::new(move |ctx: &Context| {
            let out = subscriber.create(ctx);
            let lifetime = Lifetime::new();
            ctx.lifetime().insert(&lifetime);
            let f = self.f;
            observer::delegating(out, lifetime, move |out: &_, v: V| out.next(f(v)))
        })
    }
}
