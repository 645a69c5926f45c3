//! Termination hooks.

use std::marker::PhantomData;

use crate::context::Context;
use crate::error::FromPanic;
use crate::lifetime::Lifetime;
use crate::observer::{self, Observer};
use crate::pipeline::{FnSubscriber, Lifter, Subscriber};

/// See [`finally`].
pub struct Finally<V, E, F> {
    hook: F,
    marker: PhantomData<fn(V, E)>,
}

impl<V, E, F: Clone> Clone for Finally<V, E, F> {
    fn clone(&self) -> Self {
        Self {
            hook: self.hook.clone(),
            marker: PhantomData,
        }
    }
}

/// A pass-through lifter that installs `hook` as a stop-hook on the
/// observer's lifetime, so it runs exactly once on any termination path:
/// completion, error, or cancellation.
#[must_use]
pub fn finally<V, E, F>(hook: F) -> Finally<V, E, F>
where
    F: FnOnce() + Clone + Send + Sync + 'static,
{
    Finally {
        hook,
        marker: PhantomData,
    }
}

impl<V, E, F> Lifter for Finally<V, E, F>
where
    V: 'static,
    E: FromPanic + 'static,
    F: FnOnce() + Clone + Send + Sync + 'static,
{
    type In = V;
    type Out = V;
    type Error = E;

    fn lift<S>(self, subscriber: S) -> impl Subscriber<Value = V, Error = E>
    where
        S: Subscriber<Value = V, Error = E>,
    {
        FnSubscriber::new(move |ctx: &Context| {
            let out = subscriber.create(ctx);
            let lifetime = Lifetime::new();
            ctx.lifetime().insert(&lifetime);
            lifetime.on_stop(self.hook);
            observer::delegating(out, lifetime, |out: &_, v: V| out.next(v))
        })
    }
}
