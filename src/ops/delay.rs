//! Time shifting.

use std::marker::PhantomData;
use std::time::Duration;

use tracing::trace;

use crate::context::Context;
use crate::error::FromPanic;
use crate::lifetime::Lifetime;
use crate::observer::{self, Observer};
use crate::pipeline::{FnSubscriber, Lifter, Subscriber};
use crate::strand::{defer_after, once_action, StrandFactory};

/// See [`delay`].
pub struct Delay<V, E> {
    factory: StrandFactory,
    delay: Duration,
    marker: PhantomData<fn(V, E)>,
}

impl<V, E> Clone for Delay<V, E> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            delay: self.delay,
            marker: PhantomData,
        }
    }
}

/// A lifter rescheduling every signal (value, error, and completion)
/// `delay` later on a strand derived from `factory`. The relative order of
/// signals from one upstream is preserved because they all land on that one
/// serial strand.
#[must_use]
pub fn delay<V, E>(factory: StrandFactory, delay: Duration) -> Delay<V, E> {
    Delay {
        factory,
        delay,
        marker: PhantomData,
    }
}

impl<V, E> Lifter for Delay<V, E>
where
    V: Send + 'static,
    E: FromPanic + Send + 'static,
{
    type In = V;
    type Out = V;
    type Error = E;

    fn lift<S>(self, subscriber: S) -> impl Subscriber<Value = V, Error = E>
    where
        S: Subscriber<Value = V, Error = E>,
    {
        let delay = self.delay;
        FnSubscriber::new(move |ctx: &Context| {
            trace!(?delay, "delay bound to context");
            let out_lifetime = Lifetime::new();
            out_lifetime.insert(ctx.lifetime());
            let out_ctx = ctx.with_strand_factory(out_lifetime.clone(), self.factory.clone());
            let out = subscriber.create(&out_ctx);

            // After the upstream context stops nothing further can be
            // posted; close the delay strand once in-flight signals (all due
            // within one delay) have drained.
            {
                let out_ctx = out_ctx.clone();
                ctx.lifetime().on_stop(move || {
                    let out_lifetime = out_ctx.lifetime().clone();
                    defer_after(&out_ctx, delay, once_action(move || out_lifetime.stop()));
                });
            }

            let lifetime = Lifetime::new();
            ctx.lifetime().insert(&lifetime);
            observer::delegating_full(
                out,
                lifetime,
                {
                    let out_ctx = out_ctx.clone();
                    move |out: &_, v: V| {
                        let out = Clone::clone(out);
                        defer_after(&out_ctx, delay, once_action(move || out.next(v)));
                    }
                },
                {
                    let out_ctx = out_ctx.clone();
                    move |out: &_, e: E| {
                        let out = Clone::clone(out);
                        defer_after(&out_ctx, delay, once_action(move || out.error(e)));
                    }
                },
                {
                    let out_ctx = out_ctx.clone();
                    move |out: &_| {
                        let out = Clone::clone(out);
                        defer_after(&out_ctx, delay, once_action(move || out.complete()));
                    }
                },
            )
        })
    }
}
