//! Strand hopping.

use std::marker::PhantomData;

use tracing::trace;

use crate::context::Context;
use crate::error::FromPanic;
use crate::lifetime::Lifetime;
use crate::observer::{self, EitherObserver, Observer};
use crate::pipeline::{FnSubscriber, Lifter, Subscriber};
use crate::strand::{defer, once_action, StrandFactory};

/// See [`observe_on`].
pub struct ObserveOn<V, E> {
    factory: StrandFactory,
    marker: PhantomData<fn(V, E)>,
}

impl<V, E> Clone for ObserveOn<V, E> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            marker: PhantomData,
        }
    }
}

/// A lifter that posts every signal onto a strand derived from `factory`
/// before forwarding it downstream. When `factory` produces immediate
/// strands this is a pass-through: inline execution has nothing to post.
#[must_use]
pub fn observe_on<V, E>(factory: StrandFactory) -> ObserveOn<V, E> {
    ObserveOn {
        factory,
        marker: PhantomData,
    }
}

impl<V, E> Lifter for ObserveOn<V, E>
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
        FnSubscriber::new(move |ctx: &Context| {
            if self.factory.is_immediate() {
                trace!("observe_on immediate fast path");
                return EitherObserver::Left(subscriber.create(ctx));
            }

            let out_lifetime = Lifetime::new();
            out_lifetime.insert(ctx.lifetime());
            let out_ctx = ctx.with_strand_factory(out_lifetime.clone(), self.factory.clone());
            let out = subscriber.create(&out_ctx);

            // Once the upstream context stops, no further signal can be
            // posted; queue the relay shutdown behind whatever is in flight.
            {
                let out_ctx = out_ctx.clone();
                ctx.lifetime().on_stop(move || {
                    let out_lifetime = out_ctx.lifetime().clone();
                    defer(&out_ctx, once_action(move || out_lifetime.stop()));
                });
            }

            let lifetime = Lifetime::new();
            ctx.lifetime().insert(&lifetime);
            EitherObserver::Right(observer::delegating_full(
                out,
                lifetime,
                {
                    let out_ctx = out_ctx.clone();
                    move |out: &_, v: V| {
                        let out = Clone::clone(out);
                        defer(&out_ctx, once_action(move || out.next(v)));
                    }
                },
                {
                    let out_ctx = out_ctx.clone();
                    move |out: &_, e: E| {
                        let out = Clone::clone(out);
                        defer(&out_ctx, once_action(move || out.error(e)));
                    }
                },
                {
                    let out_ctx = out_ctx.clone();
                    move |out: &_| {
                        let out = Clone::clone(out);
                        defer(&out_ctx, once_action(move || out.complete()));
                    }
                },
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;
    use crate::ops::range;
    use crate::pipeline::{ObservableExt as _, Starter as _};
    use crate::time::MonotonicClock;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn immediate_factory_is_a_pass_through() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ctx = Context::immediate();

        let subscriber = FnSubscriber::new({
            let seen = seen.clone();
            move |ctx: &Context| {
                observer::from_fns::<i64, Failure, _, _, _>(
                    ctx.lifetime().clone(),
                    move |v| seen.lock().push(v),
                    |_err| {},
                    || {},
                )
            }
        });

        range(1, 3)
            .lift(observe_on(StrandFactory::immediate(
                MonotonicClock::handle(),
            )))
            .subscribe(subscriber)
            .start(&ctx);

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn signals_arrive_on_the_worker_strand_in_order() {
        let clock = MonotonicClock::handle();
        let ctx = Context::root(StrandFactory::immediate(clock.clone()), clock.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(Mutex::new(false));
        let worker_thread = Arc::new(Mutex::new(None));

        let subscriber = FnSubscriber::new({
            let seen = seen.clone();
            let completed = completed.clone();
            let worker_thread = worker_thread.clone();
            move |ctx: &Context| {
                let seen = seen.clone();
                let completed = completed.clone();
                let worker_thread = worker_thread.clone();
                observer::from_fns::<i64, Failure, _, _, _>(
                    ctx.lifetime().clone(),
                    move |v| {
                        *worker_thread.lock() = Some(std::thread::current().id());
                        seen.lock().push(v);
                    },
                    |_err| {},
                    move || *completed.lock() = true,
                )
            }
        });

        range(1, 3)
            .lift(observe_on(StrandFactory::thread(clock)))
            .subscribe(subscriber)
            .start(&ctx);

        // emission is asynchronous from the caller's point of view
        for _ in 0..200 {
            if *completed.lock() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        assert!(*completed.lock());
        assert_ne!(
            *worker_thread.lock(),
            Some(std::thread::current().id()),
            "signals must be delivered off the calling thread"
        );
    }
}
