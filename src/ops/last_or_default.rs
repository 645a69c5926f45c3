//! Last-value reduction.

use std::marker::PhantomData;

use tracing::trace;

use crate::context::Context;
use crate::error::FromPanic;
use crate::lifetime::Lifetime;
use crate::observer::{self, Observer};
use crate::pipeline::{FnSubscriber, Lifter, Subscriber};
use crate::state::State;

/// See [`last_or_default`].
pub struct LastOrDefault<V, E> {
    default: V,
    marker: PhantomData<fn(E)>,
}

impl<V: Clone, E> Clone for LastOrDefault<V, E> {
    fn clone(&self) -> Self {
        Self {
            default: self.default.clone(),
            marker: PhantomData,
        }
    }
}

/// A lifter that swallows the stream and, on upstream completion, emits the
/// last observed value (or `default` when the stream was empty) followed by
/// a completion.
#[must_use]
pub fn last_or_default<V, E>(default: V) -> LastOrDefault<V, E>
where
    V: Clone + Send + Sync + 'static,
{
    LastOrDefault {
        default,
        marker: PhantomData,
    }
}

impl<V, E> Lifter for LastOrDefault<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: FromPanic + 'static,
{
    type In = V;
    type Out = V;
    type Error = E;

    fn lift<S>(self, subscriber: S) -> impl Subscriber<Value = V, Error = E>
    where
        S: Subscriber<Value = V, Error = E>,
    {
        trace!("last_or_default bound to subscriber");
        FnSubscriber::new(move |ctx: &Context| {
            let out = subscriber.create(ctx);
            let lifetime = Lifetime::new();
            ctx.lifetime().insert(&lifetime);
            let last = State::attach(&lifetime, self.default);
            observer::delegating_full(
                out,
                lifetime,
                {
                    let last = last.clone();
                    move |_out: &_, v: V| {
                        let _previous = last.set(v);
                    }
                },
                |out: &_, e: E| out.error(e),
                move |out: &_| {
                    let value = last.get().clone();
                    out.next(value);
                    out.complete();
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;
    use crate::ops::{filter, range, take};
    use crate::pipeline::{ObservableExt as _, Starter as _};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn collect(
        seen: &Arc<Mutex<Vec<i64>>>,
        completes: &Arc<Mutex<usize>>,
    ) -> impl Subscriber<Value = i64, Error = Failure> {
        let seen = seen.clone();
        let completes = completes.clone();
        FnSubscriber::new(move |ctx: &Context| {
            let seen = seen.clone();
            let completes = completes.clone();
            observer::from_fns(
                ctx.lifetime().clone(),
                move |v| seen.lock().push(v),
                |_err: Failure| {},
                move || *completes.lock() += 1,
            )
        })
    }

    #[test]
    fn emits_last_value_on_completion() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let completes = Arc::new(Mutex::new(0usize));
        let ctx = Context::immediate();

        range(1, 9)
            .lift(last_or_default(42))
            .subscribe(collect(&seen, &completes))
            .start(&ctx);

        assert_eq!(*seen.lock(), vec![9]);
        assert_eq!(*completes.lock(), 1);
    }

    #[test]
    fn empty_stream_emits_the_default() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let completes = Arc::new(Mutex::new(0usize));
        let ctx = Context::immediate();

        range(1, 10)
            .lift(filter(|v: &i64| *v > 100))
            .lift(last_or_default(42))
            .subscribe(collect(&seen, &completes))
            .start(&ctx);

        assert_eq!(*seen.lock(), vec![42]);
        assert_eq!(*completes.lock(), 1);
    }

    #[test]
    fn composes_under_take() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let completes = Arc::new(Mutex::new(0usize));
        let ctx = Context::immediate();

        range(1, 10)
            .lift(filter(|v: &i64| v % 2 == 0))
            .adapt(take(3))
            .lift(last_or_default(42))
            .subscribe(collect(&seen, &completes))
            .start(&ctx);

        assert_eq!(*seen.lock(), vec![6]);
        assert_eq!(*completes.lock(), 1);
    }
}
