//! Prefix truncation.

use std::marker::PhantomData;

use tracing::trace;

use crate::context::Context;
use crate::error::FromPanic;
use crate::lifetime::Lifetime;
use crate::observer::{self, Observer};
use crate::pipeline::{Adaptor, FnSubscriber, Observable, Starter, Subscriber};
use crate::state::State;

/// See [`take`].
pub struct Take<V, E> {
    count: usize,
    marker: PhantomData<fn(V, E)>,
}

impl<V, E> Clone for Take<V, E> {
    fn clone(&self) -> Self {
        Self {
            count: self.count,
            marker: PhantomData,
        }
    }
}

/// An adaptor forwarding the first `count` values, completing together with
/// the last of them. Later inputs produce no signal at all.
#[must_use]
pub fn take<V, E>(count: usize) -> Take<V, E> {
    Take {
        count,
        marker: PhantomData,
    }
}

#[derive(Clone)]
struct TakeSource<O> {
    source: O,
    count: usize,
}

impl<O> Observable for TakeSource<O>
where
    O: Observable,
    O::Value: 'static,
    O::Error: FromPanic + 'static,
{
    type Value = O::Value;
    type Error = O::Error;

    fn bind<S>(self, subscriber: S) -> impl Starter + Send + 'static
    where
        S: Subscriber<Value = O::Value, Error = O::Error>,
    {
        let count = self.count;
        self.source.bind(FnSubscriber::new(move |ctx: &Context| {
            let out = subscriber.create(ctx);
            let lifetime = Lifetime::new();
            ctx.lifetime().insert(&lifetime);
            let remaining = State::attach(&lifetime, count);
            observer::delegating(out, lifetime, move |out: &_, v| {
                let forwarded = {
                    let mut remaining = remaining.get();
                    if *remaining == 0 {
                        None
                    } else {
                        *remaining -= 1;
                        Some(*remaining == 0)
                    }
                };
                match forwarded {
                    None => out.complete(),
                    Some(exhausted) => {
                        out.next(v);
                        if exhausted {
                            out.complete();
                        }
                    }
                }
            })
        }))
    }
}

impl<V, E> Adaptor for Take<V, E>
where
    V: Send + 'static,
    E: FromPanic + Send + 'static,
{
    type In = V;
    type Out = V;
    type Error = E;

    fn adapt<O>(self, source: O) -> impl Observable<Value = V, Error = E>
    where
        O: Observable<Value = V, Error = E>,
    {
        trace!(count = self.count, "take bound to source");
        TakeSource {
            source,
            count: self.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;
    use crate::ops::range;
    use crate::pipeline::ObservableExt as _;
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
    fn forwards_a_prefix_and_completes_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let completes = Arc::new(Mutex::new(0usize));
        let ctx = Context::immediate();

        range(1, 5)
            .adapt(take(3))
            .subscribe(collect(&seen, &completes))
            .start(&ctx);

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        assert_eq!(*completes.lock(), 1);
    }

    #[test]
    fn take_zero_emits_nothing() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let completes = Arc::new(Mutex::new(0usize));
        let ctx = Context::immediate();

        range(1, 5)
            .adapt(take(0))
            .subscribe(collect(&seen, &completes))
            .start(&ctx);

        assert!(seen.lock().is_empty());
        assert_eq!(*completes.lock(), 1);
    }

    #[test]
    fn take_larger_than_source_completes_with_source() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let completes = Arc::new(Mutex::new(0usize));
        let ctx = Context::immediate();

        range(1, 3)
            .adapt(take(10))
            .subscribe(collect(&seen, &completes))
            .start(&ctx);

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        assert_eq!(*completes.lock(), 1);
    }
}
