//! Predicate filtering.

use std::marker::PhantomData;

use tracing::trace;

use crate::context::Context;
use crate::error::FromPanic;
use crate::lifetime::Lifetime;
use crate::observer::{self, Observer};
use crate::pipeline::{FnSubscriber, Lifter, Subscriber};

/// See [`filter`].
pub struct Filter<V, E, P> {
    pred: P,
    marker: PhantomData<fn(V, E)>,
}

impl<V, E, P: Clone> Clone for Filter<V, E, P> {
    fn clone(&self) -> Self {
        Self {
            pred: self.pred.clone(),
            marker: PhantomData,
        }
    }
}

/// A lifter forwarding only the values for which `pred` returns true.
#[must_use]
pub fn filter<V, E, P>(pred: P) -> Filter<V, E, P>
where
    P: Fn(&V) -> bool + Clone + Send + Sync + 'static,
{
    Filter {
        pred,
        marker: PhantomData,
    }
}

impl<V, E, P> Lifter for Filter<V, E, P>
where
    E: FromPanic + 'static,
    V: 'static,
    P: Fn(&V) -> bool + Clone + Send + Sync + 'static,
{
    type In = V;
    type Out = V;
    type Error = E;

    fn lift<S>(self, subscriber: S) -> impl Subscriber<Value = V, Error = E>
    where
        S: Subscriber<Value = V, Error = E>,
    {
        trace!("filter bound to subscriber");
        FnSubscriber::new(move |ctx: &Context| {
            let out = subscriber.create(ctx);
            let lifetime = Lifetime::new();
            ctx.lifetime().insert(&lifetime);
            let pred = self.pred;
            observer::delegating(out, lifetime, move |out: &_, v: V| {
                if pred(&v) {
                    out.next(v);
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;
    use crate::ops::range;
    use crate::pipeline::ObservableExt as _;
    use crate::pipeline::Starter as _;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn keeps_only_matching_values_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let completes = Arc::new(Mutex::new(0usize));
        let ctx = Context::immediate();

        let subscriber = FnSubscriber::new({
            let seen = seen.clone();
            let completes = completes.clone();
            move |ctx: &Context| {
                observer::from_fns::<i64, Failure, _, _, _>(
                    ctx.lifetime().clone(),
                    move |v| seen.lock().push(v),
                    |_err| {},
                    move || *completes.lock() += 1,
                )
            }
        });

        range(1, 10)
            .lift(filter(|v: &i64| v % 2 == 0))
            .subscribe(subscriber)
            .start(&ctx);

        assert_eq!(*seen.lock(), vec![2, 4, 6, 8, 10]);
        assert_eq!(*completes.lock(), 1);
    }
}
