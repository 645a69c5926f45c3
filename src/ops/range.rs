//! Synchronous integer range source.

use tracing::trace;

use crate::context::Context;
use crate::error::Failure;
use crate::observer::Observer;
use crate::pipeline::{FnStarter, Observable, Starter, Subscriber};

/// See [`range`].
#[derive(Debug, Clone, Copy)]
pub struct Range {
    first: i64,
    last: i64,
}

/// An observable emitting `first..=last` synchronously on start, then
/// completing. The producer polls its observer's lifetime each iteration,
/// so a stop from downstream halts emission within one value.
#[must_use]
pub fn range(first: i64, last: i64) -> Range {
    Range { first, last }
}

impl Observable for Range {
    type Value = i64;
    type Error = Failure;

    fn bind<S>(self, subscriber: S) -> impl Starter + Send + 'static
    where
        S: Subscriber<Value = i64, Error = Failure>,
    {
        trace!(first = self.first, last = self.last, "range bound");
        FnStarter::new(move |ctx: &Context| {
            let out = subscriber.create(ctx);
            trace!(first = self.first, last = self.last, "range started");
            let mut value = self.first;
            while value <= self.last && !out.lifetime().is_stopped() {
                out.next(value);
                value += 1;
            }
            out.complete();
            ctx.lifetime().clone()
        })
    }
}
