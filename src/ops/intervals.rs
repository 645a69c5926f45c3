//! Periodic counting source.

use std::time::Duration;

use tracing::trace;

use crate::context::Context;
use crate::error::Failure;
use crate::lifetime::Lifetime;
use crate::observer::ErrorPolicy;
use crate::pipeline::{FnStarter, Observable, Starter, Subscriber};
use crate::strand::{defer_periodic_with_policy, Strand, StrandFactory};
use crate::time::Time;

/// See [`intervals`].
#[derive(Clone)]
pub struct Intervals {
    factory: StrandFactory,
    initial: Time,
    period: Duration,
    policy: ErrorPolicy,
}

/// An observable emitting monotonically increasing counts at
/// `initial + n·period`, scheduled on a strand derived from `factory`.
#[must_use]
pub fn intervals(factory: StrandFactory, initial: Time, period: Duration) -> Intervals {
    intervals_with_policy(factory, initial, period, ErrorPolicy::Pass)
}

/// [`intervals`] with an explicit error policy for the periodic stage.
#[must_use]
pub fn intervals_with_policy(
    factory: StrandFactory,
    initial: Time,
    period: Duration,
    policy: ErrorPolicy,
) -> Intervals {
    Intervals {
        factory,
        initial,
        period,
        policy,
    }
}

impl Observable for Intervals {
    type Value = u64;
    type Error = Failure;

    fn bind<S>(self, subscriber: S) -> impl Starter + Send + 'static
    where
        S: Subscriber<Value = u64, Error = Failure>,
    {
        trace!(initial = %self.initial, period_ms = self.period.as_millis() as u64, "intervals bound");
        FnStarter::new(move |ctx: &Context| {
            let strand = self.factory.make(Lifetime::new());
            ctx.lifetime().insert(strand.lifetime());
            let out = subscriber.create(ctx);
            trace!("intervals started");
            defer_periodic_with_policy(&strand, self.initial, self.period, out, self.policy);
            ctx.lifetime().clone()
        })
    }
}
