//! The operator set.
//!
//! Sources ([`range`], [`intervals`]) are observables; [`filter`], [`map`],
//! [`last_or_default`], [`delay`], [`observe_on`], and [`finally`] are
//! lifters; [`take`] and [`merge`] are adaptors. [`map_merge`] is the fused
//! map-then-merge convenience. Compose them with the methods from
//! [`crate::pipeline`].

pub mod delay;
pub mod filter;
pub mod finally;
pub mod intervals;
pub mod last_or_default;
pub mod map;
pub mod merge;
pub mod observe_on;
pub mod range;
pub mod take;

pub use delay::{delay, Delay};
pub use filter::{filter, Filter};
pub use finally::{finally, Finally};
pub use intervals::{intervals, intervals_with_policy, Intervals};
pub use last_or_default::{last_or_default, LastOrDefault};
pub use map::{map, Map};
pub use merge::{map_merge, merge, merge_with_policy, Merge};
pub use observe_on::{observe_on, ObserveOn};
pub use range::{range, Range};
pub use take::{take, Take};

use std::marker::PhantomData;

use crate::context::Context;
use crate::error::FromPanic;
use crate::observer::{self, Observer};
use crate::pipeline::Subscriber;

/// The subscriber produced by [`noop_subscriber`].
pub struct NoopSubscriber<V, E> {
    marker: PhantomData<fn(V, E)>,
}

impl<V, E> Clone for NoopSubscriber<V, E> {
    fn clone(&self) -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

/// A subscriber that discards values and completion but treats an error
/// reaching it as a bug (process abort) — the default consumer for driving
/// a pipeline purely for its effects.
#[must_use]
pub fn noop_subscriber<V, E>() -> NoopSubscriber<V, E> {
    NoopSubscriber {
        marker: PhantomData,
    }
}

impl<V, E> Subscriber for NoopSubscriber<V, E>
where
    V: 'static,
    E: FromPanic + 'static,
{
    type Value = V;
    type Error = E;

    fn create(
        self,
        ctx: &Context,
    ) -> impl Observer<Value = V, Error = E> + Clone + Send + Sync + 'static + use<V, E> {
        observer::terminal::<V, E, _>(ctx.lifetime().clone(), |_v: V| {})
    }
}
