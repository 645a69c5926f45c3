//! Multiplexing an observable of observables.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use tracing::trace;

use crate::context::Context;
use crate::error::FromPanic;
use crate::lifetime::Lifetime;
use crate::observer::{self, ErrorPolicy, Observer};
use crate::pipeline::{
    Adaptor, FnSubscriber, Lifter, LiftedAdaptor, LifterExt as _, Observable, ObservableExt as _,
    Starter as _, Subscriber,
};
use crate::state::State;
use crate::strand::{defer, once_action, StrandFactory};

use super::map::{map, Map};
use super::observe_on::observe_on;

/// See [`merge`].
pub struct Merge<O> {
    factory: StrandFactory,
    policy: ErrorPolicy,
    marker: PhantomData<fn(O)>,
}

impl<O> Clone for Merge<O> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            policy: self.policy,
            marker: PhantomData,
        }
    }
}

/// An adaptor over an observable of observables that runs every inner
/// source and multiplexes their emissions onto one destination strand
/// derived from `factory`.
///
/// A pending set tracks the outer source and every running inner; the
/// downstream completion fires exactly when the outer source has finished
/// AND every inner has stopped. Errors from the outer source or any inner
/// are routed per the error policy (default: forwarded downstream, which
/// stops the merge). Cancelling the binding context stops every inner
/// eagerly.
#[must_use]
pub fn merge<O>(factory: StrandFactory) -> Merge<O> {
    merge_with_policy(factory, ErrorPolicy::Pass)
}

/// [`merge`] with an explicit error policy for the relay stages.
#[must_use]
pub fn merge_with_policy<O>(factory: StrandFactory, policy: ErrorPolicy) -> Merge<O> {
    Merge {
        factory,
        policy,
        marker: PhantomData,
    }
}

/// `map(f)` fused with `merge(factory)`: maps each value to an inner
/// observable and multiplexes the results.
#[must_use]
pub fn map_merge<V, O, F>(
    factory: StrandFactory,
    f: F,
) -> LiftedAdaptor<Map<V, O, <O as Observable>::Error, F>, Merge<O>>
where
    O: Observable,
    F: Fn(V) -> O + Clone + Send + Sync + 'static,
    V: 'static,
    O::Value: Send + 'static,
    O::Error: FromPanic + Send + 'static,
{
    map(f).then_adapt(merge(factory))
}

struct MergeLifter<O> {
    shared: StrandFactory,
    policy: ErrorPolicy,
    marker: PhantomData<fn(O)>,
}

impl<O> Clone for MergeLifter<O> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            policy: self.policy,
            marker: PhantomData,
        }
    }
}

impl<O> Lifter for MergeLifter<O>
where
    O: Observable,
    O::Value: Send + 'static,
    O::Error: FromPanic + Send + 'static,
{
    type In = O;
    type Out = O::Value;
    type Error = O::Error;

    fn lift<S>(self, subscriber: S) -> impl Subscriber<Value = O, Error = O::Error>
    where
        S: Subscriber<Value = O::Value, Error = O::Error>,
    {
        let shared = self.shared;
        let policy = self.policy;
        FnSubscriber::new(move |ctx: &Context| {
            trace!("merge bound to context");

            // The destination outlives the outer source: inners keep
            // emitting after the outer completes. The binding context nests
            // inside it so the whole chain winds down when the merge does.
            let dest_lifetime = Lifetime::new();
            dest_lifetime.insert(ctx.lifetime());
            let dest_ctx = ctx.with_strand_factory(dest_lifetime.clone(), shared.clone());
            let out = subscriber.create(&dest_ctx);

            let pending: State<BTreeSet<Lifetime>> =
                State::attach(&dest_lifetime, BTreeSet::new());

            // Registers an input (the outer source or one inner) in the
            // pending set and arms its stop to run the completion check on
            // the destination strand.
            let arm = {
                let pending = pending.clone();
                let dest_ctx = dest_ctx.clone();
                let out = out.clone();
                move |input: &Lifetime| {
                    pending.get().insert(input.clone());
                    let pending = pending.clone();
                    let dest_ctx = dest_ctx.clone();
                    let out = out.clone();
                    let input = input.clone();
                    input.clone().on_stop(move || {
                        let check = move || {
                            if !pending.is_live() {
                                return;
                            }
                            let drained = {
                                let mut pending = pending.get();
                                pending.remove(&input);
                                pending.is_empty()
                            };
                            if drained {
                                trace!("merge drained; completing downstream");
                                out.complete();
                            }
                        };
                        defer(&dest_ctx, once_action(check));
                    });
                }
            };

            // Track the outer source through its own lifetime, nested in the
            // binding context so cancellation reaches it.
            let in_lifetime = Lifetime::new();
            ctx.lifetime().insert(&in_lifetime);
            arm(&in_lifetime);

            let spawn = {
                let arm = arm.clone();
                let dest_ctx = dest_ctx.clone();
                let shared = shared.clone();
                let upstream = ctx.lifetime().clone();
                let out = out.clone();
                move |inner: O| {
                    trace!("merge inner source started");
                    let nested = Lifetime::new();
                    upstream.insert(&nested);
                    arm(&nested);
                    let inner_ctx = dest_ctx.with_lifetime(nested);
                    let out = out.clone();
                    inner
                        .lift(observe_on::<O::Value, O::Error>(shared.clone()))
                        .subscribe(FnSubscriber::new(move |ictx: &Context| {
                            observer::delegating_full(
                                out,
                                ictx.lifetime().clone(),
                                |out: &_, v: O::Value| out.next(v),
                                move |out: &_, e: O::Error| policy.route(out, e),
                                // completion is tracked through the lifetime
                                |_out: &_| {},
                            )
                        }))
                        .start(&inner_ctx);
                }
            };

            observer::delegating_full(
                out,
                in_lifetime,
                move |_out: &_, inner: O| spawn(inner),
                move |out: &_, e: O::Error| policy.route(out, e),
                |_out: &_| {},
            )
        })
    }
}

impl<O> Adaptor for Merge<O>
where
    O: Observable,
    O::Value: Send + 'static,
    O::Error: FromPanic + Send + 'static,
{
    type In = O;
    type Out = O::Value;
    type Error = O::Error;

    fn adapt<Outer>(self, source: Outer) -> impl Observable<Value = O::Value, Error = O::Error>
    where
        Outer: Observable<Value = O, Error = O::Error>,
    {
        trace!("merge bound to source");
        let shared = self.factory.shared();
        source
            .lift(observe_on::<O, O::Error>(shared.clone()))
            .lift(MergeLifter::<O> {
                shared,
                policy: self.policy,
                marker: PhantomData,
            })
    }
}
