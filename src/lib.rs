//! Freshet: push-based reactive dataflow with cancellation lifetimes and
//! strand scheduling.
//!
//! # Overview
//!
//! Freshet expresses asynchronous, push-based sequences of values composed
//! through functional operators. Three tightly coupled subsystems make up
//! the design:
//!
//! - **Lifetimes** ([`lifetime`]): a cancellation graph. Every observer,
//!   strand, and running program is scoped to a lifetime; stopping one
//!   stops everything nested inside it, runs its stop-hooks, and releases
//!   its owned state.
//! - **Strands** ([`strand`]): serial, time-ordered executors. All
//!   callbacks scheduled onto one strand happen in deadline order with FIFO
//!   tie-breaking; cross-strand ordering is not guaranteed.
//! - **The pipeline algebra** ([`pipeline`]): observables, subscribers,
//!   lifters, adaptors, terminators, and starters compose into a startable
//!   program; starting one under a [`Context`] returns the lifetime that
//!   governs it.
//!
//! # Example
//!
//! ```
//! use freshet::{range, filter, take, Context, ObservableExt as _, Starter as _};
//! use freshet::{observer, Failure, FnSubscriber};
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let lifetime = range(1, 10)
//!     .lift(filter(|v: &i64| v % 2 == 0))
//!     .adapt(take(3))
//!     .subscribe(FnSubscriber::new(move |ctx: &freshet::Context| {
//!         let sink = sink.clone();
//!         observer::from_fns::<i64, Failure, _, _, _>(
//!             ctx.lifetime().clone(),
//!             move |v| sink.lock().push(v),
//!             |_err| {},
//!             || {},
//!         )
//!     }))
//!     .start(&Context::immediate());
//! lifetime.join();
//! assert_eq!(*seen.lock(), vec![2, 4, 6]);
//! ```
//!
//! # Module Structure
//!
//! - [`lifetime`]: cancellation scopes and the stop/join protocol
//! - [`state`]: values pinned to a lifetime
//! - [`observer`]: push sinks and the termination discipline
//! - [`strand`]: immediate, run-loop, and worker-thread executors
//! - [`context`]: the binding environment threaded through composition
//! - [`pipeline`]: the composition algebra and its erased forms
//! - [`ops`]: the operator set
//! - [`time`]: instants and the clock seam
//! - [`error`]: typed errors, the erased boundary error, panic routing

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

pub mod context;
pub mod error;
pub mod lifetime;
pub mod observer;
pub mod ops;
pub mod pipeline;
pub mod state;
pub mod strand;
pub mod time;

pub use context::Context;
pub use error::{Error, ErrorKind, Failure, FromPanic, PanicPayload, Result};
pub use lifetime::{Lifetime, LifetimeId, WeakLifetime};
pub use observer::{DynObserver, ErrorPolicy, Observer, ObserverExt};
pub use ops::{
    delay, filter, finally, intervals, intervals_with_policy, last_or_default, map, map_merge,
    merge, merge_with_policy, noop_subscriber, observe_on, range, take,
};
pub use pipeline::{
    AdaptorExt, DynAdaptor, DynLifter, DynObservable, DynStarter, DynSubscriber, DynTerminator,
    FnStarter, FnSubscriber, LifterExt, Observable, ObservableExt, Starter, StarterExt,
    Subscriber, SubscriberExt, TerminatorExt,
};
pub use pipeline::{Adaptor, Lifter, Terminator};
pub use state::State;
pub use strand::{
    defer, defer_after, defer_at, defer_periodic, defer_periodic_with_policy, Action, DynStrand,
    ImmediateStrand, Rescheduler, RunLoop, Strand, StrandFactory, ThreadStrand,
};
pub use time::{Clock, ClockHandle, MonotonicClock, Time, VirtualClock};
