//! Named composition results for the pipe table.
//!
//! Each struct here is the result of one composition row and simply defers
//! to its parts, so a chain of concrete operators stays one monomorphized
//! call chain.

use crate::context::Context;
use crate::lifetime::Lifetime;
use crate::observer::Observer;

use super::{Adaptor, Lifter, Observable, Starter, Subscriber, Terminator};

/// `Observable | Lifter`.
#[derive(Clone)]
pub struct Lifted<O, L> {
    source: O,
    lifter: L,
}

impl<O, L> Lifted<O, L> {
    pub(crate) fn new(source: O, lifter: L) -> Self {
        Self { source, lifter }
    }
}

impl<O, L> Observable for Lifted<O, L>
where
    L: Lifter,
    O: Observable<Value = L::In, Error = L::Error>,
{
    type Value = L::Out;
    type Error = L::Error;

    fn bind<S>(self, subscriber: S) -> impl Starter + Send + 'static
    where
        S: Subscriber<Value = L::Out, Error = L::Error>,
    {
        self.source.bind(self.lifter.lift(subscriber))
    }
}

/// `Observable | Adaptor`.
#[derive(Clone)]
pub struct Adapted<O, A> {
    source: O,
    adaptor: A,
}

impl<O, A> Adapted<O, A> {
    pub(crate) fn new(source: O, adaptor: A) -> Self {
        Self { source, adaptor }
    }
}

impl<O, A> Observable for Adapted<O, A>
where
    A: Adaptor,
    O: Observable<Value = A::In, Error = A::Error>,
{
    type Value = A::Out;
    type Error = A::Error;

    fn bind<S>(self, subscriber: S) -> impl Starter + Send + 'static
    where
        S: Subscriber<Value = A::Out, Error = A::Error>,
    {
        self.adaptor.adapt(self.source).bind(subscriber)
    }
}

/// `Observable | Subscriber`: a startable program.
pub struct Subscribed<O, S> {
    source: O,
    subscriber: S,
}

impl<O, S> Subscribed<O, S> {
    pub(crate) fn new(source: O, subscriber: S) -> Self {
        Self { source, subscriber }
    }
}

impl<O, S> Starter for Subscribed<O, S>
where
    O: Observable,
    S: Subscriber<Value = O::Value, Error = O::Error>,
{
    fn start(self, ctx: &Context) -> Lifetime {
        self.source.bind(self.subscriber).start(ctx)
    }
}

/// `Observable | Terminator`: a startable program.
pub struct Terminated<O, T> {
    source: O,
    terminator: T,
}

impl<O, T> Terminated<O, T> {
    pub(crate) fn new(source: O, terminator: T) -> Self {
        Self { source, terminator }
    }
}

impl<O, T> Starter for Terminated<O, T>
where
    O: Observable,
    T: Terminator<Value = O::Value, Error = O::Error>,
{
    fn start(self, ctx: &Context) -> Lifetime {
        self.terminator.terminate(self.source).start(ctx)
    }
}

/// `Lifter | Lifter`.
#[derive(Clone)]
pub struct ChainedLifter<L1, L2> {
    first: L1,
    second: L2,
}

impl<L1, L2> ChainedLifter<L1, L2> {
    pub(crate) fn new(first: L1, second: L2) -> Self {
        Self { first, second }
    }
}

impl<L1, L2> Lifter for ChainedLifter<L1, L2>
where
    L1: Lifter,
    L2: Lifter<In = L1::Out, Error = L1::Error>,
{
    type In = L1::In;
    type Out = L2::Out;
    type Error = L1::Error;

    fn lift<S>(self, subscriber: S) -> impl Subscriber<Value = L1::In, Error = L1::Error>
    where
        S: Subscriber<Value = L2::Out, Error = L1::Error>,
    {
        self.first.lift(self.second.lift(subscriber))
    }
}

/// `Lifter | Subscriber`.
#[derive(Clone)]
pub struct Applied<L, S> {
    lifter: L,
    subscriber: S,
}

impl<L, S> Applied<L, S> {
    pub(crate) fn new(lifter: L, subscriber: S) -> Self {
        Self { lifter, subscriber }
    }
}

impl<L, S> Subscriber for Applied<L, S>
where
    L: Lifter,
    S: Subscriber<Value = L::Out, Error = L::Error>,
{
    type Value = L::In;
    type Error = L::Error;

    fn create(
        self,
        ctx: &Context,
    ) -> impl Observer<Value = Self::Value, Error = Self::Error> + Clone + Send + Sync + 'static + use<L, S>
    {
        self.lifter.lift(self.subscriber).create(ctx)
    }
}

/// `Lifter | Adaptor`.
#[derive(Clone)]
pub struct LiftedAdaptor<L, A> {
    lifter: L,
    adaptor: A,
}

impl<L, A> LiftedAdaptor<L, A> {
    pub(crate) fn new(lifter: L, adaptor: A) -> Self {
        Self { lifter, adaptor }
    }
}

impl<L, A> Adaptor for LiftedAdaptor<L, A>
where
    L: Lifter,
    A: Adaptor<In = L::Out, Error = L::Error>,
{
    type In = L::In;
    type Out = A::Out;
    type Error = L::Error;

    fn adapt<O>(self, source: O) -> impl Observable<Value = A::Out, Error = L::Error>
    where
        O: Observable<Value = L::In, Error = L::Error>,
    {
        self.adaptor.adapt(Lifted::new(source, self.lifter))
    }
}

/// `Adaptor | Lifter`.
#[derive(Clone)]
pub struct AdaptedLifter<A, L> {
    adaptor: A,
    lifter: L,
}

impl<A, L> AdaptedLifter<A, L> {
    pub(crate) fn new(adaptor: A, lifter: L) -> Self {
        Self { adaptor, lifter }
    }
}

impl<A, L> Adaptor for AdaptedLifter<A, L>
where
    A: Adaptor,
    L: Lifter<In = A::Out, Error = A::Error>,
{
    type In = A::In;
    type Out = L::Out;
    type Error = A::Error;

    fn adapt<O>(self, source: O) -> impl Observable<Value = L::Out, Error = A::Error>
    where
        O: Observable<Value = A::In, Error = A::Error>,
    {
        Lifted::new(self.adaptor.adapt(source), self.lifter)
    }
}

/// `Adaptor | Adaptor`.
#[derive(Clone)]
pub struct ChainedAdaptor<A1, A2> {
    first: A1,
    second: A2,
}

impl<A1, A2> ChainedAdaptor<A1, A2> {
    pub(crate) fn new(first: A1, second: A2) -> Self {
        Self { first, second }
    }
}

impl<A1, A2> Adaptor for ChainedAdaptor<A1, A2>
where
    A1: Adaptor,
    A2: Adaptor<In = A1::Out, Error = A1::Error>,
{
    type In = A1::In;
    type Out = A2::Out;
    type Error = A1::Error;

    fn adapt<O>(self, source: O) -> impl Observable<Value = A2::Out, Error = A1::Error>
    where
        O: Observable<Value = A1::In, Error = A1::Error>,
    {
        self.second.adapt(self.first.adapt(source))
    }
}

/// `Adaptor | Subscriber`: a terminator.
#[derive(Clone)]
pub struct Fused<A, S> {
    adaptor: A,
    subscriber: S,
}

impl<A, S> Fused<A, S> {
    pub(crate) fn new(adaptor: A, subscriber: S) -> Self {
        Self { adaptor, subscriber }
    }
}

impl<A, S> Terminator for Fused<A, S>
where
    A: Adaptor,
    S: Subscriber<Value = A::Out, Error = A::Error>,
{
    type Value = A::In;
    type Error = A::Error;

    fn terminate<O>(self, source: O) -> impl Starter + Send + 'static
    where
        O: Observable<Value = A::In, Error = A::Error>,
    {
        self.adaptor.adapt(source).bind(self.subscriber)
    }
}
