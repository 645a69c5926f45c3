//! Coalescing derived strands onto one underlying strand.

use std::sync::Arc;

use crate::lifetime::Lifetime;
use crate::observer::Observer;
use crate::time::Time;

use super::{Action, DynStrand, Strand, StrandFactory};

/// A strand that forwards onto a shared underlying strand.
///
/// The derived lifetime nests inside the underlying strand's lifetime, so
/// stopping the underlying strand stops every derivation, while stopping a
/// derivation merely erases it. Action lifetimes nest inside the derived
/// lifetime so a stopped derivation silences its own in-flight actions.
struct SharedStrand {
    lifetime: Lifetime,
    underlying: DynStrand,
}

impl Strand for SharedStrand {
    fn now(&self) -> Time {
        self.underlying.now()
    }

    fn defer_at(&self, at: Time, action: Action) {
        self.lifetime.insert(action.lifetime());
        self.underlying.defer_at(at, action);
    }

    fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }
}

/// Stops the underlying strand when the last factory reference drops, which
/// is what lets a worker-thread strand wind down and be joined.
struct UnderlyingGuard {
    strand: DynStrand,
}

impl Drop for UnderlyingGuard {
    fn drop(&mut self) {
        self.strand.lifetime().stop();
    }
}

impl StrandFactory {
    /// Builds one strand now and derives every future strand from it.
    ///
    /// The multiplexing operators use this so all of their signal traffic is
    /// serialized on a single executor. The underlying strand is
    /// reference-counted by the factory and stopped (its worker joined) when
    /// the last factory clone drops. Immediate factories are returned
    /// unchanged: inline execution needs no coalescing.
    #[must_use]
    pub fn shared(&self) -> Self {
        if self.is_immediate() {
            return self.clone();
        }
        let guard = Arc::new(UnderlyingGuard {
            strand: self.make(Lifetime::new()),
        });
        Self::from_fn(move |lifetime| {
            let underlying = guard.strand.clone();
            underlying.lifetime().insert(&lifetime);
            Arc::new(SharedStrand {
                lifetime,
                underlying,
            }) as DynStrand
        })
    }
}
