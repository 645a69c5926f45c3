//! The immediate strand: defers inline on the calling thread.

use crate::lifetime::Lifetime;
use crate::observer::Observer;
use crate::time::{ClockHandle, Time};
use tracing::trace;

use super::{Action, Rescheduler, Strand};

/// A strand that executes actions inline on the caller.
///
/// `defer_at` blocks the calling thread until the deadline, invokes the
/// action, and loops while the action self-defers. The loop aborts as soon
/// as the strand's lifetime stops; a stopped action simply never touches its
/// rescheduler, which ends the loop the same way.
pub struct ImmediateStrand {
    lifetime: Lifetime,
    clock: ClockHandle,
}

impl ImmediateStrand {
    /// Creates an immediate strand over `clock`, governed by `lifetime`.
    #[must_use]
    pub fn new(lifetime: Lifetime, clock: ClockHandle) -> Self {
        Self { lifetime, clock }
    }
}

impl Strand for ImmediateStrand {
    fn now(&self) -> Time {
        self.clock.now()
    }

    fn defer_at(&self, at: Time, action: Action) {
        let mut deadline = at;
        loop {
            if self.lifetime.is_stopped() {
                trace!(lifetime = %self.lifetime.id(), "immediate strand stopped mid-defer");
                break;
            }
            self.clock.sleep_until(deadline);
            let resched = Rescheduler::new();
            action.next(resched.clone());
            match resched.take() {
                Some(next_at) => deadline = next_at,
                None => break,
            }
        }
        action.complete();
    }

    fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;
    use crate::observer::{self, ObserverExt as _};
    use crate::time::{Clock as _, VirtualClock};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn defer_waits_for_the_deadline() {
        let clock = VirtualClock::handle();
        let strand = ImmediateStrand::new(Lifetime::new(), clock.clone());

        let fired_at = Arc::new(Mutex::new(None));
        let action = observer::from_fns::<Rescheduler, Failure, _, _, _>(
            Lifetime::new(),
            {
                let fired_at = fired_at.clone();
                let clock = clock.clone();
                move |_resched| *fired_at.lock() = Some(clock.now())
            },
            |_err| {},
            || {},
        );

        strand.defer_at(Time::from_millis(40), action.into_dyn());
        assert_eq!(*fired_at.lock(), Some(Time::from_millis(40)));
    }

    #[test]
    fn self_defer_loops_until_done() {
        let clock = VirtualClock::handle();
        let strand = ImmediateStrand::new(Lifetime::new(), clock.clone());

        let ticks = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(Mutex::new(false));
        let action = observer::from_fns::<Rescheduler, Failure, _, _, _>(
            Lifetime::new(),
            {
                let ticks = ticks.clone();
                let clock = clock.clone();
                move |resched: Rescheduler| {
                    let now = clock.now();
                    ticks.lock().push(now.as_millis());
                    if ticks.lock().len() < 3 {
                        resched.reschedule(now + std::time::Duration::from_millis(10));
                    }
                }
            },
            |_err| {},
            {
                let completed = completed.clone();
                move || *completed.lock() = true
            },
        );

        strand.defer_at(Time::from_millis(5), action.into_dyn());
        assert_eq!(*ticks.lock(), vec![5, 15, 25]);
        assert!(*completed.lock());
    }

    #[test]
    fn stopped_strand_skips_the_action() {
        let lifetime = Lifetime::new();
        lifetime.stop();
        let strand = ImmediateStrand::new(lifetime, VirtualClock::handle());

        let fired = Arc::new(Mutex::new(false));
        let action = observer::from_fns::<Rescheduler, Failure, _, _, _>(
            Lifetime::new(),
            {
                let fired = fired.clone();
                move |_resched| *fired.lock() = true
            },
            |_err| {},
            || {},
        );

        strand.defer_at(Time::ZERO, action.into_dyn());
        assert!(!*fired.lock());
    }
}
