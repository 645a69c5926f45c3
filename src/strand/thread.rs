//! The thread strand: a run-loop on a detached worker thread.

use std::thread;

use tracing::trace;

use crate::lifetime::Lifetime;
use crate::time::{ClockHandle, Time};

use super::{Action, RunLoop, Strand};

/// A strand whose run-loop is driven by its own worker thread.
///
/// The thread is detached; stopping the strand's lifetime stops the loop and
/// waits for it to exit, unless the stop is issued from the worker thread
/// itself (in which case the loop winds down after the current action).
pub struct ThreadStrand {
    run_loop: RunLoop,
}

impl ThreadStrand {
    /// Spawns the worker and returns the strand, governed by `lifetime`.
    #[must_use]
    pub fn spawn(lifetime: Lifetime, clock: ClockHandle) -> Self {
        let run_loop = RunLoop::new(lifetime.clone(), clock);

        let handle = thread::Builder::new()
            .name("freshet-strand".into())
            .spawn({
                let run_loop = run_loop.clone();
                move || run_loop.run()
            })
            .expect("failed to spawn strand worker thread");
        let worker = handle.thread().id();
        drop(handle);

        lifetime.on_stop({
            let run_loop = run_loop.clone();
            move || {
                run_loop.wake();
                if thread::current().id() == worker {
                    trace!("strand stopped from its own worker; not waiting for exit");
                } else {
                    run_loop.wait_for_exit();
                }
            }
        });

        Self { run_loop }
    }
}

impl Strand for ThreadStrand {
    fn now(&self) -> Time {
        self.run_loop.now()
    }

    fn defer_at(&self, at: Time, action: Action) {
        self.run_loop.defer_at(at, action);
    }

    fn lifetime(&self) -> &Lifetime {
        self.run_loop.lifetime()
    }
}
