//! State scoped to a lifetime.
//!
//! A [`State<P>`] is a cloneable handle to a value whose destruction is
//! pinned to a lifetime's end: when the lifetime stops, the slot is emptied
//! during teardown and the value dropped. Accessing the value after that
//! point is a discipline violation; operators avoid it by testing
//! `is_stopped` before touching their state, which the observer termination
//! rules guarantee for callback code.

use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::{Error, ErrorKind, Result};
use crate::lifetime::Lifetime;

/// A guard over a live scoped-state value.
pub type StateGuard<'a, P> = MappedMutexGuard<'a, P>;

/// A handle to a value owned by a lifetime.
#[derive(Debug)]
pub struct State<P> {
    lifetime: Lifetime,
    slot: Arc<Mutex<Option<P>>>,
}

impl<P> Clone for State<P> {
    fn clone(&self) -> Self {
        Self {
            lifetime: self.lifetime.clone(),
            slot: self.slot.clone(),
        }
    }
}

impl<P: Send + 'static> State<P> {
    /// Pins `value` to `lifetime`.
    ///
    /// Total: when the lifetime is already stopped the value is dropped
    /// immediately and the returned handle is empty. Use
    /// [`Lifetime::make_state`] for the checked form.
    #[must_use]
    pub fn attach(lifetime: &Lifetime, value: P) -> Self {
        let slot = Arc::new(Mutex::new(Some(value)));
        let registered = lifetime.push_destructor(Box::new({
            let slot = slot.clone();
            move || {
                slot.lock().take();
            }
        }));
        if !registered {
            slot.lock().take();
        }
        Self {
            lifetime: lifetime.clone(),
            slot,
        }
    }

    /// The lifetime that owns the value.
    #[must_use]
    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    /// Returns true while the value has not been torn down.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Locks the value for access.
    ///
    /// # Panics
    ///
    /// Panics if the owning lifetime has already torn the value down. Test
    /// `is_stopped` on the owning lifetime before calling.
    #[must_use]
    pub fn get(&self) -> StateGuard<'_, P> {
        MutexGuard::map(self.slot.lock(), |slot| {
            slot.as_mut()
                .expect("scoped state accessed after its lifetime stopped")
        })
    }

    /// Replaces the value if it is still live, returning the old value.
    pub fn set(&self, value: P) -> Option<P> {
        let mut slot = self.slot.lock();
        match slot.as_mut() {
            Some(current) => Some(std::mem::replace(current, value)),
            None => None,
        }
    }
}

impl Lifetime {
    /// Allocates `value` pinned to this lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::LifetimeStopped`] when this lifetime has already
    /// stopped.
    pub fn make_state<P: Send + 'static>(&self, value: P) -> Result<State<P>> {
        if self.is_stopped() {
            return Err(Error::new(ErrorKind::LifetimeStopped)
                .with_context(format!("make_state on stopped lifetime {}", self.id())));
        }
        Ok(State::attach(self, value))
    }

    /// Allocates a sibling state holding a copy of `other`'s value.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::LifetimeStopped`] when this lifetime has already
    /// stopped.
    pub fn copy_state<P: Clone + Send + 'static>(&self, other: &State<P>) -> Result<State<P>> {
        let value = other.get().clone();
        self.make_state(value)
    }
}
