//! Guards
//!
//! Cheap liveness tokens used to drop callbacks whose owner went away. A
//! guard is checked when the callback is *invoked*, not when it is created.

use crate::weak::WeakOnQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Anything that can report whether its owner still exists
pub trait Guard: Send + 'static {
    fn alive(&self) -> bool;
}

impl<T: Send + Sync + 'static> Guard for Weak<T> {
    fn alive(&self) -> bool {
        self.strong_count() > 0
    }
}

impl<T: Send + 'static> Guard for WeakOnQueue<T> {
    fn alive(&self) -> bool {
        self.is_alive()
    }
}

impl Guard for BinaryGuard {
    fn alive(&self) -> bool {
        BinaryGuard::alive(self)
    }
}

/// One half of a linked pair
///
/// Both halves report `alive()` until either of them is dropped or re-armed.
#[derive(Debug, Default)]
pub struct BinaryGuard {
    bond: Option<Arc<AtomicBool>>,
}

impl BinaryGuard {
    /// An unlinked guard, never alive
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alive(&self) -> bool {
        self.bond
            .as_ref()
            .is_some_and(|bond| bond.load(Ordering::Acquire))
    }

    /// Break any existing link and return the other half of a fresh one.
    pub fn make_guard(&mut self) -> BinaryGuard {
        self.kill();
        let bond = Arc::new(AtomicBool::new(true));
        self.bond = Some(Arc::clone(&bond));
        BinaryGuard { bond: Some(bond) }
    }

    /// Break the link; both halves stop being alive.
    pub fn kill(&mut self) {
        if let Some(bond) = self.bond.take() {
            bond.store(false, Ordering::Release);
        }
    }
}

impl Drop for BinaryGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Wrap `callback` so it only runs if `guard` is alive when called.
pub fn guard<G, F>(guard: G, callback: F) -> impl FnOnce() + Send + 'static
where
    G: Guard,
    F: FnOnce() + Send + 'static,
{
    move || {
        if guard.alive() {
            callback();
        }
    }
}
