//! The key ring: trusted root identities plus the clock-skew policy.
//!
//! A `KeyRing` is a cheap, cloneable handle; clones share the same state.
//! All mutation goes through one lock and replaces the state wholesale, so
//! a verification that took a [`KeyRingSnapshot`] never observes a
//! half-applied change.

use std::sync::{Arc, PoisonError, RwLock};

use log::info;

use crate::item::{DimeItem, Identity};
use crate::time::ClockPolicy;

#[derive(Debug, Clone, Default)]
struct KeyRingState {
    roots: Arc<Vec<Identity>>,
    clock: ClockPolicy,
}

/// Point-in-time view of a key ring.
#[derive(Debug, Clone)]
pub struct KeyRingSnapshot {
    roots: Arc<Vec<Identity>>,
    clock: ClockPolicy,
}

impl KeyRingSnapshot {
    pub fn roots(&self) -> &[Identity] {
        &self.roots
    }

    pub fn clock(&self) -> ClockPolicy {
        self.clock
    }
}

/// Shared registry of trusted root identities.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    state: Arc<RwLock<KeyRingState>>,
}

impl KeyRing {
    /// An empty key ring with the default clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the trusted roots.
    pub fn init(&self, roots: Vec<Identity>) {
        let count = roots.len();
        self.update(|state| state.roots = Arc::new(roots));
        info!("Key ring initialised with {count} trusted root(s)");
    }

    /// Remove every trusted root.
    pub fn clear(&self) {
        self.update(|state| state.roots = Arc::new(Vec::new()));
        info!("Key ring cleared");
    }

    /// Shift "now" by `seconds` for every validity check.
    pub fn set_time_modifier(&self, seconds: i64) {
        self.update(|state| state.clock.time_modifier = seconds);
    }

    /// Tolerate timestamps up to `seconds` outside their window.
    pub fn set_grace_period(&self, seconds: i64) {
        self.update(|state| state.clock.grace_period = seconds);
    }

    pub fn clock(&self) -> ClockPolicy {
        self.read(|state| state.clock)
    }

    pub fn snapshot(&self) -> KeyRingSnapshot {
        self.read(|state| KeyRingSnapshot {
            roots: Arc::clone(&state.roots),
            clock: state.clock,
        })
    }

    pub fn len(&self) -> usize {
        self.read(|state| state.roots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `identity` is one of the trusted roots (same subject and
    /// same encoding).
    pub fn is_trusted_root(&self, identity: &Identity) -> bool {
        let snapshot = self.snapshot();
        let (Ok(subject), Ok(encoded)) = (identity.subject_id(), identity.to_encoded()) else {
            return false;
        };
        snapshot.roots().iter().any(|root| {
            root.subject_id().map(|s| s == subject).unwrap_or(false)
                && root.to_encoded().map(|e| e == encoded).unwrap_or(false)
        })
    }

    fn read<T>(&self, f: impl FnOnce(&KeyRingState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn update(&self, f: impl FnOnce(&mut KeyRingState)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        f(&mut next);
        *guard = next;
    }
}
