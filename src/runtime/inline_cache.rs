//! Per-call-site dispatch hints
//!
//! A call site remembers the first address kind it sees. Any later kind
//! degrades the site to polymorphic for good. The hint only decides whether
//! the fast branch may be taken; the slow path never relies on it.

use std::sync::atomic::{AtomicUsize, Ordering};

const UNINITIALIZED: usize = 0;
const POLYMORPHIC: usize = usize::MAX;

/// Observable state of an [`InlineCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing seen yet
    Uninitialized,
    /// Every execution so far saw this key
    Monomorphic(usize),
    /// At least two keys were seen
    Polymorphic,
}

/// Lock-free monomorphic/polymorphic guard
///
/// Transitions only move forward: `Uninitialized -> Monomorphic -> Polymorphic`.
/// Racing threads may both observe a miss; both then store the same
/// polymorphic marker.
#[derive(Debug)]
pub struct InlineCache {
    state: AtomicUsize,
}

impl Default for InlineCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InlineCache {
    /// A fresh, uninitialised cache
    pub fn new() -> Self {
        InlineCache {
            state: AtomicUsize::new(UNINITIALIZED),
        }
    }

    /// A cache that is already polymorphic, so it never hits
    pub fn disabled() -> Self {
        InlineCache {
            state: AtomicUsize::new(POLYMORPHIC),
        }
    }

    /// Record `key` and report whether the site is still monomorphic on it
    ///
    /// `key` must be non-zero and different from `usize::MAX`.
    pub fn check(&self, key: usize) -> bool {
        debug_assert!(key != UNINITIALIZED && key != POLYMORPHIC);

        match self.state.load(Ordering::Acquire) {
            current if current == key => true,
            POLYMORPHIC => false,
            UNINITIALIZED => match self.state.compare_exchange(
                UNINITIALIZED,
                key,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => true,
                Err(seen) if seen == key => true,
                Err(_) => {
                    self.degrade();
                    false
                }
            },
            _ => {
                self.degrade();
                false
            }
        }
    }

    fn degrade(&self) {
        let previous = self.state.swap(POLYMORPHIC, Ordering::AcqRel);
        if previous != POLYMORPHIC {
            tracing::debug!(previous, "call site degraded to polymorphic");
        }
    }

    /// Current state
    pub fn state(&self) -> CacheState {
        match self.state.load(Ordering::Acquire) {
            UNINITIALIZED => CacheState::Uninitialized,
            POLYMORPHIC => CacheState::Polymorphic,
            key => CacheState::Monomorphic(key),
        }
    }
}
