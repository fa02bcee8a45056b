//! Single-flight guard for plan generation.
//!
//! At most one generation round-trip is outstanding. A trigger that arrives
//! while one is in flight only raises the loading indicator; the caller gets
//! feedback without a second network call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct GenerationGuard {
    in_flight: AtomicBool,
    loading: AtomicBool,
}

impl GenerationGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the in-flight slot. `None` means another generation owns it and
    /// this trigger was coalesced into it.
    pub fn try_begin(self: &Arc<Self>) -> Option<GenerationTicket> {
        self.loading.store(true, Ordering::Release);
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Plan generation already in flight, coalescing trigger");
            return None;
        }
        Some(GenerationTicket {
            guard: Arc::clone(self),
        })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether a surface should show a spinner.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }
}

/// Proof of owning the in-flight slot. Dropping it releases the slot on
/// every path, including errors and panics.
#[derive(Debug)]
pub struct GenerationTicket {
    guard: Arc<GenerationGuard>,
}

impl Drop for GenerationTicket {
    fn drop(&mut self) {
        self.guard.loading.store(false, Ordering::Release);
        self.guard.in_flight.store(false, Ordering::Release);
        log::debug!("Plan generation slot released");
    }
}
