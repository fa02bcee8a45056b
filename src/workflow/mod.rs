//! Day-plan workflow
//!
//! - `merge`: reconcile a generated item list with today's completed work
//! - `today`: the guarded generate-merge-persist round-trip

pub mod merge;
pub mod today;
