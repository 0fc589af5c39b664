//! Shared per-solve state
//!
//! One `SolveContext` is created per solve and handed to every worker by
//! reference. Cancellation is cooperative: anything observing `solved`
//! exits at its next poll.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::dp::ingest::{IngestMode, IngestScheduler};
use crate::kangaroo::planner::WalkPlan;

/// Solve-scoped shared state: walk constants, the ingest scheduler, the
/// solved flag and the error counter.
pub struct SolveContext {
    pub plan: Arc<WalkPlan>,
    pub ingest: IngestScheduler,
    solved: AtomicBool,
    total_errors: AtomicU64,
}

impl SolveContext {
    pub fn new(plan: Arc<WalkPlan>, mode: IngestMode) -> Self {
        SolveContext {
            plan,
            ingest: IngestScheduler::new(mode),
            solved: AtomicBool::new(false),
            total_errors: AtomicU64::new(0),
        }
    }

    pub fn is_solved(&self) -> bool {
        self.solved.load(Ordering::Acquire)
    }

    /// First solve wins; later callers observe the flag on their next poll.
    pub fn mark_solved(&self) {
        self.solved.store(true, Ordering::Release);
    }

    pub fn count_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }
}
