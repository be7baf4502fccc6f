//! The step barrier: an outstanding-operation counter scoped to the
//! currently running task.
//!
//! Every asynchronous store operation a task dispatches registers one step;
//! every completion releases one. The scheduler only advances to the next
//! task when the counter returns to zero. The counter can never go negative:
//! a release without a matching registration means a completion arrived that
//! nothing dispatched -- a defect in the gateway contract, reported as a
//! typed error rather than recovered from.

/// Error returned when the barrier is released more often than registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("step barrier underflow: completion arrived without a matching dispatch")]
pub struct BarrierUnderflow;

/// Outstanding-operation counter for the active task.
#[derive(Debug, Default)]
pub struct StepBarrier {
    remaining: u64,
}

impl StepBarrier {
    /// Create an idle barrier.
    pub const fn new() -> Self {
        Self { remaining: 0 }
    }

    /// Register `n` steps for the active task.
    ///
    /// Called once per dispatched operation, at dispatch time.
    pub fn register_steps(&mut self, n: u64) {
        self.remaining = self.remaining.saturating_add(n);
    }

    /// Release one step; returns the number still outstanding.
    pub fn complete(&mut self) -> Result<u64, BarrierUnderflow> {
        self.remaining = self.remaining.checked_sub(1).ok_or(BarrierUnderflow)?;
        Ok(self.remaining)
    }

    /// Number of steps still outstanding.
    pub const fn pending(&self) -> u64 {
        self.remaining
    }

    /// Returns `true` when no steps are outstanding.
    pub const fn is_idle(&self) -> bool {
        self.remaining == 0
    }
}
