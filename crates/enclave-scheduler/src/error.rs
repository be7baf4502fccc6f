//! Failure taxonomy for a scheduler run.
//!
//! A run either completes with an empty queue and an idle barrier, or aborts
//! with one of these errors. Fatal errors carry a [`RunDiagnostic`] naming
//! the last executing task, the pending step count, and the remaining queue
//! -- enough to pinpoint which phase failed without re-running.

use enclave_store::{CorrelationToken, StoreError};

/// Snapshot of scheduler state attached to fatal errors and abort logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDiagnostic {
    /// Name of the task that was executing, if any.
    pub active_task: Option<String>,
    /// Steps still outstanding on the barrier.
    pub pending_steps: u64,
    /// Correlation entries still registered.
    pub pending_ops: usize,
    /// Names of the tasks still queued, front to back.
    pub queued_tasks: Vec<String>,
}

impl core::fmt::Display for RunDiagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "active={} pending_steps={} pending_ops={} queue=[{}]",
            self.active_task.as_deref().unwrap_or("<none>"),
            self.pending_steps,
            self.pending_ops,
            self.queued_tasks.join(", ")
        )
    }
}

/// Errors that abort a scheduler run.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A completion arrived without a matching dispatch.
    #[error("step barrier underflow ({diagnostic})")]
    BarrierUnderflow {
        /// State snapshot at the time of the underflow.
        diagnostic: RunDiagnostic,
    },

    /// The gateway returned a token that is already registered.
    #[error("correlation token {token} registered twice (op: {summary})")]
    DuplicateToken {
        /// The offending token.
        token: CorrelationToken,
        /// Summary of the operation being registered.
        summary: String,
    },

    /// A completion carried a token with no registered dispatch, or one
    /// that was already resolved.
    #[error("completion for unknown correlation token {token} ({diagnostic})")]
    UnknownToken {
        /// The offending token.
        token: CorrelationToken,
        /// State snapshot at the time of resolution.
        diagnostic: RunDiagnostic,
    },

    /// The store reported a failure for a dispatched operation. Fatal; no
    /// local recovery is defined.
    #[error("store failure in task `{phase}` (op: {summary}, token {token}): {source}")]
    Gateway {
        /// Task that dispatched the failed operation.
        phase: String,
        /// Summary of the failed operation.
        summary: String,
        /// The operation's correlation token.
        token: CorrelationToken,
        /// The underlying store error.
        source: StoreError,
    },

    /// The completion channel closed while steps were still outstanding.
    #[error("completion channel closed with work outstanding ({diagnostic})")]
    Disconnected {
        /// State snapshot at the time of disconnection.
        diagnostic: RunDiagnostic,
    },

    /// A task retried after its producer ran and still found the
    /// prerequisite missing. The front-insertion protocol allows exactly
    /// one retry per missing dependency.
    #[error("task `{task}` still missing dependency `{dependency}` after retry")]
    MissingDependency {
        /// The dependent task.
        task: &'static str,
        /// What it needed.
        dependency: &'static str,
    },

    /// A task failed for a domain reason.
    #[error("task `{task}` failed: {message}")]
    Task {
        /// The failing task.
        task: String,
        /// What went wrong.
        message: String,
    },
}

impl SchedulerError {
    /// Build a task-level failure for the named task.
    pub fn task(task: &str, message: impl Into<String>) -> Self {
        Self::Task {
            task: task.to_owned(),
            message: message.into(),
        }
    }
}
