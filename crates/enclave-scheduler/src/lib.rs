//! Step-barrier task scheduler for the simulation pipeline.
//!
//! A run is a short ordered queue of coarse tasks. Each task may fan out
//! into any number of concurrent store operations; the scheduler blocks the
//! pipeline on a step barrier until every operation of the running task has
//! completed, then admits the next task. There is a single logical thread of
//! control -- tasks and completion handlers never run concurrently with each
//! other, only the store operations themselves overlap.
//!
//! # Control flow
//!
//! ```text
//! run loop
//!   |
//!   +-- barrier idle? pop task, run it
//!   |     task dispatches ops: register step + token + one-shot handler
//!   |
//!   +-- await completion (any order)
//!   |     resolve token -> handler, run handler (may dispatch more),
//!   |     decrement barrier
//!   |
//!   +-- barrier hits zero -> next task
//! ```
//!
//! Tasks that need data not yet produced re-enqueue themselves at the front
//! behind the producing task and return -- see [`task::TaskContext`] and the
//! pipeline crates for the protocol.
//!
//! # Modules
//!
//! - [`barrier`] -- the outstanding-operation counter
//! - [`queue`] -- the ordered task queue
//! - [`task`] -- the task trait and the context handed to running tasks
//! - [`pending`] -- token -> handler correlation registry
//! - [`scheduler`] -- the run loop
//! - [`error`] -- failure taxonomy and the abort diagnostic

pub mod barrier;
pub mod error;
pub mod pending;
pub mod queue;
pub mod scheduler;
pub mod task;

pub use barrier::StepBarrier;
pub use error::{RunDiagnostic, SchedulerError};
pub use pending::PendingOps;
pub use queue::TaskQueue;
pub use scheduler::{RunReport, Scheduler};
pub use task::{discard_result, CompletionHandler, Task, TaskContext, TaskList};
