//! The task trait and the context handed to a running task.
//!
//! A task is a boxed unit of work identified by name. It runs to completion
//! on the control thread; anything asynchronous goes through
//! [`TaskContext::dispatch`], which registers a barrier step, obtains the
//! store's correlation token, and files a one-shot handler for the result.
//! Each dispatch carries its own continuation -- there is no shared result
//! map for tasks to poke at.
//!
//! # Dependency resolution
//!
//! A task that needs data not yet computed must front-insert the producing
//! task immediately followed by a retry of itself, then return without doing
//! further work:
//!
//! ```text
//! tc.enqueue_front_all(vec![Box::new(Producer::new()), Box::new(self.retry())]);
//! ```
//!
//! The producer carries a cached-result guard so it runs once even when
//! several dependents request it; a retry that still misses its dependency
//! fails the run with [`SchedulerError::MissingDependency`].

use enclave_store::{CorrelationToken, Gateway, StoreOp, StoreValue};

use crate::barrier::StepBarrier;
use crate::error::SchedulerError;
use crate::pending::PendingOps;
use crate::queue::TaskQueue;

/// A list of boxed tasks, for order-preserving front insertion.
pub type TaskList<C> = Vec<Box<dyn Task<C>>>;

/// One-shot continuation invoked with the result of a dispatched operation.
///
/// Handlers run on the control thread and may dispatch further operations
/// or enqueue tasks through the context they receive.
pub type CompletionHandler<C> =
    Box<dyn FnOnce(&mut TaskContext<'_, C>, StoreValue) -> Result<(), SchedulerError> + Send>;

/// A handler for operations whose result carries no information (DDL,
/// inserts, maintenance).
pub fn discard_result<C>() -> CompletionHandler<C> {
    Box::new(|_, _| Ok(()))
}

/// A unit of work in the pipeline queue.
pub trait Task<C>: Send {
    /// Stable name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Run the task. Dispatch asynchronous work and return; the scheduler
    /// holds the pipeline until every dispatched operation completes.
    fn run(self: Box<Self>, tc: &mut TaskContext<'_, C>) -> Result<(), SchedulerError>;
}

/// Everything a running task (or completion handler) may touch: the shared
/// run state, the queue, the barrier, the correlation registry, and the
/// gateway.
pub struct TaskContext<'a, C> {
    /// Run-scoped shared state, owned by the caller of the scheduler.
    pub state: &'a mut C,
    pub(crate) queue: &'a mut TaskQueue<Box<dyn Task<C>>>,
    pub(crate) barrier: &'a mut StepBarrier,
    pub(crate) pending: &'a mut PendingOps<C>,
    pub(crate) gateway: &'a mut dyn Gateway,
    pub(crate) task_name: &'static str,
}

impl<C> TaskContext<'_, C> {
    /// Name of the task this context belongs to.
    pub const fn task_name(&self) -> &'static str {
        self.task_name
    }

    /// Dispatch a store operation with its completion handler.
    ///
    /// Registers one barrier step and files the handler under the returned
    /// correlation token, in that order, so the result cannot race past the
    /// bookkeeping.
    pub fn dispatch(
        &mut self,
        op: StoreOp,
        handler: CompletionHandler<C>,
    ) -> Result<CorrelationToken, SchedulerError> {
        let summary = op.summary();
        tracing::trace!(task = self.task_name, op = %summary, "dispatch");
        self.barrier.register_steps(1);
        let token = self.gateway.dispatch(op);
        self.pending
            .register(token, self.task_name, summary, handler)?;
        Ok(token)
    }

    /// Queue a task after everything already queued.
    pub fn enqueue_back(&mut self, task: Box<dyn Task<C>>) {
        self.queue.push_back(task);
    }

    /// Queue a task to run next.
    pub fn enqueue_front(&mut self, task: Box<dyn Task<C>>) {
        self.queue.push_front(task);
    }

    /// Queue several tasks to run next, preserving their order.
    pub fn enqueue_front_all(&mut self, tasks: TaskList<C>) {
        self.queue.push_front_all(tasks);
    }

    /// Steps currently outstanding for the running task.
    pub const fn pending_steps(&self) -> u64 {
        self.barrier.pending()
    }
}
