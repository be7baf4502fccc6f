//! The scheduler run loop.
//!
//! Single logical thread of control: admit a task while the barrier is
//! idle, otherwise await one completion, run its handler, release one step.
//! Exactly one task is active at a time; a task with no asynchronous work
//! completes synchronously and the loop advances immediately.

use enclave_store::{CompletionReceiver, Gateway};

use crate::barrier::StepBarrier;
use crate::error::{RunDiagnostic, SchedulerError};
use crate::pending::PendingOps;
use crate::queue::TaskQueue;
use crate::task::{Task, TaskContext};

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Number of tasks admitted and run.
    pub tasks_run: usize,
    /// Number of store operations completed.
    pub ops_completed: u64,
    /// Correlation entries still registered at run end (should be zero; a
    /// nonzero value is logged as a leak).
    pub leaked_correlations: usize,
}

/// Owns the task queue, the step barrier, and the correlation registry, and
/// drives them to completion against a gateway.
pub struct Scheduler<C> {
    queue: TaskQueue<Box<dyn Task<C>>>,
    barrier: StepBarrier,
    pending: PendingOps<C>,
    active: Option<&'static str>,
    tasks_run: usize,
    ops_completed: u64,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self {
            queue: TaskQueue::new(),
            barrier: StepBarrier::new(),
            pending: PendingOps::new(),
            active: None,
            tasks_run: 0,
            ops_completed: 0,
        }
    }

    /// Queue a task after everything already queued.
    pub fn enqueue_back(&mut self, task: Box<dyn Task<C>>) {
        self.queue.push_back(task);
    }

    /// Queue several tasks in order after everything already queued.
    pub fn enqueue_all(&mut self, tasks: Vec<Box<dyn Task<C>>>) {
        for task in tasks {
            self.queue.push_back(task);
        }
    }

    fn diagnostic(&self) -> RunDiagnostic {
        RunDiagnostic {
            active_task: self.active.map(str::to_owned),
            pending_steps: self.barrier.pending(),
            pending_ops: self.pending.len(),
            queued_tasks: self.queue.iter().map(|t| t.name().to_owned()).collect(),
        }
    }

    fn finish(&self) -> RunReport {
        let leaked_correlations = self.pending.len();
        if leaked_correlations > 0 {
            tracing::warn!(
                leaked = leaked_correlations,
                "correlation entries leaked at run end"
            );
        }
        tracing::info!(
            tasks_run = self.tasks_run,
            ops_completed = self.ops_completed,
            "run complete, queue empty and barrier idle"
        );
        RunReport {
            tasks_run: self.tasks_run,
            ops_completed: self.ops_completed,
            leaked_correlations,
        }
    }

    /// Drive the queue to completion.
    ///
    /// Returns when the queue is empty and the barrier is idle, or aborts
    /// on the first error with a diagnostic logged. `state` is the explicit
    /// run context shared by all tasks; `completions` is the channel the
    /// gateway reports into.
    ///
    /// # Errors
    ///
    /// See [`SchedulerError`] for the failure taxonomy. All variants abort
    /// the run; none are retried.
    pub async fn run(
        &mut self,
        state: &mut C,
        gateway: &mut dyn Gateway,
        completions: &mut CompletionReceiver,
    ) -> Result<RunReport, SchedulerError> {
        loop {
            // Admit tasks while nothing is outstanding. Several fully
            // synchronous tasks may pass through here back to back.
            while self.barrier.is_idle() {
                let Some(task) = self.queue.pop_front() else {
                    return Ok(self.finish());
                };
                let name = task.name();
                self.active = Some(name);
                tracing::info!(task = name, queued = self.queue.len(), "task started");
                let result = {
                    let mut tc = TaskContext {
                        state: &mut *state,
                        queue: &mut self.queue,
                        barrier: &mut self.barrier,
                        pending: &mut self.pending,
                        gateway: &mut *gateway,
                        task_name: name,
                    };
                    task.run(&mut tc)
                };
                if let Err(error) = result {
                    tracing::error!(%error, diagnostic = %self.diagnostic(), "task failed, run aborted");
                    return Err(error);
                }
                self.tasks_run = self.tasks_run.saturating_add(1);
                if self.barrier.is_idle() {
                    tracing::debug!(task = name, "task completed synchronously");
                    self.active = None;
                }
            }

            // One or more operations outstanding: wait for any completion.
            let Some(completion) = completions.recv().await else {
                let diagnostic = self.diagnostic();
                tracing::error!(%diagnostic, "completion channel closed, run aborted");
                return Err(SchedulerError::Disconnected { diagnostic });
            };

            let resolved = match self.pending.resolve(completion.token) {
                Ok(resolved) => resolved,
                Err(token) => {
                    let diagnostic = self.diagnostic();
                    tracing::error!(%token, %diagnostic, "unknown correlation token");
                    return Err(SchedulerError::UnknownToken { token, diagnostic });
                }
            };

            let value = match completion.result {
                Ok(value) => value,
                Err(source) => {
                    let error = SchedulerError::Gateway {
                        phase: resolved.phase.to_owned(),
                        summary: resolved.summary,
                        token: completion.token,
                        source,
                    };
                    tracing::error!(%error, diagnostic = %self.diagnostic(), "store failure, run aborted");
                    return Err(error);
                }
            };

            // Run the handler before releasing the step: a handler that
            // dispatches follow-up work must keep the barrier raised, or a
            // momentary zero would admit the next task early.
            let result = {
                let mut tc = TaskContext {
                    state: &mut *state,
                    queue: &mut self.queue,
                    barrier: &mut self.barrier,
                    pending: &mut self.pending,
                    gateway: &mut *gateway,
                    task_name: resolved.phase,
                };
                (resolved.handler)(&mut tc, value)
            };
            if let Err(error) = result {
                tracing::error!(%error, diagnostic = %self.diagnostic(), "completion handler failed, run aborted");
                return Err(error);
            }
            self.ops_completed = self.ops_completed.saturating_add(1);

            match self.barrier.complete() {
                Err(_) => {
                    let diagnostic = self.diagnostic();
                    tracing::error!(%diagnostic, "step barrier underflow");
                    return Err(SchedulerError::BarrierUnderflow { diagnostic });
                }
                Ok(0) => {
                    if let Some(name) = self.active.take() {
                        tracing::debug!(task = name, "all steps complete, advancing");
                    }
                }
                Ok(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use enclave_store::{
        completion_channel, Completion, CorrelationToken, Gateway, SqlValue, StoreOp, StoreValue,
    };

    use super::*;
    use crate::error::SchedulerError;
    use crate::task::TaskList;

    // =====================================================================
    // Test doubles
    // =====================================================================

    /// Gateway that hands out sequential tokens and records summaries.
    /// Completions are injected by the tests themselves, which lets them
    /// control arrival order precisely.
    #[derive(Default)]
    struct StubGateway {
        next: u64,
        dispatched: Vec<String>,
    }

    impl Gateway for StubGateway {
        fn dispatch(&mut self, op: StoreOp) -> CorrelationToken {
            self.next = self.next.saturating_add(1);
            self.dispatched.push(op.summary());
            CorrelationToken(self.next)
        }
    }

    fn maintenance(tag: &str) -> StoreOp {
        StoreOp::RawMaintenance {
            statement: tag.to_owned(),
        }
    }

    fn int_value(v: i64) -> StoreValue {
        StoreValue::Rows(vec![vec![SqlValue::Int(v)]])
    }

    fn first_int(value: &StoreValue) -> Option<i64> {
        match value {
            StoreValue::Rows(rows) => rows.first()?.first()?.as_i64(),
            _ => None,
        }
    }

    #[derive(Default)]
    struct TestState {
        log: Vec<String>,
        values: Vec<i64>,
        produced: Option<u32>,
        producer_runs: u32,
    }

    /// Fully synchronous task: appends its tag to the log.
    struct Note(&'static str);

    impl Task<TestState> for Note {
        fn name(&self) -> &'static str {
            "note"
        }
        fn run(self: Box<Self>, tc: &mut TaskContext<'_, TestState>) -> Result<(), SchedulerError> {
            tc.state.log.push(self.0.to_owned());
            Ok(())
        }
    }

    /// Dispatches `n` operations; each handler records the arriving value.
    struct FanOut(usize);

    impl Task<TestState> for FanOut {
        fn name(&self) -> &'static str {
            "fan_out"
        }
        fn run(self: Box<Self>, tc: &mut TaskContext<'_, TestState>) -> Result<(), SchedulerError> {
            for i in 0..self.0 {
                tc.dispatch(
                    maintenance(&format!("op{i}")),
                    Box::new(|tc, value| {
                        if let Some(v) = first_int(&value) {
                            tc.state.values.push(v);
                        }
                        Ok(())
                    }),
                )?;
            }
            Ok(())
        }
    }

    /// Dispatches one op whose handler dispatches a second one.
    struct Chained;

    impl Task<TestState> for Chained {
        fn name(&self) -> &'static str {
            "chained"
        }
        fn run(self: Box<Self>, tc: &mut TaskContext<'_, TestState>) -> Result<(), SchedulerError> {
            tc.dispatch(
                maintenance("first"),
                Box::new(|tc, _| {
                    tc.state.log.push("first done".to_owned());
                    tc.dispatch(
                        maintenance("second"),
                        Box::new(|tc, _| {
                            tc.state.log.push("second done".to_owned());
                            Ok(())
                        }),
                    )?;
                    Ok(())
                }),
            )?;
            Ok(())
        }
    }

    /// Produces the shared value; guarded so it only computes once.
    struct Producer;

    impl Task<TestState> for Producer {
        fn name(&self) -> &'static str {
            "producer"
        }
        fn run(self: Box<Self>, tc: &mut TaskContext<'_, TestState>) -> Result<(), SchedulerError> {
            if tc.state.produced.is_some() {
                return Ok(());
            }
            tc.state.producer_runs = tc.state.producer_runs.saturating_add(1);
            tc.state.produced = Some(7);
            Ok(())
        }
    }

    /// Needs the produced value; follows the front-insertion protocol.
    struct Dependent {
        label: &'static str,
        retried: bool,
    }

    impl Task<TestState> for Dependent {
        fn name(&self) -> &'static str {
            "dependent"
        }
        fn run(self: Box<Self>, tc: &mut TaskContext<'_, TestState>) -> Result<(), SchedulerError> {
            tc.state.log.push(format!("{} invoked", self.label));
            if tc.state.produced.is_none() {
                if self.retried {
                    return Err(SchedulerError::MissingDependency {
                        task: "dependent",
                        dependency: "produced value",
                    });
                }
                let retry: TaskList<TestState> = vec![
                    Box::new(Producer),
                    Box::new(Self {
                        label: self.label,
                        retried: true,
                    }),
                ];
                tc.enqueue_front_all(retry);
                return Ok(());
            }
            tc.state.log.push(format!("{} ran", self.label));
            Ok(())
        }
    }

    /// Front-inserts two notes; they must run before previously queued work.
    struct FrontInserter;

    impl Task<TestState> for FrontInserter {
        fn name(&self) -> &'static str {
            "front_inserter"
        }
        fn run(self: Box<Self>, tc: &mut TaskContext<'_, TestState>) -> Result<(), SchedulerError> {
            tc.state.log.push("inserter".to_owned());
            let next: TaskList<TestState> = vec![Box::new(Note("x")), Box::new(Note("y"))];
            tc.enqueue_front_all(next);
            Ok(())
        }
    }

    // =====================================================================
    // Tests
    // =====================================================================

    #[tokio::test]
    async fn synchronous_tasks_advance_without_completions() {
        let (_tx, mut rx) = completion_channel();
        let mut gateway = StubGateway::default();
        let mut state = TestState::default();
        let mut scheduler = Scheduler::new();
        scheduler.enqueue_back(Box::new(Note("a")));
        scheduler.enqueue_back(Box::new(Note("b")));

        let report = scheduler
            .run(&mut state, &mut gateway, &mut rx)
            .await
            .map_err(|e| e.to_string());
        assert_eq!(
            report,
            Ok(RunReport {
                tasks_run: 2,
                ops_completed: 0,
                leaked_correlations: 0,
            })
        );
        assert_eq!(state.log, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn completions_may_arrive_out_of_dispatch_order() {
        let (tx, mut rx) = completion_channel();
        // Arrival order 2, 1 -- the reverse of dispatch order.
        tx.send(Completion {
            token: CorrelationToken(2),
            result: Ok(int_value(20)),
        })
        .ok();
        tx.send(Completion {
            token: CorrelationToken(1),
            result: Ok(int_value(10)),
        })
        .ok();

        let mut gateway = StubGateway::default();
        let mut state = TestState::default();
        let mut scheduler = Scheduler::new();
        scheduler.enqueue_back(Box::new(FanOut(2)));
        scheduler.enqueue_back(Box::new(Note("after")));

        let report = scheduler
            .run(&mut state, &mut gateway, &mut rx)
            .await
            .map_err(|e| e.to_string());
        assert!(report.is_ok());
        // Handlers ran in arrival order, and the barrier held the queued
        // task until both completed.
        assert_eq!(state.values, vec![20, 10]);
        assert_eq!(state.log, vec!["after"]);
    }

    #[tokio::test]
    async fn handler_dispatches_keep_the_barrier_raised() {
        let (tx, mut rx) = completion_channel();
        tx.send(Completion {
            token: CorrelationToken(1),
            result: Ok(StoreValue::Unit),
        })
        .ok();
        tx.send(Completion {
            token: CorrelationToken(2),
            result: Ok(StoreValue::Unit),
        })
        .ok();

        let mut gateway = StubGateway::default();
        let mut state = TestState::default();
        let mut scheduler = Scheduler::new();
        scheduler.enqueue_back(Box::new(Chained));
        scheduler.enqueue_back(Box::new(Note("after")));

        let report = scheduler
            .run(&mut state, &mut gateway, &mut rx)
            .await
            .map_err(|e| e.to_string());
        assert!(report.is_ok());
        assert_eq!(state.log, vec!["first done", "second done", "after"]);
        assert_eq!(gateway.dispatched.len(), 2);
    }

    #[tokio::test]
    async fn front_inserted_list_runs_next_in_order() {
        let (_tx, mut rx) = completion_channel();
        let mut gateway = StubGateway::default();
        let mut state = TestState::default();
        let mut scheduler = Scheduler::new();
        scheduler.enqueue_back(Box::new(FrontInserter));
        scheduler.enqueue_back(Box::new(Note("tail")));

        scheduler
            .run(&mut state, &mut gateway, &mut rx)
            .await
            .map_err(|e| e.to_string())
            .ok();
        assert_eq!(state.log, vec!["inserter", "x", "y", "tail"]);
    }

    #[tokio::test]
    async fn producer_runs_once_for_multiple_dependents() {
        let (_tx, mut rx) = completion_channel();
        let mut gateway = StubGateway::default();
        let mut state = TestState::default();
        let mut scheduler = Scheduler::new();
        scheduler.enqueue_back(Box::new(Dependent {
            label: "A",
            retried: false,
        }));
        scheduler.enqueue_back(Box::new(Dependent {
            label: "B",
            retried: false,
        }));

        let report = scheduler
            .run(&mut state, &mut gateway, &mut rx)
            .await
            .map_err(|e| e.to_string());
        assert!(report.is_ok());
        assert_eq!(state.producer_runs, 1);
        // A is invoked twice (miss + retry); B finds the value cached and
        // is invoked exactly once.
        assert_eq!(
            state.log,
            vec!["A invoked", "A invoked", "A ran", "B invoked", "B ran"]
        );
    }

    #[tokio::test]
    async fn duplicate_completion_is_an_unknown_token() {
        let (tx, mut rx) = completion_channel();
        tx.send(Completion {
            token: CorrelationToken(1),
            result: Ok(StoreValue::Unit),
        })
        .ok();
        tx.send(Completion {
            token: CorrelationToken(1),
            result: Ok(StoreValue::Unit),
        })
        .ok();

        let mut gateway = StubGateway::default();
        let mut state = TestState::default();
        let mut scheduler = Scheduler::new();
        scheduler.enqueue_back(Box::new(FanOut(2)));

        let result = scheduler.run(&mut state, &mut gateway, &mut rx).await;
        assert!(matches!(
            result,
            Err(SchedulerError::UnknownToken { token, .. }) if token == CorrelationToken(1)
        ));
    }

    #[tokio::test]
    async fn closed_channel_with_outstanding_work_aborts() {
        let (tx, mut rx) = completion_channel();
        drop(tx);

        let mut gateway = StubGateway::default();
        let mut state = TestState::default();
        let mut scheduler = Scheduler::new();
        scheduler.enqueue_back(Box::new(FanOut(1)));

        let result = scheduler.run(&mut state, &mut gateway, &mut rx).await;
        assert!(matches!(result, Err(SchedulerError::Disconnected { .. })));
    }

    #[tokio::test]
    async fn gateway_failure_carries_phase_and_token() {
        let (tx, mut rx) = completion_channel();
        tx.send(Completion {
            token: CorrelationToken(1),
            result: Err(enclave_store::StoreError::MissingTable("nope".to_owned())),
        })
        .ok();

        let mut gateway = StubGateway::default();
        let mut state = TestState::default();
        let mut scheduler = Scheduler::new();
        scheduler.enqueue_back(Box::new(FanOut(1)));

        let result = scheduler.run(&mut state, &mut gateway, &mut rx).await;
        match result {
            Err(SchedulerError::Gateway { phase, token, .. }) => {
                assert_eq!(phase, "fan_out");
                assert_eq!(token, CorrelationToken(1));
            }
            other => {
                assert!(other.is_err(), "expected gateway failure, got {other:?}");
            }
        }
    }
}
