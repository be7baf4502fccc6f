//! The gateway dispatch contract and the completion channel.
//!
//! A [`Gateway`] accepts an operation and returns a [`CorrelationToken`]
//! synchronously, before any result exists. The result arrives later as a
//! [`Completion`] on the channel created alongside the gateway. There is
//! exactly one completion per dispatch; ordering is not guaranteed.

use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::op::{StoreOp, StoreValue};
use crate::token::CorrelationToken;

/// The asynchronous outcome of one dispatched operation.
#[derive(Debug)]
pub struct Completion {
    /// Token returned by the dispatch this completion answers.
    pub token: CorrelationToken,
    /// The operation's result or failure.
    pub result: Result<StoreValue, StoreError>,
}

/// Sending half of the completion channel, held by gateway backends.
pub type CompletionSender = mpsc::UnboundedSender<Completion>;

/// Receiving half of the completion channel, held by the scheduler loop.
pub type CompletionReceiver = mpsc::UnboundedReceiver<Completion>;

/// Create the completion channel a gateway reports into.
///
/// Unbounded on purpose: the number of outstanding operations is already
/// bounded by the dispatching side (the step barrier and the proximity
/// pool), and a bounded channel would let the store stall the control
/// thread.
pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    mpsc::unbounded_channel()
}

/// A store backend that accepts operations for asynchronous execution.
///
/// `dispatch` must return without waiting for the store: backends either
/// spawn the real work (Postgres) or execute in-process and queue the
/// completion immediately (memory). Either way the completion carrying the
/// returned token is eventually delivered exactly once.
pub trait Gateway: Send {
    /// Dispatch `op`, returning its correlation token synchronously.
    fn dispatch(&mut self, op: StoreOp) -> CorrelationToken;
}
