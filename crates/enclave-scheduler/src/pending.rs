//! The correlation registry: token -> one-shot completion handler.
//!
//! Every dispatch registers its token here immediately, because results can
//! arrive interleaved and out of dispatch order. Resolution removes the
//! entry and hands back the handler; a token can be resolved exactly once.
//! Duplicate registration and unknown resolution are both defects in the
//! gateway contract, not runtime conditions to recover from.

use std::collections::HashMap;

use enclave_store::CorrelationToken;

use crate::error::SchedulerError;
use crate::task::CompletionHandler;

/// A registered, not-yet-completed operation.
pub struct PendingOp<C> {
    /// Name of the task that dispatched the operation.
    pub phase: &'static str,
    /// Operation summary for diagnostics.
    pub summary: String,
    /// The one-shot handler to run on completion.
    pub handler: CompletionHandler<C>,
}

/// Registry of outstanding operations keyed by correlation token.
pub struct PendingOps<C> {
    map: HashMap<CorrelationToken, PendingOp<C>>,
}

impl<C> Default for PendingOps<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> PendingOps<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Register a dispatched operation under its token.
    pub fn register(
        &mut self,
        token: CorrelationToken,
        phase: &'static str,
        summary: String,
        handler: CompletionHandler<C>,
    ) -> Result<(), SchedulerError> {
        if self.map.contains_key(&token) {
            return Err(SchedulerError::DuplicateToken { token, summary });
        }
        self.map.insert(
            token,
            PendingOp {
                phase,
                summary,
                handler,
            },
        );
        Ok(())
    }

    /// Remove and return the entry for `token`.
    ///
    /// Errors if the token was never registered or was already resolved;
    /// the caller attaches the run diagnostic.
    pub fn resolve(&mut self, token: CorrelationToken) -> Result<PendingOp<C>, CorrelationToken> {
        self.map.remove(&token).ok_or(token)
    }

    /// Number of outstanding entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` when nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
