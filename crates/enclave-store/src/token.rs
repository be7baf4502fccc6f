//! The opaque correlation token pairing a dispatch with its completion.

use serde::{Deserialize, Serialize};

/// Opaque identifier returned synchronously by a gateway dispatch and echoed
/// back with the asynchronous result.
///
/// Many concurrent operations share one completion channel and results may
/// arrive out of dispatch order, so the token -- not a positional index --
/// drives result matching. A token is never reused within a run; presenting
/// the same token twice is a defect in the gateway contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct CorrelationToken(pub u64);

impl CorrelationToken {
    /// Return the inner integer value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
