//! # Memory-monitor contract.
//!
//! The runner does not watch memory itself; it cooperates with an external
//! monitor through a three-call contract:
//!
//! - the monitor is handed the runner at startup via
//!   [`MemoryMonitor::register_shrinkable`];
//! - under pressure it calls [`Shrinkable::shrink`], which halves the
//!   runner's queue maximum and drops overflow;
//! - [`Shrinkable::shrunk`] reports whether a runner has ever been shrunk.
//!
//! ## Recovery prerequisite
//! Work dropped by a shrink is only recovered by re-running the callback's
//! `init` once the shrunken queue drains. Callbacks registered with a
//! memory monitor **must** therefore be able to re-enumerate their corpus
//! on every `init` call.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RunnerError;

/// A component whose memory footprint can be reduced on demand.
///
/// Implemented by [`RunnerHandle`](crate::RunnerHandle); a monitor only ever
/// sees this trait.
#[async_trait]
pub trait Shrinkable: Send + Sync {
    /// Halves the component's buffering capacity and drops overflow.
    ///
    /// Returns [`RunnerError::MinimumSize`] when the capacity is already at
    /// its floor, leaving the monitor to decide what to do next.
    async fn shrink(&self) -> Result<(), RunnerError>;

    /// Returns whether the capacity has ever been reduced.
    async fn shrunk(&self) -> bool;
}

/// External memory monitor consumed by the runner.
///
/// The runner registers itself once at startup; everything else (sampling,
/// thresholds, which registered component to shrink first) is the monitor's
/// policy.
pub trait MemoryMonitor: Send + Sync {
    /// Registers a shrinkable component with the monitor.
    fn register_shrinkable(&self, shrinkable: Arc<dyn Shrinkable>);
}
