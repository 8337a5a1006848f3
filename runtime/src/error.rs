//! Error types for transfer scheduling and kernel sessions.

use ferry_device::BufferId;
use snafu::Snafu;

/// Result type for scheduling operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by kernel sessions.
///
/// Stale data from a forgotten explicit transfer is deliberately absent:
/// the scheduler cannot tell "intentionally stale" from "forgotten", so
/// that class of caller bug surfaces only through incorrect results.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Storage-layer failure during a transfer or mirror allocation.
    #[snafu(display("device error: {source}"))]
    Device { source: ferry_device::Error },

    /// The transfer mode cannot change once the session has executed.
    #[snafu(display("transfer mode is locked after the first execution"))]
    ModeLocked,

    /// Work size must be positive.
    #[snafu(display("invalid range: {range}"))]
    InvalidRange { range: usize },

    /// Pass count must be positive.
    #[snafu(display("invalid pass count: {passes}"))]
    InvalidPassCount { passes: u32 },

    /// Operation names a buffer the session does not hold.
    #[snafu(display("unknown buffer {id}"))]
    UnknownBuffer { id: BufferId },
}
