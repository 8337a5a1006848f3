//! Transfer directives and accounting.

use ferry_device::BufferId;

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToDevice,
    ToHost,
}

/// Who asked for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Scheduled by the buffer state tracker.
    Implicit,
    /// Requested directly by the caller (`put`/`get`).
    Explicit,
}

/// A single scheduled transfer.
///
/// Computed and consumed per invocation, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDirective {
    pub buffer: BufferId,
    pub direction: Direction,
    pub origin: Origin,
}

/// Per-buffer transfer counters.
///
/// Over-transfer in implicit mode is a performance defect, not a
/// correctness one; these counters are how it is observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub to_device: u64,
    pub to_host: u64,
}

impl TransferStats {
    pub(crate) fn record(&mut self, direction: Direction) {
        match direction {
            Direction::ToDevice => self.to_device += 1,
            Direction::ToHost => self.to_host += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.to_device + self.to_host
    }
}
