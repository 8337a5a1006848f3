//! Dirty-state tracking and implicit transfer decisions.
//!
//! One [`BufferTracker`] per session buffer. The tracker answers, for
//! each launch and each host-side read, whether a transfer directive is
//! needed; the session executes the directives it emits. Explicit mode
//! bypasses the tracker entirely.

use crate::access::AccessMode;
use crate::directive::Direction;

/// Where the current contents of a buffer live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Host copy valid, mirror never written.
    HostOnly,
    /// Mirror valid, host copy never written. Not reachable through the
    /// session's implicit flow (buffers always bind a host array), but
    /// part of the machine for completeness.
    DeviceOnly,
    /// Both copies agree.
    Synced,
    /// Host copy modified since the last upload.
    HostDirty,
    /// Mirror modified since the last download.
    DeviceDirty,
}

/// Per-buffer tracker: dirty state plus the session-cached access mode.
#[derive(Debug, Clone, Copy)]
pub struct BufferTracker {
    state: SyncState,
    mode: AccessMode,
}

impl BufferTracker {
    pub fn new(mode: AccessMode) -> Self {
        Self { state: SyncState::HostOnly, mode }
    }

    #[cfg(test)]
    pub(crate) fn with_state(mode: AccessMode, state: SyncState) -> Self {
        Self { state, mode }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Decide the upload for a single-pass launch.
    ///
    /// A buffer proven read-only uploads only while the host copy is
    /// ahead of the mirror, so repeated launches cost one transfer
    /// total. Anything read-write re-uploads on every invocation: the
    /// host side may have changed without the tracker hearing about it,
    /// and a redundant copy is cheaper than a wrong one.
    pub fn before_launch(&mut self) -> Option<Direction> {
        if !self.mode.is_read() {
            return None;
        }
        let upload = match self.state {
            SyncState::HostOnly | SyncState::HostDirty => true,
            SyncState::Synced => self.mode != AccessMode::Read,
            // The mirror is ahead of (or is the only) valid copy.
            SyncState::DeviceOnly | SyncState::DeviceDirty => false,
        };
        if upload {
            self.state = SyncState::Synced;
            Some(Direction::ToDevice)
        } else {
            None
        }
    }

    /// Decide the single upload at the start of a fused multi-pass run:
    /// exactly one per read buffer, regardless of state or pass count.
    pub fn before_fused_run(&mut self) -> Option<Direction> {
        if self.mode.is_read() {
            self.state = SyncState::Synced;
            Some(Direction::ToDevice)
        } else {
            None
        }
    }

    /// Record that a launch wrote this buffer.
    pub fn after_launch(&mut self) {
        if self.mode.is_written() {
            self.state = SyncState::DeviceDirty;
        }
    }

    /// Decide the download when host code is about to read the buffer
    /// (`get`, or the flush at the end of a run).
    pub fn on_host_read(&mut self) -> Option<Direction> {
        match self.state {
            SyncState::DeviceDirty | SyncState::DeviceOnly => {
                self.state = SyncState::Synced;
                Some(Direction::ToHost)
            }
            SyncState::HostOnly | SyncState::Synced | SyncState::HostDirty => None,
        }
    }

    /// Record a host-side write (`put` in implicit mode, or any caller
    /// notification that the host copy changed).
    pub fn mark_host_dirty(&mut self) {
        self.state = SyncState::HostDirty;
    }
}
