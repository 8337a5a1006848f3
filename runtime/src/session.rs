//! Kernel sessions: bind-time analysis, transfer scheduling, and the
//! fused pass loop.
//!
//! # Lifecycle
//!
//! [`KernelSession::bind`] analyzes the kernel's call graph once and
//! fixes each buffer's access mode for the session's lifetime. After
//! that the session runs in one of two modes:
//!
//! - **Implicit** (default): the per-buffer trackers schedule every
//!   transfer around each launch.
//! - **Explicit**: the caller schedules every transfer through
//!   [`KernelSession::put`] / [`KernelSession::get`]; launches move no
//!   data on their own. The mode is locked once the session executes.
//!
//! Buffers move into the session, so a mirror is always driven by
//! exactly one session.

use std::collections::HashMap;

use snafu::{OptionExt, ResultExt, ensure};
use tracing::debug;

use ferry_device::{Buffer, BufferId};

use crate::access::AccessMode;
use crate::directive::{Direction, Origin, TransferDirective, TransferStats};
use crate::error::{
    DeviceSnafu, InvalidPassCountSnafu, InvalidRangeSnafu, ModeLockedSnafu, Result,
    UnknownBufferSnafu,
};
use crate::kernel::{Kernel, PassContext};
use crate::tracker::{BufferTracker, SyncState};

/// One buffer's session-side bookkeeping.
#[derive(Debug)]
struct SessionBuffer {
    buffer: Buffer,
    tracker: BufferTracker,
    stats: TransferStats,
}

/// A kernel bound to a fixed set of buffers.
///
/// Every transfer-request and execute operation returns the session
/// handle, so calls compose left-to-right without temporaries:
///
/// ```ignore
/// session.set_explicit(true)?.put(a)?.execute(range)?.get(a)?;
/// ```
///
/// Chained and unchained sequences are observably identical; the
/// chaining is ergonomics, not semantics.
#[derive(Debug)]
pub struct KernelSession {
    kernel: Kernel,
    buffers: Vec<SessionBuffer>,
    index: HashMap<BufferId, usize>,
    explicit: bool,
    executed: bool,
}

impl KernelSession {
    /// Bind `kernel` to `buffers`, analyzing the kernel's call graph to
    /// fix each buffer's access mode.
    ///
    /// Fails if the graph names a buffer that is not in `buffers`.
    pub fn bind(kernel: Kernel, buffers: Vec<Buffer>) -> Result<Self> {
        let bound: Vec<BufferId> = buffers.iter().map(|b| b.id()).collect();
        for id in kernel.graph().referenced_buffers() {
            ensure!(bound.contains(&id), UnknownBufferSnafu { id });
        }
        let modes = kernel.graph().analyze(&bound);

        let index = buffers.iter().enumerate().map(|(slot, b)| (b.id(), slot)).collect();
        let buffers = buffers
            .into_iter()
            .map(|buffer| {
                let mode = modes.get(&buffer.id()).copied().unwrap_or_default();
                debug!(buffer = %buffer.name(), ?mode, "analyzed access mode");
                SessionBuffer { buffer, tracker: BufferTracker::new(mode), stats: TransferStats::default() }
            })
            .collect();

        Ok(Self { kernel, buffers, index, explicit: false, executed: false })
    }

    /// Delegate all transfer scheduling to the caller (`true`) or to the
    /// trackers (`false`). Rejected once the session has executed.
    pub fn set_explicit(&mut self, explicit: bool) -> Result<&mut Self> {
        ensure!(!self.executed, ModeLockedSnafu);
        self.explicit = explicit;
        Ok(self)
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Request a host→device transfer of one buffer.
    ///
    /// Explicit mode copies immediately, in exactly the order of the
    /// calls, with no reordering or batching. Implicit mode records the
    /// host copy as dirty; the upload happens at the next launch.
    pub fn put(&mut self, id: BufferId) -> Result<&mut Self> {
        let slot = self.slot(id)?;
        if self.explicit {
            self.transfer(slot, Direction::ToDevice, Origin::Explicit)?;
        } else {
            self.buffers[slot].tracker.mark_host_dirty();
        }
        Ok(self)
    }

    /// Request a device→host transfer of one buffer.
    ///
    /// Explicit mode copies immediately; implicit mode flushes only if
    /// the mirror is ahead of the host copy.
    pub fn get(&mut self, id: BufferId) -> Result<&mut Self> {
        let slot = self.slot(id)?;
        if self.explicit {
            self.transfer(slot, Direction::ToHost, Origin::Explicit)?;
        } else if let Some(direction) = self.buffers[slot].tracker.on_host_read() {
            self.transfer(slot, direction, Origin::Implicit)?;
        }
        Ok(self)
    }

    /// Run one pass over `range` work items.
    ///
    /// Implicit mode brackets the launch conservatively: upload before,
    /// per the tracker's rules, and flush every written buffer after, so
    /// host arrays are current the moment this returns.
    pub fn execute(&mut self, range: usize) -> Result<&mut Self> {
        ensure!(range > 0, InvalidRangeSnafu { range });
        self.executed = true;

        if !self.explicit {
            for slot in 0..self.buffers.len() {
                if let Some(direction) = self.buffers[slot].tracker.before_launch() {
                    self.transfer(slot, direction, Origin::Implicit)?;
                }
            }
        }
        self.run_passes(range, 1)?;
        if !self.explicit {
            self.finish_run()?;
        }
        Ok(self)
    }

    /// Run `passes` passes over `range` inside one device-resident
    /// session: one upload per read buffer before pass 0 and one
    /// download per written buffer after the final pass, regardless of
    /// `passes`.
    ///
    /// The pass count is fixed here, before the first pass. This path
    /// exists precisely to avoid host round-trips inside the loop, so a
    /// device-computed termination condition cannot be supported; that
    /// case falls back to explicit mode with a host-visible flag.
    pub fn execute_with_passes(&mut self, range: usize, passes: u32) -> Result<&mut Self> {
        ensure!(range > 0, InvalidRangeSnafu { range });
        ensure!(passes > 0, InvalidPassCountSnafu { passes });
        self.executed = true;

        if !self.explicit {
            for slot in 0..self.buffers.len() {
                if let Some(direction) = self.buffers[slot].tracker.before_fused_run() {
                    self.transfer(slot, direction, Origin::Implicit)?;
                }
            }
        }
        self.run_passes(range, passes)?;
        if !self.explicit {
            self.finish_run()?;
        }
        Ok(self)
    }

    /// Flush every mirror that is ahead of its host copy.
    ///
    /// Implicit-mode launches already flush on return; this is the
    /// end-of-session form for callers who drove the trackers into a
    /// dirty state some other way. No-op in explicit mode.
    pub fn flush(&mut self) -> Result<&mut Self> {
        if !self.explicit {
            for slot in 0..self.buffers.len() {
                if let Some(direction) = self.buffers[slot].tracker.on_host_read() {
                    self.transfer(slot, direction, Origin::Implicit)?;
                }
            }
        }
        Ok(self)
    }

    /// Transfer counters for one buffer.
    pub fn stats(&self, id: BufferId) -> Result<TransferStats> {
        Ok(self.buffers[self.slot(id)?].stats)
    }

    /// Transfer counters summed over every buffer.
    pub fn total_stats(&self) -> TransferStats {
        self.buffers.iter().fold(TransferStats::default(), |mut acc, entry| {
            acc.to_device += entry.stats.to_device;
            acc.to_host += entry.stats.to_host;
            acc
        })
    }

    /// The analyzed access mode of one buffer.
    pub fn mode(&self, id: BufferId) -> Result<AccessMode> {
        Ok(self.buffers[self.slot(id)?].tracker.mode())
    }

    /// The tracker state of one buffer.
    pub fn state(&self, id: BufferId) -> Result<SyncState> {
        Ok(self.buffers[self.slot(id)?].tracker.state())
    }

    fn slot(&self, id: BufferId) -> Result<usize> {
        self.index.get(&id).copied().context(UnknownBufferSnafu { id })
    }

    /// Execute one transfer directive and account for it.
    fn transfer(&mut self, slot: usize, direction: Direction, origin: Origin) -> Result<()> {
        let entry = &mut self.buffers[slot];
        let directive = TransferDirective { buffer: entry.buffer.id(), direction, origin };
        debug!(buffer = %entry.buffer.name(), ?directive, "transfer");
        match direction {
            Direction::ToDevice => entry.buffer.sync_to_device().context(DeviceSnafu)?,
            Direction::ToHost => entry.buffer.sync_to_host().context(DeviceSnafu)?,
        }
        entry.stats.record(direction);
        Ok(())
    }

    /// Launch the program `passes` times, strictly sequentially. Pass
    /// *k*+1 starts only after pass *k* returns, so later passes observe
    /// earlier writes.
    fn run_passes(&mut self, range: usize, passes: u32) -> Result<()> {
        for entry in &self.buffers {
            entry.buffer.ensure_allocated().context(DeviceSnafu)?;
        }
        let refs: Vec<&Buffer> = self.buffers.iter().map(|entry| &entry.buffer).collect();
        for pass in 0..passes {
            let ctx = PassContext::new(&refs, pass, passes, range);
            debug!(kernel = self.kernel.program().name(), pass, passes, range, "launch");
            self.kernel.program().launch(&ctx)?;
        }
        Ok(())
    }

    /// Implicit post-launch bookkeeping: written buffers become device
    /// dirty and are flushed back to the host.
    fn finish_run(&mut self) -> Result<()> {
        for slot in 0..self.buffers.len() {
            self.buffers[slot].tracker.after_launch();
            if let Some(direction) = self.buffers[slot].tracker.on_host_read() {
                self.transfer(slot, direction, Origin::Implicit)?;
            }
        }
        Ok(())
    }
}
