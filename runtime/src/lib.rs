//! Transfer scheduling for repeated kernel offload.
//!
//! Decides, for every kernel invocation, which host buffers must be
//! copied to the device before execution and which mirrors must be
//! copied back after, minimizing redundant transfers across repeated
//! invocations.
//!
//! # Modes
//!
//! - **Implicit** (default): a bind-time access analysis plus per-buffer
//!   dirty tracking schedule every transfer. Conservative: a buffer that
//!   cannot be proven read-only is re-uploaded on every invocation.
//! - **Explicit**: the caller issues every transfer through
//!   [`KernelSession::put`] / [`KernelSession::get`]; nothing moves
//!   automatically, and forgotten transfers mean stale data, never a
//!   raised fault.
//! - **Loop fusion**: [`KernelSession::execute_with_passes`] runs N
//!   passes device-resident, with one upload before pass 0 and one
//!   download after the last pass, however large N is. The kernel body
//!   sees the pass index through [`PassContext::pass_id`].
//!
//! # Example
//!
//! ```ignore
//! let x = HostArray::new(vec![1.0f32; 64]);
//! let y = HostArray::new(vec![0.0f32; 64]);
//! let bx = Buffer::bind(backend.clone(), "x", &x);
//! let by = Buffer::bind(backend, "y", &y);
//! let (ix, iy) = (bx.id(), by.id());
//!
//! let mut graph = BodyGraph::new("scale");
//! graph.routine("scale").reads(ix).writes(iy);
//!
//! let kernel = Kernel::new(graph, move |ctx: &PassContext<'_>| {
//!     let src = ctx.read::<f32>(ix)?;
//!     let mut dst = ctx.write::<f32>(iy)?;
//!     for i in 0..ctx.range() {
//!         dst[i] = src[i] * 2.0;
//!     }
//!     Ok(())
//! });
//!
//! KernelSession::bind(kernel, vec![bx, by])?.execute(64)?;
//! // y's host array now holds the results.
//! ```

pub mod access;
pub mod directive;
pub mod error;
pub mod kernel;
pub mod session;
pub mod tracker;

#[cfg(test)]
pub mod test;

pub use access::{AccessMode, BodyGraph, CallSite, Routine};
pub use directive::{Direction, Origin, TransferDirective, TransferStats};
pub use error::{Error, Result};
pub use kernel::{Kernel, KernelProgram, PassContext};
pub use session::KernelSession;
pub use tracker::{BufferTracker, SyncState};
