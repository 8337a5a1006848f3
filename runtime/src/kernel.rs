//! Opaque kernel programs and the per-pass execution context.

use std::cell::{Ref, RefMut};
use std::fmt;

use snafu::{OptionExt, ResultExt};

use ferry_device::{Buffer, BufferId, Element};

use crate::access::BodyGraph;
use crate::error::{DeviceSnafu, Result, UnknownBufferSnafu};

/// The executable form of a kernel body: one invocation per pass.
///
/// The body is opaque to the scheduler; everything it knows about the
/// body comes from the declared [`BodyGraph`]. Implemented for plain
/// closures, which is the usual way to supply one.
pub trait KernelProgram {
    fn launch(&self, ctx: &PassContext<'_>) -> Result<()>;

    /// Program name, for logging.
    fn name(&self) -> &str {
        "kernel"
    }
}

impl<F> KernelProgram for F
where
    F: Fn(&PassContext<'_>) -> Result<()>,
{
    fn launch(&self, ctx: &PassContext<'_>) -> Result<()> {
        self(ctx)
    }
}

/// A kernel: its declared call graph plus its executable program.
pub struct Kernel {
    graph: BodyGraph,
    program: Box<dyn KernelProgram>,
}

impl Kernel {
    pub fn new(graph: BodyGraph, program: impl KernelProgram + 'static) -> Self {
        Self { graph, program: Box::new(program) }
    }

    pub fn graph(&self) -> &BodyGraph {
        &self.graph
    }

    pub(crate) fn program(&self) -> &dyn KernelProgram {
        &*self.program
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.program.name())
            .field("entry", &self.graph.entry())
            .finish()
    }
}

/// Per-pass context handed to a kernel program: the pass index, the work
/// range, and typed views of the bound device mirrors.
///
/// The pass index travels here, as an explicit per-invocation value
/// rather than session-ambient state, so concurrent sessions can never
/// observe each other's counters.
pub struct PassContext<'a> {
    buffers: &'a [&'a Buffer],
    pass: u32,
    pass_count: u32,
    range: usize,
}

impl<'a> PassContext<'a> {
    pub(crate) fn new(buffers: &'a [&'a Buffer], pass: u32, pass_count: u32, range: usize) -> Self {
        Self { buffers, pass, pass_count, range }
    }

    /// Zero-based index of the current pass. Counts 0, 1, … per run and
    /// resets at the start of every `execute_with_passes` call.
    pub fn pass_id(&self) -> u32 {
        self.pass
    }

    /// Total number of passes in the current run.
    pub fn pass_count(&self) -> u32 {
        self.pass_count
    }

    /// Work size of the current run.
    pub fn range(&self) -> usize {
        self.range
    }

    /// Borrow a buffer's mirror contents for reading.
    pub fn read<T: Element>(&self, id: BufferId) -> Result<Ref<'a, [T]>> {
        self.lookup(id)?.mirror().host_view::<T>().context(DeviceSnafu)
    }

    /// Borrow a buffer's mirror contents for writing.
    ///
    /// Read-modify-write of a single buffer goes through this view;
    /// holding `read` and `write` of the same buffer at once panics
    /// (runtime borrow check).
    pub fn write<T: Element>(&self, id: BufferId) -> Result<RefMut<'a, [T]>> {
        self.lookup(id)?.mirror().host_view_mut::<T>().context(DeviceSnafu)
    }

    fn lookup(&self, id: BufferId) -> Result<&'a Buffer> {
        self.buffers.iter().copied().find(|b| b.id() == id).context(UnknownBufferSnafu { id })
    }
}
