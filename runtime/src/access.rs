//! Static per-buffer access analysis over a kernel's declared call graph.
//!
//! The analysis only sees code reachable from the kernel body itself,
//! never the call site that invokes the kernel. It is sound but not
//! complete: whenever an access mode cannot be proven, the result
//! degrades to [`AccessMode::ReadWrite`]: correctness over performance.
//!
//! # Design
//!
//! The kernel body arrives as a [`BodyGraph`]: routines holding direct
//! buffer accesses and call sites. Analysis is a fixed-point worklist
//! walk from the entry routine, joining every access observed on any
//! reachable path. An opaque call site (indirect call, dynamic dispatch)
//! forces every bound buffer to `ReadWrite`, as does a call to a routine
//! the graph does not contain.

use std::collections::{HashMap, HashSet};

use ferry_device::BufferId;

/// How a kernel body touches a buffer within one invocation.
///
/// Forms a join lattice: `None` at the bottom, `ReadWrite` at the top.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AccessMode {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    /// Least upper bound of two observations.
    pub const fn join(self, other: AccessMode) -> AccessMode {
        use AccessMode::*;
        match (self, other) {
            (None, m) | (m, None) => m,
            (Read, Read) => Read,
            (Write, Write) => Write,
            _ => ReadWrite,
        }
    }

    /// Whether a launch consumes the host copy.
    pub const fn is_read(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    /// Whether a launch invalidates the host copy.
    pub const fn is_written(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

/// A call site inside a routine.
#[derive(Debug, Clone)]
pub enum CallSite {
    /// Statically-known callee, by routine name.
    Direct(String),
    /// Indirect call whose target is invisible to the analysis
    /// (function pointer, dynamic dispatch).
    Opaque,
}

/// One routine of the kernel body: its direct buffer accesses and the
/// calls it makes.
#[derive(Debug, Clone, Default)]
pub struct Routine {
    accesses: Vec<(BufferId, AccessMode)>,
    calls: Vec<CallSite>,
}

impl Routine {
    pub fn reads(&mut self, id: BufferId) -> &mut Self {
        self.accesses.push((id, AccessMode::Read));
        self
    }

    pub fn writes(&mut self, id: BufferId) -> &mut Self {
        self.accesses.push((id, AccessMode::Write));
        self
    }

    pub fn reads_writes(&mut self, id: BufferId) -> &mut Self {
        self.accesses.push((id, AccessMode::ReadWrite));
        self
    }

    /// An access whose direction cannot be proven, e.g. the buffer is
    /// handed by mutable reference to code the analysis cannot classify.
    pub fn touches(&mut self, id: BufferId) -> &mut Self {
        self.reads_writes(id)
    }

    pub fn calls(&mut self, callee: impl Into<String>) -> &mut Self {
        self.calls.push(CallSite::Direct(callee.into()));
        self
    }

    pub fn calls_opaque(&mut self) -> &mut Self {
        self.calls.push(CallSite::Opaque);
        self
    }
}

/// Declared call graph of a kernel body, rooted at the entry routine.
#[derive(Debug, Clone)]
pub struct BodyGraph {
    entry: String,
    routines: HashMap<String, Routine>,
}

impl BodyGraph {
    /// Create a graph whose entry routine is `entry` (created empty).
    pub fn new(entry: impl Into<String>) -> Self {
        let entry = entry.into();
        let mut routines = HashMap::new();
        routines.insert(entry.clone(), Routine::default());
        Self { entry, routines }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Access a routine by name, creating it if needed.
    pub fn routine(&mut self, name: impl Into<String>) -> &mut Routine {
        self.routines.entry(name.into()).or_default()
    }

    /// Every buffer id named by any routine's accesses.
    pub fn referenced_buffers(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.routines.values().flat_map(|r| r.accesses.iter().map(|(id, _)| *id))
    }

    /// Compute the access mode of each buffer in `bound`: a fixed-point
    /// walk of every routine reachable from the entry, joining each
    /// access seen. Pure; sessions run it once at bind time and cache
    /// the result.
    pub(crate) fn analyze(&self, bound: &[BufferId]) -> HashMap<BufferId, AccessMode> {
        let mut modes: HashMap<BufferId, AccessMode> =
            bound.iter().map(|id| (*id, AccessMode::None)).collect();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut worklist: Vec<&str> = vec![self.entry.as_str()];

        while let Some(name) = worklist.pop() {
            if !visited.insert(name) {
                continue;
            }
            let Some(routine) = self.routines.get(name) else {
                // Callee missing from the graph: same as an opaque call.
                conservative_all(&mut modes);
                continue;
            };
            for (id, mode) in &routine.accesses {
                if let Some(entry) = modes.get_mut(id) {
                    *entry = entry.join(*mode);
                }
            }
            for call in &routine.calls {
                match call {
                    CallSite::Direct(callee) => worklist.push(callee.as_str()),
                    CallSite::Opaque => conservative_all(&mut modes),
                }
            }
        }
        modes
    }
}

fn conservative_all(modes: &mut HashMap<BufferId, AccessMode>) {
    for mode in modes.values_mut() {
        *mode = AccessMode::ReadWrite;
    }
}
