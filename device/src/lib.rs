//! Storage layer for ferry: element types, host arrays, device mirrors,
//! and the backend seam that owns allocation and copy mechanics.
//!
//! The scheduling layer (`ferry-runtime`) decides *when* data moves
//! between a host array and its device mirror; this crate knows *how*.
//!
//! # Backends
//!
//! [`HostBackend`] simulates a device in host memory and is what
//! in-process kernel programs execute against. A `cuda` feature adds a
//! `cudarc`-based backend carrying the transfer primitives only.

pub mod backend;
pub mod buffer;
pub mod dtype;
pub mod error;
pub mod mirror;

#[cfg(test)]
pub mod test;

#[cfg(feature = "cuda")]
pub use backend::cuda::CudaBackend;
pub use backend::{HostBackend, MirrorBackend, MirrorOptions};
pub use buffer::{Buffer, BufferId, HostArray};
pub use dtype::{DType, Element};
pub use error::{Error, Result};
pub use mirror::{Mirror, RawMirror};
