//! Device-resident mirror storage for host buffers.

use std::cell::{OnceCell, Ref, RefCell, RefMut};
use std::sync::Arc;

use snafu::ensure;

use crate::backend::{MirrorBackend, MirrorOptions};
use crate::dtype::{DType, Element};
#[cfg(feature = "cuda")]
use crate::error::MirrorNotHostVisibleSnafu;
use crate::error::{DTypeMismatchSnafu, Result};

/// Raw mirror storage handle.
///
/// Uses `RefCell` for interior mutability with runtime borrow checking;
/// mirrors are only ever touched from the thread driving their session.
#[derive(Debug)]
pub enum RawMirror {
    /// Host-simulated device storage. Backed by `u64` words so element
    /// views stay aligned; `len` is the logical size in bytes.
    Host { words: RefCell<Box<[u64]>>, len: usize },
    #[cfg(feature = "cuda")]
    Cuda {
        data: RefCell<cudarc::driver::CudaSlice<u8>>,
        context: Arc<cudarc::driver::CudaContext>,
    },
}

impl RawMirror {
    /// Logical size of the mirror in bytes.
    pub fn len_bytes(&self) -> usize {
        match self {
            RawMirror::Host { len, .. } => *len,
            #[cfg(feature = "cuda")]
            RawMirror::Cuda { data, .. } => data.borrow().len(),
        }
    }
}

/// A buffer's device mirror.
///
/// Owns the raw allocation's lifecycle: storage is allocated on first use
/// and returned to the backend on drop. The host copy it shadows lives in
/// the owning [`crate::buffer::Buffer`].
#[derive(Debug)]
pub struct Mirror {
    raw: OnceCell<RawMirror>,
    backend: Arc<dyn MirrorBackend>,
    dtype: DType,
    len_bytes: usize,
}

impl Mirror {
    pub(crate) fn new(backend: Arc<dyn MirrorBackend>, dtype: DType, len_bytes: usize) -> Self {
        Self { raw: OnceCell::new(), backend, dtype, len_bytes }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn len_bytes(&self) -> usize {
        self.len_bytes
    }

    pub fn backend(&self) -> &Arc<dyn MirrorBackend> {
        &self.backend
    }

    pub fn is_allocated(&self) -> bool {
        self.raw.get().is_some()
    }

    /// Allocate the mirror storage if it does not exist yet.
    pub fn ensure_allocated(&self) -> Result<()> {
        if self.raw.get().is_some() {
            return Ok(());
        }
        let raw = self.backend.alloc(self.len_bytes, &MirrorOptions { zero_init: true })?;
        let _ = self.raw.set(raw);
        Ok(())
    }

    /// Raw storage reference (mirror must be allocated).
    fn raw(&self) -> &RawMirror {
        self.raw.get().expect("mirror not allocated")
    }

    /// Copy host bytes into the mirror, allocating it if needed.
    pub fn upload(&self, src: &[u8]) -> Result<()> {
        self.ensure_allocated()?;
        self.backend.upload(self.raw(), src)
    }

    /// Copy mirror bytes out to the host, allocating it if needed.
    pub fn download(&self, dst: &mut [u8]) -> Result<()> {
        self.ensure_allocated()?;
        self.backend.download(self.raw(), dst)
    }

    /// Borrow the mirror contents as a typed slice.
    ///
    /// Only host-visible mirrors support this; it is how in-process
    /// kernel programs read their arguments.
    pub fn host_view<T: Element>(&self) -> Result<Ref<'_, [T]>> {
        self.check_dtype::<T>()?;
        self.ensure_allocated()?;
        match self.raw() {
            RawMirror::Host { words, len } => {
                let len = *len;
                Ok(Ref::map(words.borrow(), |words| {
                    bytemuck::cast_slice(&bytemuck::cast_slice::<u64, u8>(words)[..len])
                }))
            }
            #[cfg(feature = "cuda")]
            RawMirror::Cuda { .. } => {
                MirrorNotHostVisibleSnafu { backend: self.backend.name() }.fail()
            }
        }
    }

    /// Borrow the mirror contents as a mutable typed slice.
    pub fn host_view_mut<T: Element>(&self) -> Result<RefMut<'_, [T]>> {
        self.check_dtype::<T>()?;
        self.ensure_allocated()?;
        match self.raw() {
            RawMirror::Host { words, len } => {
                let len = *len;
                Ok(RefMut::map(words.borrow_mut(), |words| {
                    bytemuck::cast_slice_mut(&mut bytemuck::cast_slice_mut::<u64, u8>(words)[..len])
                }))
            }
            #[cfg(feature = "cuda")]
            RawMirror::Cuda { .. } => {
                MirrorNotHostVisibleSnafu { backend: self.backend.name() }.fail()
            }
        }
    }

    fn check_dtype<T: Element>(&self) -> Result<()> {
        ensure!(
            T::DTYPE == self.dtype,
            DTypeMismatchSnafu { expected: self.dtype, requested: T::DTYPE }
        );
        Ok(())
    }
}

impl Drop for Mirror {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.backend.free(raw);
        }
    }
}
