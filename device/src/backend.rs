//! Mirror allocation and transfer primitives.
//!
//! `MirrorBackend` is the narrow seam to the device runtime: it owns the
//! mechanics of allocating mirror storage and copying bytes across, while
//! [`crate::buffer::Buffer`] owns *when* those things happen.

use std::cell::RefCell;

use snafu::ensure;

use crate::error::{Result, SizeMismatchSnafu};
use crate::mirror::RawMirror;

/// Options for mirror allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MirrorOptions {
    /// Zero the storage at allocation time.
    pub zero_init: bool,
}

pub trait MirrorBackend: Send + Sync + std::fmt::Debug {
    fn alloc(&self, len_bytes: usize, options: &MirrorOptions) -> Result<RawMirror>;
    fn free(&self, _mirror: RawMirror) {}
    /// Copy host bytes into the mirror.
    fn upload(&self, mirror: &RawMirror, src: &[u8]) -> Result<()>;
    /// Copy mirror bytes back to the host.
    fn download(&self, mirror: &RawMirror, dst: &mut [u8]) -> Result<()>;
    /// Wait for outstanding device work to complete.
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
    fn name(&self) -> &str;
}

/// Host-memory backend that simulates a device.
///
/// Mirror storage is allocated in `u64` words so typed element views of
/// the mirror stay aligned for every supported dtype. This is the backend
/// in-process kernel programs run against.
#[derive(Debug, Clone, Default)]
pub struct HostBackend;

impl MirrorBackend for HostBackend {
    fn alloc(&self, len_bytes: usize, _options: &MirrorOptions) -> Result<RawMirror> {
        // Fresh words are always zeroed; zero_init is a no-op here.
        let words = vec![0u64; len_bytes.div_ceil(8)].into_boxed_slice();
        Ok(RawMirror::Host { words: RefCell::new(words), len: len_bytes })
    }

    fn upload(&self, mirror: &RawMirror, src: &[u8]) -> Result<()> {
        match mirror {
            RawMirror::Host { words, len } => {
                ensure!(src.len() == *len, SizeMismatchSnafu { expected: *len, actual: src.len() });
                let mut words = words.borrow_mut();
                bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..*len].copy_from_slice(src);
                Ok(())
            }
            #[cfg(feature = "cuda")]
            RawMirror::Cuda { .. } => foreign_mirror("host"),
        }
    }

    fn download(&self, mirror: &RawMirror, dst: &mut [u8]) -> Result<()> {
        match mirror {
            RawMirror::Host { words, len } => {
                ensure!(dst.len() == *len, SizeMismatchSnafu { expected: *len, actual: dst.len() });
                let words = words.borrow();
                dst.copy_from_slice(&bytemuck::cast_slice::<u64, u8>(&words)[..*len]);
                Ok(())
            }
            #[cfg(feature = "cuda")]
            RawMirror::Cuda { .. } => foreign_mirror("host"),
        }
    }

    fn name(&self) -> &str {
        "host"
    }
}

/// A mirror allocated by a different backend was handed in.
#[cfg(feature = "cuda")]
fn foreign_mirror<T>(backend: &str) -> Result<T> {
    crate::error::CopyFailedSnafu { reason: format!("{backend} backend handed a foreign mirror") }.fail()
}

#[cfg(feature = "cuda")]
pub mod cuda {
    //! CUDA mirror backend.
    //!
    //! Carries the transfer primitives only: mirrors here are not host
    //! visible, so in-process kernel programs cannot run against them.

    use std::cell::RefCell;
    use std::sync::Arc;

    use cudarc::driver::CudaContext;
    use snafu::{ResultExt, ensure};

    use super::{MirrorBackend, MirrorOptions, foreign_mirror};
    use crate::error::{CudaSnafu, Result, SizeMismatchSnafu};
    use crate::mirror::RawMirror;

    #[derive(Debug, Clone)]
    pub struct CudaBackend {
        context: Arc<CudaContext>,
        device_id: usize,
    }

    impl CudaBackend {
        pub fn new(device_id: usize) -> Result<Self> {
            let context = CudaContext::new(device_id).context(CudaSnafu)?;
            Ok(Self { context, device_id })
        }

        pub fn device_id(&self) -> usize {
            self.device_id
        }
    }

    impl MirrorBackend for CudaBackend {
        fn alloc(&self, len_bytes: usize, options: &MirrorOptions) -> Result<RawMirror> {
            let stream = self.context.default_stream();
            let data = if options.zero_init {
                stream.alloc_zeros::<u8>(len_bytes)
            } else {
                unsafe { stream.alloc::<u8>(len_bytes) }
            }
            .context(CudaSnafu)?;

            Ok(RawMirror::Cuda { data: RefCell::new(data), context: Arc::clone(&self.context) })
        }

        fn upload(&self, mirror: &RawMirror, src: &[u8]) -> Result<()> {
            match mirror {
                RawMirror::Cuda { data, .. } => {
                    let mut data = data.borrow_mut();
                    ensure!(src.len() == data.len(), SizeMismatchSnafu { expected: data.len(), actual: src.len() });
                    self.context.default_stream().memcpy_htod(src, &mut *data).context(CudaSnafu)
                }
                RawMirror::Host { .. } => foreign_mirror("CUDA"),
            }
        }

        fn download(&self, mirror: &RawMirror, dst: &mut [u8]) -> Result<()> {
            match mirror {
                RawMirror::Cuda { data, .. } => {
                    let data = data.borrow();
                    ensure!(dst.len() == data.len(), SizeMismatchSnafu { expected: data.len(), actual: dst.len() });
                    self.context.default_stream().memcpy_dtoh(&*data, dst).context(CudaSnafu)
                }
                RawMirror::Host { .. } => foreign_mirror("CUDA"),
            }
        }

        fn synchronize(&self) -> Result<()> {
            self.context.default_stream().synchronize().context(CudaSnafu)
        }

        fn name(&self) -> &str {
            "CUDA"
        }
    }
}
