use snafu::Snafu;

use crate::dtype::DType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Declared shape does not cover the host array.
    #[snafu(display("shape mismatch: shape {shape:?} holds {expected} elements, host array has {actual}"))]
    ShapeMismatch { shape: Vec<usize>, expected: usize, actual: usize },

    #[snafu(display("size mismatch: expected {expected} bytes, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// Typed access with an element type other than the buffer's dtype.
    #[snafu(display("dtype mismatch: buffer is {expected:?}, requested {requested:?}"))]
    DTypeMismatch { expected: DType, requested: DType },

    /// Mirror contents cannot be borrowed by host code (non-host backend).
    #[snafu(display("mirror on backend '{backend}' is not host visible"))]
    MirrorNotHostVisible { backend: String },

    /// Failed to copy data between host and mirror.
    #[snafu(display("copy operation failed: {reason}"))]
    CopyFailed { reason: String },

    #[cfg(feature = "cuda")]
    /// CUDA driver errors.
    #[snafu(display("CUDA error: {source}"))]
    Cuda { source: cudarc::driver::DriverError },
}
