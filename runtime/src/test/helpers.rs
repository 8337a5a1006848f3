//! Shared helpers for session tests.

use std::sync::Arc;

use ferry_device::{Buffer, HostArray, HostBackend, MirrorBackend};

pub fn backend() -> Arc<dyn MirrorBackend> {
    Arc::new(HostBackend)
}

/// Bind a named f32 buffer over fresh host storage.
pub fn f32_buffer(name: &str, data: Vec<f32>) -> (HostArray<f32>, Buffer) {
    let host = HostArray::new(data);
    let buffer = Buffer::bind(backend(), name, &host);
    (host, buffer)
}
