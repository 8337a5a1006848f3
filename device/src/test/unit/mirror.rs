use crate::backend::{MirrorBackend, MirrorOptions};
use crate::mirror::Mirror;
use crate::{DType, Error, HostBackend};

use std::sync::Arc;

fn mirror(dtype: DType, len_bytes: usize) -> Mirror {
    Mirror::new(Arc::new(HostBackend), dtype, len_bytes)
}

#[test]
fn fresh_mirror_is_zeroed() {
    let m = mirror(DType::F32, 16);
    let view = m.host_view::<f32>().unwrap();
    assert_eq!(&*view, &[0.0; 4]);
}

#[test]
fn upload_download_round_trip() {
    let m = mirror(DType::U32, 12);
    let data: Vec<u32> = vec![10, 20, 30];
    m.upload(bytemuck::cast_slice(&data)).unwrap();

    let mut out = vec![0u32; 3];
    m.download(bytemuck::cast_slice_mut(&mut out)).unwrap();
    assert_eq!(out, data);
}

#[test]
fn upload_rejects_wrong_size() {
    let m = mirror(DType::F32, 8);
    let result = m.upload(&[0u8; 4]);
    assert!(matches!(result, Err(Error::SizeMismatch { expected: 8, actual: 4 })));
}

#[test]
fn typed_view_rejects_wrong_dtype() {
    let m = mirror(DType::F32, 8);
    let result = m.host_view::<f64>();
    assert!(matches!(
        result,
        Err(Error::DTypeMismatch { expected: DType::F32, requested: DType::F64 })
    ));
}

#[test]
fn f64_view_is_aligned() {
    let m = mirror(DType::F64, 24);
    {
        let mut view = m.host_view_mut::<f64>().unwrap();
        view[0] = 1.25;
        view[2] = -3.5;
    }
    let view = m.host_view::<f64>().unwrap();
    assert_eq!(&*view, &[1.25, 0.0, -3.5]);
}

#[test]
fn view_writes_survive_download() {
    let m = mirror(DType::I32, 8);
    {
        let mut view = m.host_view_mut::<i32>().unwrap();
        view[0] = -1;
        view[1] = 42;
    }
    let mut out = [0i32; 2];
    m.download(bytemuck::cast_slice_mut(&mut out)).unwrap();
    assert_eq!(out, [-1, 42]);
}

#[test]
fn backend_alloc_respects_odd_lengths() {
    // 6 bytes does not fill a whole word; the logical length must win.
    let raw = HostBackend.alloc(6, &MirrorOptions::default()).unwrap();
    assert_eq!(raw.len_bytes(), 6);
}
