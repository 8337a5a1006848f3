use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::{SmallVec, smallvec};
use snafu::ensure;
use tracing::trace;

use crate::backend::MirrorBackend;
use crate::dtype::{DType, Element};
use crate::error::{Result, ShapeMismatchSnafu};
use crate::mirror::Mirror;

/// Process-unique buffer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

impl BufferId {
    fn next() -> Self {
        BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Caller-owned host storage for one buffer.
///
/// The caller keeps a clone for host-side reads and writes; the bound
/// [`Buffer`] keeps a type-erased handle for transfers. Clones share the
/// same storage.
#[derive(Debug, Clone)]
pub struct HostArray<T: Element> {
    data: Rc<RefCell<Vec<T>>>,
}

impl<T: Element> HostArray<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data: Rc::new(RefCell::new(data)) }
    }

    pub fn from_elem(value: T, len: usize) -> Self {
        Self::new(vec![value; len])
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }

    /// Borrow the host contents.
    pub fn borrow(&self) -> Ref<'_, Vec<T>> {
        self.data.borrow()
    }

    /// Borrow the host contents mutably.
    ///
    /// A session tracking this array does not observe the write; in
    /// implicit mode, follow up with `put` so the next launch re-uploads.
    pub fn borrow_mut(&self) -> RefMut<'_, Vec<T>> {
        self.data.borrow_mut()
    }

    /// Snapshot the host contents.
    pub fn to_vec(&self) -> Vec<T> {
        self.data.borrow().clone()
    }
}

/// Type-erased transfer access to a host array.
trait HostStore: fmt::Debug {
    fn len_bytes(&self) -> usize;
    fn with_bytes(&self, f: &mut dyn FnMut(&[u8]));
    fn with_bytes_mut(&self, f: &mut dyn FnMut(&mut [u8]));
}

impl<T: Element> HostStore for RefCell<Vec<T>> {
    fn len_bytes(&self) -> usize {
        self.borrow().len() * size_of::<T>()
    }

    fn with_bytes(&self, f: &mut dyn FnMut(&[u8])) {
        f(bytemuck::cast_slice(&self.borrow()));
    }

    fn with_bytes_mut(&self, f: &mut dyn FnMut(&mut [u8])) {
        f(bytemuck::cast_slice_mut(&mut self.borrow_mut()));
    }
}

/// One host array and its device mirror.
///
/// The buffer does not own the host data (the caller keeps a
/// [`HostArray`] clone); it exclusively owns the mirror's lifecycle.
///
/// This type is `!Send + !Sync`: one thread drives a session and the
/// buffers bound to it.
#[derive(Debug)]
pub struct Buffer {
    id: BufferId,
    name: String,
    dtype: DType,
    shape: SmallVec<[usize; 4]>,
    host: Rc<dyn HostStore>,
    mirror: Mirror,
    /// Marker to make Buffer `!Send + !Sync` (single-threaded only).
    _not_send_sync: PhantomData<Rc<()>>,
}

impl Buffer {
    /// Bind a host array as a flat work buffer.
    pub fn bind<T: Element>(
        backend: Arc<dyn MirrorBackend>,
        name: impl Into<String>,
        host: &HostArray<T>,
    ) -> Self {
        let len = host.len();
        Self::build(backend, name.into(), host, smallvec![len])
    }

    /// Bind a host array with an explicit shape.
    pub fn bind_with_shape<T: Element>(
        backend: Arc<dyn MirrorBackend>,
        name: impl Into<String>,
        host: &HostArray<T>,
        shape: &[usize],
    ) -> Result<Self> {
        let expected: usize = shape.iter().product();
        ensure!(
            expected == host.len(),
            ShapeMismatchSnafu { shape: shape.to_vec(), expected, actual: host.len() }
        );
        Ok(Self::build(backend, name.into(), host, SmallVec::from_slice(shape)))
    }

    fn build<T: Element>(
        backend: Arc<dyn MirrorBackend>,
        name: String,
        host: &HostArray<T>,
        shape: SmallVec<[usize; 4]>,
    ) -> Self {
        let len_bytes = host.len() * T::DTYPE.bytes();
        Self {
            id: BufferId::next(),
            name,
            dtype: T::DTYPE,
            shape,
            host: host.data.clone(),
            mirror: Mirror::new(backend, T::DTYPE, len_bytes),
            _not_send_sync: PhantomData,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len_bytes(&self) -> usize {
        self.host.len_bytes()
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Allocate the device mirror if it does not exist yet.
    pub fn ensure_allocated(&self) -> Result<()> {
        self.mirror.ensure_allocated()
    }

    /// Copy the host array into the device mirror.
    pub fn sync_to_device(&self) -> Result<()> {
        trace!(buffer = %self.id, name = %self.name, "sync to device");
        let mut result = Ok(());
        self.host.with_bytes(&mut |bytes| result = self.mirror.upload(bytes));
        result
    }

    /// Copy the device mirror back into the host array.
    pub fn sync_to_host(&self) -> Result<()> {
        trace!(buffer = %self.id, name = %self.name, "sync to host");
        let mut result = Ok(());
        self.host.with_bytes_mut(&mut |bytes| result = self.mirror.download(bytes));
        result
    }
}
