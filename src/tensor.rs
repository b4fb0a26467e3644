use pin_project::{pin_project, pinned_drop};

use core::slice;
use std::{marker::PhantomData, mem, os::raw::c_void, pin::Pin, ptr::NonNull};

use crate::{
    datatype::DataType,
    device::Device,
    errors::{Error, Result},
    ffi::{DLManagedTensor, DLTensor},
    interface::ArrayInterface,
    registry::registry,
    stream::DevicePtr,
};

/// Whether `strides` (in elements) describe a packed row-major layout of `shape`.
fn is_compact(shape: &[i64], strides: &[i64]) -> bool {
    let mut expected = 1;
    for (&dim, &stride) in shape.iter().zip(strides).rev() {
        if dim != 1 && stride != expected {
            return false;
        }
        expected *= dim;
    }
    true
}

/// Non-owning DLPack view over device memory.
/// See [DLTensor](https://dmlc.github.io/dlpack/latest/c_api.html#_CPPv48DLTensor)
///
/// Shape and strides (in elements) are owned by the view and back the raw
/// pointers of the inner `DLTensor`; the data is not.
#[derive(Debug)]
pub struct Tensor<'tensor> {
    inner: DLTensor,
    device: Device,
    shape: Vec<i64>,
    strides: Vec<i64>,
    _marker: PhantomData<fn(&'tensor ()) -> &'tensor ()>, // invariant wrt 'tensor
}

impl<'tensor> Tensor<'tensor> {
    /// # Panics
    ///
    /// If `shape` and `strides` differ in length.
    pub fn new(
        data: DevicePtr,
        device: Device,
        dtype: DataType,
        shape: Vec<i64>,
        strides: Vec<i64>,
        byte_offset: u64,
    ) -> Self {
        assert_eq!(shape.len(), strides.len(), "one stride per axis");
        let inner = DLTensor {
            data: data.as_ptr(),
            device: device.into(),
            ndim: shape.len() as i32,
            dtype: dtype.into(),
            shape: shape.as_ptr() as *mut i64,
            strides: strides.as_ptr() as *mut i64,
            byte_offset,
        };
        Tensor {
            inner,
            device,
            shape,
            strides,
            _marker: PhantomData,
        }
    }

    /// Builds a zero-copy view from an array interchange descriptor.
    pub fn from_interface(iface: &'tensor ArrayInterface, device: Device) -> Result<Self> {
        let (dtype, entry) = registry()
            .parse_typestr(iface.typestr)
            .ok_or_else(|| Error::UnknownTypestr(iface.typestr.to_string()))?;
        let itemsize = entry.byte_width;
        if iface.strides.iter().any(|s| s % itemsize != 0) {
            return Err(Error::InvalidStrides {
                strides: iface.strides.to_vec(),
                itemsize,
            });
        }
        Ok(Tensor::new(
            iface.ptr(),
            device,
            dtype,
            iface.shape.iter().map(|&d| d as i64).collect(),
            iface.strides.iter().map(|&s| (s / itemsize) as i64).collect(),
            0,
        ))
    }

    /// Reorders axes without touching memory; axis `i` of the result is axis
    /// `axes[i]` of `self`.
    ///
    /// # Panics
    ///
    /// If `axes` is not a permutation of `0..ndim`.
    pub fn permute(self, axes: &[usize]) -> Self {
        let ndim = self.ndim();
        let mut seen = vec![false; ndim];
        assert_eq!(axes.len(), ndim, "permutation must name every axis");
        for &axis in axes {
            assert!(axis < ndim && !seen[axis], "invalid permutation {:?}", axes);
            seen[axis] = true;
        }
        let shape = axes.iter().map(|&a| self.shape[a]).collect();
        let strides = axes.iter().map(|&a| self.strides[a]).collect();
        Tensor::new(
            self.data(),
            self.device,
            self.dtype(),
            shape,
            strides,
            self.inner.byte_offset,
        )
    }

    /// The underlying DLTensor; its pointers stay valid while `self` lives.
    pub fn as_dl_tensor(&self) -> &DLTensor {
        &self.inner
    }

    pub fn data(&self) -> DevicePtr {
        DevicePtr::from_raw(self.inner.data)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn dtype(&self) -> DataType {
        self.inner.dtype.into()
    }

    /// Returns the size of an entry/item in the Tensor.
    pub fn itemsize(&self) -> usize {
        self.dtype().itemsize()
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    /// Strides in elements.
    pub fn strides(&self) -> &[i64] {
        &self.strides
    }

    pub fn byte_offset(&self) -> u64 {
        self.inner.byte_offset
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product::<i64>() as usize
    }

    /// Bytes needed to store the elements packed.
    pub fn nbytes(&self) -> usize {
        self.numel() * self.itemsize()
    }

    pub fn is_contiguous(&self) -> bool {
        is_compact(&self.shape, &self.strides)
    }
}

struct ExportContext {
    _shape: Vec<i64>,
    _strides: Vec<i64>,
}

unsafe extern "C" fn export_deleter(managed: *mut DLManagedTensor) {
    if managed.is_null() {
        return;
    }
    // SAFETY: both boxes were leaked by `ManagedTensor::export` and the
    // deleter runs once.
    let managed = Box::from_raw(managed);
    if !managed.manager_ctx.is_null() {
        drop(Box::from_raw(managed.manager_ctx as *mut ExportContext));
    }
}

/// Owning handle over a DLPack managed tensor.
/// See [DLManagedTensor](https://dmlc.github.io/dlpack/latest/c_api.html#_CPPv415DLManagedTensor)
///
/// Holding the handle keeps the producer's buffer alive; dropping it hands
/// the buffer back by calling the producer's deleter. The handle itself never
/// frees device memory.
#[derive(Debug)]
#[pin_project(PinnedDrop)]
pub struct ManagedTensor {
    raw: NonNull<DLManagedTensor>,
}

// The handle is only a pointer to producer-owned metadata; moving it across
// threads moves the responsibility to call the deleter with it.
unsafe impl Send for ManagedTensor {}

impl ManagedTensor {
    /// Publishes `view` as a managed tensor aliasing the same memory.
    ///
    /// Only the shape/strides metadata is owned; the data must outlive the
    /// returned handle.
    pub fn export(view: &Tensor<'_>) -> Self {
        let context = Box::new(ExportContext {
            _shape: view.shape.clone(),
            _strides: view.strides.clone(),
        });
        let dl_tensor = DLTensor {
            shape: context._shape.as_ptr() as *mut i64,
            strides: context._strides.as_ptr() as *mut i64,
            ..view.inner
        };
        let managed = Box::new(DLManagedTensor {
            dl_tensor,
            manager_ctx: Box::into_raw(context) as *mut c_void,
            deleter: Some(export_deleter),
        });
        ManagedTensor {
            // SAFETY: Box::into_raw never returns null.
            raw: unsafe { NonNull::new_unchecked(Box::into_raw(managed)) },
        }
    }

    /// Takes ownership of a managed tensor produced across the C boundary.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a valid `DLManagedTensor` whose deleter (if any)
    /// has not been called, and must not be used by the caller afterwards.
    pub unsafe fn from_raw(ptr: *mut DLManagedTensor) -> Option<Self> {
        NonNull::new(ptr).map(|raw| ManagedTensor { raw })
    }

    /// Gives up ownership without calling the deleter.
    pub fn into_raw(self) -> *mut DLManagedTensor {
        let raw = self.raw.as_ptr();
        mem::forget(self);
        raw
    }

    pub fn dl_tensor(&self) -> &DLTensor {
        // SAFETY: valid until the deleter runs, which only happens on drop.
        unsafe { &self.raw.as_ref().dl_tensor }
    }

    /// First byte of the tensor's data, `byte_offset` applied.
    pub fn data(&self) -> DevicePtr {
        let dl = self.dl_tensor();
        DevicePtr::from_raw(dl.data).offset(dl.byte_offset as usize)
    }

    pub fn dtype(&self) -> DataType {
        self.dl_tensor().dtype.into()
    }

    pub fn shape(&self) -> &[i64] {
        let dl = self.dl_tensor();
        if dl.shape.is_null() {
            return &[];
        }
        unsafe { slice::from_raw_parts(dl.shape, dl.ndim as usize) }
    }

    /// Strides in elements; `None` means compact row-major.
    pub fn strides(&self) -> Option<&[i64]> {
        let dl = self.dl_tensor();
        if dl.strides.is_null() {
            return None;
        }
        Some(unsafe { slice::from_raw_parts(dl.strides, dl.ndim as usize) })
    }

    pub fn nbytes(&self) -> usize {
        self.shape().iter().product::<i64>() as usize * self.dtype().itemsize()
    }

    pub fn is_contiguous(&self) -> bool {
        match self.strides() {
            None => true,
            Some(strides) => is_compact(self.shape(), strides),
        }
    }
}

#[pinned_drop]
impl PinnedDrop for ManagedTensor {
    fn drop(self: Pin<&mut Self>) {
        let raw = self.project().raw.as_ptr();
        unsafe {
            if let Some(deleter) = (*raw).deleter {
                deleter(raw);
            }
        }
    }
}
