use std::fmt::{self, Display, Formatter};
use std::os::raw::c_void;
use std::sync::Arc;

use crate::{device::DeviceType, errors::DeviceError};

/// Opaque handle of an asynchronous execution queue.
///
/// The value is passed verbatim to the host and to the tensor library; its
/// only contract is that work tagged with the same handle executes in issue
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StreamId(pub u64);

impl StreamId {
    /// The runtime's legacy default stream.
    pub const DEFAULT: StreamId = StreamId(0);

    pub fn as_raw(self) -> u64 {
        self.0
    }

    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

impl Display for StreamId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "stream({:#x})", self.0)
    }
}

/// Non-owning device address.
///
/// Valid only until the owner (host texture or tensor library) moves or frees
/// the allocation; for host buffers that is until the next `update`, for
/// tensor-produced buffers until the next `set_source`. Dropping it never
/// frees anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct DevicePtr(usize);

impl DevicePtr {
    pub const fn null() -> Self {
        DevicePtr(0)
    }

    pub fn from_raw(ptr: *mut c_void) -> Self {
        DevicePtr(ptr as usize)
    }

    pub const fn from_addr(addr: usize) -> Self {
        DevicePtr(addr)
    }

    pub fn addr(self) -> usize {
        self.0
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn offset(self, bytes: usize) -> Self {
        DevicePtr(self.0 + bytes)
    }
}

impl Display for DevicePtr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// The device runtime every binding issues its work through.
pub trait DeviceRuntime {
    /// Memory domain the runtime's pointers belong to.
    fn device_type(&self) -> DeviceType;

    fn create_stream(&self) -> Result<StreamId, DeviceError>;

    fn destroy_stream(&self, stream: StreamId) -> Result<(), DeviceError>;

    /// Enqueues a copy of `bytes` bytes from `src` to `dst` on `stream`.
    ///
    /// # Safety
    ///
    /// Both ranges must be valid device allocations of at least `bytes` bytes
    /// until the copy has executed on `stream`, and must not overlap.
    unsafe fn copy_async(
        &self,
        dst: DevicePtr,
        src: DevicePtr,
        bytes: usize,
        stream: StreamId,
    ) -> Result<(), DeviceError>;

    /// Blocks until all work on `stream` has completed.
    fn synchronize(&self, stream: StreamId) -> Result<(), DeviceError>;
}

impl<R: DeviceRuntime + ?Sized> DeviceRuntime for &R {
    fn device_type(&self) -> DeviceType {
        (**self).device_type()
    }

    fn create_stream(&self) -> Result<StreamId, DeviceError> {
        (**self).create_stream()
    }

    fn destroy_stream(&self, stream: StreamId) -> Result<(), DeviceError> {
        (**self).destroy_stream(stream)
    }

    unsafe fn copy_async(
        &self,
        dst: DevicePtr,
        src: DevicePtr,
        bytes: usize,
        stream: StreamId,
    ) -> Result<(), DeviceError> {
        (**self).copy_async(dst, src, bytes, stream)
    }

    fn synchronize(&self, stream: StreamId) -> Result<(), DeviceError> {
        (**self).synchronize(stream)
    }
}

impl<R: DeviceRuntime + ?Sized> DeviceRuntime for Arc<R> {
    fn device_type(&self) -> DeviceType {
        (**self).device_type()
    }

    fn create_stream(&self) -> Result<StreamId, DeviceError> {
        (**self).create_stream()
    }

    fn destroy_stream(&self, stream: StreamId) -> Result<(), DeviceError> {
        (**self).destroy_stream(stream)
    }

    unsafe fn copy_async(
        &self,
        dst: DevicePtr,
        src: DevicePtr,
        bytes: usize,
        stream: StreamId,
    ) -> Result<(), DeviceError> {
        (**self).copy_async(dst, src, bytes, stream)
    }

    fn synchronize(&self, stream: StreamId) -> Result<(), DeviceError> {
        (**self).synchronize(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_ptr_is_plain_address() {
        let ptr = DevicePtr::from_addr(0x1000);
        assert_eq!(ptr.offset(0x20).addr(), 0x1020);
        assert!(!ptr.is_null());
        assert!(DevicePtr::null().is_null());
        assert_eq!(ptr.to_string(), "0x1000");
    }

    #[test]
    fn stream_display() {
        assert_eq!(StreamId(0x2a).to_string(), "stream(0x2a)");
        assert!(StreamId::DEFAULT.is_default());
    }
}
