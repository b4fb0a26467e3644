//! The graphics host's side of the boundary.

use crate::{
    errors::DeviceError,
    shape::MemoryShape,
    stream::{DevicePtr, StreamId},
};

/// Snapshot of a host texture's device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceMemory {
    pub ptr: DevicePtr,
    /// Bytes reachable from `ptr`. Must cover the strides implied by `shape`.
    pub size: usize,
    pub shape: MemoryShape,
}

/// Accessor for a host-owned texture that can be read on the device.
///
/// Both calls are expected to be cheap enough to make once per frame.
pub trait HostBuffer {
    fn memory_shape(&self) -> MemoryShape;

    /// Current device memory, made valid for `stream`.
    fn device_memory(&self, stream: StreamId) -> Result<DeviceMemory, DeviceError>;
}

/// Host-owned texture memory a result is copied into.
pub trait DeviceDestination {
    /// Bytes available behind the address returned by `device_ptr`, if the host exposes it.
    fn capacity(&self) -> Option<usize>;

    /// Prepares the destination to receive an image of `shape` on `stream` and
    /// returns the address to copy to.
    fn device_ptr(&mut self, shape: &MemoryShape, stream: StreamId)
        -> Result<DevicePtr, DeviceError>;
}

impl<H: HostBuffer + ?Sized> HostBuffer for &H {
    fn memory_shape(&self) -> MemoryShape {
        (**self).memory_shape()
    }

    fn device_memory(&self, stream: StreamId) -> Result<DeviceMemory, DeviceError> {
        (**self).device_memory(stream)
    }
}
