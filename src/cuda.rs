//! CUDA runtime bindings used by [`CudaRuntime`].
//!
//! Only the handful of entry points a binding needs: stream lifetime,
//! async device-to-device copies and stream synchronisation. Built without
//! the `cuda` feature every call fails with [`DeviceError::NotSupported`].

#[cfg(feature = "cuda")]
use std::os::raw::c_void;

use crate::{
    device::DeviceType,
    errors::DeviceError,
    stream::{DevicePtr, DeviceRuntime, StreamId},
};

/// `cudaMemcpyKind`
#[repr(i32)]
#[derive(Debug, Clone, Copy)]
pub enum MemcpyKind {
    HostToHost = 0,
    HostToDevice = 1,
    DeviceToHost = 2,
    DeviceToDevice = 3,
    Default = 4,
}

#[cfg(feature = "cuda")]
#[link(name = "cudart")]
extern "C" {
    fn cudaSetDevice(device: i32) -> i32;
    fn cudaStreamCreate(stream: *mut *mut c_void) -> i32;
    fn cudaStreamDestroy(stream: *mut c_void) -> i32;
    fn cudaStreamSynchronize(stream: *mut c_void) -> i32;
    fn cudaMemcpyAsync(
        dst: *mut c_void,
        src: *const c_void,
        count: usize,
        kind: i32,
        stream: *mut c_void,
    ) -> i32;
}

/// Device runtime backed by libcudart on one GPU.
#[derive(Debug, Clone)]
pub struct CudaRuntime {
    device_id: i32,
}

impl CudaRuntime {
    /// Selects `device_id` as the current device for the calling thread.
    ///
    /// Every runtime call selects it again, so the runtime can be shared with
    /// bindings driven from other threads.
    pub fn new(device_id: usize) -> Result<Self, DeviceError> {
        let runtime = CudaRuntime {
            device_id: device_id as i32,
        };
        runtime.make_current()?;
        Ok(runtime)
    }

    pub fn device_id(&self) -> usize {
        self.device_id as usize
    }

    #[cfg(feature = "cuda")]
    fn make_current(&self) -> Result<(), DeviceError> {
        DeviceError::check(unsafe { cudaSetDevice(self.device_id) })
    }

    #[cfg(not(feature = "cuda"))]
    fn make_current(&self) -> Result<(), DeviceError> {
        Err(DeviceError::NotSupported)
    }
}

#[cfg(feature = "cuda")]
impl DeviceRuntime for CudaRuntime {
    fn device_type(&self) -> DeviceType {
        DeviceType::CUDA
    }

    fn create_stream(&self) -> Result<StreamId, DeviceError> {
        self.make_current()?;
        let mut raw: *mut c_void = std::ptr::null_mut();
        DeviceError::check(unsafe { cudaStreamCreate(&mut raw) })?;
        log::debug!("created CUDA stream {:p} on device {}", raw, self.device_id);
        Ok(StreamId(raw as u64))
    }

    fn destroy_stream(&self, stream: StreamId) -> Result<(), DeviceError> {
        self.make_current()?;
        DeviceError::check(unsafe { cudaStreamDestroy(stream.as_raw() as *mut c_void) })
    }

    unsafe fn copy_async(
        &self,
        dst: DevicePtr,
        src: DevicePtr,
        bytes: usize,
        stream: StreamId,
    ) -> Result<(), DeviceError> {
        if dst.is_null() || src.is_null() {
            return Err(DeviceError::NullPointer);
        }
        self.make_current()?;
        DeviceError::check(cudaMemcpyAsync(
            dst.as_ptr(),
            src.as_ptr() as *const c_void,
            bytes,
            MemcpyKind::DeviceToDevice as i32,
            stream.as_raw() as *mut c_void,
        ))
    }

    fn synchronize(&self, stream: StreamId) -> Result<(), DeviceError> {
        self.make_current()?;
        DeviceError::check(unsafe { cudaStreamSynchronize(stream.as_raw() as *mut c_void) })
    }
}

#[cfg(not(feature = "cuda"))]
impl DeviceRuntime for CudaRuntime {
    fn device_type(&self) -> DeviceType {
        DeviceType::CUDA
    }

    fn create_stream(&self) -> Result<StreamId, DeviceError> {
        Err(DeviceError::NotSupported)
    }

    fn destroy_stream(&self, _stream: StreamId) -> Result<(), DeviceError> {
        Err(DeviceError::NotSupported)
    }

    unsafe fn copy_async(
        &self,
        _dst: DevicePtr,
        _src: DevicePtr,
        _bytes: usize,
        _stream: StreamId,
    ) -> Result<(), DeviceError> {
        Err(DeviceError::NotSupported)
    }

    fn synchronize(&self, _stream: StreamId) -> Result<(), DeviceError> {
        Err(DeviceError::NotSupported)
    }
}
