//! Host-memory stand-ins for the device runtime and host textures.
//!
//! Pointers handed out here are ordinary heap addresses and copies run
//! synchronously at enqueue time, which trivially preserves stream order.
//! Useful on machines without a GPU and for exercising a binding end to end.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::{
    datatype::DataType,
    device::DeviceType,
    errors::DeviceError,
    host::{DeviceDestination, DeviceMemory, HostBuffer},
    registry::registry,
    shape::MemoryShape,
    stream::{DevicePtr, DeviceRuntime, StreamId},
};

#[derive(Debug)]
pub struct EmulatedRuntime {
    next_stream: AtomicU64,
    live: Mutex<HashSet<StreamId>>,
    created: AtomicUsize,
    copies: AtomicUsize,
    copy_fault: Mutex<Option<DeviceError>>,
}

impl Default for EmulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatedRuntime {
    pub fn new() -> Self {
        EmulatedRuntime {
            next_stream: AtomicU64::new(1),
            live: Mutex::new(HashSet::new()),
            created: AtomicUsize::new(0),
            copies: AtomicUsize::new(0),
            copy_fault: Mutex::new(None),
        }
    }

    pub fn streams_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn live_streams(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_live(&self, stream: StreamId) -> bool {
        self.live.lock().contains(&stream)
    }

    pub fn copies_issued(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }

    /// Makes the next `copy_async` fail with `err` without touching memory.
    pub fn fail_next_copy(&self, err: DeviceError) {
        *self.copy_fault.lock() = Some(err);
    }
}

impl DeviceRuntime for EmulatedRuntime {
    fn device_type(&self) -> DeviceType {
        DeviceType::CPU
    }

    fn create_stream(&self) -> Result<StreamId, DeviceError> {
        let stream = StreamId(self.next_stream.fetch_add(1, Ordering::SeqCst));
        self.live.lock().insert(stream);
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(stream)
    }

    fn destroy_stream(&self, stream: StreamId) -> Result<(), DeviceError> {
        if self.live.lock().remove(&stream) {
            Ok(())
        } else {
            Err(DeviceError::InvalidHandle)
        }
    }

    unsafe fn copy_async(
        &self,
        dst: DevicePtr,
        src: DevicePtr,
        bytes: usize,
        stream: StreamId,
    ) -> Result<(), DeviceError> {
        if let Some(err) = self.copy_fault.lock().take() {
            return Err(err);
        }
        if !stream.is_default() && !self.is_live(stream) {
            return Err(DeviceError::InvalidHandle);
        }
        if dst.is_null() || src.is_null() {
            return Err(DeviceError::NullPointer);
        }
        std::ptr::copy(src.as_ptr() as *const u8, dst.as_ptr() as *mut u8, bytes);
        self.copies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn synchronize(&self, stream: StreamId) -> Result<(), DeviceError> {
        if stream.is_default() || self.is_live(stream) {
            Ok(())
        } else {
            Err(DeviceError::InvalidHandle)
        }
    }
}

#[derive(Debug)]
struct Texels {
    // u64 words keep every supported element kind aligned.
    words: Vec<u64>,
    len: usize,
    shape: MemoryShape,
    fault: Option<DeviceError>,
}

impl Texels {
    fn alloc(shape: MemoryShape) -> Self {
        let itemsize = registry()
            .describe(shape.data_type)
            .map(|entry| entry.byte_width)
            .unwrap_or_else(|_| shape.data_type.itemsize());
        let len = shape.byte_size(itemsize);
        Texels {
            words: vec![0; (len + 7) / 8],
            len,
            shape,
            fault: None,
        }
    }

    fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.words)[..self.len]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut(&mut self.words)[..self.len]
    }
}

/// A texture living in host memory, usable both as the input accessor and
/// as a copy destination.
#[derive(Debug)]
pub struct EmulatedTexture {
    texels: Mutex<Texels>,
}

impl EmulatedTexture {
    pub fn new(width: usize, height: usize, num_comps: usize, data_type: DataType) -> Self {
        Self::with_shape(MemoryShape::new(width, height, num_comps, data_type))
    }

    pub fn with_shape(shape: MemoryShape) -> Self {
        EmulatedTexture {
            texels: Mutex::new(Texels::alloc(shape)),
        }
    }

    /// Fills the texture with `f(byte_index)`.
    pub fn fill_with(&self, mut f: impl FnMut(usize) -> u8) {
        let mut texels = self.texels.lock();
        for (i, b) in texels.bytes_mut().iter_mut().enumerate() {
            *b = f(i);
        }
    }

    pub fn write(&self, data: &[u8]) {
        let mut texels = self.texels.lock();
        let n = data.len().min(texels.len);
        texels.bytes_mut()[..n].copy_from_slice(&data[..n]);
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.texels.lock().bytes().to_vec()
    }

    pub fn byte_len(&self) -> usize {
        self.texels.lock().len
    }

    /// Moves the contents to a fresh allocation, as a host does when it
    /// recreates a texture.
    pub fn reallocate(&self) {
        let mut texels = self.texels.lock();
        let mut moved = Texels::alloc(texels.shape);
        moved.bytes_mut().copy_from_slice(texels.bytes());
        moved.fault = texels.fault;
        *texels = moved;
    }

    /// Changes the texture's shape; contents are zeroed.
    pub fn resize(&self, shape: MemoryShape) {
        let mut texels = self.texels.lock();
        let fault = texels.fault;
        *texels = Texels::alloc(shape);
        texels.fault = fault;
    }

    /// Makes every subsequent memory access fail with `fault` until cleared.
    pub fn set_fault(&self, fault: Option<DeviceError>) {
        self.texels.lock().fault = fault;
    }
}

impl HostBuffer for EmulatedTexture {
    fn memory_shape(&self) -> MemoryShape {
        self.texels.lock().shape
    }

    fn device_memory(&self, _stream: StreamId) -> Result<DeviceMemory, DeviceError> {
        let mut texels = self.texels.lock();
        if let Some(fault) = texels.fault {
            return Err(fault);
        }
        Ok(DeviceMemory {
            ptr: DevicePtr::from_raw(texels.words.as_mut_ptr().cast()),
            size: texels.len,
            shape: texels.shape,
        })
    }
}

impl DeviceDestination for EmulatedTexture {
    fn capacity(&self) -> Option<usize> {
        Some(self.texels.lock().len)
    }

    fn device_ptr(
        &mut self,
        shape: &MemoryShape,
        _stream: StreamId,
    ) -> Result<DevicePtr, DeviceError> {
        let texels = self.texels.get_mut();
        if let Some(fault) = texels.fault {
            return Err(fault);
        }
        if texels.shape != *shape {
            log::trace!("destination {} receives {}", texels.shape, shape);
        }
        Ok(DevicePtr::from_raw(texels.words.as_mut_ptr().cast()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_tracked() {
        let rt = EmulatedRuntime::new();
        let a = rt.create_stream().unwrap();
        let b = rt.create_stream().unwrap();
        assert_ne!(a, b);
        assert!(!a.is_default());
        assert_eq!(rt.live_streams(), 2);
        rt.destroy_stream(a).unwrap();
        assert_eq!(rt.destroy_stream(a), Err(DeviceError::InvalidHandle));
        assert_eq!(rt.live_streams(), 1);
        assert_eq!(rt.streams_created(), 2);
    }

    #[test]
    fn copy_moves_bytes() {
        let rt = EmulatedRuntime::new();
        let stream = rt.create_stream().unwrap();
        let src = EmulatedTexture::new(4, 2, 1, DataType::u8());
        src.fill_with(|i| i as u8 + 1);
        let mut dst = EmulatedTexture::new(4, 2, 1, DataType::u8());
        let shape = src.memory_shape();
        let from = src.device_memory(stream).unwrap().ptr;
        let to = dst.device_ptr(&shape, stream).unwrap();
        unsafe { rt.copy_async(to, from, 8, stream).unwrap() };
        assert_eq!(dst.to_vec(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(rt.copies_issued(), 1);
    }

    #[test]
    fn copy_on_dead_stream_fails() {
        let rt = EmulatedRuntime::new();
        let stream = rt.create_stream().unwrap();
        rt.destroy_stream(stream).unwrap();
        let a = DevicePtr::from_addr(8);
        let res = unsafe { rt.copy_async(a, a, 0, stream) };
        assert_eq!(res, Err(DeviceError::InvalidHandle));
    }

    #[test]
    fn reallocation_keeps_contents() {
        let tex = EmulatedTexture::new(8, 8, 4, DataType::f32());
        assert_eq!(tex.byte_len(), 8 * 8 * 4 * 4);
        tex.fill_with(|i| (i % 251) as u8);
        let before = tex.to_vec();
        let keep = tex.device_memory(StreamId::DEFAULT).unwrap();
        tex.reallocate();
        let after = tex.device_memory(StreamId::DEFAULT).unwrap();
        assert_eq!(keep.shape, after.shape);
        assert_eq!(tex.to_vec(), before);
    }

    #[test]
    fn faults_surface() {
        let tex = EmulatedTexture::new(2, 2, 1, DataType::u8());
        tex.set_fault(Some(DeviceError::IllegalAddress));
        assert_eq!(
            tex.device_memory(StreamId::DEFAULT).unwrap_err(),
            DeviceError::IllegalAddress
        );
        tex.set_fault(None);
        assert!(tex.device_memory(StreamId::DEFAULT).is_ok());
    }
}
