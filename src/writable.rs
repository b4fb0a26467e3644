use crate::{
    datatype::DataType,
    errors::{Error, Result},
    host::DeviceDestination,
    registry::registry,
    shape::MemoryShape,
    stream::{DeviceRuntime, StreamId},
    tensor::ManagedTensor,
};

/// Copies a tensor-produced buffer into host texture memory.
///
/// Shape, dtype and byte size are fixed at construction. The source buffer is
/// handed over once per frame and released when the next one replaces it.
#[derive(Debug)]
pub struct WritableInterface {
    shape: MemoryShape,
    stream: StreamId,
    byte_width: usize,
    size: usize,
    source: Option<ManagedTensor>,
}

impl WritableInterface {
    pub fn new(
        width: usize,
        height: usize,
        num_comps: usize,
        data_type: DataType,
        stream: StreamId,
    ) -> Result<Self> {
        Self::with_shape(MemoryShape::new(width, height, num_comps, data_type), stream)
    }

    pub fn with_shape(shape: MemoryShape, stream: StreamId) -> Result<Self> {
        let byte_width = registry().describe(shape.data_type)?.byte_width;
        shape.validate()?;
        Ok(WritableInterface {
            shape,
            stream,
            byte_width,
            size: shape.byte_size(byte_width),
            source: None,
        })
    }

    /// Shape handed to the host along with the copy.
    pub fn memory_shape(&self) -> &MemoryShape {
        &self.shape
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn byte_width(&self) -> usize {
        self.byte_width
    }

    /// Bytes copied by each `flush`.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Records the buffer to copy from, releasing the previous one.
    pub fn set_source(&mut self, tensor: ManagedTensor) {
        self.source = Some(tensor);
    }

    pub fn clear_source(&mut self) -> Option<ManagedTensor> {
        self.source.take()
    }

    pub fn source(&self) -> Option<&ManagedTensor> {
        self.source.as_ref()
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// The source must already be laid out like the host texture: packed
    /// `(H, W, C)` of the texture's element type.
    fn check_source(&self, source: &ManagedTensor) -> Result<()> {
        if !source.is_contiguous() {
            return Err(Error::NonContiguous);
        }
        if source.dtype() != self.shape.data_type {
            return Err(Error::DtypeMismatch {
                expected: self.shape.data_type,
                found: source.dtype(),
            });
        }
        let expected = [
            self.shape.height as i64,
            self.shape.width as i64,
            self.shape.num_comps as i64,
        ];
        if source.shape() != &expected[..] {
            return Err(Error::LayoutMismatch {
                expected: expected.to_vec(),
                found: source.shape().to_vec(),
            });
        }
        if source.nbytes() < self.size {
            return Err(Error::SizeMismatch {
                required: self.size,
                capacity: source.nbytes(),
            });
        }
        Ok(())
    }

    /// Enqueues the copy of `size` bytes into `dst` on this adapter's stream.
    ///
    /// Without a source this does nothing and leaves `dst` untouched. A source
    /// that is strided, or of another shape or element type, is refused
    /// before anything is copied.
    pub fn flush<R, D>(&self, runtime: &R, dst: &mut D) -> Result<()>
    where
        R: DeviceRuntime + ?Sized,
        D: DeviceDestination + ?Sized,
    {
        let source = match &self.source {
            Some(source) => source,
            None => return Ok(()),
        };
        self.check_source(source)?;
        if let Some(capacity) = dst.capacity() {
            if capacity < self.size {
                return Err(Error::SizeMismatch {
                    required: self.size,
                    capacity,
                });
            }
        }
        let to = dst.device_ptr(&self.shape, self.stream)?;
        log::trace!(
            "flush {} bytes {} -> {} on {}",
            self.size,
            source.data(),
            to,
            self.stream
        );
        // SAFETY: the source holds at least `size` bytes and stays alive while
        // it is set; the destination capacity was checked above or is the
        // host's responsibility.
        unsafe { runtime.copy_async(to, source.data(), self.size, self.stream)? };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device::Device,
        emulated::{EmulatedRuntime, EmulatedTexture},
        errors::DeviceError,
        host::HostBuffer,
        tensor::Tensor,
    };

    fn export_texture(tex: &EmulatedTexture, stream: StreamId) -> ManagedTensor {
        let mem = tex.device_memory(stream).unwrap();
        let shape = mem.shape;
        let itemsize = shape.data_type.itemsize() as i64;
        let (c, w) = (shape.num_comps as i64, shape.width as i64);
        let view = Tensor::new(
            mem.ptr,
            Device::cpu(0),
            shape.data_type,
            vec![shape.height as i64, w, c],
            vec![w * c, c, 1],
            0,
        );
        assert_eq!(view.itemsize() as i64, itemsize);
        ManagedTensor::export(&view)
    }

    #[test]
    fn size_is_derived_from_shape() {
        let out = WritableInterface::new(256, 256, 4, DataType::u8(), StreamId(1)).unwrap();
        assert_eq!(out.size(), 262_144);
        let out = WritableInterface::new(10, 3, 2, DataType::f64(), StreamId(1)).unwrap();
        assert_eq!(out.size(), 10 * 3 * 2 * 8);
        assert_eq!(out.byte_width(), 8);
    }

    #[test]
    fn unsupported_kind_fails() {
        assert!(matches!(
            WritableInterface::new(4, 4, 4, DataType::complex(128, 1), StreamId(1)),
            Err(Error::UnsupportedDtype(_))
        ));
    }

    #[test]
    fn flush_without_source_is_a_noop() {
        let rt = EmulatedRuntime::new();
        let stream = rt.create_stream().unwrap();
        let out = WritableInterface::new(4, 4, 4, DataType::u8(), stream).unwrap();
        let mut dst = EmulatedTexture::new(4, 4, 4, DataType::u8());
        dst.fill_with(|_| 0xab);
        out.flush(&rt, &mut dst).unwrap();
        assert_eq!(rt.copies_issued(), 0);
        assert!(dst.to_vec().iter().all(|&b| b == 0xab));
    }

    #[test]
    fn flush_copies_exactly_size_bytes() {
        let rt = EmulatedRuntime::new();
        let stream = rt.create_stream().unwrap();
        let src = EmulatedTexture::new(4, 2, 4, DataType::u8());
        src.fill_with(|i| i as u8);
        let mut out = WritableInterface::new(4, 2, 4, DataType::u8(), stream).unwrap();
        out.set_source(export_texture(&src, stream));
        let mut dst = EmulatedTexture::new(4, 2, 4, DataType::u8());
        out.flush(&rt, &mut dst).unwrap();
        assert_eq!(dst.to_vec(), src.to_vec());
        assert_eq!(rt.copies_issued(), 1);
    }

    #[test]
    fn small_destination_is_rejected() {
        let rt = EmulatedRuntime::new();
        let stream = rt.create_stream().unwrap();
        let src = EmulatedTexture::new(4, 4, 4, DataType::u8());
        let mut out = WritableInterface::new(4, 4, 4, DataType::u8(), stream).unwrap();
        out.set_source(export_texture(&src, stream));
        let mut dst = EmulatedTexture::new(4, 2, 4, DataType::u8());
        dst.fill_with(|_| 7);
        match out.flush(&rt, &mut dst) {
            Err(Error::SizeMismatch { required, capacity }) => {
                assert_eq!(required, 64);
                assert_eq!(capacity, 32);
            }
            other => panic!("expected SizeMismatch, got {:?}", other),
        }
        assert_eq!(rt.copies_issued(), 0);
        assert!(dst.to_vec().iter().all(|&b| b == 7));
    }

    #[test]
    fn copy_failures_propagate() {
        let rt = EmulatedRuntime::new();
        let stream = rt.create_stream().unwrap();
        let src = EmulatedTexture::new(2, 2, 1, DataType::u8());
        let mut out = WritableInterface::new(2, 2, 1, DataType::u8(), stream).unwrap();
        out.set_source(export_texture(&src, stream));
        rt.fail_next_copy(DeviceError::LaunchFailure);
        let mut dst = EmulatedTexture::new(2, 2, 1, DataType::u8());
        assert!(matches!(
            out.flush(&rt, &mut dst),
            Err(Error::DeviceOperationFailure(DeviceError::LaunchFailure))
        ));
        assert!(out.clear_source().is_some());
        assert!(!out.has_source());
    }

    fn export_view(
        tex: &EmulatedTexture,
        dtype: DataType,
        shape: Vec<i64>,
        strides: Vec<i64>,
    ) -> ManagedTensor {
        let mem = tex.device_memory(StreamId::DEFAULT).unwrap();
        ManagedTensor::export(&Tensor::new(mem.ptr, Device::cpu(0), dtype, shape, strides, 0))
    }

    #[test]
    fn strided_source_is_refused() {
        let rt = EmulatedRuntime::new();
        let stream = rt.create_stream().unwrap();
        let src = EmulatedTexture::new(4, 4, 4, DataType::u8());
        let mut out = WritableInterface::new(4, 4, 4, DataType::u8(), stream).unwrap();
        // Channel-first view straight off the texture.
        out.set_source(export_view(&src, DataType::u8(), vec![4, 4, 4], vec![1, 16, 4]));
        let mut dst = EmulatedTexture::new(4, 4, 4, DataType::u8());
        assert!(matches!(out.flush(&rt, &mut dst), Err(Error::NonContiguous)));
        assert_eq!(rt.copies_issued(), 0);
    }

    #[test]
    fn source_of_another_kind_is_refused() {
        let rt = EmulatedRuntime::new();
        let stream = rt.create_stream().unwrap();
        let src = EmulatedTexture::new(4, 4, 4, DataType::f32());
        let mut out = WritableInterface::new(4, 4, 4, DataType::u8(), stream).unwrap();
        out.set_source(export_view(&src, DataType::f32(), vec![4, 4, 4], vec![16, 4, 1]));
        let mut dst = EmulatedTexture::new(4, 4, 4, DataType::u8());
        match out.flush(&rt, &mut dst) {
            Err(Error::DtypeMismatch { expected, found }) => {
                assert_eq!(expected, DataType::u8());
                assert_eq!(found, DataType::f32());
            }
            other => panic!("expected DtypeMismatch, got {:?}", other),
        }
        assert_eq!(rt.copies_issued(), 0);
    }

    #[test]
    fn source_of_another_shape_is_refused() {
        let rt = EmulatedRuntime::new();
        let stream = rt.create_stream().unwrap();
        let src = EmulatedTexture::new(8, 2, 4, DataType::u8());
        let mut out = WritableInterface::new(8, 2, 4, DataType::u8(), stream).unwrap();
        // Same byte count, width and height swapped.
        out.set_source(export_view(&src, DataType::u8(), vec![8, 2, 4], vec![8, 4, 1]));
        let mut dst = EmulatedTexture::new(8, 2, 4, DataType::u8());
        assert!(matches!(
            out.flush(&rt, &mut dst),
            Err(Error::LayoutMismatch { .. })
        ));
        assert_eq!(rt.copies_issued(), 0);
    }
}
