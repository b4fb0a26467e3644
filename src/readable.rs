use crate::{
    device::Device,
    errors::{Error, Result},
    host::HostBuffer,
    interface::ArrayInterface,
    registry::registry,
    shape::MemoryShape,
    stream::StreamId,
    tensor::Tensor,
};

/// Publishes a host texture as an [`ArrayInterface`] without copying it.
///
/// The adapter borrows the host accessor and never owns device memory. The
/// published pointer is valid until the next [`update`](Self::update).
#[derive(Debug)]
pub struct ReadableInterface<'host, H: HostBuffer + ?Sized> {
    host: &'host H,
    shape: MemoryShape,
    iface: ArrayInterface,
}

impl<'host, H: HostBuffer + ?Sized> ReadableInterface<'host, H> {
    pub fn new(host: &'host H, stream: StreamId, read_only: bool) -> Result<Self> {
        let mem = host.device_memory(stream)?;
        let iface = ArrayInterface::describe(registry(), &mem.shape, mem.ptr, read_only, stream)?;
        check_extent(&iface, mem.size)?;
        log::debug!(
            "readable interface over {} at {} on {}",
            mem.shape,
            mem.ptr,
            stream
        );
        Ok(ReadableInterface {
            host,
            shape: mem.shape,
            iface,
        })
    }

    /// Refreshes the device pointer and stream from the host. Shape and dtype
    /// are fixed for the adapter's lifetime; a host that changed them fails
    /// with `ShapeChanged` and the descriptor is left untouched.
    pub fn update(&mut self, stream: StreamId) -> Result<()> {
        let mem = self.host.device_memory(stream)?;
        if mem.shape != self.shape {
            return Err(Error::ShapeChanged {
                expected: self.shape,
                found: mem.shape,
            });
        }
        check_extent(&self.iface, mem.size)?;
        log::trace!("readable update: {} on {}", mem.ptr, stream);
        self.iface.data.0 = mem.ptr;
        self.iface.stream = stream;
        Ok(())
    }

    pub fn interface(&self) -> &ArrayInterface {
        &self.iface
    }

    pub fn memory_shape(&self) -> &MemoryShape {
        &self.shape
    }

    /// Channel-first view `(C, H, W)` aliasing the host memory.
    pub fn tensor_view(&self, device: Device) -> Result<Tensor<'_>> {
        Tensor::from_interface(&self.iface, device)
    }
}

/// The published strides must stay inside what the host allocated.
fn check_extent(iface: &ArrayInterface, size: usize) -> Result<()> {
    if size < iface.nbytes() {
        return Err(Error::SizeMismatch {
            required: iface.nbytes(),
            capacity: size,
        });
    }
    Ok(())
}
