use std::fmt;

use crate::{
    config::BindingConfig,
    device::Device,
    errors::{Error, Result},
    host::{DeviceDestination, HostBuffer},
    interface::ArrayInterface,
    readable::ReadableInterface,
    registry::registry,
    stream::{DeviceRuntime, StreamId},
    transform::{Identity, TensorBackend, Transform, ZeroCopyBackend},
    writable::WritableInterface,
};

/// `(C, H, W)` to `(H, W, C)`.
const CHANNELS_LAST: [usize; 3] = [1, 2, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Stream and input adapter exist; no frame processed yet.
    Bound,
    /// Output adapter exists; steady state.
    Ready,
    TornDown,
}

/// Connects one host texture to the tensor library for the lifetime of a
/// host-side binding.
///
/// Owns a dedicated stream on which every frame's work is ordered. The host
/// calls [`process`](Self::process) once per frame and afterwards copies the
/// result out with [`copy_output_to`](Self::copy_output_to) (or
/// [`WritableInterface::flush`] on the same stream). Any failure while
/// processing tears the binding down; recovery means building a new one.
pub struct Binding<'host, H: HostBuffer + ?Sized, R: DeviceRuntime> {
    runtime: R,
    config: BindingConfig,
    state: BindingState,
    stream: Option<StreamId>,
    readable: Option<ReadableInterface<'host, H>>,
    writable: Option<WritableInterface>,
    stage: Box<dyn Transform + Send + 'host>,
    backend: Box<dyn TensorBackend + Send + 'host>,
}

impl<'host, H: HostBuffer + ?Sized, R: DeviceRuntime> Binding<'host, H, R> {
    /// Binds to `host`. The host's shape and dtype are checked before any
    /// device resource is created, and nothing is retained on failure.
    pub fn new(host: &'host H, runtime: R, config: BindingConfig) -> Result<Self> {
        let shape = host.memory_shape();
        shape.validate()?;
        registry().describe(shape.data_type)?;

        let stream = runtime.create_stream()?;
        let readable = match ReadableInterface::new(host, stream, config.read_only) {
            Ok(readable) => readable,
            Err(err) => {
                if let Err(release) = runtime.destroy_stream(stream) {
                    log::warn!("failed to release {} after bind error: {}", stream, release);
                }
                return Err(err);
            }
        };
        log::debug!("bound {} on {}", shape, stream);

        Ok(Binding {
            runtime,
            config,
            state: BindingState::Bound,
            stream: Some(stream),
            readable: Some(readable),
            writable: None,
            stage: Box::new(Identity),
            backend: Box::new(ZeroCopyBackend),
        })
    }

    /// Replaces the per-frame computation stage.
    pub fn with_stage(mut self, stage: impl Transform + Send + 'host) -> Self {
        self.stage = Box::new(stage);
        self
    }

    pub fn with_backend(mut self, backend: impl TensorBackend + Send + 'host) -> Self {
        self.backend = Box::new(backend);
        self
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    pub fn stream(&self) -> Option<StreamId> {
        self.stream
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Descriptor of the host texture as of the last frame.
    pub fn input(&self) -> Option<&ArrayInterface> {
        self.readable.as_ref().map(|readable| readable.interface())
    }

    /// Output adapter, available once the first frame has been processed.
    pub fn output(&self) -> Option<&WritableInterface> {
        self.writable.as_ref()
    }

    fn device(&self) -> Device {
        Device::new(self.runtime.device_type(), self.config.device_id)
    }

    /// Runs one frame: refresh the input descriptor, view it as a tensor,
    /// apply the stage and hand the packed result to the output adapter.
    pub fn process(&mut self) -> Result<()> {
        if self.state == BindingState::TornDown {
            return Err(Error::UseAfterTeardown);
        }
        self.run_frame().map_err(|err| {
            log::error!("frame failed, tearing binding down: {}", err);
            if let Err(release) = self.release() {
                log::warn!("teardown after failed frame: {}", release);
            }
            err
        })
    }

    fn run_frame(&mut self) -> Result<()> {
        let stream = self.stream.ok_or(Error::UseAfterTeardown)?;
        let device = self.device();
        if self.state == BindingState::Bound {
            self.prepare(stream, device)?;
        }

        let readable = self.readable.as_mut().ok_or(Error::UseAfterTeardown)?;
        readable.update(stream)?;
        let view = readable.tensor_view(device)?;
        let out = self.stage.apply(view, stream)?;
        let packed = self.backend.contiguous(&out.permute(&CHANNELS_LAST), stream)?;
        self.writable
            .as_mut()
            .ok_or(Error::UseAfterTeardown)?
            .set_source(packed);
        log::trace!("frame processed on {}", stream);
        Ok(())
    }

    /// Creates the output adapter from the input's shape and seeds it with the
    /// input itself, so the output has content before the first real frame.
    fn prepare(&mut self, stream: StreamId, device: Device) -> Result<()> {
        let readable = self.readable.as_ref().ok_or(Error::UseAfterTeardown)?;
        let mut writable = WritableInterface::with_shape(*readable.memory_shape(), stream)?;
        let initial = readable.tensor_view(device)?.permute(&CHANNELS_LAST);
        writable.set_source(self.backend.contiguous(&initial, stream)?);
        log::debug!(
            "output ready: {} bytes per frame via {}",
            writable.size(),
            self.stage.name()
        );
        self.writable = Some(writable);
        self.state = BindingState::Ready;
        Ok(())
    }

    /// Host-side copy of the last frame's result into `dst`, on the binding's
    /// stream. Does nothing before the first frame.
    ///
    /// A source or destination that does not fit the output only fails this
    /// copy; a device failure tears the binding down.
    pub fn copy_output_to<D: DeviceDestination + ?Sized>(&mut self, dst: &mut D) -> Result<()> {
        if self.state == BindingState::TornDown {
            return Err(Error::UseAfterTeardown);
        }
        let writable = match &self.writable {
            Some(writable) => writable,
            None => return Ok(()),
        };
        match writable.flush(&self.runtime, dst) {
            Err(err @ Error::DeviceOperationFailure(_)) => {
                log::error!("output copy failed, tearing binding down: {}", err);
                if let Err(release) = self.release() {
                    log::warn!("teardown after failed copy: {}", release);
                }
                Err(err)
            }
            other => other,
        }
    }

    /// Releases the adapters and destroys the stream. Idempotent.
    pub fn teardown(&mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        self.state = BindingState::TornDown;
        self.writable = None;
        self.readable = None;
        match self.stream.take() {
            Some(stream) => {
                log::debug!("tearing down binding on {}", stream);
                self.runtime.destroy_stream(stream)?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<'host, H: HostBuffer + ?Sized, R: DeviceRuntime> Drop for Binding<'host, H, R> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            log::warn!("binding dropped without teardown: {}", err);
        }
    }
}

impl<'host, H: HostBuffer + ?Sized, R: DeviceRuntime> fmt::Debug for Binding<'host, H, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("state", &self.state)
            .field("stream", &self.stream)
            .field("config", &self.config)
            .field("input", &self.input())
            .field("output", &self.writable)
            .field("stage", &self.stage.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{datatype::DataType, emulated::EmulatedRuntime, emulated::EmulatedTexture};

    #[test]
    fn state_machine() {
        let rt = EmulatedRuntime::new();
        let tex = EmulatedTexture::new(8, 4, 4, DataType::u8());
        let mut binding = Binding::new(&tex, &rt, BindingConfig::default()).unwrap();
        assert_eq!(binding.state(), BindingState::Bound);
        assert!(binding.output().is_none());
        assert_eq!(rt.live_streams(), 1);

        binding.process().unwrap();
        assert_eq!(binding.state(), BindingState::Ready);
        assert_eq!(binding.output().unwrap().size(), 8 * 4 * 4);
        binding.process().unwrap();
        assert_eq!(binding.state(), BindingState::Ready);

        binding.teardown().unwrap();
        assert_eq!(binding.state(), BindingState::TornDown);
        assert_eq!(rt.live_streams(), 0);
        assert!(matches!(binding.process(), Err(Error::UseAfterTeardown)));
        binding.teardown().unwrap();
    }

    #[test]
    fn descriptor_follows_the_binding_stream() {
        let rt = EmulatedRuntime::new();
        let tex = EmulatedTexture::new(2, 2, 1, DataType::f32());
        let config = BindingConfig::new().with_read_only(true).with_device_id(1);
        let mut binding = Binding::new(&tex, &rt, config).unwrap();
        binding.process().unwrap();
        let stream = binding.stream().unwrap();
        let input = binding.input().unwrap();
        assert_eq!(input.stream, stream);
        assert!(input.read_only());
        assert_eq!(binding.output().unwrap().stream(), stream);
    }

    #[test]
    fn drop_releases_stream() {
        let rt = EmulatedRuntime::new();
        let tex = EmulatedTexture::new(2, 2, 4, DataType::u8());
        {
            let mut binding = Binding::new(&tex, &rt, BindingConfig::default()).unwrap();
            binding.process().unwrap();
        }
        assert_eq!(rt.streams_created(), 1);
        assert_eq!(rt.live_streams(), 0);
    }
}
