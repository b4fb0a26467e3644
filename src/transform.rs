//! Seams to the tensor library: the optional per-frame computation stage and
//! the step that turns its result into a packed buffer for the host.

use crate::{
    errors::{Error, Result},
    stream::StreamId,
    tensor::{ManagedTensor, Tensor},
};

/// A computation applied to every frame.
///
/// Receives the channel-first `(C, H, W)` view of the host texture and
/// returns a view of compatible shape. Any device work it issues must be
/// enqueued on `stream`. The returned view may alias the input or memory
/// owned by the stage.
pub trait Transform {
    fn apply<'a>(&'a mut self, input: Tensor<'a>, stream: StreamId) -> Result<Tensor<'a>>;

    fn name(&self) -> &str {
        "transform"
    }
}

/// Passes frames through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl Transform for Identity {
    fn apply<'a>(&'a mut self, input: Tensor<'a>, _stream: StreamId) -> Result<Tensor<'a>> {
        Ok(input)
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// Materialises a channel-last `(H, W, C)` view as a packed,
/// components-innermost buffer the host can copy from.
pub trait TensorBackend {
    fn contiguous(&mut self, view: &Tensor<'_>, stream: StreamId) -> Result<ManagedTensor>;
}

/// Hands out packed views as-is and refuses anything that would need a
/// device-side gather.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroCopyBackend;

impl TensorBackend for ZeroCopyBackend {
    fn contiguous(&mut self, view: &Tensor<'_>, _stream: StreamId) -> Result<ManagedTensor> {
        if !view.is_contiguous() {
            return Err(Error::NonContiguous);
        }
        Ok(ManagedTensor::export(view))
    }
}
