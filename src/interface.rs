use crate::{
    errors::Result,
    registry::DtypeRegistry,
    shape::MemoryShape,
    stream::{DevicePtr, StreamId},
};

/// Version of the array interchange protocol the descriptor follows.
pub const ARRAY_INTERFACE_VERSION: u32 = 3;

/// Device array interchange descriptor.
///
/// Mirrors the fields a tensor library reads to build a zero-copy view:
/// `shape` is channel-first `(C, H, W)` while the bytes are laid out
/// components-innermost, so `strides` is `(e, e*C*W, e*C)` for an element
/// width of `e` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayInterface {
    pub version: u32,
    pub shape: [usize; 3],
    pub typestr: &'static str,
    pub descr: Vec<(String, String)>,
    /// Byte strides, one per axis of `shape`.
    pub strides: [usize; 3],
    /// Device address and read-only flag.
    pub data: (DevicePtr, bool),
    pub stream: StreamId,
}

impl ArrayInterface {
    pub(crate) fn describe(
        registry: &DtypeRegistry,
        shape: &MemoryShape,
        ptr: DevicePtr,
        read_only: bool,
        stream: StreamId,
    ) -> Result<Self> {
        shape.validate()?;
        let entry = registry.describe(shape.data_type)?;
        let strides = shape.byte_strides(entry.byte_width);
        Ok(ArrayInterface {
            version: ARRAY_INTERFACE_VERSION,
            shape: shape.chw(),
            typestr: entry.typestr,
            descr: entry.descr(),
            strides: [strides.element, strides.row, strides.pixel],
            data: (ptr, read_only),
            stream,
        })
    }

    pub fn ptr(&self) -> DevicePtr {
        self.data.0
    }

    pub fn read_only(&self) -> bool {
        self.data.1
    }

    pub fn num_comps(&self) -> usize {
        self.shape[0]
    }

    pub fn height(&self) -> usize {
        self.shape[1]
    }

    pub fn width(&self) -> usize {
        self.shape[2]
    }

    /// Stride between two components of one pixel, i.e. the element width.
    pub fn element_stride(&self) -> usize {
        self.strides[0]
    }

    pub fn row_stride(&self) -> usize {
        self.strides[1]
    }

    pub fn pixel_stride(&self) -> usize {
        self.strides[2]
    }

    /// Total bytes spanned by the described image.
    pub fn nbytes(&self) -> usize {
        self.row_stride() * self.height()
    }
}
