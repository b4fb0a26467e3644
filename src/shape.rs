use std::fmt::{self, Display, Formatter};

use crate::{
    datatype::DataType,
    errors::{Error, Result},
};

/// Shape of one device-resident image: `width` x `height` pixels of
/// `num_comps` interleaved components of kind `data_type`.
///
/// This is also what the host is handed when it copies a result back into
/// its own texture memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryShape {
    pub width: usize,
    pub height: usize,
    pub num_comps: usize,
    pub data_type: DataType,
}

/// Byte strides of a channel-interleaved, row-major image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteStrides {
    /// Between two components of the same pixel.
    pub element: usize,
    /// Between two horizontally adjacent pixels.
    pub pixel: usize,
    /// Between two rows.
    pub row: usize,
}

impl MemoryShape {
    pub fn new(width: usize, height: usize, num_comps: usize, data_type: DataType) -> Self {
        MemoryShape {
            width,
            height,
            num_comps,
            data_type,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.num_comps == 0 {
            return Err(Error::InvalidShape {
                width: self.width,
                height: self.height,
                num_comps: self.num_comps,
            });
        }
        Ok(())
    }

    pub fn num_elements(&self) -> usize {
        self.width * self.height * self.num_comps
    }

    pub fn byte_size(&self, itemsize: usize) -> usize {
        self.num_elements() * itemsize
    }

    pub fn byte_strides(&self, itemsize: usize) -> ByteStrides {
        let pixel = itemsize * self.num_comps;
        ByteStrides {
            element: itemsize,
            pixel,
            row: pixel * self.width,
        }
    }

    /// Channel-first logical shape `(num_comps, height, width)`.
    pub fn chw(&self) -> [usize; 3] {
        [self.num_comps, self.height, self.width]
    }
}

impl Display for MemoryShape {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} {}",
            self.width, self.height, self.num_comps, self.data_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_follow_interleaved_layout() {
        for &(w, h, c, e) in &[(256, 256, 4, 1), (7, 3, 1, 4), (1920, 1080, 3, 2), (1, 1, 2, 8)] {
            let shape = MemoryShape::new(w, h, c, DataType::uint(8 * e as u8, 1));
            let strides = shape.byte_strides(e);
            assert_eq!(strides.element, e);
            assert_eq!(strides.pixel, c * e);
            assert_eq!(strides.row, c * w * e);
            assert_eq!(shape.byte_size(e), strides.row * h);
        }
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let shape = MemoryShape::new(16, 0, 4, DataType::u8());
        assert!(matches!(
            shape.validate(),
            Err(Error::InvalidShape { height: 0, .. })
        ));
        assert!(MemoryShape::new(16, 16, 4, DataType::u8()).validate().is_ok());
    }

    #[test]
    fn display() {
        let shape = MemoryShape::new(640, 480, 4, DataType::f32());
        assert_eq!(shape.to_string(), "640x480x4 float32");
        assert_eq!(shape.chw(), [4, 480, 640]);
    }
}
