use thiserror::Error;

use crate::{datatype::DataType, shape::MemoryShape};

#[derive(Debug, Error)]
#[error("unsupported device: {0}")]
pub struct UnsupportedDeviceError(pub String);

#[derive(Debug, Error)]
#[error("unsupported data type code: {0}")]
pub struct UnsupportedDataTypeCode(pub String);

/// Failure reported by the device runtime. Codes follow `cudaError_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("invalid value")]
    InvalidValue,
    #[error("device memory allocation failed")]
    MemoryAllocation,
    #[error("device runtime initialization failed")]
    InitializationError,
    #[error("kernel launch failure")]
    LaunchFailure,
    #[error("invalid device ordinal")]
    InvalidDevice,
    #[error("invalid memcpy direction")]
    InvalidMemcpyDirection,
    #[error("operation not supported")]
    NotSupported,
    #[error("invalid resource handle")]
    InvalidHandle,
    #[error("illegal address")]
    IllegalAddress,
    #[error("null device pointer")]
    NullPointer,
    #[error("device runtime error code {0}")]
    Other(i32),
}

impl DeviceError {
    /// Maps a runtime status code, `None` for success.
    pub fn from_code(code: i32) -> Option<Self> {
        if Self::is_success(code) {
            return None;
        }
        let err = match code {
            1 => DeviceError::InvalidValue,
            2 => DeviceError::MemoryAllocation,
            3 => DeviceError::InitializationError,
            4 | 719 => DeviceError::LaunchFailure,
            101 => DeviceError::InvalidDevice,
            21 => DeviceError::InvalidMemcpyDirection,
            801 => DeviceError::NotSupported,
            400 => DeviceError::InvalidHandle,
            700 => DeviceError::IllegalAddress,
            other => DeviceError::Other(other),
        };
        Some(err)
    }

    pub fn is_success(code: i32) -> bool {
        code == 0
    }

    /// Turns a runtime status code into a `Result`.
    pub fn check(code: i32) -> std::result::Result<(), DeviceError> {
        match Self::from_code(code) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

/// Failures surfaced by the interchange layer. None of them is retried
/// internally; a failing binding tears itself down.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported dtype: {0}")]
    UnsupportedDtype(DataType),
    #[error("unknown array type string {0:?}")]
    UnknownTypestr(String),
    #[error("invalid shape {width}x{height}x{num_comps}: every dimension must be positive")]
    InvalidShape {
        width: usize,
        height: usize,
        num_comps: usize,
    },
    #[error("host buffer changed shape from {expected} to {found}")]
    ShapeChanged {
        expected: MemoryShape,
        found: MemoryShape,
    },
    #[error("destination holds {capacity} bytes but {required} are required")]
    SizeMismatch { required: usize, capacity: usize },
    #[error("source element type {found} does not match {expected}")]
    DtypeMismatch { expected: DataType, found: DataType },
    #[error("source shape {found:?} does not match {expected:?}")]
    LayoutMismatch { expected: Vec<i64>, found: Vec<i64> },
    #[error("binding has been torn down")]
    UseAfterTeardown,
    #[error("tensor is not a packed components-innermost buffer")]
    NonContiguous,
    #[error("byte strides {strides:?} are not multiples of the element width {itemsize}")]
    InvalidStrides { strides: Vec<usize>, itemsize: usize },
    #[error("device operation failed: {0}")]
    DeviceOperationFailure(#[from] DeviceError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_codes() {
        assert_eq!(DeviceError::from_code(0), None);
        assert_eq!(DeviceError::from_code(2), Some(DeviceError::MemoryAllocation));
        assert_eq!(DeviceError::from_code(12345), Some(DeviceError::Other(12345)));
        assert!(DeviceError::is_success(0));
        assert!(!DeviceError::is_success(400));
        assert!(DeviceError::check(0).is_ok());
        assert_eq!(DeviceError::check(700), Err(DeviceError::IllegalAddress));
    }

    #[test]
    fn device_errors_convert() {
        let err: Error = DeviceError::NullPointer.into();
        assert!(matches!(
            err,
            Error::DeviceOperationFailure(DeviceError::NullPointer)
        ));
        assert_eq!(
            err.to_string(),
            "device operation failed: null device pointer"
        );
    }
}
