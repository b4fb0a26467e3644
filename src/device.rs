use enumn::N;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::errors::UnsupportedDeviceError;
use crate::ffi;

/// Memory domains a host texture or tensor can live in.
/// Discriminants follow [DLDeviceType](https://dmlc.github.io/dlpack/latest/c_api.html#_CPPv412DLDeviceType).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, N)]
#[repr(u32)]
pub enum DeviceType {
    CPU = 1,
    CUDA = 2,
    CUDAHost = 3,
    ROCM = 10,
    CUDAManaged = 13,
}

impl From<DeviceType> for ffi::DLDeviceType {
    fn from(device_type: DeviceType) -> Self {
        device_type as Self
    }
}

impl TryFrom<ffi::DLDeviceType> for DeviceType {
    type Error = UnsupportedDeviceError;
    fn try_from(device_type: ffi::DLDeviceType) -> Result<Self, Self::Error> {
        Self::n(device_type).ok_or_else(|| UnsupportedDeviceError(device_type.to_string()))
    }
}

impl Display for DeviceType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                DeviceType::CPU => "cpu",
                DeviceType::CUDA => "cuda",
                DeviceType::CUDAHost => "cuda_host",
                DeviceType::ROCM => "rocm",
                DeviceType::CUDAManaged => "cuda_managed",
            }
        )
    }
}

/// A device ordinal within one memory domain.
///
/// ## Example
///
/// ```
/// use devbridge::Device;
/// let dev: Device = "cuda".parse().unwrap();
/// assert_eq!(dev, Device::cuda(0));
/// assert_eq!(dev.to_string(), "cuda(0)");
/// ```
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Device {
    pub device_type: DeviceType,
    pub device_id: usize,
}

impl Device {
    pub fn new(device_type: DeviceType, device_id: usize) -> Device {
        Device {
            device_type,
            device_id,
        }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::cuda(0)
    }
}

impl From<Device> for ffi::DLDevice {
    fn from(dev: Device) -> Self {
        ffi::DLDevice {
            device_type: dev.device_type.into(),
            device_id: dev.device_id as i32,
        }
    }
}

impl TryFrom<ffi::DLDevice> for Device {
    type Error = UnsupportedDeviceError;
    fn try_from(dev: ffi::DLDevice) -> Result<Self, Self::Error> {
        Ok(Device {
            device_type: DeviceType::try_from(dev.device_type)?,
            device_id: dev.device_id as usize,
        })
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}({})", self.device_type, self.device_id)
    }
}

macro_rules! add_device {
    ( $( $dev_type:ident : [ $( $dev_name:ident ),+ ] ),+ ) => {
        impl FromStr for Device {
            type Err = UnsupportedDeviceError;
            fn from_str(type_str: &str) -> Result<Self, Self::Err> {
                Ok(Self {
                    device_type: match type_str {
                         $( $(  stringify!($dev_name)  )|+ => DeviceType::$dev_type),+,
                        _ => return Err(UnsupportedDeviceError(type_str.to_string())),
                    },
                    device_id: 0,
                })
            }
        }

        impl Device {
            $(
                $(
                    pub fn $dev_name(device_id: usize) -> Self {
                        Self {
                            device_type: DeviceType::$dev_type,
                            device_id,
                        }
                    }
                )+
            )+
        }
    };
}

add_device!(
    CPU: [cpu],
    CUDA: [cuda],
    CUDAHost: [cuda_host], // pinned cuda cpu memory
    ROCM: [rocm],
    CUDAManaged: [cuda_managed]
);
