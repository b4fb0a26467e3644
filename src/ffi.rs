//! DLPack ABI definitions.
//!
//! Layout-compatible with `dlpack.h` (v0.8). See
//! [DLPack C API](https://dmlc.github.io/dlpack/latest/c_api.html).

#![allow(non_camel_case_types, non_upper_case_globals)]

use std::os::raw::{c_int, c_void};

pub const DLPACK_VERSION: u32 = 80;
pub const DLPACK_ABI_VERSION: u32 = 1;

pub type DLDeviceType = u32;
pub const DLDeviceType_kDLCPU: DLDeviceType = 1;
pub const DLDeviceType_kDLCUDA: DLDeviceType = 2;
pub const DLDeviceType_kDLCUDAHost: DLDeviceType = 3;
pub const DLDeviceType_kDLROCM: DLDeviceType = 10;
pub const DLDeviceType_kDLCUDAManaged: DLDeviceType = 13;

pub type DLDataTypeCode = u32;
pub const DLDataTypeCode_kDLInt: DLDataTypeCode = 0;
pub const DLDataTypeCode_kDLUInt: DLDataTypeCode = 1;
pub const DLDataTypeCode_kDLFloat: DLDataTypeCode = 2;
pub const DLDataTypeCode_kDLOpaqueHandle: DLDataTypeCode = 3;
pub const DLDataTypeCode_kDLBfloat: DLDataTypeCode = 4;
pub const DLDataTypeCode_kDLComplex: DLDataTypeCode = 5;
pub const DLDataTypeCode_kDLBool: DLDataTypeCode = 6;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DLDevice {
    pub device_type: DLDeviceType,
    pub device_id: c_int,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DLDataType {
    pub code: u8,
    pub bits: u8,
    pub lanes: u16,
}

/// Strides are counted in elements, not bytes. `strides` may be null for a
/// compact row-major tensor.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DLTensor {
    pub data: *mut c_void,
    pub device: DLDevice,
    pub ndim: c_int,
    pub dtype: DLDataType,
    pub shape: *mut i64,
    pub strides: *mut i64,
    pub byte_offset: u64,
}

impl Default for DLTensor {
    fn default() -> Self {
        Self {
            data: std::ptr::null_mut(),
            device: DLDevice::default(),
            ndim: 0,
            dtype: DLDataType::default(),
            shape: std::ptr::null_mut(),
            strides: std::ptr::null_mut(),
            byte_offset: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct DLManagedTensor {
    pub dl_tensor: DLTensor,
    pub manager_ctx: *mut c_void,
    pub deleter: Option<unsafe extern "C" fn(self_: *mut DLManagedTensor)>,
}
