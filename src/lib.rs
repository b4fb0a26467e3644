//! [![crates.io](https://img.shields.io/crates/v/devbridge.svg)](https://crates.io/crates/devbridge)
//! [![docs.rs](https://docs.rs/devbridge/badge.svg)](https://docs.rs/devbridge)
//!
//! <br>
//!
//! Zero-copy interchange between GPU textures owned by a real-time graphics host
//! and tensor libraries speaking [DLPack](https://dmlc.github.io/dlpack/latest/).
//!
//! The host keeps ownership of its device memory. Each frame the crate publishes
//! the texture as a strided array descriptor (`shape = (C, H, W)`, components
//! innermost in memory), builds a DLPack view over it, optionally runs a
//! computation stage, and hands the packed result back so the host can copy it
//! into its own output texture. All of a binding's device work is ordered on one
//! dedicated stream; nothing in between crosses the host/device boundary.
//!
//! The Minimum Supported Rust Version (MSRV) is the stable toolchain **1.70.0**.
//!
//! ## Usage
//!
//! Implement [`HostBuffer`] for the host's texture accessor and
//! [`DeviceDestination`] for its output texture, pick a [`DeviceRuntime`]
//! ([`CudaRuntime`] with the `cuda` feature, or [`EmulatedRuntime`] for host
//! memory), then drive a [`Binding`] once per frame:
//!
//! ```
//! use devbridge::{Binding, BindingConfig, DataType, EmulatedRuntime, EmulatedTexture};
//!
//! let runtime = EmulatedRuntime::new();
//! let input = EmulatedTexture::new(64, 64, 4, DataType::u8());
//! let mut output = EmulatedTexture::new(64, 64, 4, DataType::u8());
//! input.fill_with(|i| (i % 256) as u8);
//!
//! let mut binding = Binding::new(&input, &runtime, BindingConfig::default())?;
//! binding.process()?;
//! binding.copy_output_to(&mut output)?;
//! assert_eq!(output.to_vec(), input.to_vec());
//! binding.teardown()?;
//! # Ok::<(), devbridge::Error>(())
//! ```
//!
//! A failed frame tears its binding down; the host is expected to build a new
//! one rather than retry.

#![allow(clippy::missing_safety_doc)]
pub mod ffi;

pub mod binding;
pub mod config;
pub mod cuda;
pub mod datatype;
pub mod device;
pub mod emulated;
pub mod errors;
pub mod host;
pub mod interface;
pub mod readable;
pub mod registry;
pub mod shape;
pub mod stream;
pub mod tensor;
pub mod transform;
pub mod writable;

pub use binding::{Binding, BindingState};
pub use config::BindingConfig;
pub use cuda::CudaRuntime;
pub use datatype::{DataType, DataTypeCode};
pub use device::{Device, DeviceType};
pub use emulated::{EmulatedRuntime, EmulatedTexture};
pub use errors::{DeviceError, Error, Result};
pub use host::{DeviceDestination, DeviceMemory, HostBuffer};
pub use interface::{ArrayInterface, ARRAY_INTERFACE_VERSION};
pub use readable::ReadableInterface;
pub use registry::{registry, DtypeEntry, DtypeRegistry, TensorKind};
pub use shape::{ByteStrides, MemoryShape};
pub use stream::{DevicePtr, DeviceRuntime, StreamId};
pub use tensor::{ManagedTensor, Tensor};
pub use transform::{Identity, TensorBackend, Transform, ZeroCopyBackend};
pub use writable::WritableInterface;

pub fn dlpack_version() -> u32 {
    ffi::DLPACK_VERSION
}

pub fn dlpack_abi_version() -> u32 {
    ffi::DLPACK_ABI_VERSION
}
