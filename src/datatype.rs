#![allow(non_upper_case_globals)]

use std::convert::TryFrom;
use std::fmt::{self, Display, Formatter};

use crate::{
    errors::UnsupportedDataTypeCode,
    ffi::{
        DLDataType, DLDataTypeCode, DLDataTypeCode_kDLBfloat, DLDataTypeCode_kDLBool,
        DLDataTypeCode_kDLComplex, DLDataTypeCode_kDLFloat, DLDataTypeCode_kDLInt,
        DLDataTypeCode_kDLOpaqueHandle, DLDataTypeCode_kDLUInt,
    },
};

/// See [DLDataTypeCode](https://dmlc.github.io/dlpack/latest/c_api.html#_CPPv414DLDataTypeCode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataTypeCode {
    Int = 0,
    UInt = 1,
    Float = 2,
    OpaqueHandle = 3,
    Bfloat = 4,
    Complex = 5,
    Bool = 6,
}

impl From<DataTypeCode> for u8 {
    fn from(code: DataTypeCode) -> Self {
        code as u8
    }
}

impl TryFrom<DLDataTypeCode> for DataTypeCode {
    type Error = UnsupportedDataTypeCode;
    fn try_from(code: DLDataTypeCode) -> Result<Self, Self::Error> {
        match code {
            DLDataTypeCode_kDLInt => Ok(DataTypeCode::Int),
            DLDataTypeCode_kDLUInt => Ok(DataTypeCode::UInt),
            DLDataTypeCode_kDLFloat => Ok(DataTypeCode::Float),
            DLDataTypeCode_kDLOpaqueHandle => Ok(DataTypeCode::OpaqueHandle),
            DLDataTypeCode_kDLBfloat => Ok(DataTypeCode::Bfloat),
            DLDataTypeCode_kDLComplex => Ok(DataTypeCode::Complex),
            DLDataTypeCode_kDLBool => Ok(DataTypeCode::Bool),
            _ => Err(UnsupportedDataTypeCode(code.to_string())),
        }
    }
}

/// Elemental numeric kind of a device buffer, in DLPack terms.
///
/// The host reports the kind of its texture memory as a `DataType`; the
/// [`DtypeRegistry`](crate::DtypeRegistry) decides whether it can be exchanged.
///
/// ## Example
///
/// ```
/// use devbridge::DataType;
/// let rgba8 = DataType::u8();
/// assert_eq!(rgba8.itemsize(), 1);
/// assert_eq!(rgba8.to_string(), "uint8");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct DataType {
    pub code: u8,
    pub bits: u8,
    pub lanes: u16,
}

impl From<DataType> for DLDataType {
    fn from(dtype: DataType) -> Self {
        Self {
            code: dtype.code,
            bits: dtype.bits,
            lanes: dtype.lanes,
        }
    }
}

impl From<DLDataType> for DataType {
    fn from(dtype: DLDataType) -> Self {
        Self {
            code: dtype.code,
            bits: dtype.bits,
            lanes: dtype.lanes,
        }
    }
}

impl DataType {
    pub const fn new(code: u8, bits: u8, lanes: u16) -> DataType {
        DataType { code, bits, lanes }
    }

    pub const fn code(&self) -> usize {
        self.code as usize
    }

    pub const fn bits(&self) -> usize {
        self.bits as usize
    }

    pub const fn lanes(&self) -> usize {
        self.lanes as usize
    }

    /// Bytes occupied by one element, rounded up to whole bytes.
    pub const fn itemsize(&self) -> usize {
        (self.bits() * self.lanes() + 7) / 8
    }

    /// For vectorized int type.
    pub const fn int(bits: u8, lanes: u16) -> DataType {
        DataType::new(DataTypeCode::Int as u8, bits, lanes)
    }

    pub const fn i8() -> DataType {
        Self::int(8, 1)
    }

    pub const fn i16() -> DataType {
        Self::int(16, 1)
    }

    pub const fn i32() -> DataType {
        Self::int(32, 1)
    }

    pub const fn i64() -> DataType {
        Self::int(64, 1)
    }

    /// For vectorized uint type.
    pub const fn uint(bits: u8, lanes: u16) -> DataType {
        DataType::new(DataTypeCode::UInt as u8, bits, lanes)
    }

    pub const fn u8() -> DataType {
        Self::uint(8, 1)
    }

    pub const fn u16() -> DataType {
        Self::uint(16, 1)
    }

    pub const fn u32() -> DataType {
        Self::uint(32, 1)
    }

    pub const fn u64() -> DataType {
        Self::uint(64, 1)
    }

    pub const fn float(bits: u8, lanes: u16) -> DataType {
        DataType::new(DataTypeCode::Float as u8, bits, lanes)
    }

    pub const fn f16() -> DataType {
        Self::float(16, 1)
    }

    pub const fn f32() -> DataType {
        Self::float(32, 1)
    }

    pub const fn f64() -> DataType {
        Self::float(64, 1)
    }

    /// BFloat type.
    pub const fn bfloat(bits: u8, lanes: u16) -> DataType {
        DataType::new(DataTypeCode::Bfloat as u8, bits, lanes)
    }

    /// Mathematical Complex type.
    pub const fn complex(bits: u8, lanes: u16) -> DataType {
        DataType::new(DataTypeCode::Complex as u8, bits, lanes)
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let prefix = match DataTypeCode::try_from(self.code as DLDataTypeCode) {
            Ok(DataTypeCode::Int) => "int",
            Ok(DataTypeCode::UInt) => "uint",
            Ok(DataTypeCode::Float) => "float",
            Ok(DataTypeCode::OpaqueHandle) => "handle",
            Ok(DataTypeCode::Bfloat) => "bfloat",
            Ok(DataTypeCode::Complex) => "complex",
            Ok(DataTypeCode::Bool) => "bool",
            Err(_) => return write!(f, "code{}:{}x{}", self.code, self.bits, self.lanes),
        };
        write!(f, "{}{}", prefix, self.bits)?;
        if self.lanes != 1 {
            write!(f, "x{}", self.lanes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(DataType::u8().to_string(), "uint8");
        assert_eq!(DataType::f16().to_string(), "float16");
        assert_eq!(DataType::int(32, 4).to_string(), "int32x4");
        assert_eq!(DataType::new(42, 8, 1).to_string(), "code42:8x1");
    }

    #[test]
    fn itemsize_rounds_up() {
        assert_eq!(DataType::f64().itemsize(), 8);
        assert_eq!(DataType::uint(4, 1).itemsize(), 1);
        assert_eq!(DataType::float(32, 4).itemsize(), 16);
    }

    #[test]
    fn code_roundtrip_through_ffi() {
        let dl: DLDataType = DataType::bfloat(16, 1).into();
        assert_eq!(
            DataTypeCode::try_from(dl.code as DLDataTypeCode).unwrap(),
            DataTypeCode::Bfloat
        );
        assert!(DataTypeCode::try_from(99).is_err());
    }
}
