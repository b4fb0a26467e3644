//! Process-wide table of exchangeable element kinds.
//!
//! Built once on first use and never mutated afterwards, so bindings running
//! on different threads read it without locking.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::OnceLock;

use enumn::N;

use crate::{
    datatype::DataType,
    errors::{Error, Result},
};

/// Scalar type tag of the tensor library. Discriminants are the library's
/// own scalar-type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, N)]
#[repr(i8)]
pub enum TensorKind {
    UInt8 = 0,
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Int64 = 4,
    Float16 = 5,
    Float32 = 6,
    Float64 = 7,
    UInt16 = 27,
    UInt32 = 28,
    UInt64 = 29,
}

impl TensorKind {
    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn from_code(code: i8) -> Option<Self> {
        Self::n(code)
    }
}

impl Display for TensorKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            TensorKind::UInt8 => "uint8",
            TensorKind::Int8 => "int8",
            TensorKind::Int16 => "int16",
            TensorKind::Int32 => "int32",
            TensorKind::Int64 => "int64",
            TensorKind::Float16 => "float16",
            TensorKind::Float32 => "float32",
            TensorKind::Float64 => "float64",
            TensorKind::UInt16 => "uint16",
            TensorKind::UInt32 => "uint32",
            TensorKind::UInt64 => "uint64",
        };
        f.write_str(name)
    }
}

/// Array-protocol description of one element kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtypeEntry {
    /// Byte order marker, kind character and width, e.g. `<f4` or `|u1`.
    pub typestr: &'static str,
    pub byte_width: usize,
    pub tensor_kind: TensorKind,
}

impl DtypeEntry {
    /// The single-field record layout, `[("", typestr)]`.
    pub fn descr(&self) -> Vec<(String, String)> {
        vec![(String::new(), self.typestr.to_string())]
    }
}

#[derive(Debug)]
pub struct DtypeRegistry {
    entries: HashMap<DataType, DtypeEntry>,
}

const SUPPORTED: [(DataType, &str, TensorKind); 11] = [
    (DataType::i8(), "|i1", TensorKind::Int8),
    (DataType::i16(), "<i2", TensorKind::Int16),
    (DataType::i32(), "<i4", TensorKind::Int32),
    (DataType::i64(), "<i8", TensorKind::Int64),
    (DataType::u8(), "|u1", TensorKind::UInt8),
    (DataType::u16(), "<u2", TensorKind::UInt16),
    (DataType::u32(), "<u4", TensorKind::UInt32),
    (DataType::u64(), "<u8", TensorKind::UInt64),
    (DataType::f16(), "<f2", TensorKind::Float16),
    (DataType::f32(), "<f4", TensorKind::Float32),
    (DataType::f64(), "<f8", TensorKind::Float64),
];

impl DtypeRegistry {
    /// Builds the table covering every supported kind exactly once.
    pub fn register() -> Self {
        let entries = SUPPORTED
            .iter()
            .map(|&(dtype, typestr, tensor_kind)| {
                let entry = DtypeEntry {
                    typestr,
                    byte_width: dtype.itemsize(),
                    tensor_kind,
                };
                (dtype, entry)
            })
            .collect();
        DtypeRegistry { entries }
    }

    pub fn describe(&self, dtype: DataType) -> Result<&DtypeEntry> {
        self.entries
            .get(&dtype)
            .ok_or(Error::UnsupportedDtype(dtype))
    }

    pub fn to_tensor_kind(&self, dtype: DataType) -> Result<TensorKind> {
        self.describe(dtype).map(|entry| entry.tensor_kind)
    }

    /// Reverse lookup from a protocol type string.
    pub fn parse_typestr(&self, typestr: &str) -> Option<(DataType, &DtypeEntry)> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.typestr == typestr)
            .map(|(dtype, entry)| (*dtype, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DataType, &DtypeEntry)> {
        self.entries.iter()
    }
}

/// The shared registry, built on first access.
pub fn registry() -> &'static DtypeRegistry {
    static REGISTRY: OnceLock<DtypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(DtypeRegistry::register)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_match_canonical_sizes() {
        let reg = DtypeRegistry::register();
        assert_eq!(reg.len(), 11);
        for (dtype, width) in [
            (DataType::i8(), 1),
            (DataType::u8(), 1),
            (DataType::i16(), 2),
            (DataType::u16(), 2),
            (DataType::f16(), 2),
            (DataType::i32(), 4),
            (DataType::u32(), 4),
            (DataType::f32(), 4),
            (DataType::i64(), 8),
            (DataType::u64(), 8),
            (DataType::f64(), 8),
        ] {
            assert_eq!(reg.describe(dtype).unwrap().byte_width, width, "{}", dtype);
        }
    }

    #[test]
    fn unsupported_kinds_fail() {
        let reg = registry();
        for dtype in [
            DataType::bfloat(16, 1),
            DataType::complex(64, 1),
            DataType::float(32, 4),
            DataType::uint(4, 1),
        ] {
            assert!(matches!(
                reg.describe(dtype),
                Err(Error::UnsupportedDtype(d)) if d == dtype
            ));
            assert!(matches!(
                reg.to_tensor_kind(dtype),
                Err(Error::UnsupportedDtype(_))
            ));
        }
    }

    #[test]
    fn typestrs() {
        let reg = registry();
        assert_eq!(reg.describe(DataType::u8()).unwrap().typestr, "|u1");
        assert_eq!(reg.describe(DataType::f32()).unwrap().typestr, "<f4");
        assert_eq!(
            reg.describe(DataType::i16()).unwrap().descr(),
            vec![(String::new(), "<i2".to_string())]
        );
        let (dtype, entry) = reg.parse_typestr("<u8").unwrap();
        assert_eq!(dtype, DataType::u64());
        assert_eq!(entry.byte_width, 8);
        assert!(reg.parse_typestr("<c8").is_none());
    }

    #[test]
    fn tensor_kinds() {
        let reg = registry();
        assert_eq!(reg.to_tensor_kind(DataType::u8()).unwrap(), TensorKind::UInt8);
        assert_eq!(reg.to_tensor_kind(DataType::f16()).unwrap(), TensorKind::Float16);
        assert_eq!(TensorKind::from_code(28), Some(TensorKind::UInt32));
        assert_eq!(TensorKind::from_code(15), None);
        assert_eq!(TensorKind::Float64.to_string(), "float64");
    }

    #[test]
    fn shared_instance_is_stable() {
        assert!(std::ptr::eq(registry(), registry()));
    }
}
