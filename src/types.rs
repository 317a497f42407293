//! Core data types for EMD volumes

use crate::error::{EmdError, Result};
use hdf5::types::{FloatSize, IntSize, TypeDescriptor};
use hdf5::Datatype;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar types an application may hand to the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ScalarType {
    /// Signed 8-bit integer
    I8 = 0,
    /// Unsigned 8-bit integer
    U8 = 1,
    /// Signed 16-bit integer
    I16 = 2,
    /// Unsigned 16-bit integer
    U16 = 3,
    /// Signed 32-bit integer
    I32 = 4,
    /// Unsigned 32-bit integer
    U32 = 5,
    /// Signed 64-bit integer
    I64 = 6,
    /// Unsigned 64-bit integer
    U64 = 7,
    /// 32-bit floating point
    F32 = 8,
    /// 64-bit floating point
    F64 = 9,
}

impl ScalarType {
    /// Size in bytes of this scalar type
    pub fn size_in_bytes(&self) -> usize {
        match self {
            ScalarType::U8 | ScalarType::I8 => 1,
            ScalarType::U16 | ScalarType::I16 => 2,
            ScalarType::U32 | ScalarType::I32 | ScalarType::F32 => 4,
            ScalarType::U64 | ScalarType::I64 | ScalarType::F64 => 8,
        }
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        !self.is_float()
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Element types an EMD volume can be stored as.
///
/// Each variant maps to exactly one little-endian on-disk encoding:
///
/// | Element | On disk |
/// |---|---|
/// | `F32` | IEEE 754 32-bit LE |
/// | `U32` | unsigned 32-bit LE |
/// | `U16` | unsigned 16-bit LE |
/// | `U8`  | unsigned 8-bit LE |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ElementType {
    #[default]
    F32,
    U32,
    U16,
    U8,
}

impl ElementType {
    pub const ALL: [ElementType; 4] = [
        ElementType::F32,
        ElementType::U32,
        ElementType::U16,
        ElementType::U8,
    ];

    pub fn size_in_bytes(&self) -> usize {
        match self {
            ElementType::F32 | ElementType::U32 => 4,
            ElementType::U16 => 2,
            ElementType::U8 => 1,
        }
    }

    /// The on-disk type this element is stored as
    pub fn disk_descriptor(&self) -> TypeDescriptor {
        match self {
            ElementType::F32 => TypeDescriptor::Float(FloatSize::U4),
            ElementType::U32 => TypeDescriptor::Unsigned(IntSize::U4),
            ElementType::U16 => TypeDescriptor::Unsigned(IntSize::U2),
            ElementType::U8 => TypeDescriptor::Unsigned(IntSize::U1),
        }
    }

    /// The on-disk datatype, in the host's (little-endian) byte order
    pub fn disk_datatype(&self) -> Result<Datatype> {
        Ok(Datatype::from_descriptor(&self.disk_descriptor())?)
    }

    /// Map a stored datatype back to an element type. Only types equal to a
    /// table entry are accepted; nothing is widened or byte-swapped.
    pub fn from_datatype(datatype: &Datatype) -> Result<Self> {
        for element in Self::ALL {
            if *datatype == element.disk_datatype()? {
                return Ok(element);
            }
        }
        let described = datatype
            .to_descriptor()
            .map(|descriptor| format!("{:?}", descriptor))
            .unwrap_or_else(|_| "an unrecognised type".to_string());
        Err(EmdError::UnsupportedType(format!(
            "stored type {} has no element mapping",
            described
        )))
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::F32 => "float32",
            ElementType::U32 => "uint32",
            ElementType::U16 => "uint16",
            ElementType::U8 => "uint8",
        };
        f.write_str(name)
    }
}

impl TryFrom<ScalarType> for ElementType {
    type Error = EmdError;

    fn try_from(scalar: ScalarType) -> Result<Self> {
        match scalar {
            ScalarType::F32 => Ok(ElementType::F32),
            ScalarType::U32 => Ok(ElementType::U32),
            ScalarType::U16 => Ok(ElementType::U16),
            ScalarType::U8 => Ok(ElementType::U8),
            other => Err(EmdError::UnsupportedType(format!(
                "{} volumes cannot be stored as EMD",
                other
            ))),
        }
    }
}

impl From<ElementType> for ScalarType {
    fn from(element: ElementType) -> Self {
        match element {
            ElementType::F32 => ScalarType::F32,
            ElementType::U32 => ScalarType::U32,
            ElementType::U16 => ScalarType::U16,
            ElementType::U8 => ScalarType::U8,
        }
    }
}

/// Axis label, unit and coordinate extent as stored in a `dimN` dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDescriptor {
    /// Name of the axis (e.g., "x")
    pub name: String,
    /// Unit of measurement (e.g., "[n_m]")
    pub units: String,
    /// Coordinate of the first sample
    pub start: f32,
    /// Coordinate of the last sample
    pub end: f32,
}

impl AxisDescriptor {
    pub fn new(name: impl Into<String>, units: impl Into<String>, start: f32, end: f32) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            start,
            end,
        }
    }
}

/// Value range for a volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}
