use std::fmt;
use std::str::FromStr;

use crate::NdError;

/// Scalar representation of an array's elements.
///
/// `Float64` is the native kind with fast kernels; `Object` elements are
/// handled through the host value bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementKind {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    #[default]
    Float64,
    Object,
}

impl ElementKind {
    /// Parse a single-character typecode.
    pub fn from_typecode(code: char) -> Option<Self> {
        Some(match code {
            '?' => ElementKind::Bool,
            'b' => ElementKind::Int8,
            'B' => ElementKind::UInt8,
            'h' => ElementKind::Int16,
            'H' => ElementKind::UInt16,
            'i' => ElementKind::Int32,
            'I' => ElementKind::UInt32,
            'l' | 'q' => ElementKind::Int64,
            'L' | 'Q' => ElementKind::UInt64,
            'f' => ElementKind::Float32,
            'd' => ElementKind::Float64,
            'O' => ElementKind::Object,
            _ => return None,
        })
    }

    pub fn typecode(self) -> char {
        match self {
            ElementKind::Bool => '?',
            ElementKind::Int8 => 'b',
            ElementKind::UInt8 => 'B',
            ElementKind::Int16 => 'h',
            ElementKind::UInt16 => 'H',
            ElementKind::Int32 => 'i',
            ElementKind::UInt32 => 'I',
            ElementKind::Int64 => 'q',
            ElementKind::UInt64 => 'Q',
            ElementKind::Float32 => 'f',
            ElementKind::Float64 => 'd',
            ElementKind::Object => 'O',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Bool => "bool",
            ElementKind::Int8 => "int8",
            ElementKind::UInt8 => "uint8",
            ElementKind::Int16 => "int16",
            ElementKind::UInt16 => "uint16",
            ElementKind::Int32 => "int32",
            ElementKind::UInt32 => "uint32",
            ElementKind::Int64 => "int64",
            ElementKind::UInt64 => "uint64",
            ElementKind::Float32 => "float32",
            ElementKind::Float64 => "float64",
            ElementKind::Object => "object",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ElementKind::Float32 | ElementKind::Float64)
    }

    pub fn is_object(self) -> bool {
        self == ElementKind::Object
    }
}

impl FromStr for ElementKind {
    type Err = NdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                ElementKind::from_typecode(c).ok_or_else(|| NdError::InvalidElementKind(s.into()))
            }
            _ => Err(NdError::InvalidElementKind(s.into())),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
