//! Array type resolution
//!
//! Maps a host `PrimitiveKind` and a dimension count to the descriptor of
//! the Julia array type able to hold it, and parses Julia array type names
//! back into descriptors.

use crate::error::{BridgeError, BridgeResult};
use crate::kind::PrimitiveKind;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Julia scalar types usable as array elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ElementType {
    pub fn julia_name(self) -> &'static str {
        match self {
            ElementType::UInt8 => "UInt8",
            ElementType::UInt16 => "UInt16",
            ElementType::UInt32 => "UInt32",
            ElementType::UInt64 => "UInt64",
            ElementType::Int8 => "Int8",
            ElementType::Int16 => "Int16",
            ElementType::Int32 => "Int32",
            ElementType::Int64 => "Int64",
            ElementType::Float32 => "Float32",
            ElementType::Float64 => "Float64",
        }
    }

    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            ElementType::UInt8 | ElementType::Int8 => 1,
            ElementType::UInt16 | ElementType::Int16 => 2,
            ElementType::UInt32 | ElementType::Int32 | ElementType::Float32 => 4,
            ElementType::UInt64 | ElementType::Int64 | ElementType::Float64 => 8,
        }
    }

    /// The host kind whose values are stored unchanged under this element type
    pub fn kind(self) -> PrimitiveKind {
        match self {
            ElementType::UInt8 => PrimitiveKind::U8,
            ElementType::UInt16 => PrimitiveKind::U16,
            ElementType::UInt32 => PrimitiveKind::U32,
            ElementType::UInt64 => PrimitiveKind::U64,
            ElementType::Int8 => PrimitiveKind::I8,
            ElementType::Int16 => PrimitiveKind::I16,
            ElementType::Int32 => PrimitiveKind::I32,
            ElementType::Int64 => PrimitiveKind::I64,
            ElementType::Float32 => PrimitiveKind::F32,
            ElementType::Float64 => PrimitiveKind::F64,
        }
    }
}

impl FromStr for ElementType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<PrimitiveKind>()? {
            PrimitiveKind::Bool => Err(BridgeError::UnsupportedType(format!(
                "{} is not an array element type",
                s
            ))),
            kind => Ok(kind.element_type()),
        }
    }
}

/// "Array of element type E with N dimensions"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayTypeDescriptor {
    pub element: ElementType,
    pub ndims: usize,
}

impl ArrayTypeDescriptor {
    /// Parse a Julia array type name such as `Vector{Int8}`,
    /// `Matrix{Float64}` or `Array{UInt16, 3}`
    ///
    /// Returns `None` for names that are not arrays of a supported element type.
    pub fn parse(name: &str) -> Option<Self> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        let pattern = PATTERN
            .get_or_init(|| {
                Regex::new(r"^(?:(Vector|Matrix)\{(\w+)\}|Array\{(\w+),\s*(\d+)\})$").ok()
            })
            .as_ref()?;

        let captures = pattern.captures(name.trim())?;
        if let Some(alias) = captures.get(1) {
            let element = captures.get(2)?.as_str().parse().ok()?;
            let ndims = if alias.as_str() == "Vector" { 1 } else { 2 };
            return Some(Self { element, ndims });
        }

        let element = captures.get(3)?.as_str().parse().ok()?;
        let ndims = captures.get(4)?.as_str().parse().ok()?;
        Some(Self { element, ndims })
    }
}

impl fmt::Display for ArrayTypeDescriptor {
    /// Formats the way Julia prints array types
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ndims {
            1 => write!(f, "Vector{{{}}}", self.element.julia_name()),
            2 => write!(f, "Matrix{{{}}}", self.element.julia_name()),
            n => write!(f, "Array{{{}, {}}}", self.element.julia_name(), n),
        }
    }
}

/// Resolve the array type descriptor for `kind` with `ndims` dimensions
///
/// Bool resolves to an Int8 array: the reported type name of a marshaled
/// Bool container is therefore `Vector{Int8}`, `Matrix{Int8}`, ...
pub fn resolve(kind: PrimitiveKind, ndims: usize) -> BridgeResult<ArrayTypeDescriptor> {
    if ndims == 0 {
        return Err(BridgeError::InvalidDimensions(
            "array type needs at least one dimension".to_string(),
        ));
    }
    Ok(ArrayTypeDescriptor {
        element: kind.element_type(),
        ndims,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PrimitiveKind::Bool, 1, "Vector{Int8}")]
    #[case(PrimitiveKind::U8, 2, "Matrix{UInt8}")]
    #[case(PrimitiveKind::F64, 3, "Array{Float64, 3}")]
    #[case(PrimitiveKind::I16, 5, "Array{Int16, 5}")]
    fn test_resolve_names(#[case] kind: PrimitiveKind, #[case] ndims: usize, #[case] name: &str) {
        let descriptor = resolve(kind, ndims).unwrap();
        assert_eq!(descriptor.to_string(), name);
        assert_eq!(ArrayTypeDescriptor::parse(name), Some(descriptor));
    }

    #[test]
    fn test_resolve_zero_dims() {
        assert!(matches!(
            resolve(PrimitiveKind::I32, 0),
            Err(BridgeError::InvalidDimensions(_))
        ));
    }

    #[rstest]
    #[case("Array{Float32,4}", Some((ElementType::Float32, 4)))]
    #[case("Vector{String}", None)]
    #[case("Vector{Bool}", None)]
    #[case("Int64", None)]
    #[case("Matrix{Int64} ", Some((ElementType::Int64, 2)))]
    fn test_parse(#[case] name: &str, #[case] expected: Option<(ElementType, usize)>) {
        let parsed = ArrayTypeDescriptor::parse(name).map(|d| (d.element, d.ndims));
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_element_sizes() {
        assert_eq!(ElementType::Int8.size(), 1);
        assert_eq!(ElementType::UInt16.size(), 2);
        assert_eq!(ElementType::Float32.size(), 4);
        assert_eq!(ElementType::Int64.size(), 8);
    }
}
