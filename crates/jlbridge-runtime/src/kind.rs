//! Primitive element kinds shared by every marshaling path
//!
//! Defines:
//! - `PrimitiveKind`: the closed set of element kinds the bridge can move
//! - `Scalar`: a boxed-by-value host scalar of any kind
//! - `Primitive`: the sealed trait tying a Rust type to its kind
//!
//! Kind mapping (host → Julia scalar type):
//! - bool → Bool
//! - u8/u16/u32/u64 → UInt8/UInt16/UInt32/UInt64
//! - i8/i16/i32/i64 → Int8/Int16/Int32/Int64
//! - f32/f64 → Float32/Float64

use crate::error::BridgeError;
use crate::ffi::array_type::ElementType;
use std::fmt;
use std::str::FromStr;

/// Closed enumeration of supported element kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Every kind, in declaration order
    pub const ALL: [PrimitiveKind; 11] = [
        PrimitiveKind::Bool,
        PrimitiveKind::U8,
        PrimitiveKind::U16,
        PrimitiveKind::U32,
        PrimitiveKind::U64,
        PrimitiveKind::I8,
        PrimitiveKind::I16,
        PrimitiveKind::I32,
        PrimitiveKind::I64,
        PrimitiveKind::F32,
        PrimitiveKind::F64,
    ];

    /// Julia scalar type name (what `typeof` prints for a boxed value)
    pub fn julia_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "Bool",
            PrimitiveKind::U8 => "UInt8",
            PrimitiveKind::U16 => "UInt16",
            PrimitiveKind::U32 => "UInt32",
            PrimitiveKind::U64 => "UInt64",
            PrimitiveKind::I8 => "Int8",
            PrimitiveKind::I16 => "Int16",
            PrimitiveKind::I32 => "Int32",
            PrimitiveKind::I64 => "Int64",
            PrimitiveKind::F32 => "Float32",
            PrimitiveKind::F64 => "Float64",
        }
    }

    /// Rust type name
    pub fn rust_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
        }
    }

    /// Element type used when this kind is stored in a foreign array
    ///
    /// Bool has no array element type of its own at the C-API level and is
    /// stored as Int8 holding 0 or 1.
    pub fn element_type(self) -> ElementType {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::I8 => ElementType::Int8,
            PrimitiveKind::U8 => ElementType::UInt8,
            PrimitiveKind::U16 => ElementType::UInt16,
            PrimitiveKind::U32 => ElementType::UInt32,
            PrimitiveKind::U64 => ElementType::UInt64,
            PrimitiveKind::I16 => ElementType::Int16,
            PrimitiveKind::I32 => ElementType::Int32,
            PrimitiveKind::I64 => ElementType::Int64,
            PrimitiveKind::F32 => ElementType::Float32,
            PrimitiveKind::F64 => ElementType::Float64,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.julia_name())
    }
}

impl FromStr for PrimitiveKind {
    type Err = BridgeError;

    /// Accepts Julia names ("Float64") and Rust names ("f64")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        PrimitiveKind::ALL
            .into_iter()
            .find(|kind| kind.julia_name() == name || kind.rust_name() == name)
            .ok_or_else(|| BridgeError::UnsupportedType(name.to_string()))
    }
}

/// A host scalar of any supported kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Scalar::Bool(_) => PrimitiveKind::Bool,
            Scalar::U8(_) => PrimitiveKind::U8,
            Scalar::U16(_) => PrimitiveKind::U16,
            Scalar::U32(_) => PrimitiveKind::U32,
            Scalar::U64(_) => PrimitiveKind::U64,
            Scalar::I8(_) => PrimitiveKind::I8,
            Scalar::I16(_) => PrimitiveKind::I16,
            Scalar::I32(_) => PrimitiveKind::I32,
            Scalar::I64(_) => PrimitiveKind::I64,
            Scalar::F32(_) => PrimitiveKind::F32,
            Scalar::F64(_) => PrimitiveKind::F64,
        }
    }

    /// Numeric value widened to f64 (Bool maps to 0.0 / 1.0)
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Bool(b) => f64::from(u8::from(b)),
            Scalar::U8(v) => f64::from(v),
            Scalar::U16(v) => f64::from(v),
            Scalar::U32(v) => f64::from(v),
            Scalar::U64(v) => v as f64,
            Scalar::I8(v) => f64::from(v),
            Scalar::I16(v) => f64::from(v),
            Scalar::I32(v) => f64::from(v),
            Scalar::I64(v) => v as f64,
            Scalar::F32(v) => f64::from(v),
            Scalar::F64(v) => v,
        }
    }

    /// Integer value, if this is an integer kind that fits in i64
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Scalar::Bool(_) | Scalar::F32(_) | Scalar::F64(_) => None,
            Scalar::U8(v) => Some(i64::from(v)),
            Scalar::U16(v) => Some(i64::from(v)),
            Scalar::U32(v) => Some(i64::from(v)),
            Scalar::U64(v) => i64::try_from(v).ok(),
            Scalar::I8(v) => Some(i64::from(v)),
            Scalar::I16(v) => Some(i64::from(v)),
            Scalar::I32(v) => Some(i64::from(v)),
            Scalar::I64(v) => Some(v),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::U8(v) => write!(f, "0x{:02x}", v),
            Scalar::U16(v) => write!(f, "0x{:04x}", v),
            Scalar::U32(v) => write!(f, "0x{:08x}", v),
            Scalar::U64(v) => write!(f, "0x{:016x}", v),
            Scalar::I8(v) => write!(f, "{}", v),
            Scalar::I16(v) => write!(f, "{}", v),
            Scalar::I32(v) => write!(f, "{}", v),
            Scalar::I64(v) => write!(f, "{}", v),
            Scalar::F32(v) => write!(f, "{:?}", v),
            Scalar::F64(v) => write!(f, "{:?}", v),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust types that map onto a `PrimitiveKind`
///
/// Sealed: the set of kinds is closed, so downstream crates cannot add
/// implementations.
pub trait Primitive: sealed::Sealed + Copy + PartialEq + Default + fmt::Debug + 'static {
    const KIND: PrimitiveKind;

    /// Layout of one element inside a foreign array buffer
    type Repr: Copy + Default + 'static;

    fn into_scalar(self) -> Scalar;

    /// Extract a value of this kind; `None` when the scalar has another kind
    fn from_scalar(scalar: Scalar) -> Option<Self>;

    fn to_repr(self) -> Self::Repr;

    fn from_repr(repr: Self::Repr) -> Self;
}

macro_rules! impl_primitive {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Primitive for $ty {
                const KIND: PrimitiveKind = PrimitiveKind::$kind;
                type Repr = $ty;

                fn into_scalar(self) -> Scalar {
                    Scalar::$kind(self)
                }

                fn from_scalar(scalar: Scalar) -> Option<Self> {
                    match scalar {
                        Scalar::$kind(v) => Some(v),
                        _ => None,
                    }
                }

                fn to_repr(self) -> Self::Repr {
                    self
                }

                fn from_repr(repr: Self::Repr) -> Self {
                    repr
                }
            }
        )*
    };
}

impl_primitive!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

impl sealed::Sealed for bool {}

impl Primitive for bool {
    const KIND: PrimitiveKind = PrimitiveKind::Bool;
    type Repr = i8;

    fn into_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }

    fn from_scalar(scalar: Scalar) -> Option<Self> {
        match scalar {
            Scalar::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn to_repr(self) -> i8 {
        i8::from(self)
    }

    fn from_repr(repr: i8) -> Self {
        repr != 0
    }
}

/// Run `$body` with `$T` bound to the Rust type of a runtime `PrimitiveKind`
///
/// ```
/// use jlbridge_runtime::{dispatch_kind, PrimitiveKind};
///
/// let size = dispatch_kind!(PrimitiveKind::U16, T => std::mem::size_of::<T>());
/// assert_eq!(size, 2);
/// ```
#[macro_export]
macro_rules! dispatch_kind {
    ($kind:expr, $T:ident => $body:expr) => {
        match $kind {
            $crate::kind::PrimitiveKind::Bool => {
                type $T = bool;
                $body
            }
            $crate::kind::PrimitiveKind::U8 => {
                type $T = u8;
                $body
            }
            $crate::kind::PrimitiveKind::U16 => {
                type $T = u16;
                $body
            }
            $crate::kind::PrimitiveKind::U32 => {
                type $T = u32;
                $body
            }
            $crate::kind::PrimitiveKind::U64 => {
                type $T = u64;
                $body
            }
            $crate::kind::PrimitiveKind::I8 => {
                type $T = i8;
                $body
            }
            $crate::kind::PrimitiveKind::I16 => {
                type $T = i16;
                $body
            }
            $crate::kind::PrimitiveKind::I32 => {
                type $T = i32;
                $body
            }
            $crate::kind::PrimitiveKind::I64 => {
                type $T = i64;
                $body
            }
            $crate::kind::PrimitiveKind::F32 => {
                type $T = f32;
                $body
            }
            $crate::kind::PrimitiveKind::F64 => {
                type $T = f64;
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PrimitiveKind::Bool, "Bool", "bool")]
    #[case(PrimitiveKind::U8, "UInt8", "u8")]
    #[case(PrimitiveKind::U64, "UInt64", "u64")]
    #[case(PrimitiveKind::I32, "Int32", "i32")]
    #[case(PrimitiveKind::F64, "Float64", "f64")]
    fn test_kind_names(#[case] kind: PrimitiveKind, #[case] julia: &str, #[case] rust: &str) {
        assert_eq!(kind.julia_name(), julia);
        assert_eq!(kind.rust_name(), rust);
        assert_eq!(julia.parse::<PrimitiveKind>().unwrap(), kind);
        assert_eq!(rust.parse::<PrimitiveKind>().unwrap(), kind);
    }

    #[test]
    fn test_unknown_kind_unsupported() {
        let err = "ComplexF64".parse::<PrimitiveKind>().unwrap_err();
        assert_eq!(err, BridgeError::UnsupportedType("ComplexF64".to_string()));
    }

    #[test]
    fn test_bool_stored_as_int8() {
        assert_eq!(PrimitiveKind::Bool.element_type(), ElementType::Int8);
        assert_eq!(true.to_repr(), 1i8);
        assert_eq!(false.to_repr(), 0i8);
        assert!(bool::from_repr(1));
        assert!(!bool::from_repr(0));
    }

    #[test]
    fn test_element_type_matches_kind_name_except_bool() {
        for kind in PrimitiveKind::ALL {
            if kind != PrimitiveKind::Bool {
                assert_eq!(kind.element_type().julia_name(), kind.julia_name());
            }
        }
    }

    #[test]
    fn test_scalar_round_trip_through_primitive() {
        assert_eq!(u16::from_scalar(7u16.into_scalar()), Some(7));
        assert_eq!(f32::from_scalar(Scalar::F64(1.0)), None);
        assert_eq!(Scalar::I16(-3).kind(), PrimitiveKind::I16);
        assert_eq!(Scalar::U64(u64::MAX).as_i64(), None);
        assert_eq!(Scalar::Bool(true).as_f64(), 1.0);
    }

    #[test]
    fn test_dispatch_kind_binds_type() {
        for kind in PrimitiveKind::ALL {
            let resolved = dispatch_kind!(kind, T => <T as Primitive>::KIND);
            assert_eq!(resolved, kind);
        }
    }
}
