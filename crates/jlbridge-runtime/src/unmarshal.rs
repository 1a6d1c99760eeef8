//! Julia objects back to host values
//!
//! The checked entry points compare the object's Julia type with the
//! requested kind before reading it, and array reads compare lengths before
//! copying. Only `unmarshal_scalar_unchecked` skips the type check.

use crate::error::{BridgeError, BridgeResult};
use crate::ffi::array_type::ArrayTypeDescriptor;
use crate::ffi::buffer::ForeignBuffer;
use crate::kind::Primitive;
use crate::mat::Mat;
use crate::session::Session;
use crate::value::Value;
use tracing::trace;

impl Session {
    /// Unbox a scalar after checking its Julia type is `T`'s
    pub fn unmarshal_scalar<T: Primitive>(&self, value: &Value<'_>) -> BridgeResult<T> {
        let expected = T::KIND.julia_name();
        let found = value.type_name()?;
        if found != expected {
            return Err(BridgeError::TypeMismatch {
                expected: expected.to_string(),
                found,
            });
        }
        // SAFETY: the runtime type was checked above
        unsafe { self.unmarshal_scalar_unchecked(value) }
    }

    /// Unbox a scalar without checking its Julia type
    ///
    /// # Safety
    ///
    /// `value` must be a boxed scalar whose Julia type is `T`'s. On libjulia
    /// anything else reads arbitrary memory.
    pub unsafe fn unmarshal_scalar_unchecked<T: Primitive>(&self, value: &Value<'_>) -> BridgeResult<T> {
        let api = self.api()?;
        trace!(kind = %T::KIND, "unmarshal scalar");
        let scalar = api.unbox_scalar(value.raw(), T::KIND);
        T::from_scalar(scalar).ok_or_else(|| BridgeError::TypeMismatch {
            expected: T::KIND.julia_name().to_string(),
            found: scalar.kind().julia_name().to_string(),
        })
    }

    /// Copy a Julia array into `out`, which must hold exactly as many
    /// elements as the array
    ///
    /// The shape of `out` is not compared with the array's dimensions; the
    /// copy is a flat element copy.
    pub fn unmarshal_mat<T: Primitive>(&self, value: &Value<'_>, out: &mut Mat<T>) -> BridgeResult<()> {
        self.read_array(value, out.elements_mut())
    }

    /// Unmarshal into any supported host target
    pub fn unmarshal<U: UnmarshalTarget + ?Sized>(&self, value: &Value<'_>, target: &mut U) -> BridgeResult<()> {
        target.unmarshal_from(self, value)
    }

    /// Length of `value` after checking it is an array of `T`'s element type
    fn array_len<T: Primitive>(&self, value: &Value<'_>) -> BridgeResult<usize> {
        let element = T::KIND.element_type();
        let found = value.type_name()?;
        match ArrayTypeDescriptor::parse(&found) {
            Some(descriptor) if descriptor.element == element => value.len(),
            _ => Err(BridgeError::TypeMismatch {
                expected: format!("Array{{{}}}", element.julia_name()),
                found,
            }),
        }
    }

    /// Copy an array whose element type matches `T` straight into `dst`
    ///
    /// A different array length fails with `LengthMismatch` before anything
    /// is copied.
    fn read_array<T: Primitive>(&self, value: &Value<'_>, dst: &mut [T]) -> BridgeResult<()> {
        let len = self.array_len::<T>(value)?;
        if len != dst.len() {
            return Err(BridgeError::LengthMismatch {
                expected: dst.len(),
                found: len,
            });
        }
        trace!(kind = %T::KIND, len, "unmarshal array");
        if len == 0 {
            return Ok(());
        }

        let api = self.api()?;
        // SAFETY: `value` is an array of `len` elements laid out as `T::Repr`
        let buffer = unsafe { ForeignBuffer::<T::Repr>::new(api.array_data(value.raw()), len)? };
        buffer.copy_into(dst, T::from_repr)
    }
}

/// Host containers a Julia value can be unmarshaled into
pub trait UnmarshalTarget {
    fn unmarshal_from(&mut self, session: &Session, value: &Value<'_>) -> BridgeResult<()>;
}

macro_rules! impl_unmarshal_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl UnmarshalTarget for $ty {
                fn unmarshal_from(&mut self, session: &Session, value: &Value<'_>) -> BridgeResult<()> {
                    *self = session.unmarshal_scalar(value)?;
                    Ok(())
                }
            }
        )*
    };
}

impl_unmarshal_scalar!(bool, u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl<T: Primitive> UnmarshalTarget for Mat<T> {
    fn unmarshal_from(&mut self, session: &Session, value: &Value<'_>) -> BridgeResult<()> {
        session.unmarshal_mat(value, self)
    }
}

/// Replaces the vector's contents with every element of the array
impl<T: Primitive> UnmarshalTarget for Vec<T> {
    fn unmarshal_from(&mut self, session: &Session, value: &Value<'_>) -> BridgeResult<()> {
        let len = session.array_len::<T>(value)?;
        self.clear();
        self.resize(len, T::default());
        session.read_array(value, self.as_mut_slice())
    }
}

/// Fills the slice, whose length must match the array's
impl<T: Primitive> UnmarshalTarget for [T] {
    fn unmarshal_from(&mut self, session: &Session, value: &Value<'_>) -> BridgeResult<()> {
        session.read_array(value, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_type_checked() {
        let session = Session::emulated().unwrap();
        let value = session.marshal_scalar(7i32).unwrap();
        assert_eq!(session.unmarshal_scalar::<i32>(&value).unwrap(), 7);
        assert_eq!(
            session.unmarshal_scalar::<f64>(&value).unwrap_err(),
            BridgeError::TypeMismatch {
                expected: "Float64".to_string(),
                found: "Int32".to_string(),
            }
        );
    }

    #[test]
    fn test_unchecked_reinterprets_on_emulator() {
        let session = Session::emulated().unwrap();
        let value = session.marshal_scalar(-1i16).unwrap();
        let bits = unsafe { session.unmarshal_scalar_unchecked::<u16>(&value) }.unwrap();
        assert_eq!(bits, u16::MAX);
    }

    #[test]
    fn test_array_element_type_checked() {
        let session = Session::emulated().unwrap();
        let value = session.marshal_slice(&[1.0f32, 2.0]).unwrap();
        let mut out = Mat::<f64>::zeros(vec![2]).unwrap();
        assert_eq!(
            session.unmarshal_mat(&value, &mut out).unwrap_err(),
            BridgeError::TypeMismatch {
                expected: "Array{Float64}".to_string(),
                found: "Vector{Float32}".to_string(),
            }
        );

        let scalar = session.marshal_scalar(1.0f64).unwrap();
        assert!(matches!(
            session.unmarshal_mat(&scalar, &mut out).unwrap_err(),
            BridgeError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_length_checked_before_copy() {
        let session = Session::emulated().unwrap();
        let value = session.marshal_slice(&[1u8, 2, 3]).unwrap();
        let mut out = Mat::<u8>::zeros(vec![2, 2]).unwrap();
        assert_eq!(
            session.unmarshal_mat(&value, &mut out).unwrap_err(),
            BridgeError::LengthMismatch { expected: 4, found: 3 }
        );
        assert_eq!(out.elements(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_generic_targets() {
        let session = Session::emulated().unwrap();
        let value = session.marshal_slice(&[true, false, true]).unwrap();

        let mut vector: Vec<bool> = vec![false; 10];
        session.unmarshal(&value, &mut vector).unwrap();
        assert_eq!(vector, vec![true, false, true]);

        let mut mismatched: Vec<f64> = vec![1.0];
        assert!(session.unmarshal(&value, &mut mismatched).is_err());
        assert_eq!(mismatched, vec![1.0]);

        let mut slice = [false; 3];
        session.unmarshal(&value, &mut slice[..]).unwrap();
        assert_eq!(slice, [true, false, true]);

        let mut scalar = 0u64;
        session.unmarshal(&session.marshal_scalar(9u64).unwrap(), &mut scalar).unwrap();
        assert_eq!(scalar, 9);
    }
}
