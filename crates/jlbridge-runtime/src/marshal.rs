//! Host values to Julia objects
//!
//! Scalars are boxed with the boxing primitive of their exact kind. Slices
//! and containers are copied into a freshly allocated Julia array whose type
//! is resolved for every call; no memory is shared with the host afterwards.

use crate::dims;
use crate::error::{BridgeError, BridgeResult};
use crate::ffi::array_type;
use crate::ffi::buffer::ForeignBuffer;
use crate::kind::Primitive;
use crate::mat::Mat;
use crate::session::Session;
use crate::value::Value;
use tracing::trace;

impl Session {
    pub fn marshal_scalar<T: Primitive>(&self, value: T) -> BridgeResult<Value<'_>> {
        let api = self.api()?;
        trace!(kind = %T::KIND, "marshal scalar");
        let raw = api.box_scalar(value.into_scalar())?;
        Ok(Value::new(self, raw))
    }

    /// Marshal as a one-dimensional array
    ///
    /// An empty slice fails with `InvalidDimensions`.
    pub fn marshal_slice<T: Primitive>(&self, values: &[T]) -> BridgeResult<Value<'_>> {
        self.marshal_array(values, &[values.len()])
    }

    pub fn marshal_mat<T: Primitive>(&self, mat: &Mat<T>) -> BridgeResult<Value<'_>> {
        self.marshal_array(mat.elements(), mat.shape())
    }

    /// Marshal any supported host value
    ///
    /// ```
    /// use jlbridge_runtime::{Mat, Session};
    ///
    /// let session = Session::emulated().unwrap();
    /// let scalar = session.marshal(5i64).unwrap();
    /// assert_eq!(scalar.type_name().unwrap(), "Int64");
    ///
    /// let mat = Mat::new(vec![1u8, 2, 3, 4], vec![2, 2]).unwrap();
    /// let array = session.marshal(&mat).unwrap();
    /// assert_eq!(array.type_name().unwrap(), "Matrix{UInt8}");
    /// ```
    pub fn marshal<V: IntoJulia>(&self, value: V) -> BridgeResult<Value<'_>> {
        value.into_julia(self)
    }

    fn marshal_array<T: Primitive>(&self, elements: &[T], shape: &[usize]) -> BridgeResult<Value<'_>> {
        let api = self.api()?;
        let count = dims::validate(shape)?;
        if count != elements.len() {
            return Err(BridgeError::DimensionMismatch {
                expected: count,
                got: elements.len(),
            });
        }

        let descriptor = array_type::resolve(T::KIND, shape.len())?;
        trace!(array_type = %descriptor, dims = ?shape, "marshal array");

        let array_type = api.apply_array_type(descriptor.element, descriptor.ndims)?;
        let array = api
            .alloc_array(array_type, shape)?
            .ok_or_else(|| BridgeError::AllocationFailed {
                array_type: descriptor.to_string(),
                dims: shape.to_vec(),
            })?;

        // SAFETY: `array` was just allocated with `count` elements of
        // `descriptor.element`, whose layout is `T::Repr`
        let mut buffer = unsafe { ForeignBuffer::<T::Repr>::new(api.array_data(array), count)? };
        buffer.copy_from(elements, T::to_repr)?;

        Ok(Value::new(self, array))
    }
}

/// Host values that can be marshaled into Julia
pub trait IntoJulia {
    fn into_julia<'s>(self, session: &'s Session) -> BridgeResult<Value<'s>>;
}

macro_rules! impl_into_julia_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoJulia for $ty {
                fn into_julia<'s>(self, session: &'s Session) -> BridgeResult<Value<'s>> {
                    session.marshal_scalar(self)
                }
            }
        )*
    };
}

impl_into_julia_scalar!(bool, u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl<T: Primitive> IntoJulia for &[T] {
    fn into_julia<'s>(self, session: &'s Session) -> BridgeResult<Value<'s>> {
        session.marshal_slice(self)
    }
}

impl<T: Primitive> IntoJulia for &Vec<T> {
    fn into_julia<'s>(self, session: &'s Session) -> BridgeResult<Value<'s>> {
        session.marshal_slice(self)
    }
}

impl<T: Primitive> IntoJulia for Vec<T> {
    fn into_julia<'s>(self, session: &'s Session) -> BridgeResult<Value<'s>> {
        session.marshal_slice(&self)
    }
}

impl<T: Primitive> IntoJulia for &Mat<T> {
    fn into_julia<'s>(self, session: &'s Session) -> BridgeResult<Value<'s>> {
        session.marshal_mat(self)
    }
}

impl<T: Primitive> IntoJulia for Mat<T> {
    fn into_julia<'s>(self, session: &'s Session) -> BridgeResult<Value<'s>> {
        session.marshal_mat(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::api::{JuliaApi, Module, RawValue};
    use crate::ffi::array_type::ElementType;
    use crate::ffi::emulated::EmulatedJulia;
    use crate::kind::{PrimitiveKind, Scalar};
    use pretty_assertions::assert_eq;
    use std::ffi::c_void;

    /// Emulator whose array allocation always comes back empty
    struct NoArrays(EmulatedJulia);

    impl JuliaApi for NoArrays {
        fn name(&self) -> &'static str {
            "no-arrays"
        }
        fn init(&mut self) -> BridgeResult<()> {
            self.0.init()
        }
        fn exit(&mut self) {
            self.0.exit()
        }
        fn eval_string(&self, code: &str) -> BridgeResult<RawValue> {
            self.0.eval_string(code)
        }
        fn get_function(&self, module: Module, name: &str) -> BridgeResult<RawValue> {
            self.0.get_function(module, name)
        }
        fn call(&self, function: RawValue, args: &[RawValue]) -> BridgeResult<RawValue> {
            self.0.call(function, args)
        }
        fn box_scalar(&self, scalar: Scalar) -> BridgeResult<RawValue> {
            self.0.box_scalar(scalar)
        }
        unsafe fn unbox_scalar(&self, value: RawValue, kind: PrimitiveKind) -> Scalar {
            self.0.unbox_scalar(value, kind)
        }
        fn apply_array_type(&self, element: ElementType, ndims: usize) -> BridgeResult<RawValue> {
            self.0.apply_array_type(element, ndims)
        }
        fn alloc_array(&self, _array_type: RawValue, _dims: &[usize]) -> BridgeResult<Option<RawValue>> {
            Ok(None)
        }
        unsafe fn array_data(&self, array: RawValue) -> *mut c_void {
            self.0.array_data(array)
        }
    }

    #[test]
    fn test_allocation_failure() {
        let mut session = Session::new(Box::new(NoArrays(EmulatedJulia::new())));
        session.initialize().unwrap();
        let err = session.marshal_slice(&[1.0f32, 2.0]).unwrap_err();
        assert_eq!(
            err,
            BridgeError::AllocationFailed {
                array_type: "Vector{Float32}".to_string(),
                dims: vec![2],
            }
        );
    }

    #[test]
    fn test_empty_slice_rejected() {
        let session = Session::emulated().unwrap();
        let empty: &[i32] = &[];
        assert!(matches!(
            session.marshal_slice(empty).unwrap_err(),
            BridgeError::InvalidDimensions(_)
        ));
    }

    #[test]
    fn test_marshal_dispatches_on_value() {
        let session = Session::emulated().unwrap();
        assert_eq!(session.marshal(true).unwrap().type_name().unwrap(), "Bool");
        assert_eq!(session.marshal(vec![1u16, 2]).unwrap().type_name().unwrap(), "Vector{UInt16}");
        let data = vec![1i32, 2, 3];
        assert_eq!(session.marshal(&data).unwrap().len().unwrap(), 3);
        assert_eq!(session.marshal(data.as_slice()).unwrap().type_name().unwrap(), "Vector{Int32}");
        let mat = Mat::new(vec![0.5f64; 24], vec![2, 3, 4]).unwrap();
        assert_eq!(session.marshal(mat).unwrap().type_name().unwrap(), "Array{Float64, 3}");
    }

    #[test]
    fn test_marshal_requires_ready_session() {
        let mut session = Session::emulated().unwrap();
        session.finalize().unwrap();
        assert_eq!(session.marshal_scalar(1u8).unwrap_err(), BridgeError::Finalized);
        assert_eq!(session.marshal_slice(&[1u8]).unwrap_err(), BridgeError::Finalized);
    }
}
