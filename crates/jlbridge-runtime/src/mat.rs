//! Typed host-side container for arrays passed to and from Julia
//!
//! A `Mat<T>` owns a flat element buffer and the shape describing it. The
//! invariant `product(shape) == elements.len()` is checked at construction
//! and cannot be broken afterwards: there are no public mutators.

use crate::dims;
use crate::error::{BridgeError, BridgeResult};
use crate::kind::Primitive;
use serde::{Deserialize, Deserializer, Serialize};

/// Flat elements plus shape, for one primitive element kind
///
/// # Examples
///
/// ```
/// use jlbridge_runtime::Mat;
///
/// let mat = Mat::new(vec![1u8, 2, 3, 4], vec![2, 2]).unwrap();
/// assert_eq!(mat.shape(), &[2, 2]);
///
/// // Shape defaults to a single dimension
/// let vector = Mat::from_elements(vec![1.0f64, 2.0]).unwrap();
/// assert_eq!(vector.shape(), &[2]);
///
/// assert!(Mat::new(vec![1u8, 2, 3, 4], vec![2, 3]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mat<T: Primitive> {
    #[serde(rename = "elms")]
    elements: Vec<T>,
    #[serde(rename = "dims")]
    shape: Vec<usize>,
}

impl<T: Primitive> Mat<T> {
    /// Build a container from elements and an explicit shape
    pub fn new(elements: Vec<T>, shape: Vec<usize>) -> BridgeResult<Self> {
        let expected = dims::validate(&shape)?;
        if expected != elements.len() {
            return Err(BridgeError::DimensionMismatch {
                expected,
                got: elements.len(),
            });
        }
        Ok(Self { elements, shape })
    }

    /// Build a one-dimensional container
    pub fn from_elements(elements: Vec<T>) -> BridgeResult<Self> {
        let shape = vec![elements.len()];
        Self::new(elements, shape)
    }

    /// Build a container of default values, e.g. to receive an unmarshaled array
    pub fn zeros(shape: Vec<usize>) -> BridgeResult<Self> {
        let count = dims::validate(&shape)?;
        Ok(Self {
            elements: vec![T::default(); count],
            shape,
        })
    }

    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndims(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Always false: a valid shape has no zero extent
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element storage for the unmarshaler; length is fixed by the shape
    pub(crate) fn elements_mut(&mut self) -> &mut [T] {
        &mut self.elements
    }
}

#[derive(Deserialize)]
struct MatParts<T> {
    elms: Vec<T>,
    dims: Vec<usize>,
}

impl<'de, T> Deserialize<'de> for Mat<T>
where
    T: Primitive + Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parts = MatParts::<T>::deserialize(deserializer)?;
        Mat::new(parts.elms, parts.dims).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_new_mat_instantiation() {
        assert!(Mat::new(vec![1u8, 2, 3, 4], vec![4]).is_ok());
        assert!(Mat::from_elements(vec![1u8, 2, 3, 4]).is_ok());
        assert!(Mat::new(vec![1u8, 2, 3, 4], vec![2, 2]).is_ok());
        assert_eq!(
            Mat::new(vec![1u8, 2, 3, 4], vec![2, 3]),
            Err(BridgeError::DimensionMismatch {
                expected: 6,
                got: 4
            })
        );
    }

    #[test]
    fn test_empty_elements_rejected() {
        let result = Mat::<f64>::from_elements(Vec::new());
        assert!(matches!(result, Err(BridgeError::InvalidDimensions(_))));
    }

    #[test]
    fn test_zeros() {
        let mat = Mat::<f32>::zeros(vec![2, 3]).unwrap();
        assert_eq!(mat.len(), 6);
        assert_eq!(mat.ndims(), 2);
        assert!(mat.elements().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_json_field_names() {
        let mat = Mat::new(vec![true, false], vec![2]).unwrap();
        let json = serde_json::to_string(&mat).unwrap();
        assert_eq!(json, r#"{"elms":[true,false],"dims":[2]}"#);

        let back: Mat<bool> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mat);
    }

    #[test]
    fn test_json_revalidates_shape() {
        let result: Result<Mat<i32>, _> = serde_json::from_str(r#"{"elms":[1,2,3],"dims":[2,2]}"#);
        assert!(result.is_err());
    }

    fn shape_and_elements() -> impl Strategy<Value = (Vec<usize>, Vec<i32>)> {
        prop::collection::vec(1usize..5, 1..5).prop_flat_map(|shape| {
            let count: usize = shape.iter().product();
            (Just(shape), prop::collection::vec(any::<i32>(), count))
        })
    }

    proptest! {
        #[test]
        fn prop_construct_preserves_parts((shape, elements) in shape_and_elements()) {
            let mat = Mat::new(elements.clone(), shape.clone()).unwrap();
            prop_assert_eq!(mat.elements(), elements.as_slice());
            prop_assert_eq!(mat.shape(), shape.as_slice());
        }

        #[test]
        fn prop_construct_rejects_wrong_length(
            (shape, mut elements) in shape_and_elements(),
            extra in 1usize..4,
        ) {
            elements.extend(std::iter::repeat(0).take(extra));
            let is_mismatch = matches!(
                Mat::new(elements, shape),
                Err(BridgeError::DimensionMismatch { .. })
            );
            prop_assert!(is_mismatch);
        }

        #[test]
        fn prop_default_shape_is_length(elements in prop::collection::vec(any::<u16>(), 1..64)) {
            let mat = Mat::from_elements(elements.clone()).unwrap();
            prop_assert_eq!(mat.shape(), &[elements.len()][..]);
        }
    }
}
