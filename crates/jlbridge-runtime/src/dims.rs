//! Shape validation

use crate::error::{BridgeError, BridgeResult};

/// Validate a shape and return the number of elements it describes
///
/// Fails with `InvalidDimensions` when the shape is empty, holds a zero
/// extent, or its product overflows `usize`.
///
/// # Examples
///
/// ```
/// use jlbridge_runtime::dims::validate;
///
/// assert_eq!(validate(&[2, 3]).unwrap(), 6);
/// assert!(validate(&[]).is_err());
/// assert!(validate(&[2, 0]).is_err());
/// ```
pub fn validate(shape: &[usize]) -> BridgeResult<usize> {
    if shape.is_empty() {
        return Err(BridgeError::InvalidDimensions(
            "shape needs at least one dimension".to_string(),
        ));
    }

    shape.iter().enumerate().try_fold(1usize, |count, (axis, &extent)| {
        if extent == 0 {
            return Err(BridgeError::InvalidDimensions(format!(
                "dimension {} must be greater than 0",
                axis
            )));
        }
        count.checked_mul(extent).ok_or_else(|| {
            BridgeError::InvalidDimensions(format!("element count of {:?} overflows", shape))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[4], 4)]
    #[case(&[2, 3], 6)]
    #[case(&[2, 3, 4], 24)]
    #[case(&[1, 1, 1, 1, 7], 7)]
    fn test_validate_counts(#[case] shape: &[usize], #[case] expected: usize) {
        assert_eq!(validate(shape), Ok(expected));
    }

    #[rstest]
    #[case(&[])]
    #[case(&[0])]
    #[case(&[2, 0])]
    #[case(&[3, 2, 0, 5])]
    fn test_validate_rejects(#[case] shape: &[usize]) {
        assert!(matches!(
            validate(shape),
            Err(BridgeError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_validate_overflow() {
        let result = validate(&[usize::MAX, 2]);
        assert!(matches!(result, Err(BridgeError::InvalidDimensions(_))));
    }
}
