//! Handles to Julia objects

use crate::error::BridgeResult;
use crate::ffi::api::RawValue;
use crate::session::Session;
use std::fmt;

/// Non-owning reference to one Julia object
///
/// The runtime's garbage collector owns the object. A `Value` borrows the
/// session that produced it and stays usable only while that session is
/// ready.
#[derive(Clone, Copy)]
pub struct Value<'s> {
    raw: RawValue,
    session: &'s Session,
}

impl<'s> Value<'s> {
    pub(crate) fn new(session: &'s Session, raw: RawValue) -> Self {
        Self { raw, session }
    }

    /// Julia type name, as `string(typeof(x))` prints it
    ///
    /// Bool containers report Int8 array types (`Vector{Int8}`).
    pub fn type_name(&self) -> BridgeResult<String> {
        self.session.type_name_of(self.raw)
    }

    /// `length(x)`
    pub fn len(&self) -> BridgeResult<usize> {
        self.session.length_of(self.raw)
    }

    pub fn is_empty(&self) -> BridgeResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn is_nothing(&self) -> BridgeResult<bool> {
        Ok(self.type_name()? == "Nothing")
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    pub(crate) fn raw(&self) -> RawValue {
        self.raw
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("ptr", &self.raw.as_ptr())
            .field("backend", &self.session.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("nothing", "Nothing")]
    #[case("1.0", "Float64")]
    #[case("\"text\"", "String")]
    #[case("[0x01, 0x02]", "Vector{UInt8}")]
    fn test_type_name(#[case] code: &str, #[case] expected: &str) {
        let session = Session::emulated().unwrap();
        let value = session.eval(code).unwrap();
        assert_eq!(value.type_name().unwrap(), expected);
    }

    #[test]
    fn test_len_and_nothing() {
        let session = Session::emulated().unwrap();
        let vector = session.eval("[1, 2, 3]").unwrap();
        assert_eq!(vector.len().unwrap(), 3);
        assert!(!vector.is_empty().unwrap());
        assert!(!vector.is_nothing().unwrap());
        assert!(session.eval("nothing").unwrap().is_nothing().unwrap());
        assert!(session.eval("nothing").unwrap().len().is_err());
    }
}
