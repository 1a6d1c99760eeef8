//! The C-API surface the bridge needs from a Julia runtime
//!
//! `JuliaApi` is implemented by `LibJulia` (a dynamically loaded libjulia)
//! and by `EmulatedJulia` (an in-process stand-in). Everything above this
//! trait is backend-agnostic.

use crate::error::BridgeResult;
use crate::ffi::array_type::ElementType;
use crate::kind::{PrimitiveKind, Scalar};
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

/// Prelude helper returning `string(typeof(x))` as a `Vector{UInt8}`
pub const TYPEOF_HELPER: &str = "__jlbridge_typeof";

/// Prelude helper returning the `showerror` text of an exception as a `Vector{UInt8}`
pub const SHOWERROR_HELPER: &str = "__jlbridge_showerror";

/// Helpers evaluated in `Main` right after initialization
pub const PRELUDE: &str = "\
__jlbridge_typeof(x) = Vector{UInt8}(string(typeof(x)))
__jlbridge_showerror(e) = Vector{UInt8}(sprint(showerror, e))
";

/// Namespace a function name is resolved in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Base,
    Main,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Module::Base => write!(f, "Base"),
            Module::Main => write!(f, "Main"),
        }
    }
}

/// Non-null pointer to a runtime-owned object (`jl_value_t*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RawValue(NonNull<c_void>);

impl RawValue {
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(RawValue)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

impl From<NonNull<c_void>> for RawValue {
    fn from(ptr: NonNull<c_void>) -> Self {
        RawValue(ptr)
    }
}

/// Runtime primitives used by the session, the marshaler and the unmarshaler
pub trait JuliaApi {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Start the runtime (`jl_init`)
    fn init(&mut self) -> BridgeResult<()>;

    /// Run exit hooks and finalizers (`jl_atexit_hook`)
    fn exit(&mut self);

    /// Evaluate source text in `Main`
    fn eval_string(&self, code: &str) -> BridgeResult<RawValue>;

    /// Look up a global function by name
    fn get_function(&self, module: Module, name: &str) -> BridgeResult<RawValue>;

    /// Call a function value with positional arguments
    fn call(&self, function: RawValue, args: &[RawValue]) -> BridgeResult<RawValue>;

    /// Box a host scalar with the boxing primitive of its exact kind
    fn box_scalar(&self, scalar: Scalar) -> BridgeResult<RawValue>;

    /// Unbox `value` as `kind`
    ///
    /// # Safety
    ///
    /// `value` must be a live boxed scalar whose runtime type is `kind`.
    unsafe fn unbox_scalar(&self, value: RawValue, kind: PrimitiveKind) -> Scalar;

    /// `Array{element, ndims}` as a runtime type object
    fn apply_array_type(&self, element: ElementType, ndims: usize) -> BridgeResult<RawValue>;

    /// Allocate an uninitialized array; `Ok(None)` when the runtime returned no array
    fn alloc_array(&self, array_type: RawValue, dims: &[usize]) -> BridgeResult<Option<RawValue>>;

    /// Pointer to the first element of an array's backing buffer
    ///
    /// # Safety
    ///
    /// `array` must be a live array object.
    unsafe fn array_data(&self, array: RawValue) -> *mut c_void;
}
