//! Heap objects of the emulated runtime

use super::parser::Expr;
use crate::ffi::api::RawValue;
use crate::ffi::array_type::{ArrayTypeDescriptor, ElementType};
use crate::kind::{Primitive, PrimitiveKind, Scalar};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

/// Runtime type of an emulated object
#[derive(Debug, Clone, PartialEq)]
pub enum JlType {
    Scalar(PrimitiveKind),
    Array(ElementType, usize),
    String,
    Nothing,
    DataType,
    Undef,
    Function(String),
}

impl fmt::Display for JlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JlType::Scalar(kind) => f.write_str(kind.julia_name()),
            JlType::Array(element, ndims) => write!(
                f,
                "{}",
                ArrayTypeDescriptor {
                    element: *element,
                    ndims: *ndims,
                }
            ),
            JlType::String => f.write_str("String"),
            JlType::Nothing => f.write_str("Nothing"),
            JlType::DataType => f.write_str("DataType"),
            JlType::Undef => f.write_str("UndefInitializer"),
            JlType::Function(name) => write!(f, "typeof({})", name),
        }
    }
}

/// A Julia exception raised inside the emulator
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    pub type_name: &'static str,
    /// What `showerror` prints
    pub text: String,
}

impl Exception {
    fn new(type_name: &'static str, detail: impl fmt::Display) -> Self {
        Self {
            type_name,
            text: format!("{}: {}", type_name, detail),
        }
    }

    pub fn method_error(name: &str, arg_types: &[JlType]) -> Self {
        let args: Vec<String> = arg_types.iter().map(|t| format!("::{}", t)).collect();
        Self::new(
            "MethodError",
            format!("no method matching {}({})", name, args.join(", ")),
        )
    }

    pub fn not_callable(t: &JlType) -> Self {
        Self::new("MethodError", format!("objects of type {} are not callable", t))
    }

    pub fn undef_var(name: &str) -> Self {
        Self::new("UndefVarError", format!("`{}` not defined", name))
    }

    pub fn argument(message: impl fmt::Display) -> Self {
        Self::new("ArgumentError", message)
    }

    pub fn dimension_mismatch(message: impl fmt::Display) -> Self {
        Self::new("DimensionMismatch", message)
    }

    pub fn inexact(target: PrimitiveKind, value: Scalar) -> Self {
        Self::new("InexactError", format!("{}({})", target, value))
    }

    pub fn type_error(message: impl fmt::Display) -> Self {
        Self::new("TypeError", message)
    }

    pub fn parse(message: impl fmt::Display) -> Self {
        Self::new("ParseError", message)
    }

    pub fn out_of_memory() -> Self {
        Self {
            type_name: "OutOfMemoryError",
            text: "OutOfMemoryError()".to_string(),
        }
    }

    pub fn stack_overflow() -> Self {
        Self {
            type_name: "StackOverflowError",
            text: "StackOverflowError:".to_string(),
        }
    }

    pub fn singular(column: usize) -> Self {
        Self {
            type_name: "SingularException",
            text: format!("SingularException({})", column),
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Numeric cast with Julia's wrapping integer semantics (`x % T`)
pub fn cast_scalar(value: Scalar, kind: PrimitiveKind) -> Scalar {
    let int = match value {
        Scalar::F32(_) | Scalar::F64(_) => value.as_f64() as i128,
        Scalar::U64(v) => i128::from(v),
        _ => i128::from(value.as_i64().unwrap_or(0)) + i128::from(matches!(value, Scalar::Bool(true))),
    };
    match kind {
        PrimitiveKind::Bool => Scalar::Bool(value.as_f64() != 0.0),
        PrimitiveKind::F32 => Scalar::F32(value.as_f64() as f32),
        PrimitiveKind::F64 => Scalar::F64(value.as_f64()),
        PrimitiveKind::U8 => Scalar::U8(int as u8),
        PrimitiveKind::U16 => Scalar::U16(int as u16),
        PrimitiveKind::U32 => Scalar::U32(int as u32),
        PrimitiveKind::U64 => Scalar::U64(int as u64),
        PrimitiveKind::I8 => Scalar::I8(int as i8),
        PrimitiveKind::I16 => Scalar::I16(int as i16),
        PrimitiveKind::I32 => Scalar::I32(int as i32),
        PrimitiveKind::I64 => Scalar::I64(int as i64),
    }
}

/// Exact conversion (`T(x)`), failing with `InexactError` when the value changes
pub fn convert_scalar(value: Scalar, kind: PrimitiveKind) -> Result<Scalar, Exception> {
    let converted = cast_scalar(value, kind);
    if kind.is_float() || converted.as_f64() == value.as_f64() {
        Ok(converted)
    } else {
        Err(Exception::inexact(kind, value))
    }
}

/// Largest backing buffer an emulated array may own
pub const MAX_ARRAY_BYTES: usize = 1 << 32;

/// Array with an 8-byte aligned backing buffer
///
/// Elements are stored in the same layout a libjulia array uses, so the
/// marshaling copy path reads and writes it through a raw data pointer.
pub struct ArrayObject {
    element: ElementType,
    dims: Vec<usize>,
    words: Box<[Cell<u64>]>,
}

impl ArrayObject {
    /// Bytes backing `dims` elements of `element`, `None` on overflow or
    /// past `MAX_ARRAY_BYTES`
    pub fn byte_size(element: ElementType, dims: &[usize]) -> Option<usize> {
        dims.iter()
            .try_fold(element.size(), |acc, &extent| acc.checked_mul(extent))
            .filter(|&bytes| bytes <= MAX_ARRAY_BYTES)
    }

    /// Zero-filled array, `OutOfMemoryError` when it exceeds the allocation limit
    pub fn alloc(element: ElementType, dims: Vec<usize>) -> Result<Self, Exception> {
        let bytes = Self::byte_size(element, &dims).ok_or_else(Exception::out_of_memory)?;
        let words = bytes.div_ceil(8).max(1);
        Ok(Self {
            element,
            dims,
            words: vec![Cell::new(0u64); words].into_boxed_slice(),
        })
    }

    /// Array holding `values` cast to `element`
    pub fn from_scalars(element: ElementType, dims: Vec<usize>, values: &[Scalar]) -> Result<Self, Exception> {
        let array = Self::alloc(element, dims)?;
        for (index, value) in values.iter().enumerate().take(array.len()) {
            array.set(index, *value);
        }
        Ok(array)
    }

    pub fn element(&self) -> ElementType {
        self.element
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn type_of(&self) -> JlType {
        JlType::Array(self.element, self.dims.len())
    }

    pub fn data_ptr(&self) -> *mut c_void {
        self.words.as_ptr().cast_mut().cast()
    }

    fn slot<T>(&self, index: usize) -> *mut T {
        // SAFETY: callers check `index < len`, so the offset stays inside `words`
        unsafe { self.data_ptr().cast::<u8>().add(index * self.element.size()).cast() }
    }

    pub fn get(&self, index: usize) -> Option<Scalar> {
        if index >= self.len() {
            return None;
        }
        let value = crate::dispatch_kind!(self.element.kind(), T => {
            // SAFETY: in bounds, aligned to the element size, written through `Cell`s only
            let repr = unsafe { self.slot::<<T as Primitive>::Repr>(index).read() };
            T::from_repr(repr).into_scalar()
        });
        Some(value)
    }

    /// Store `value` cast to the element type; out-of-bounds writes are ignored
    pub fn set(&self, index: usize, value: Scalar) {
        if index >= self.len() {
            return;
        }
        let value = cast_scalar(value, self.element.kind());
        crate::dispatch_kind!(self.element.kind(), T => {
            if let Some(v) = T::from_scalar(value) {
                // SAFETY: see `get`
                unsafe { self.slot::<<T as Primitive>::Repr>(index).write(v.to_repr()) };
            }
        });
    }

    pub fn scalars(&self) -> Vec<Scalar> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }

    pub fn to_f64(&self) -> Vec<f64> {
        self.scalars().iter().map(Scalar::as_f64).collect()
    }
}

impl fmt::Debug for ArrayObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayObject")
            .field("type", &self.type_of().to_string())
            .field("dims", &self.dims)
            .finish()
    }
}

/// Type constraint on a method parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Concrete(JlType),
    Abstract(String),
}

pub const ABSTRACT_TYPES: [&str; 12] = [
    "Any",
    "Number",
    "Real",
    "Integer",
    "Signed",
    "Unsigned",
    "AbstractFloat",
    "AbstractArray",
    "AbstractVector",
    "AbstractMatrix",
    "AbstractString",
    "Function",
];

impl Annotation {
    pub fn matches(&self, t: &JlType) -> bool {
        use PrimitiveKind::*;
        match self {
            Annotation::Concrete(expected) => expected == t,
            Annotation::Abstract(name) => match (name.as_str(), t) {
                ("Any", _) => true,
                ("Number" | "Real", JlType::Scalar(_)) => true,
                ("Integer", JlType::Scalar(kind)) => !kind.is_float(),
                ("Signed", JlType::Scalar(kind)) => matches!(kind, I8 | I16 | I32 | I64),
                ("Unsigned", JlType::Scalar(kind)) => matches!(kind, U8 | U16 | U32 | U64),
                ("AbstractFloat", JlType::Scalar(kind)) => kind.is_float(),
                ("AbstractArray", JlType::Array(..)) => true,
                ("AbstractVector", JlType::Array(_, n)) => *n == 1,
                ("AbstractMatrix", JlType::Array(_, n)) => *n == 2,
                ("AbstractString", JlType::String) => true,
                ("Function", JlType::Function(_)) => true,
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub params: Vec<(String, Option<Annotation>)>,
    pub body: Expr,
}

impl Method {
    pub fn accepts(&self, arg_types: &[JlType]) -> bool {
        self.params.len() == arg_types.len()
            && self
                .params
                .iter()
                .zip(arg_types)
                .all(|((_, annotation), t)| annotation.as_ref().map_or(true, |a| a.matches(t)))
    }

    fn signature(&self) -> Vec<Option<Annotation>> {
        self.params.iter().map(|(_, a)| a.clone()).collect()
    }

    /// Number of annotated parameters, used to pick the most specific method
    pub fn specificity(&self) -> usize {
        self.params.iter().filter(|(_, a)| a.is_some()).count()
    }
}

/// User-defined function with one or more methods
#[derive(Debug)]
pub struct GenericFunction {
    pub name: String,
    methods: RefCell<Vec<Method>>,
}

impl GenericFunction {
    pub fn new(name: String) -> Self {
        Self {
            name,
            methods: RefCell::new(Vec::new()),
        }
    }

    /// Add a method, replacing one with the same signature
    pub fn define(&self, method: Method) {
        let mut methods = self.methods.borrow_mut();
        let signature = method.signature();
        methods.retain(|m| m.signature() != signature);
        methods.push(method);
    }

    /// Most specific method accepting the argument types
    pub fn select(&self, arg_types: &[JlType]) -> Option<Method> {
        self.methods
            .borrow()
            .iter()
            .filter(|m| m.accepts(arg_types))
            .max_by_key(|m| m.specificity())
            .cloned()
    }
}

#[derive(Debug)]
pub enum Object {
    Nothing,
    Undef,
    Scalar(Scalar),
    Str(String),
    Type(JlType),
    Array(ArrayObject),
    Builtin(super::builtins::Builtin),
    Generic(GenericFunction),
}

impl Object {
    pub fn type_of(&self) -> JlType {
        match self {
            Object::Nothing => JlType::Nothing,
            Object::Undef => JlType::Undef,
            Object::Scalar(value) => JlType::Scalar(value.kind()),
            Object::Str(_) => JlType::String,
            Object::Type(_) => JlType::DataType,
            Object::Array(array) => array.type_of(),
            Object::Builtin(builtin) => JlType::Function(builtin.name().to_string()),
            Object::Generic(function) => JlType::Function(function.name.clone()),
        }
    }
}

/// Objects are never moved or freed while the heap lives
#[derive(Default)]
pub struct Heap {
    objects: RefCell<Vec<NonNull<Object>>>,
    addresses: RefCell<HashSet<usize>>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&self, object: Object) -> RawValue {
        let ptr = NonNull::from(Box::leak(Box::new(object)));
        self.objects.borrow_mut().push(ptr);
        self.addresses.borrow_mut().insert(ptr.as_ptr() as usize);
        RawValue::from(ptr.cast::<c_void>())
    }

    /// Resolve a pointer handed out by `alloc`; `None` for foreign pointers
    pub fn get(&self, raw: RawValue) -> Option<&Object> {
        if !self.addresses.borrow().contains(&(raw.as_ptr() as usize)) {
            return None;
        }
        // SAFETY: the address came from `alloc` and stays valid until `drop`
        Some(unsafe { &*raw.as_ptr().cast::<Object>() })
    }

    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        for ptr in self.objects.get_mut().drain(..) {
            // SAFETY: each pointer came from `Box::leak` exactly once
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_array_data_is_aligned() {
        let array = ArrayObject::alloc(ElementType::UInt8, vec![3]).unwrap();
        assert_eq!(array.data_ptr() as usize % 8, 0);
        assert_eq!(array.len(), 3);
        assert_eq!(array.scalars(), vec![Scalar::U8(0); 3]);
    }

    #[test]
    fn test_array_set_casts_to_element() {
        let array = ArrayObject::alloc(ElementType::Int8, vec![2, 2]).unwrap();
        array.set(0, Scalar::I64(-3));
        array.set(3, Scalar::F64(2.0));
        array.set(9, Scalar::I64(1));
        assert_eq!(
            array.scalars(),
            vec![Scalar::I8(-3), Scalar::I8(0), Scalar::I8(0), Scalar::I8(2)]
        );
        assert_eq!(array.get(4), None);
        assert_eq!(array.type_of().to_string(), "Matrix{Int8}");
    }

    #[test]
    fn test_alloc_rejects_oversized_arrays() {
        assert!(ArrayObject::alloc(ElementType::Float64, vec![1 << 62, 4]).is_err());
        assert!(ArrayObject::alloc(ElementType::UInt8, vec![MAX_ARRAY_BYTES + 1]).is_err());
        assert_eq!(
            ArrayObject::alloc(ElementType::Float64, vec![usize::MAX, 2]).unwrap_err(),
            Exception::out_of_memory()
        );
        assert_eq!(ArrayObject::byte_size(ElementType::Int16, &[3, 4]), Some(24));
        assert_eq!(ArrayObject::byte_size(ElementType::UInt8, &[MAX_ARRAY_BYTES]), Some(MAX_ARRAY_BYTES));
    }

    #[rstest]
    #[case(Scalar::I64(300), PrimitiveKind::U8, Scalar::U8(44))]
    #[case(Scalar::I64(-1), PrimitiveKind::U16, Scalar::U16(u16::MAX))]
    #[case(Scalar::F64(2.9), PrimitiveKind::I32, Scalar::I32(2))]
    #[case(Scalar::Bool(true), PrimitiveKind::F64, Scalar::F64(1.0))]
    #[case(Scalar::U64(u64::MAX), PrimitiveKind::I64, Scalar::I64(-1))]
    fn test_cast_scalar(#[case] value: Scalar, #[case] kind: PrimitiveKind, #[case] expected: Scalar) {
        assert_eq!(cast_scalar(value, kind), expected);
    }

    #[test]
    fn test_convert_scalar_inexact() {
        assert_eq!(convert_scalar(Scalar::I64(5), PrimitiveKind::I8), Ok(Scalar::I8(5)));
        let err = convert_scalar(Scalar::I64(300), PrimitiveKind::I8).unwrap_err();
        assert_eq!(err.text, "InexactError: Int8(300)");
        assert!(convert_scalar(Scalar::F64(1.5), PrimitiveKind::I64).is_err());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(JlType::Scalar(PrimitiveKind::I64).to_string(), "Int64");
        assert_eq!(JlType::Array(ElementType::Float64, 3).to_string(), "Array{Float64, 3}");
        assert_eq!(JlType::Function("inv".into()).to_string(), "typeof(inv)");
    }

    #[test]
    fn test_annotation_matching() {
        let integer = Annotation::Abstract("Integer".to_string());
        assert!(integer.matches(&JlType::Scalar(PrimitiveKind::U8)));
        assert!(!integer.matches(&JlType::Scalar(PrimitiveKind::F64)));
        let vector = Annotation::Abstract("AbstractVector".to_string());
        assert!(vector.matches(&JlType::Array(ElementType::Int8, 1)));
        assert!(!vector.matches(&JlType::Array(ElementType::Int8, 2)));
    }

    #[test]
    fn test_heap_rejects_foreign_pointers() {
        let heap = Heap::new();
        let raw = heap.alloc(Object::Scalar(Scalar::I64(5)));
        assert!(matches!(heap.get(raw), Some(Object::Scalar(Scalar::I64(5)))));

        let mut other = 0u64;
        let foreign = RawValue::new((&mut other as *mut u64).cast()).unwrap();
        assert!(heap.get(foreign).is_none());
        assert_eq!(heap.len(), 1);
    }
}
