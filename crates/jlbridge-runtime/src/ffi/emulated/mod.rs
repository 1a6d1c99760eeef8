//! In-process stand-in for libjulia
//!
//! `EmulatedJulia` implements `JuliaApi` over its own object heap. Scalars,
//! strings, types, functions and arrays live in boxed heap slots with stable
//! addresses, and arrays keep an aligned backing buffer in libjulia's element
//! layout, so the marshaling layer runs the same pointer-copy path against
//! both backends.
//!
//! `eval_string` accepts the subset of Julia described in [`parser`]. Names
//! resolve through local bindings, then `Main`, then `Base`.

mod builtins;
mod object;
pub mod parser;

use crate::error::{BridgeError, BridgeResult};
use crate::ffi::api::{JuliaApi, Module, RawValue};
use crate::ffi::array_type::ElementType;
use crate::kind::{Primitive, PrimitiveKind, Scalar};
use builtins::Builtin;
use object::{
    convert_scalar, Annotation, ArrayObject, Exception, GenericFunction, Heap, JlType, Method, Object,
    ABSTRACT_TYPES,
};
use parser::{Expr, Param, Stmt};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr;
use tracing::{debug, trace};

type EvalResult = Result<RawValue, Exception>;
type Locals = HashMap<String, RawValue>;

/// Nested user-function calls allowed before `StackOverflowError`
const MAX_CALL_DEPTH: usize = 100;

pub struct EmulatedJulia {
    heap: Heap,
    nothing: RawValue,
    base: HashMap<String, RawValue>,
    main: RefCell<Locals>,
    depth: Cell<usize>,
}

impl EmulatedJulia {
    pub fn new() -> Self {
        let heap = Heap::new();
        let nothing = heap.alloc(Object::Nothing);
        Self {
            heap,
            nothing,
            base: HashMap::new(),
            main: RefCell::new(HashMap::new()),
            depth: Cell::new(0),
        }
    }

    fn object(&self, raw: RawValue) -> Result<&Object, Exception> {
        self.heap
            .get(raw)
            .ok_or_else(|| Exception::type_error("reference to an object outside this runtime"))
    }

    fn alloc(&self, object: Object) -> RawValue {
        self.heap.alloc(object)
    }

    fn nothing(&self) -> RawValue {
        self.nothing
    }

    fn type_of(&self, raw: RawValue) -> JlType {
        self.heap.get(raw).map_or(JlType::Nothing, Object::type_of)
    }

    fn run(&self, source: &str) -> EvalResult {
        let statements = parser::parse_program(source).map_err(|e| Exception::parse(e))?;
        let mut result = self.nothing();
        for statement in &statements {
            result = self.exec(statement)?;
        }
        Ok(result)
    }

    fn exec(&self, statement: &Stmt) -> EvalResult {
        match statement {
            Stmt::Expr(expr) => self.eval(expr, &Locals::new()),
            Stmt::Assign(name, expr) => {
                let value = self.eval(expr, &Locals::new())?;
                self.main.borrow_mut().insert(name.clone(), value);
                Ok(value)
            }
            Stmt::Method { name, params, body } => self.define(name, params, body),
            Stmt::Using(packages) => Err(Exception::argument(format!(
                "Package {} not found in current path.",
                packages.first().map_or("", String::as_str)
            ))),
        }
    }

    fn define(&self, name: &str, params: &[Param], body: &Expr) -> EvalResult {
        let params = params
            .iter()
            .map(|param| -> Result<(String, Option<Annotation>), Exception> {
                let annotation = param
                    .annotation
                    .as_ref()
                    .map(|expr| self.annotation(expr))
                    .transpose()?;
                Ok((param.name.clone(), annotation))
            })
            .collect::<Result<Vec<_>, Exception>>()?;
        let method = Method {
            params,
            body: body.clone(),
        };

        let existing = self.main.borrow().get(name).copied();
        if let Some(raw) = existing {
            if let Object::Generic(function) = self.object(raw)? {
                function.define(method);
                return Ok(raw);
            }
        }

        let function = GenericFunction::new(name.to_string());
        function.define(method);
        let raw = self.alloc(Object::Generic(function));
        self.main.borrow_mut().insert(name.to_string(), raw);
        Ok(raw)
    }

    fn annotation(&self, expr: &Expr) -> Result<Annotation, Exception> {
        if let Expr::Ident(name) = expr {
            if ABSTRACT_TYPES.contains(&name.as_str()) {
                return Ok(Annotation::Abstract(name.clone()));
            }
        }
        match self.object(self.eval(expr, &Locals::new())?)? {
            Object::Type(t) => Ok(Annotation::Concrete(t.clone())),
            other => Err(Exception::type_error(format!(
                "in type annotation, expected Type, got a value of type {}",
                other.type_of()
            ))),
        }
    }

    fn eval(&self, expr: &Expr, locals: &Locals) -> EvalResult {
        match expr {
            Expr::Literal(value) => Ok(self.alloc(Object::Scalar(*value))),
            Expr::Str(text) => Ok(self.alloc(Object::Str(text.clone()))),
            Expr::Ident(name) => self.lookup(name, locals),
            Expr::Vector(items) => {
                let values = self.args(items, locals)?;
                self.vector_literal(&values)
            }
            Expr::Call { callee, args } => {
                let function = self.eval(callee, locals)?;
                let args = self.args(args, locals)?;
                self.apply(function, &args)
            }
            Expr::Curly { name, params } => self.curly(name, params, locals),
            Expr::TypeAssert(inner, annotation) => {
                let value = self.eval(inner, locals)?;
                let annotation = self.annotation(annotation)?;
                let found = self.type_of(value);
                if annotation.matches(&found) {
                    Ok(value)
                } else {
                    Err(Exception::type_error(format!(
                        "typeassert: expected {}, got a value of type {}",
                        match annotation {
                            Annotation::Concrete(t) => t.to_string(),
                            Annotation::Abstract(name) => name,
                        },
                        found
                    )))
                }
            }
            Expr::Splat(_) => Err(Exception::parse("\"...\" expression outside call")),
        }
    }

    /// Evaluate call arguments, expanding `xs...` splats element by element
    fn args(&self, exprs: &[Expr], locals: &Locals) -> Result<Vec<RawValue>, Exception> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let Expr::Splat(inner) = expr else {
                values.push(self.eval(expr, locals)?);
                continue;
            };
            let value = self.eval(inner, locals)?;
            match self.object(value)? {
                Object::Array(array) => {
                    for scalar in array.scalars() {
                        values.push(self.alloc(Object::Scalar(scalar)));
                    }
                }
                Object::Scalar(_) => values.push(value),
                other => {
                    return Err(Exception::method_error("iterate", &[other.type_of()]));
                }
            }
        }
        Ok(values)
    }

    fn lookup(&self, name: &str, locals: &Locals) -> EvalResult {
        locals
            .get(name)
            .copied()
            .or_else(|| self.main.borrow().get(name).copied())
            .or_else(|| self.base.get(name).copied())
            .ok_or_else(|| Exception::undef_var(name))
    }

    fn vector_literal(&self, values: &[RawValue]) -> EvalResult {
        let scalars = values
            .iter()
            .map(|v| match self.object(*v)? {
                Object::Scalar(scalar) => Ok(*scalar),
                other => Err(Exception::argument(format!(
                    "vectors of {} are not supported",
                    other.type_of()
                ))),
            })
            .collect::<Result<Vec<Scalar>, Exception>>()?;

        let kind = scalars
            .iter()
            .map(Scalar::kind)
            .reduce(|a, b| if a == b { a } else { builtins::promote(a, b) })
            .ok_or_else(|| Exception::argument("empty vector literals are not supported"))?;
        if kind == PrimitiveKind::Bool {
            return Err(Exception::argument("vectors of Bool are not supported"));
        }

        let array = ArrayObject::from_scalars(kind.element_type(), vec![scalars.len()], &scalars)?;
        Ok(self.alloc(Object::Array(array)))
    }

    /// `Vector{T}`, `Matrix{T}` and `Array{T, N}`
    fn curly(&self, name: &str, params: &[Expr], locals: &Locals) -> EvalResult {
        let (element, ndims) = match (name, params) {
            ("Vector", [element]) => (element, 1),
            ("Matrix", [element]) => (element, 2),
            ("Array", [element, ndims]) => {
                let ndims = self.eval(ndims, locals)?;
                match self.object(ndims)? {
                    Object::Scalar(value) => match value.as_i64() {
                        Some(n) if n > 0 => (element, n as usize),
                        _ => return Err(Exception::type_error("invalid array dimension count")),
                    },
                    _ => return Err(Exception::type_error("invalid array dimension count")),
                }
            }
            ("Vector" | "Matrix" | "Array", _) => {
                return Err(Exception::type_error(format!("wrong number of parameters for {}", name)))
            }
            _ => return Err(Exception::undef_var(name)),
        };

        let element = self.eval(element, locals)?;
        let element = match self.object(element)? {
            Object::Type(JlType::Scalar(kind)) if *kind != PrimitiveKind::Bool => kind.element_type(),
            other => {
                return Err(Exception::argument(format!(
                    "unsupported array element {}",
                    match other {
                        Object::Type(t) => t.to_string(),
                        _ => other.type_of().to_string(),
                    }
                )))
            }
        };
        Ok(self.alloc(Object::Type(JlType::Array(element, ndims))))
    }

    fn apply(&self, function: RawValue, args: &[RawValue]) -> EvalResult {
        match self.object(function)? {
            Object::Builtin(builtin) => {
                trace!(function = builtin.name(), nargs = args.len(), "builtin call");
                builtins::call(self, *builtin, args)
            }
            Object::Generic(generic) => {
                let types: Vec<JlType> = args.iter().map(|a| self.type_of(*a)).collect();
                let method = generic
                    .select(&types)
                    .ok_or_else(|| Exception::method_error(&generic.name, &types))?;
                let locals: Locals = method
                    .params
                    .iter()
                    .map(|(name, _)| name.clone())
                    .zip(args.iter().copied())
                    .collect();

                if self.depth.get() >= MAX_CALL_DEPTH {
                    return Err(Exception::stack_overflow());
                }
                self.depth.set(self.depth.get() + 1);
                let result = self.eval(&method.body, &locals);
                self.depth.set(self.depth.get() - 1);
                result
            }
            Object::Type(t) => self.construct(t, args),
            other => Err(Exception::not_callable(&other.type_of())),
        }
    }

    /// Calling a type object: conversions and array constructors
    fn construct(&self, t: &JlType, args: &[RawValue]) -> EvalResult {
        let objects = args
            .iter()
            .map(|a| self.object(*a))
            .collect::<Result<Vec<_>, _>>()?;
        let no_method = || {
            let types: Vec<JlType> = objects.iter().map(|o| o.type_of()).collect();
            Exception::method_error(&t.to_string(), &types)
        };

        match (t, objects.as_slice()) {
            (JlType::Scalar(kind), [Object::Scalar(value)]) => {
                Ok(self.alloc(Object::Scalar(convert_scalar(*value, *kind)?)))
            }
            (JlType::Array(element, ndims), [Object::Undef, extents @ ..]) if extents.len() == *ndims => {
                let dims = extents
                    .iter()
                    .map(|o| match o {
                        Object::Scalar(value) => match value.as_i64() {
                            Some(n) if n >= 0 => Ok(n as usize),
                            _ => Err(Exception::argument("invalid Array dimensions")),
                        },
                        _ => Err(no_method()),
                    })
                    .collect::<Result<Vec<usize>, Exception>>()?;
                let array = ArrayObject::alloc(*element, dims)?;
                Ok(self.alloc(Object::Array(array)))
            }
            (JlType::Array(ElementType::UInt8, 1), [Object::Str(text)]) => {
                let bytes: Vec<Scalar> = text.bytes().map(Scalar::U8).collect();
                let array = ArrayObject::from_scalars(ElementType::UInt8, vec![bytes.len()], &bytes)?;
                Ok(self.alloc(Object::Array(array)))
            }
            (JlType::Array(element, ndims), [Object::Array(source)]) if source.dims().len() == *ndims => {
                let values = source
                    .scalars()
                    .into_iter()
                    .map(|v| convert_scalar(v, element.kind()))
                    .collect::<Result<Vec<_>, _>>()?;
                let array = ArrayObject::from_scalars(*element, source.dims().to_vec(), &values)?;
                Ok(self.alloc(Object::Array(array)))
            }
            (JlType::String, [Object::Array(bytes)]) if bytes.element() == ElementType::UInt8 => {
                let raw: Vec<u8> = bytes.scalars().iter().map(|v| v.as_f64() as u8).collect();
                Ok(self.alloc(Object::Str(String::from_utf8_lossy(&raw).into_owned())))
            }
            (JlType::String, _) => {
                let text = args
                    .iter()
                    .map(|a| builtins::display(self, *a))
                    .collect::<Result<String, _>>()?;
                Ok(self.alloc(Object::Str(text)))
            }
            (JlType::Scalar(_) | JlType::Array(..), _) => Err(no_method()),
            (other, _) => Err(Exception::not_callable(other)),
        }
    }

    fn raise(context: &str, exception: Exception) -> BridgeError {
        debug!(context, exception = exception.type_name, "julia exception");
        BridgeError::Eval {
            context: context.to_string(),
            message: exception.text,
        }
    }
}

impl Default for EmulatedJulia {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EmulatedJulia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmulatedJulia")
            .field("objects", &self.heap.len())
            .field("globals", &self.main.borrow().len())
            .finish()
    }
}

/// Read a scalar's bytes as another kind, like an unchecked unbox would
fn reinterpret(value: Scalar, kind: PrimitiveKind) -> Scalar {
    let bits = match value {
        Scalar::Bool(v) => u64::from(v),
        Scalar::U8(v) => u64::from(v),
        Scalar::U16(v) => u64::from(v),
        Scalar::U32(v) => u64::from(v),
        Scalar::U64(v) => v,
        Scalar::I8(v) => u64::from(v as u8),
        Scalar::I16(v) => u64::from(v as u16),
        Scalar::I32(v) => u64::from(v as u32),
        Scalar::I64(v) => v as u64,
        Scalar::F32(v) => u64::from(v.to_bits()),
        Scalar::F64(v) => v.to_bits(),
    };
    match kind {
        PrimitiveKind::Bool => Scalar::Bool(bits as u8 != 0),
        PrimitiveKind::U8 => Scalar::U8(bits as u8),
        PrimitiveKind::U16 => Scalar::U16(bits as u16),
        PrimitiveKind::U32 => Scalar::U32(bits as u32),
        PrimitiveKind::U64 => Scalar::U64(bits),
        PrimitiveKind::I8 => Scalar::I8(bits as u8 as i8),
        PrimitiveKind::I16 => Scalar::I16(bits as u16 as i16),
        PrimitiveKind::I32 => Scalar::I32(bits as u32 as i32),
        PrimitiveKind::I64 => Scalar::I64(bits as i64),
        PrimitiveKind::F32 => Scalar::F32(f32::from_bits(bits as u32)),
        PrimitiveKind::F64 => Scalar::F64(f64::from_bits(bits)),
    }
}

impl JuliaApi for EmulatedJulia {
    fn name(&self) -> &'static str {
        "emulated"
    }

    fn init(&mut self) -> BridgeResult<()> {
        if !self.base.is_empty() {
            return Err(BridgeError::AlreadyInitialized);
        }

        for builtin in Builtin::ALL {
            let raw = self.heap.alloc(Object::Builtin(builtin));
            self.base.insert(builtin.name().to_string(), raw);
        }
        for kind in PrimitiveKind::ALL {
            let raw = self.heap.alloc(Object::Type(JlType::Scalar(kind)));
            self.base.insert(kind.julia_name().to_string(), raw);
        }
        let string_type = self.heap.alloc(Object::Type(JlType::String));
        self.base.insert("String".to_string(), string_type);
        let nothing_type = self.heap.alloc(Object::Type(JlType::Nothing));
        self.base.insert("Nothing".to_string(), nothing_type);
        self.base.insert("nothing".to_string(), self.nothing);
        let undef = self.heap.alloc(Object::Undef);
        self.base.insert("undef".to_string(), undef);

        debug!(bindings = self.base.len(), "emulated runtime initialized");
        Ok(())
    }

    fn exit(&mut self) {
        debug!(objects = self.heap.len(), "emulated runtime finalized");
    }

    fn eval_string(&self, code: &str) -> BridgeResult<RawValue> {
        self.run(code).map_err(|e| Self::raise("eval", e))
    }

    fn get_function(&self, module: Module, name: &str) -> BridgeResult<RawValue> {
        let found = match module {
            Module::Main => self
                .main
                .borrow()
                .get(name)
                .copied()
                .or_else(|| self.base.get(name).copied()),
            Module::Base => self.base.get(name).copied(),
        };
        found.ok_or_else(|| BridgeError::FunctionNotFound {
            module: module.to_string(),
            name: name.to_string(),
        })
    }

    fn call(&self, function: RawValue, args: &[RawValue]) -> BridgeResult<RawValue> {
        self.apply(function, args).map_err(|e| Self::raise("call", e))
    }

    fn box_scalar(&self, scalar: Scalar) -> BridgeResult<RawValue> {
        Ok(self.alloc(Object::Scalar(scalar)))
    }

    unsafe fn unbox_scalar(&self, value: RawValue, kind: PrimitiveKind) -> Scalar {
        match self.heap.get(value) {
            Some(Object::Scalar(scalar)) if scalar.kind() == kind => *scalar,
            Some(Object::Scalar(scalar)) => reinterpret(*scalar, kind),
            _ => crate::dispatch_kind!(kind, T => T::default().into_scalar()),
        }
    }

    fn apply_array_type(&self, element: ElementType, ndims: usize) -> BridgeResult<RawValue> {
        if ndims == 0 {
            return Err(BridgeError::InvalidDimensions(
                "array type needs at least one dimension".to_string(),
            ));
        }
        Ok(self.alloc(Object::Type(JlType::Array(element, ndims))))
    }

    fn alloc_array(&self, array_type: RawValue, dims: &[usize]) -> BridgeResult<Option<RawValue>> {
        let Some(Object::Type(JlType::Array(element, ndims))) = self.heap.get(array_type) else {
            return Ok(None);
        };
        if *ndims != dims.len() {
            return Ok(None);
        }
        Ok(ArrayObject::alloc(*element, dims.to_vec())
            .ok()
            .map(|array| self.alloc(Object::Array(array))))
    }

    unsafe fn array_data(&self, array: RawValue) -> *mut c_void {
        match self.heap.get(array) {
            Some(Object::Array(array)) => array.data_ptr(),
            _ => ptr::null_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::api::PRELUDE;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn runtime() -> EmulatedJulia {
        let mut rt = EmulatedJulia::new();
        rt.init().unwrap();
        rt.eval_string(PRELUDE).unwrap();
        rt
    }

    fn show(rt: &EmulatedJulia, code: &str) -> String {
        let value = rt.eval_string(code).unwrap();
        builtins::display(rt, value).unwrap()
    }

    fn error(rt: &EmulatedJulia, code: &str) -> String {
        match rt.eval_string(code) {
            Err(BridgeError::Eval { message, .. }) => message,
            other => panic!("expected an evaluation error, got {:?}", other),
        }
    }

    #[rstest]
    #[case("typeof(1)", "Int64")]
    #[case("typeof(1.5f0)", "Float32")]
    #[case("typeof([1, 2])", "Vector{Int64}")]
    #[case("typeof([0x01, 0x02])", "Vector{UInt8}")]
    #[case("typeof(randn(2, 2))", "Matrix{Float64}")]
    #[case("typeof(Array{Int16, 3}(undef, 2, 3, 4))", "Array{Int16, 3}")]
    #[case("typeof(nothing)", "Nothing")]
    #[case("typeof(inv)", "typeof(inv)")]
    #[case("string(typeof(\"a\"))", "String")]
    fn test_type_names(#[case] code: &str, #[case] expected: &str) {
        let rt = runtime();
        assert_eq!(show(&rt, code), expected);
    }

    #[rstest]
    #[case("1 + 2 * 3", "7")]
    #[case("[1, 2, 3] * 2", "[2, 4, 6]")]
    #[case("sum([1.5, 2.5])", "4.0")]
    #[case("length(randn(3, 4))", "12")]
    #[case("ndims(randn(2, 2, 2))", "3")]
    #[case("Int8(-3)", "-3")]
    #[case("string(\"n=\", 4)", "n=4")]
    #[case("-[1, 2]", "[-1, -2]")]
    #[case("identity(0x2a)", "0x2a")]
    #[case("String(Vector{UInt8}(\"abc\"))", "abc")]
    fn test_expressions(#[case] code: &str, #[case] expected: &str) {
        let rt = runtime();
        assert_eq!(show(&rt, code), expected);
    }

    #[test]
    fn test_globals_and_methods() {
        let rt = runtime();
        rt.eval_string("x = [1.0, 2.0]; double(v) = v * 2").unwrap();
        assert_eq!(show(&rt, "double(x)"), "[2.0, 4.0]");
        assert_eq!(show(&rt, "string(x...)"), "1.02.0");

        rt.eval_string("scale(v::Int64, k::Int64) = v * k").unwrap();
        assert_eq!(show(&rt, "scale(2, 3)"), "6");
        assert_eq!(
            error(&rt, "scale(2.0, 3)"),
            "MethodError: no method matching scale(::Float64, ::Int64)"
        );
    }

    #[test]
    fn test_most_specific_method_wins() {
        let rt = runtime();
        rt.eval_string("pick(x) = 1\npick(x::Integer) = 2\npick(x::Int8) = 3").unwrap();
        assert_eq!(show(&rt, "pick(1.0)"), "1");
        assert_eq!(show(&rt, "pick(0x01)"), "2");
        assert_eq!(show(&rt, "pick(Int8(1))"), "3");
    }

    #[test]
    fn test_errors() {
        let rt = runtime();
        assert_eq!(error(&rt, "undefined_thing"), "UndefVarError: `undefined_thing` not defined");
        assert_eq!(
            error(&rt, "using JSON2"),
            "ArgumentError: Package JSON2 not found in current path."
        );
        assert_eq!(error(&rt, "Int8(300)"), "InexactError: Int8(300)");
        assert!(error(&rt, "[1, 2").starts_with("ParseError"));
        let deep = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(error(&rt, &deep).starts_with("ParseError"));
        assert_eq!(error(&rt, "inv(\"abc\")"), "MethodError: no method matching inv(::String)");
    }

    #[test]
    fn test_recursion_is_bounded() {
        let rt = runtime();
        rt.eval_string("spin(x) = spin(x)").unwrap();
        assert_eq!(error(&rt, "spin(1)"), "StackOverflowError:");
    }

    #[test]
    fn test_function_lookup() {
        let rt = runtime();
        assert!(rt.get_function(Module::Base, "randn").is_ok());
        assert!(rt.get_function(Module::Main, "randn").is_ok());
        assert!(rt.get_function(Module::Main, "__jlbridge_typeof").is_ok());
        assert_eq!(
            rt.get_function(Module::Base, "__jlbridge_typeof"),
            Err(BridgeError::FunctionNotFound {
                module: "Base".to_string(),
                name: "__jlbridge_typeof".to_string(),
            })
        );
    }

    #[test]
    fn test_double_init_rejected() {
        let mut rt = runtime();
        assert_eq!(rt.init(), Err(BridgeError::AlreadyInitialized));
    }

    #[test]
    fn test_unbox_reads_bits() {
        let rt = runtime();
        let boxed = rt.box_scalar(Scalar::I8(-1)).unwrap();
        assert_eq!(unsafe { rt.unbox_scalar(boxed, PrimitiveKind::I8) }, Scalar::I8(-1));
        assert_eq!(unsafe { rt.unbox_scalar(boxed, PrimitiveKind::U8) }, Scalar::U8(255));
    }

    #[test]
    fn test_alloc_array_checks_type() {
        let rt = runtime();
        let matrix = rt.apply_array_type(ElementType::Float64, 2).unwrap();
        assert!(rt.alloc_array(matrix, &[2, 2]).unwrap().is_some());
        assert!(rt.alloc_array(matrix, &[4]).unwrap().is_none());
        assert!(rt.alloc_array(matrix, &[1 << 20, 1 << 20]).unwrap().is_none());

        let not_a_type = rt.box_scalar(Scalar::I64(1)).unwrap();
        assert!(rt.alloc_array(not_a_type, &[2]).unwrap().is_none());
        assert!(unsafe { rt.array_data(not_a_type) }.is_null());
    }

    #[rstest]
    #[case("randn(4611686018427387904, 4)")]
    #[case("randn(1099511627776)")]
    #[case("Array{Float64, 2}(undef, 4611686018427387904, 4)")]
    #[case("randn(1048576, 1) * randn(1, 1048576)")]
    fn test_oversized_arrays_raise(#[case] code: &str) {
        let rt = runtime();
        assert_eq!(error(&rt, code), "OutOfMemoryError()");
    }

    #[test]
    fn test_inverse_times_matrix_is_identity() {
        let rt = runtime();
        rt.eval_string("a = randn(3, 3); b = inv(a) * a").unwrap();
        let b = rt.eval_string("b").unwrap();
        let Ok(Object::Array(array)) = rt.object(b) else {
            panic!("expected an array");
        };
        for (index, value) in array.to_f64().iter().enumerate() {
            let expected = if index % 4 == 0 { 1.0 } else { 0.0 };
            assert!((value - expected).abs() < 1e-6, "b[{}] = {}", index, value);
        }
    }
}
