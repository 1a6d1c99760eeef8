//! Base functions of the emulated runtime
//!
//! Arrays are column-major here, as in Julia: element `(i, j)` of an
//! `m × n` matrix lives at flat index `i + j * m`.

use super::object::{cast_scalar, ArrayObject, Exception, JlType, Object};
use super::{EmulatedJulia, EvalResult};
use crate::ffi::api::RawValue;
use crate::ffi::array_type::ElementType;
use crate::kind::{PrimitiveKind, Scalar};
use rand::RngExt;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    TypeOf,
    String,
    Length,
    Ndims,
    Identity,
    Println,
    Randn,
    Inv,
    Mul,
    Add,
    Sub,
    Div,
    Sum,
    Sprint,
    ShowError,
}

impl Builtin {
    pub const ALL: [Builtin; 15] = [
        Builtin::TypeOf,
        Builtin::String,
        Builtin::Length,
        Builtin::Ndims,
        Builtin::Identity,
        Builtin::Println,
        Builtin::Randn,
        Builtin::Inv,
        Builtin::Mul,
        Builtin::Add,
        Builtin::Sub,
        Builtin::Div,
        Builtin::Sum,
        Builtin::Sprint,
        Builtin::ShowError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::TypeOf => "typeof",
            Builtin::String => "string",
            Builtin::Length => "length",
            Builtin::Ndims => "ndims",
            Builtin::Identity => "identity",
            Builtin::Println => "println",
            Builtin::Randn => "randn",
            Builtin::Inv => "inv",
            Builtin::Mul => "*",
            Builtin::Add => "+",
            Builtin::Sub => "-",
            Builtin::Div => "/",
            Builtin::Sum => "sum",
            Builtin::Sprint => "sprint",
            Builtin::ShowError => "showerror",
        }
    }
}

pub(super) fn call(rt: &EmulatedJulia, builtin: Builtin, args: &[RawValue]) -> EvalResult {
    let no_method = || -> Exception {
        let types: Vec<JlType> = args.iter().map(|a| rt.type_of(*a)).collect();
        Exception::method_error(builtin.name(), &types)
    };

    match (builtin, args) {
        (Builtin::TypeOf, [x]) => Ok(rt.alloc(Object::Type(rt.type_of(*x)))),
        (Builtin::String, _) => Ok(rt.alloc(Object::Str(concat(rt, args)?))),
        (Builtin::Identity, [x]) => Ok(*x),
        (Builtin::Println, _) => {
            println!("{}", concat(rt, args)?);
            Ok(rt.nothing())
        }
        (Builtin::Length, [x]) => {
            let length = match rt.object(*x)? {
                Object::Array(array) => array.len(),
                Object::Str(text) => text.chars().count(),
                Object::Scalar(_) => 1,
                _ => return Err(no_method()),
            };
            Ok(rt.alloc(Object::Scalar(Scalar::I64(length as i64))))
        }
        (Builtin::Ndims, [x]) => {
            let ndims = match rt.object(*x)? {
                Object::Array(array) => array.dims().len(),
                Object::Scalar(_) => 0,
                _ => return Err(no_method()),
            };
            Ok(rt.alloc(Object::Scalar(Scalar::I64(ndims as i64))))
        }
        (Builtin::Randn, _) => randn(rt, args),
        (Builtin::Inv, [x]) => match rt.object(*x)? {
            Object::Scalar(value) => {
                let kind = if value.kind() == PrimitiveKind::F32 {
                    PrimitiveKind::F32
                } else {
                    PrimitiveKind::F64
                };
                Ok(rt.alloc(Object::Scalar(cast_scalar(Scalar::F64(1.0 / value.as_f64()), kind))))
            }
            Object::Array(array) if array.dims().len() == 2 => {
                Ok(rt.alloc(Object::Array(invert(array)?)))
            }
            _ => Err(no_method()),
        },
        (Builtin::Sub, [x]) => match rt.object(*x)? {
            Object::Scalar(value) => {
                let negated = scalar_op(Builtin::Sub, cast_scalar(Scalar::I64(0), value.kind()), *value)?;
                Ok(rt.alloc(Object::Scalar(negated)))
            }
            Object::Array(array) => {
                let zero = cast_scalar(Scalar::I64(0), array.element().kind());
                let values = array
                    .scalars()
                    .into_iter()
                    .map(|v| scalar_op(Builtin::Sub, zero, v))
                    .collect::<Result<Vec<_>, _>>()?;
                let negated = ArrayObject::from_scalars(array.element(), array.dims().to_vec(), &values)?;
                Ok(rt.alloc(Object::Array(negated)))
            }
            _ => Err(no_method()),
        },
        (Builtin::Mul | Builtin::Add | Builtin::Sub | Builtin::Div, [a, b]) => {
            arithmetic(rt, builtin, *a, *b)?.ok_or_else(no_method)
        }
        (Builtin::Sum, [x]) => match rt.object(*x)? {
            Object::Array(array) => Ok(rt.alloc(Object::Scalar(sum(array)))),
            Object::Scalar(value) => Ok(rt.alloc(Object::Scalar(*value))),
            _ => Err(no_method()),
        },
        (Builtin::Sprint, [f, rest @ ..]) => {
            let text = match rt.object(*f)? {
                Object::Builtin(Builtin::ShowError) => match rest {
                    [e] => display(rt, *e)?,
                    _ => return Err(no_method()),
                },
                Object::Builtin(Builtin::String | Builtin::Println) => concat(rt, rest)?,
                _ => return Err(no_method()),
            };
            Ok(rt.alloc(Object::Str(text)))
        }
        (Builtin::ShowError, [e]) => {
            print!("{}", display(rt, *e)?);
            Ok(rt.nothing())
        }
        _ => Err(no_method()),
    }
}

fn concat(rt: &EmulatedJulia, args: &[RawValue]) -> Result<String, Exception> {
    args.iter().map(|a| display(rt, *a)).collect()
}

/// What `print` writes for a value
pub(super) fn display(rt: &EmulatedJulia, value: RawValue) -> Result<String, Exception> {
    Ok(match rt.object(value)? {
        Object::Nothing => "nothing".to_string(),
        Object::Undef => "UndefInitializer()".to_string(),
        Object::Scalar(scalar) => scalar.to_string(),
        Object::Str(text) => text.clone(),
        Object::Type(t) => t.to_string(),
        Object::Array(array) => format_array(array),
        Object::Builtin(builtin) => builtin.name().to_string(),
        Object::Generic(function) => function.name.clone(),
    })
}

fn format_array(array: &ArrayObject) -> String {
    let prefix = match array.element() {
        ElementType::Int64 | ElementType::Float64 => "",
        other => other.julia_name(),
    };
    let items: Vec<String> = array.scalars().iter().map(Scalar::to_string).collect();
    match *array.dims() {
        [rows, cols] => {
            let lines: Vec<String> = (0..rows)
                .map(|i| {
                    (0..cols)
                        .map(|j| items[i + j * rows].as_str())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            format!("{}[{}]", prefix, lines.join("; "))
        }
        _ => format!("{}[{}]", prefix, items.join(", ")),
    }
}

fn randn(rt: &EmulatedJulia, args: &[RawValue]) -> EvalResult {
    let dims = args
        .iter()
        .map(|a| match rt.object(*a)? {
            Object::Scalar(value) => match value.as_i64() {
                Some(extent) if extent >= 0 => Ok(extent as usize),
                Some(_) => Err(Exception::argument("invalid Array dimensions")),
                None => Err(Exception::method_error("randn", &[JlType::Scalar(value.kind())])),
            },
            other => Err(Exception::method_error("randn", &[other.type_of()])),
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Box-Muller transform over uniform samples
    let mut rng = rand::rng();
    let mut sample = || {
        let u1: f64 = 1.0 - rng.random::<f64>();
        let u2: f64 = rng.random();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    };

    if dims.is_empty() {
        return Ok(rt.alloc(Object::Scalar(Scalar::F64(sample()))));
    }
    let array = ArrayObject::alloc(ElementType::Float64, dims)?;
    for index in 0..array.len() {
        array.set(index, Scalar::F64(sample()));
    }
    Ok(rt.alloc(Object::Array(array)))
}

fn is_unsigned(kind: PrimitiveKind) -> bool {
    matches!(
        kind,
        PrimitiveKind::U8 | PrimitiveKind::U16 | PrimitiveKind::U32 | PrimitiveKind::U64
    )
}

/// Julia's `promote_type` restricted to the primitive kinds
pub(super) fn promote(a: PrimitiveKind, b: PrimitiveKind) -> PrimitiveKind {
    use PrimitiveKind::*;
    match (a, b) {
        (Bool, Bool) => I64,
        (Bool, other) | (other, Bool) => other,
        (F64, _) | (_, F64) => F64,
        (F32, _) | (_, F32) => F32,
        _ if a == b => a,
        _ => {
            let (wa, wb) = (a.element_type().size(), b.element_type().size());
            if wa != wb {
                if wa > wb {
                    a
                } else {
                    b
                }
            } else if is_unsigned(a) {
                a
            } else {
                b
            }
        }
    }
}

fn result_kind(op: Builtin, a: PrimitiveKind, b: PrimitiveKind) -> PrimitiveKind {
    let kind = promote(a, b);
    if op == Builtin::Div && !kind.is_float() {
        PrimitiveKind::F64
    } else {
        kind
    }
}

fn to_i128(value: Scalar) -> i128 {
    match value {
        Scalar::U64(v) => i128::from(v),
        Scalar::Bool(v) => i128::from(v),
        other => i128::from(other.as_i64().unwrap_or(0)),
    }
}

fn scalar_op(op: Builtin, a: Scalar, b: Scalar) -> Result<Scalar, Exception> {
    let kind = result_kind(op, a.kind(), b.kind());
    if kind.is_float() {
        let (x, y) = (a.as_f64(), b.as_f64());
        let value = match op {
            Builtin::Add => x + y,
            Builtin::Sub => x - y,
            Builtin::Mul => x * y,
            Builtin::Div => x / y,
            _ => return Err(Exception::method_error(op.name(), &[])),
        };
        return Ok(cast_scalar(Scalar::F64(value), kind));
    }

    let (x, y) = (to_i128(a), to_i128(b));
    let value = match op {
        Builtin::Add => x.wrapping_add(y),
        Builtin::Sub => x.wrapping_sub(y),
        Builtin::Mul => x.wrapping_mul(y),
        _ => return Err(Exception::method_error(op.name(), &[])),
    };
    // Low 64 bits carry the wrapped result for every integer kind
    Ok(cast_scalar(Scalar::I64(value as i64), kind))
}

fn elementwise<F>(array: &ArrayObject, kind: PrimitiveKind, mut f: F) -> Result<ArrayObject, Exception>
where
    F: FnMut(usize, Scalar) -> Result<Scalar, Exception>,
{
    let values = array
        .scalars()
        .into_iter()
        .enumerate()
        .map(|(i, v)| f(i, v))
        .collect::<Result<Vec<_>, _>>()?;
    ArrayObject::from_scalars(kind.element_type(), array.dims().to_vec(), &values)
}

/// `Ok(None)` when no method applies to the operand types
fn arithmetic(rt: &EmulatedJulia, op: Builtin, a: RawValue, b: RawValue) -> Result<Option<RawValue>, Exception> {
    let result = match (rt.object(a)?, rt.object(b)?) {
        (Object::Scalar(x), Object::Scalar(y)) => Object::Scalar(scalar_op(op, *x, *y)?),
        (Object::Array(x), Object::Array(y)) if op == Builtin::Mul => Object::Array(matmul(x, y)?),
        (Object::Array(x), Object::Array(y)) if matches!(op, Builtin::Add | Builtin::Sub) => {
            if x.dims() != y.dims() {
                return Err(Exception::dimension_mismatch(format!(
                    "dimensions must match: a has dims {:?}, b has dims {:?}",
                    x.dims(),
                    y.dims()
                )));
            }
            let ys = y.scalars();
            let kind = result_kind(op, x.element().kind(), y.element().kind());
            Object::Array(elementwise(x, kind, |i, v| scalar_op(op, v, ys[i]))?)
        }
        (Object::Array(x), Object::Scalar(s)) if matches!(op, Builtin::Mul | Builtin::Div) => {
            let kind = result_kind(op, x.element().kind(), s.kind());
            Object::Array(elementwise(x, kind, |_, v| scalar_op(op, v, *s))?)
        }
        (Object::Scalar(s), Object::Array(x)) if op == Builtin::Mul => {
            let kind = result_kind(op, s.kind(), x.element().kind());
            Object::Array(elementwise(x, kind, |_, v| scalar_op(op, *s, v))?)
        }
        _ => return Ok(None),
    };
    Ok(Some(rt.alloc(result)))
}

fn matmul(a: &ArrayObject, b: &ArrayObject) -> Result<ArrayObject, Exception> {
    let no_method = || {
        Exception::method_error("*", &[a.type_of(), b.type_of()])
    };
    let [m, k] = *a.dims() else {
        return Err(no_method());
    };
    let (k2, n, out_dims) = match *b.dims() {
        [k2] => (k2, 1, vec![m]),
        [k2, n] => (k2, n, vec![m, n]),
        _ => return Err(no_method()),
    };
    if k != k2 {
        return Err(Exception::dimension_mismatch(format!(
            "matrix A has dimensions ({}, {}), matrix B has dimensions ({}, {})",
            m, k, k2, n
        )));
    }

    let kind = result_kind(Builtin::Mul, a.element().kind(), b.element().kind());
    ArrayObject::byte_size(kind.element_type(), &out_dims).ok_or_else(Exception::out_of_memory)?;
    let values: Vec<Scalar> = if kind.is_float() {
        let (av, bv) = (a.to_f64(), b.to_f64());
        (0..n)
            .flat_map(|j| (0..m).map(move |i| (i, j)))
            .map(|(i, j)| Scalar::F64((0..k).map(|p| av[i + p * m] * bv[p + j * k]).sum()))
            .collect()
    } else {
        let av: Vec<i128> = a.scalars().into_iter().map(to_i128).collect();
        let bv: Vec<i128> = b.scalars().into_iter().map(to_i128).collect();
        (0..n)
            .flat_map(|j| (0..m).map(move |i| (i, j)))
            .map(|(i, j)| {
                let total = (0..k).fold(0i128, |acc, p| {
                    acc.wrapping_add(av[i + p * m].wrapping_mul(bv[p + j * k]))
                });
                Scalar::I64(total as i64)
            })
            .collect()
    };
    ArrayObject::from_scalars(kind.element_type(), out_dims, &values)
}

/// Gauss-Jordan elimination with partial pivoting
fn invert(array: &ArrayObject) -> Result<ArrayObject, Exception> {
    let [rows, cols] = *array.dims() else {
        return Err(Exception::method_error("inv", &[array.type_of()]));
    };
    if rows != cols {
        return Err(Exception::dimension_mismatch(format!(
            "matrix is not square: dimensions are ({}, {})",
            rows, cols
        )));
    }
    let n = rows;
    let data = array.to_f64();
    let mut a: Vec<Vec<f64>> = (0..n).map(|i| (0..n).map(|j| data[i + j * n]).collect()).collect();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .unwrap_or(col);
        if a[pivot][col] == 0.0 {
            return Err(Exception::singular(col + 1));
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);

        let scale = a[col][col];
        for j in 0..n {
            a[col][j] /= scale;
            inv[col][j] /= scale;
        }
        let (pivot_row, pivot_inv) = (a[col].clone(), inv[col].clone());
        for row in (0..n).filter(|&row| row != col) {
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[row][j] -= factor * pivot_row[j];
                inv[row][j] -= factor * pivot_inv[j];
            }
        }
    }

    let element = if array.element() == ElementType::Float32 {
        ElementType::Float32
    } else {
        ElementType::Float64
    };
    let values: Vec<Scalar> = (0..n)
        .flat_map(|j| (0..n).map(move |i| (i, j)))
        .map(|(i, j)| Scalar::F64(inv[i][j]))
        .collect();
    ArrayObject::from_scalars(element, vec![n, n], &values)
}

/// `sum` widens small integers to 64 bits, as Julia does
fn sum(array: &ArrayObject) -> Scalar {
    let kind = array.element().kind();
    if kind.is_float() {
        let total: f64 = array.to_f64().iter().sum();
        return cast_scalar(Scalar::F64(total), kind);
    }
    let total = array
        .scalars()
        .into_iter()
        .map(to_i128)
        .fold(0i128, i128::wrapping_add);
    let widened = if is_unsigned(kind) {
        PrimitiveKind::U64
    } else {
        PrimitiveKind::I64
    };
    cast_scalar(Scalar::I64(total as i64), widened)
}
