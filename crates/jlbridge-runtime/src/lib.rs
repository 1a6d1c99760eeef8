//! Typed marshaling between Rust and an embedded Julia runtime
//!
//! Provides:
//! - `Session`: the runtime lifecycle (initialize, evaluate, finalize)
//! - `Mat<T>`: the host-side container for rectangular arrays
//! - marshaling of scalars, slices and containers into Julia objects
//! - unmarshaling of Julia objects back into host scalars and containers
//! - two backends: a dynamically loaded libjulia and an in-process emulator
//!
//! # Example
//!
//! ```
//! use jlbridge_runtime::{Mat, Module, Session};
//!
//! let session = Session::emulated().unwrap();
//!
//! let input = Mat::new(vec![1u8, 2, 3, 4], vec![2, 2]).unwrap();
//! let value = session.marshal_mat(&input).unwrap();
//! assert_eq!(value.type_name().unwrap(), "Matrix{UInt8}");
//!
//! let same = session.eval_function("identity", Module::Base, &[&value]).unwrap();
//! let mut output = Mat::<u8>::zeros(vec![2, 2]).unwrap();
//! session.unmarshal_mat(&same, &mut output).unwrap();
//! assert_eq!(output, input);
//! ```

pub mod dims;
pub mod error;
pub mod ffi;
pub mod kind;
pub mod marshal;
pub mod mat;
pub mod session;
pub mod unmarshal;
pub mod value;

pub use error::{BridgeError, BridgeResult};
pub use ffi::{resolve, ArrayTypeDescriptor, ElementType, EmulatedJulia, JuliaApi, LibJulia, Module};
pub use kind::{Primitive, PrimitiveKind, Scalar};
pub use marshal::IntoJulia;
pub use mat::Mat;
pub use session::{Session, SessionState};
pub use unmarshal::UnmarshalTarget;
pub use value::Value;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
