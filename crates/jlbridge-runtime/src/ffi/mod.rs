//! Foreign runtime boundary
//!
//! - `api`: the `JuliaApi` trait the rest of the crate is written against
//! - `loader`: `LibJulia`, a libjulia loaded at run time
//! - `emulated`: `EmulatedJulia`, an in-process stand-in
//! - `array_type`: element types and array type descriptors
//! - `buffer`: the bounds-checked view used for every array copy

pub mod api;
pub mod array_type;
pub mod buffer;
pub mod emulated;
pub mod loader;

pub use api::{JuliaApi, Module, RawValue};
pub use array_type::{resolve, ArrayTypeDescriptor, ElementType};
pub use buffer::ForeignBuffer;
pub use emulated::EmulatedJulia;
pub use loader::{LibJulia, LibJuliaOptions, LoadError};
