//! libjulia backend
//!
//! Loads `libjulia` at run time with `libloading`, resolves the exported C
//! functions and global type/module pointers, and forwards the `JuliaApi`
//! primitives to them. Nothing links against Julia at build time.
//!
//! Library naming follows the platform conventions:
//! - Linux: libjulia.so
//! - macOS: libjulia.dylib or libjulia.so
//! - Windows: julia.dll / libjulia.dll

use crate::error::{BridgeError, BridgeResult};
use crate::ffi::api::{JuliaApi, Module, RawValue, SHOWERROR_HELPER};
use crate::ffi::array_type::ElementType;
use crate::ffi::buffer::ForeignBuffer;
use crate::kind::{PrimitiveKind, Scalar};
use jlbridge_config::BridgeConfig;
use libloading::Library;
use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_void, CString};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;
use tracing::{debug, trace};

/// Library loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Library not found: {0}")]
    LibraryNotFound(String),

    #[error("Symbol '{symbol}' not found in library '{library}'")]
    SymbolNotFound { library: String, symbol: String },

    #[error("Failed to load library: {0}")]
    LoadFailed(String),
}

const STATE_UNINITIALIZED: u8 = 0;
const STATE_READY: u8 = 1;
const STATE_FINALIZED: u8 = 2;

/// Julia can be started once per process and never restarted
static JULIA_STATE: AtomicU8 = AtomicU8::new(STATE_UNINITIALIZED);

fn claim_process() -> BridgeResult<()> {
    match JULIA_STATE.compare_exchange(
        STATE_UNINITIALIZED,
        STATE_READY,
        Ordering::SeqCst,
        Ordering::SeqCst,
    ) {
        Ok(_) => Ok(()),
        Err(STATE_READY) => Err(BridgeError::AlreadyInitialized),
        Err(_) => Err(BridgeError::Finalized),
    }
}

type Ptr = *mut c_void;

macro_rules! julia_functions {
    ($($name:ident: fn($($arg:ty),*) $(-> $ret:ty)?;)*) => {
        /// Entry points resolved from libjulia
        struct JlFunctions {
            $($name: unsafe extern "C" fn($($arg),*) $(-> $ret)?,)*
        }

        impl JlFunctions {
            /// # Safety
            ///
            /// `library` must be libjulia, so every symbol has the declared signature.
            unsafe fn resolve(library: &Library, library_name: &str) -> Result<Self, LoadError> {
                Ok(Self {
                    $($name: *library
                        .get::<unsafe extern "C" fn($($arg),*) $(-> $ret)?>(
                            concat!(stringify!($name), "\0").as_bytes(),
                        )
                        .map_err(|_| LoadError::SymbolNotFound {
                            library: library_name.to_string(),
                            symbol: stringify!($name).to_string(),
                        })?,)*
                })
            }
        }
    };
}

julia_functions! {
    jl_init: fn();
    jl_init_with_image: fn(*const c_char, *const c_char);
    jl_atexit_hook: fn(c_int);
    jl_eval_string: fn(*const c_char) -> Ptr;
    jl_exception_occurred: fn() -> Ptr;
    jl_exception_clear: fn();
    jl_symbol: fn(*const c_char) -> Ptr;
    jl_get_global: fn(Ptr, Ptr) -> Ptr;
    jl_call: fn(Ptr, *mut Ptr, u32) -> Ptr;
    jl_box_bool: fn(i8) -> Ptr;
    jl_box_uint8: fn(u8) -> Ptr;
    jl_box_uint16: fn(u16) -> Ptr;
    jl_box_uint32: fn(u32) -> Ptr;
    jl_box_uint64: fn(u64) -> Ptr;
    jl_box_int8: fn(i8) -> Ptr;
    jl_box_int16: fn(i16) -> Ptr;
    jl_box_int32: fn(i32) -> Ptr;
    jl_box_int64: fn(i64) -> Ptr;
    jl_box_float32: fn(f32) -> Ptr;
    jl_box_float64: fn(f64) -> Ptr;
    jl_unbox_bool: fn(Ptr) -> i8;
    jl_unbox_uint8: fn(Ptr) -> u8;
    jl_unbox_uint16: fn(Ptr) -> u16;
    jl_unbox_uint32: fn(Ptr) -> u32;
    jl_unbox_uint64: fn(Ptr) -> u64;
    jl_unbox_int8: fn(Ptr) -> i8;
    jl_unbox_int16: fn(Ptr) -> i16;
    jl_unbox_int32: fn(Ptr) -> i32;
    jl_unbox_int64: fn(Ptr) -> i64;
    jl_unbox_float32: fn(Ptr) -> f32;
    jl_unbox_float64: fn(Ptr) -> f64;
    jl_apply_array_type: fn(Ptr, usize) -> Ptr;
    jl_alloc_array_1d: fn(Ptr, usize) -> Ptr;
    jl_alloc_array_2d: fn(Ptr, usize, usize) -> Ptr;
    jl_alloc_array_3d: fn(Ptr, usize, usize, usize) -> Ptr;
}

/// Exported data symbol holding a runtime pointer, set by `jl_init`
#[derive(Clone, Copy)]
struct GlobalSlot(*mut Ptr);

impl GlobalSlot {
    unsafe fn resolve(library: &Library, library_name: &str, symbol: &str) -> Result<Self, LoadError> {
        let name = format!("{}\0", symbol);
        library
            .get::<*mut Ptr>(name.as_bytes())
            .map(|slot| GlobalSlot(*slot))
            .map_err(|_| LoadError::SymbolNotFound {
                library: library_name.to_string(),
                symbol: symbol.to_string(),
            })
    }

    /// # Safety
    ///
    /// Only meaningful after `jl_init` has run.
    unsafe fn read(self) -> Ptr {
        *self.0
    }
}

fn element_type_symbol(element: ElementType) -> &'static str {
    match element {
        ElementType::UInt8 => "jl_uint8_type",
        ElementType::UInt16 => "jl_uint16_type",
        ElementType::UInt32 => "jl_uint32_type",
        ElementType::UInt64 => "jl_uint64_type",
        ElementType::Int8 => "jl_int8_type",
        ElementType::Int16 => "jl_int16_type",
        ElementType::Int32 => "jl_int32_type",
        ElementType::Int64 => "jl_int64_type",
        ElementType::Float32 => "jl_float32_type",
        ElementType::Float64 => "jl_float64_type",
    }
}

const ELEMENT_TYPES: [ElementType; 10] = [
    ElementType::UInt8,
    ElementType::UInt16,
    ElementType::UInt32,
    ElementType::UInt64,
    ElementType::Int8,
    ElementType::Int16,
    ElementType::Int32,
    ElementType::Int64,
    ElementType::Float32,
    ElementType::Float64,
];

/// Where and how to find libjulia
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibJuliaOptions {
    /// Short name ("julia") or absolute path
    pub library: String,
    /// Install root; `lib/` below it is searched first
    pub julia_dir: Option<PathBuf>,
    /// System image passed to `jl_init_with_image`
    pub image: Option<PathBuf>,
}

impl LibJuliaOptions {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            library: config.julia_library().to_string(),
            julia_dir: config.julia_dir().map(Path::to_path_buf),
            image: config.julia_image().map(Path::to_path_buf),
        }
    }
}

/// Library search paths: the Julia install first, then the system defaults
pub fn search_paths(julia_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(dir) = julia_dir {
        paths.push(dir.join("lib"));
        if cfg!(target_os = "windows") {
            paths.push(dir.join("bin"));
        }
        paths.push(dir.to_path_buf());
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/lib"));
        if cfg!(target_pointer_width = "64") {
            paths.push(PathBuf::from("/usr/lib64"));
            paths.push(PathBuf::from("/lib64"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/opt/homebrew/lib"));
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(system_root) = std::env::var("SystemRoot") {
            paths.push(PathBuf::from(format!("{}\\System32", system_root)));
        }
    }

    paths
}

/// Resolve a library name to a file in `search_paths`
pub fn resolve_library_path(name: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return path.exists().then(|| path.to_path_buf());
    }

    let extensions: &[&str] = if cfg!(target_os = "windows") {
        &["dll"]
    } else if cfg!(target_os = "macos") {
        &["dylib", "so"]
    } else {
        &["so"]
    };
    let prefixes: &[&str] = if cfg!(target_os = "windows") {
        &["", "lib"]
    } else {
        &["lib", ""]
    };

    search_paths.iter().find_map(|dir| {
        prefixes.iter().find_map(|prefix| {
            extensions.iter().find_map(|ext| {
                let candidate = dir.join(format!("{}{}.{}", prefix, name, ext));
                candidate.exists().then_some(candidate)
            })
        })
    })
}

/// Open with global symbol visibility so Julia's own dependencies resolve
fn open_library(path: &Path) -> Result<Library, LoadError> {
    #[cfg(unix)]
    {
        use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};
        unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }
            .map(Library::from)
            .map_err(|e| LoadError::LoadFailed(e.to_string()))
    }

    #[cfg(not(unix))]
    {
        unsafe { Library::new(path) }.map_err(|e| LoadError::LoadFailed(e.to_string()))
    }
}

fn to_cstring(path: &Path) -> BridgeResult<CString> {
    CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| LoadError::LoadFailed(format!("path contains a NUL byte: {}", path.display())).into())
}

/// A dynamically loaded libjulia
///
/// # Safety
///
/// Loading libjulia runs its initialization code in this process. Once
/// `init` has run the library is never unloaded.
pub struct LibJulia {
    library: Option<Library>,
    path: PathBuf,
    fns: JlFunctions,
    base_module: GlobalSlot,
    main_module: GlobalSlot,
    element_types: HashMap<ElementType, GlobalSlot>,
    init_paths: Option<(CString, CString)>,
    initialized: bool,
}

impl LibJulia {
    /// Locate and load libjulia, resolving every symbol the bridge uses
    pub fn open(options: &LibJuliaOptions) -> BridgeResult<Self> {
        let paths = search_paths(options.julia_dir.as_deref());
        let path = resolve_library_path(&options.library, &paths)
            .ok_or_else(|| LoadError::LibraryNotFound(options.library.clone()))?;
        debug!(path = %path.display(), "loading libjulia");

        let init_paths = match &options.image {
            Some(image) => {
                let bindir = options
                    .julia_dir
                    .as_ref()
                    .map(|dir| dir.join("bin"))
                    .or_else(|| path.parent()?.parent().map(|root| root.join("bin")))
                    .ok_or_else(|| {
                        LoadError::LoadFailed("a system image needs a Julia directory".to_string())
                    })?;
                Some((to_cstring(&bindir)?, to_cstring(image)?))
            }
            None => None,
        };

        let library = open_library(&path)?;
        let name = path.display().to_string();

        // SAFETY: `library` is libjulia; symbols are typed after julia.h
        let (fns, base_module, main_module, element_types) = unsafe {
            let fns = JlFunctions::resolve(&library, &name)?;
            let base_module = GlobalSlot::resolve(&library, &name, "jl_base_module")?;
            let main_module = GlobalSlot::resolve(&library, &name, "jl_main_module")?;
            let mut element_types = HashMap::new();
            for element in ELEMENT_TYPES {
                let slot = GlobalSlot::resolve(&library, &name, element_type_symbol(element))?;
                element_types.insert(element, slot);
            }
            (fns, base_module, main_module, element_types)
        };

        Ok(Self {
            library: Some(library),
            path,
            fns,
            base_module,
            main_module,
            element_types,
            init_paths,
            initialized: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn module_slot(&self, module: Module) -> GlobalSlot {
        match module {
            Module::Base => self.base_module,
            Module::Main => self.main_module,
        }
    }

    fn global(&self, module: Module, name: &str) -> Option<RawValue> {
        let name = CString::new(name).ok()?;
        // SAFETY: only called once the runtime is initialized
        unsafe {
            let symbol = (self.fns.jl_symbol)(name.as_ptr());
            RawValue::new((self.fns.jl_get_global)(self.module_slot(module).read(), symbol))
        }
    }

    fn take_exception(&self) -> Option<RawValue> {
        // SAFETY: plain runtime queries
        unsafe {
            let exception = RawValue::new((self.fns.jl_exception_occurred)())?;
            (self.fns.jl_exception_clear)();
            Some(exception)
        }
    }

    fn check_exception(&self, context: &str) -> BridgeResult<()> {
        match self.take_exception() {
            Some(exception) => Err(BridgeError::Eval {
                context: context.to_string(),
                message: self.describe_exception(exception),
            }),
            None => Ok(()),
        }
    }

    fn check_result(&self, result: Ptr, context: &str) -> BridgeResult<RawValue> {
        self.check_exception(context)?;
        RawValue::new(result).ok_or_else(|| BridgeError::NullPointer(context.to_string()))
    }

    fn describe_exception(&self, exception: RawValue) -> String {
        self.showerror_text(exception)
            .unwrap_or_else(|| "Julia raised an exception".to_string())
    }

    /// `showerror` text through the prelude helper, read back as bytes
    fn showerror_text(&self, exception: RawValue) -> Option<String> {
        let helper = self.global(Module::Main, SHOWERROR_HELPER)?;
        let length = self.global(Module::Base, "length")?;

        // SAFETY: helper returns a Vector{UInt8}; length returns an Int64
        unsafe {
            let mut args = [exception.as_ptr()];
            let bytes = RawValue::new((self.fns.jl_call)(helper.as_ptr(), args.as_mut_ptr(), 1));
            if self.take_exception().is_some() {
                return None;
            }
            let bytes = bytes?;

            let mut args = [bytes.as_ptr()];
            let count = RawValue::new((self.fns.jl_call)(length.as_ptr(), args.as_mut_ptr(), 1))?;
            let count = usize::try_from((self.fns.jl_unbox_int64)(count.as_ptr())).ok()?;
            if count == 0 {
                return Some(String::new());
            }

            let buffer = ForeignBuffer::<u8>::new(self.array_data(bytes), count).ok()?;
            Some(String::from_utf8_lossy(&buffer.to_vec()).into_owned())
        }
    }

    /// `Array{T, N}(undef, dims...)` for any N
    fn alloc_array_nd(&self, array_type: RawValue, dims: &[usize]) -> BridgeResult<Option<RawValue>> {
        let undef = self.global(Module::Base, "undef").ok_or_else(|| BridgeError::FunctionNotFound {
            module: Module::Base.to_string(),
            name: "undef".to_string(),
        })?;

        let mut args = Vec::with_capacity(dims.len() + 1);
        args.push(undef.as_ptr());
        for &extent in dims {
            let extent = i64::try_from(extent)
                .map_err(|_| BridgeError::InvalidDimensions(format!("extent {} too large", extent)))?;
            // SAFETY: boxing has no preconditions once the runtime is up
            let boxed = unsafe { (self.fns.jl_box_int64)(extent) };
            args.push(self.check_result(boxed, "jl_box_int64")?.as_ptr());
        }

        let nargs = u32::try_from(args.len())
            .map_err(|_| BridgeError::InvalidDimensions(format!("{} dimensions", dims.len())))?;
        // SAFETY: `array_type` is a live type object and every arg is a live value
        let array = unsafe { (self.fns.jl_call)(array_type.as_ptr(), args.as_mut_ptr(), nargs) };
        self.check_exception("array allocation")?;
        Ok(RawValue::new(array))
    }
}

impl JuliaApi for LibJulia {
    fn name(&self) -> &'static str {
        "libjulia"
    }

    fn init(&mut self) -> BridgeResult<()> {
        claim_process()?;
        // SAFETY: first and only initialization in this process
        unsafe {
            match &self.init_paths {
                Some((bindir, image)) => (self.fns.jl_init_with_image)(bindir.as_ptr(), image.as_ptr()),
                None => (self.fns.jl_init)(),
            }
        }
        self.initialized = true;
        debug!(path = %self.path.display(), "libjulia initialized");
        Ok(())
    }

    fn exit(&mut self) {
        if !self.initialized {
            return;
        }
        // SAFETY: runtime is initialized and not yet finalized
        unsafe { (self.fns.jl_atexit_hook)(0) };
        JULIA_STATE.store(STATE_FINALIZED, Ordering::SeqCst);
        debug!("libjulia finalized");
    }

    fn eval_string(&self, code: &str) -> BridgeResult<RawValue> {
        let source = CString::new(code).map_err(|_| BridgeError::Eval {
            context: "eval".to_string(),
            message: "source contains a NUL byte".to_string(),
        })?;
        // SAFETY: `source` is a valid C string for the duration of the call
        let result = unsafe { (self.fns.jl_eval_string)(source.as_ptr()) };
        self.check_result(result, "eval")
    }

    fn get_function(&self, module: Module, name: &str) -> BridgeResult<RawValue> {
        self.global(module, name)
            .ok_or_else(|| BridgeError::FunctionNotFound {
                module: module.to_string(),
                name: name.to_string(),
            })
    }

    fn call(&self, function: RawValue, args: &[RawValue]) -> BridgeResult<RawValue> {
        let mut argv: Vec<Ptr> = args.iter().map(|arg| arg.as_ptr()).collect();
        let nargs = u32::try_from(argv.len()).map_err(|_| BridgeError::Eval {
            context: "call".to_string(),
            message: format!("too many arguments: {}", argv.len()),
        })?;
        trace!(nargs, "jl_call");
        // SAFETY: function and args are live runtime values
        let result = unsafe { (self.fns.jl_call)(function.as_ptr(), argv.as_mut_ptr(), nargs) };
        self.check_result(result, "call")
    }

    fn box_scalar(&self, scalar: Scalar) -> BridgeResult<RawValue> {
        // SAFETY: boxing has no preconditions once the runtime is up
        let boxed = unsafe {
            match scalar {
                Scalar::Bool(v) => (self.fns.jl_box_bool)(i8::from(v)),
                Scalar::U8(v) => (self.fns.jl_box_uint8)(v),
                Scalar::U16(v) => (self.fns.jl_box_uint16)(v),
                Scalar::U32(v) => (self.fns.jl_box_uint32)(v),
                Scalar::U64(v) => (self.fns.jl_box_uint64)(v),
                Scalar::I8(v) => (self.fns.jl_box_int8)(v),
                Scalar::I16(v) => (self.fns.jl_box_int16)(v),
                Scalar::I32(v) => (self.fns.jl_box_int32)(v),
                Scalar::I64(v) => (self.fns.jl_box_int64)(v),
                Scalar::F32(v) => (self.fns.jl_box_float32)(v),
                Scalar::F64(v) => (self.fns.jl_box_float64)(v),
            }
        };
        RawValue::new(boxed).ok_or_else(|| BridgeError::NullPointer(format!("box {}", scalar.kind())))
    }

    unsafe fn unbox_scalar(&self, value: RawValue, kind: PrimitiveKind) -> Scalar {
        let v = value.as_ptr();
        match kind {
            PrimitiveKind::Bool => Scalar::Bool((self.fns.jl_unbox_bool)(v) != 0),
            PrimitiveKind::U8 => Scalar::U8((self.fns.jl_unbox_uint8)(v)),
            PrimitiveKind::U16 => Scalar::U16((self.fns.jl_unbox_uint16)(v)),
            PrimitiveKind::U32 => Scalar::U32((self.fns.jl_unbox_uint32)(v)),
            PrimitiveKind::U64 => Scalar::U64((self.fns.jl_unbox_uint64)(v)),
            PrimitiveKind::I8 => Scalar::I8((self.fns.jl_unbox_int8)(v)),
            PrimitiveKind::I16 => Scalar::I16((self.fns.jl_unbox_int16)(v)),
            PrimitiveKind::I32 => Scalar::I32((self.fns.jl_unbox_int32)(v)),
            PrimitiveKind::I64 => Scalar::I64((self.fns.jl_unbox_int64)(v)),
            PrimitiveKind::F32 => Scalar::F32((self.fns.jl_unbox_float32)(v)),
            PrimitiveKind::F64 => Scalar::F64((self.fns.jl_unbox_float64)(v)),
        }
    }

    fn apply_array_type(&self, element: ElementType, ndims: usize) -> BridgeResult<RawValue> {
        let slot = self
            .element_types
            .get(&element)
            .ok_or_else(|| BridgeError::UnsupportedType(element.julia_name().to_string()))?;
        // SAFETY: element type globals are set by `jl_init`
        let array_type = unsafe { (self.fns.jl_apply_array_type)(slot.read(), ndims) };
        self.check_result(array_type, "jl_apply_array_type")
    }

    fn alloc_array(&self, array_type: RawValue, dims: &[usize]) -> BridgeResult<Option<RawValue>> {
        let t = array_type.as_ptr();
        // SAFETY: `array_type` came from `apply_array_type` with `dims.len()` dimensions
        let array = unsafe {
            match *dims {
                [rows] => (self.fns.jl_alloc_array_1d)(t, rows),
                [rows, cols] => (self.fns.jl_alloc_array_2d)(t, rows, cols),
                [rows, cols, depth] => (self.fns.jl_alloc_array_3d)(t, rows, cols, depth),
                _ => return self.alloc_array_nd(array_type, dims),
            }
        };
        self.check_exception("array allocation")?;
        Ok(RawValue::new(array))
    }

    unsafe fn array_data(&self, array: RawValue) -> *mut c_void {
        // The data pointer is the first field of jl_array_t
        *array.as_ptr().cast::<Ptr>()
    }
}

impl Drop for LibJulia {
    fn drop(&mut self) {
        if self.initialized {
            // Julia cannot be unloaded once initialized
            if let Some(library) = self.library.take() {
                mem::forget(library);
            }
        }
    }
}

impl std::fmt::Debug for LibJulia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibJulia")
            .field("path", &self.path)
            .field("initialized", &self.initialized)
            .finish()
    }
}
