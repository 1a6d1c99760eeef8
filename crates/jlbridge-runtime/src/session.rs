//! Julia session: lifecycle state machine and evaluation
//!
//! A `Session` owns one `JuliaApi` backend and moves through
//! `Uninitialized -> Ready -> Finalized`. Every operation checks the state
//! first and fails with `NotInitialized` or `Finalized` instead of touching
//! the runtime.
//!
//! The session is neither `Send` nor `Sync`: the runtime must only be used
//! from the thread that initialized it. Values borrow the session, so none
//! can be used after `finalize`.

use crate::error::{BridgeError, BridgeResult};
use crate::ffi::api::{JuliaApi, Module, RawValue, PRELUDE, TYPEOF_HELPER};
use crate::ffi::buffer::ForeignBuffer;
use crate::ffi::emulated::EmulatedJulia;
use crate::ffi::loader::{LibJulia, LibJuliaOptions};
use crate::kind::{PrimitiveKind, Scalar};
use crate::value::Value;
use jlbridge_config::{BackendKind, BridgeConfig};
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Finalized,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Finalized => write!(f, "finalized"),
        }
    }
}

pub struct Session {
    api: Box<dyn JuliaApi>,
    state: SessionState,
    _not_send: PhantomData<*const ()>,
}

impl Session {
    /// Wrap a backend; the session starts `Uninitialized`
    pub fn new(api: Box<dyn JuliaApi>) -> Self {
        Self {
            api,
            state: SessionState::Uninitialized,
            _not_send: PhantomData,
        }
    }

    /// Initialized session over the in-process emulator
    pub fn emulated() -> BridgeResult<Self> {
        let mut session = Self::new(Box::new(EmulatedJulia::new()));
        session.initialize()?;
        Ok(session)
    }

    /// Build the backend selected by `config` and initialize it
    pub fn start(config: &BridgeConfig) -> BridgeResult<Self> {
        let api: Box<dyn JuliaApi> = match config.backend() {
            BackendKind::Emulated => Box::new(EmulatedJulia::new()),
            BackendKind::LibJulia => Box::new(LibJulia::open(&LibJuliaOptions::from_config(config))?),
        };
        let mut session = Self::new(api);
        session.initialize()?;
        Ok(session)
    }

    /// Start the runtime and define the helper prelude
    pub fn initialize(&mut self) -> BridgeResult<()> {
        match self.state {
            SessionState::Ready => return Err(BridgeError::AlreadyInitialized),
            SessionState::Finalized => return Err(BridgeError::Finalized),
            SessionState::Uninitialized => {}
        }

        self.api.init()?;
        if let Err(err) = self.api.eval_string(PRELUDE) {
            self.api.exit();
            self.state = SessionState::Finalized;
            debug!(backend = self.api.name(), error = %err, "prelude failed, session finalized");
            return Err(err);
        }
        self.state = SessionState::Ready;
        debug!(backend = self.api.name(), "session ready");
        Ok(())
    }

    /// Run the runtime's exit hooks; the session cannot be used afterwards
    pub fn finalize(&mut self) -> BridgeResult<()> {
        match self.state {
            SessionState::Uninitialized => return Err(BridgeError::NotInitialized),
            SessionState::Finalized => return Err(BridgeError::Finalized),
            SessionState::Ready => {}
        }

        self.api.exit();
        self.state = SessionState::Finalized;
        debug!(backend = self.api.name(), "session finalized");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn backend_name(&self) -> &'static str {
        self.api.name()
    }

    /// The backend, if the session is ready
    pub(crate) fn api(&self) -> BridgeResult<&dyn JuliaApi> {
        match self.state {
            SessionState::Ready => Ok(self.api.as_ref()),
            SessionState::Uninitialized => Err(BridgeError::NotInitialized),
            SessionState::Finalized => Err(BridgeError::Finalized),
        }
    }

    /// Evaluate source text in `Main`
    #[tracing::instrument(level = "debug", skip(self), fields(backend = self.api.name()))]
    pub fn eval(&self, code: &str) -> BridgeResult<Value<'_>> {
        let raw = self.api()?.eval_string(code)?;
        Ok(Value::new(self, raw))
    }

    /// Call `module.name` with the given arguments
    ///
    /// Julia errors are reported as `Eval` with the qualified function name
    /// as context.
    #[tracing::instrument(level = "debug", skip(self, args), fields(nargs = args.len()))]
    pub fn eval_function(&self, name: &str, module: Module, args: &[&Value<'_>]) -> BridgeResult<Value<'_>> {
        let raw_args: Vec<RawValue> = args.iter().map(|arg| arg.raw()).collect();
        let raw = self.call_raw(name, module, &raw_args).map_err(|err| match err {
            BridgeError::Eval { message, .. } => BridgeError::Eval {
                context: format!("{}.{}", module, name),
                message,
            },
            other => other,
        })?;
        Ok(Value::new(self, raw))
    }

    pub(crate) fn call_raw(&self, name: &str, module: Module, args: &[RawValue]) -> BridgeResult<RawValue> {
        let api = self.api()?;
        let function = api.get_function(module, name)?;
        api.call(function, args)
    }

    /// `string(typeof(x))`
    pub(crate) fn type_name_of(&self, raw: RawValue) -> BridgeResult<String> {
        let bytes = self.call_raw(TYPEOF_HELPER, Module::Main, &[raw])?;
        self.read_utf8(bytes)
    }

    /// `length(x)`
    pub(crate) fn length_of(&self, raw: RawValue) -> BridgeResult<usize> {
        let length = self.call_raw("length", Module::Base, &[raw])?;
        // SAFETY: Base.length returns an Int64 for every value it accepts
        let length = unsafe { self.api()?.unbox_scalar(length, PrimitiveKind::I64) };
        match length {
            Scalar::I64(n) if n >= 0 => Ok(n as usize),
            other => Err(BridgeError::TypeMismatch {
                expected: "non-negative Int64".to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Decode a `Vector{UInt8}` as UTF-8 text
    fn read_utf8(&self, bytes: RawValue) -> BridgeResult<String> {
        let len = self.length_of(bytes)?;
        if len == 0 {
            return Ok(String::new());
        }
        let api = self.api()?;
        // SAFETY: the helpers return a Vector{UInt8} holding `len` bytes
        let buffer = unsafe { ForeignBuffer::<u8>::new(api.array_data(bytes), len)? };
        Ok(String::from_utf8_lossy(&buffer.to_vec()).into_owned())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Ready {
            self.api.exit();
            self.state = SessionState::Finalized;
            debug!(backend = self.api.name(), "session finalized on drop");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.api.name())
            .field("state", &self.state)
            .finish()
    }
}
