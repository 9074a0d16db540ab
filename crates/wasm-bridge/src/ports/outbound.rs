//! # Driven Ports (SPI - Outbound)
//!
//! Interfaces the bridge depends on. External adapters implement these to
//! provide:
//! - Key-value storage (`ContractStore`)
//! - A bytecode interpreter (`WasmEngine` / `WasmCode` / `ExecContext`)
//! - Execution backends (`InstanceCreator` / `RunnableInstance`)
//!
//! ## Host Imports
//!
//! Imports are resolved once at compile time into a closed [`HostFunc`]
//! set with fixed arity. A resolved syscall carries a [`SyscallBinding`]
//! the engine calls with a decoded [`SyscallRequest`]; there is no dynamic
//! inspection of function shapes.

use crate::domain::context::{ContextId, ExecutionContext};
use crate::domain::keys::Language;
use crate::domain::messages::{SyscallKind, SyscallRequest, SyscallResponse};
use crate::domain::resources::ResourceLimits;
use crate::domain::trap::{Trap, TrapKind};
use crate::errors::{BridgeError, EngineError, StoreError};
use crate::ports::inbound::SyscallHandler;
use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

// =============================================================================
// STORAGE
// =============================================================================

/// Byte-oriented key-value store holding contract code and data.
///
/// Implementations synchronise internally; every method takes `&self`.
pub trait ContractStore: Send + Sync {
    /// Reads a value. `Ok(None)` when the key does not exist.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes a value, replacing any previous one.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Deletes a key. Deleting a missing key succeeds.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Returns true if the key exists.
    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

// =============================================================================
// HOST FUNCTIONS
// =============================================================================

/// Module name syscalls are imported from.
pub const SYSCALL_MODULE: &str = "env";

/// Module name the Go runtime support functions are imported from.
pub const GO_RUNTIME_MODULE: &str = "go";

/// A syscall import bound to the dispatcher that serves it.
#[derive(Clone)]
pub struct SyscallBinding {
    kind: SyscallKind,
    handler: Arc<dyn SyscallHandler>,
}

impl SyscallBinding {
    /// Binds `kind` to `handler`.
    #[must_use]
    pub fn new(kind: SyscallKind, handler: Arc<dyn SyscallHandler>) -> Self {
        Self { kind, handler }
    }

    /// Syscall this import serves.
    #[must_use]
    pub fn kind(&self) -> SyscallKind {
        self.kind
    }

    /// Issues the syscall on behalf of the contract running under `ctx_id`.
    ///
    /// A request for a different syscall than the one bound is a signature
    /// mismatch and traps.
    pub fn call(
        &self,
        ctx_id: ContextId,
        request: SyscallRequest,
    ) -> Result<SyscallResponse, EngineError> {
        if request.kind() != self.kind {
            return Err(EngineError::Trap(Trap::new(TrapKind::SignatureMismatch {
                module: SYSCALL_MODULE.to_string(),
                name: self.kind.name().to_string(),
            })));
        }
        self.handler
            .dispatch(ctx_id, request)
            .map_err(|e| EngineError::Host(Box::new(e)))
    }
}

impl fmt::Debug for SyscallBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyscallBinding")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Go runtime support functions (`wasm_exec` imports).
///
/// Each one takes the Go stack pointer as its only argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuntimeFunc {
    /// `runtime.wasmExit`
    WasmExit,
    /// `runtime.wasmWrite`
    WasmWrite,
    /// `runtime.resetMemoryDataView`
    ResetMemoryDataView,
    /// `runtime.nanotime1`
    Nanotime,
    /// `runtime.walltime1`
    Walltime,
    /// `runtime.scheduleTimeoutEvent`
    ScheduleTimeoutEvent,
    /// `runtime.clearTimeoutEvent`
    ClearTimeoutEvent,
    /// `runtime.getRandomData`
    GetRandomData,
    /// `debug`
    Debug,
}

impl RuntimeFunc {
    /// Every runtime function.
    pub const ALL: [RuntimeFunc; 9] = [
        Self::WasmExit,
        Self::WasmWrite,
        Self::ResetMemoryDataView,
        Self::Nanotime,
        Self::Walltime,
        Self::ScheduleTimeoutEvent,
        Self::ClearTimeoutEvent,
        Self::GetRandomData,
        Self::Debug,
    ];

    /// Import name inside the `go` module.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::WasmExit => "runtime.wasmExit",
            Self::WasmWrite => "runtime.wasmWrite",
            Self::ResetMemoryDataView => "runtime.resetMemoryDataView",
            Self::Nanotime => "runtime.nanotime1",
            Self::Walltime => "runtime.walltime1",
            Self::ScheduleTimeoutEvent => "runtime.scheduleTimeoutEvent",
            Self::ClearTimeoutEvent => "runtime.clearTimeoutEvent",
            Self::GetRandomData => "runtime.getRandomData",
            Self::Debug => "debug",
        }
    }

    /// Parses an import name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// A resolved host import.
#[derive(Clone, Debug)]
pub enum HostFunc {
    /// Bridge syscall: `(request_ptr, request_len)`.
    Syscall(SyscallBinding),
    /// Language runtime support: `(sp)`.
    Runtime(RuntimeFunc),
}

impl HostFunc {
    /// Number of `i32` parameters the guest passes.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::Syscall(_) => 2,
            Self::Runtime(_) => 1,
        }
    }
}

/// Resolves symbols imported by contract code.
pub trait Resolver: Send + Sync {
    /// Resolves an imported function.
    fn resolve_func(&self, module: &str, name: &str) -> Option<HostFunc>;

    /// Resolves an imported global.
    fn resolve_global(&self, _module: &str, _name: &str) -> Option<i64> {
        None
    }
}

// =============================================================================
// ABORT SIGNAL
// =============================================================================

/// Cancellation flag shared between an instance and its engine context.
///
/// Raising is sticky: the first message wins and the signal never clears.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    reason: Arc<Mutex<Option<String>>>,
}

impl AbortSignal {
    /// A signal that has not been raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests termination with `message`.
    pub fn raise(&self, message: &str) {
        let mut reason = self.reason.lock();
        if reason.is_none() {
            *reason = Some(message.to_string());
        }
    }

    /// True once raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.reason.lock().is_some()
    }

    /// The trap to report, if raised.
    #[must_use]
    pub fn trap(&self) -> Option<Trap> {
        self.reason.lock().as_deref().map(Trap::aborted)
    }
}

// =============================================================================
// INTERPRETER
// =============================================================================

/// Per-context engine settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextConfig {
    /// Gas the context may consume before trapping.
    pub gas_limit: u64,
}

/// A bytecode interpreter.
pub trait WasmEngine: Send + Sync + 'static {
    /// Decodes `bytecode` and links its imports through `resolver`.
    ///
    /// An import the resolver does not know fails with a
    /// `SymbolNotFound` trap.
    fn compile(
        &self,
        bytecode: &[u8],
        resolver: Arc<dyn Resolver>,
    ) -> Result<Arc<dyn WasmCode>, EngineError>;
}

/// A compiled, linked module that can spawn execution contexts.
pub trait WasmCode: Send + Sync {
    /// Creates a fresh execution context.
    fn new_context(&self, config: &ContextConfig) -> Result<Box<dyn ExecContext>, EngineError>;

    /// Frees the compiled module. Called once, on cache eviction.
    fn release(&self);
}

/// One execution of a compiled module.
pub trait ExecContext: Send {
    /// Runs an exported function.
    fn exec(&mut self, entry: &str, params: &[i64]) -> Result<i64, EngineError>;

    /// Gas consumed so far.
    fn gas_used(&self) -> u64;

    /// Linear memory size in bytes, `None` if the module has no memory.
    fn memory_size(&self) -> Option<u64>;

    /// Installs the language runtime support.
    fn init_runtime(&mut self, language: Language) -> Result<(), EngineError>;

    /// Binds the bridge context id that syscalls are tagged with.
    fn bind_context(&mut self, ctx_id: ContextId);

    /// Destination of contract debug output.
    fn set_debug_writer(&mut self, writer: Box<dyn Write + Send>);

    /// Signal polled during execution.
    fn set_abort_signal(&mut self, signal: AbortSignal);

    /// Frees the context.
    fn release(&mut self);
}

// =============================================================================
// BACKENDS
// =============================================================================

/// How an instance obtains its compiled code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeLoad {
    /// Compile fresh; a cached entry is a stale-code error. Used by deploy.
    Compile,
    /// Reuse the cached entry or compile on miss. Used by invoke.
    Reuse,
}

/// Execution backend: turns contexts into runnable instances.
pub trait InstanceCreator: Send + Sync {
    /// Creates an instance bound to `ctx`.
    fn create_instance(
        &self,
        ctx: &Arc<ExecutionContext>,
        load: CodeLoad,
    ) -> Result<Box<dyn RunnableInstance>, BridgeError>;

    /// Drops the contract's cached code, if any.
    fn evict(&self, contract: &str);

    /// True if compiled code for the contract is cached.
    fn is_cached(&self, contract: &str) -> bool;
}

/// A contract instance ready to run one call.
pub trait RunnableInstance: Send {
    /// Entry symbol for the bound context's language and method.
    fn entry_point(&self) -> Result<String, BridgeError>;

    /// Runs `entry`.
    fn exec(&mut self, entry: &str) -> Result<(), BridgeError>;

    /// Resources consumed so far.
    fn resource_used(&self) -> ResourceLimits;

    /// Frees the instance's engine context.
    fn release(&mut self);

    /// Requests termination; `exec` reports an `Aborted` trap.
    fn abort(&self, message: &str);

    /// Handle for aborting from another thread.
    fn abort_signal(&self) -> AbortSignal;
}
