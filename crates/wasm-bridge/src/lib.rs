//! # WASM Bridge - Host-Side Contract Execution
//!
//! Connects a contract runtime host to WASM execution engines. The bridge
//! owns everything between "deploy/invoke this contract" and "engine runs
//! bytecode": request validation, per-call execution contexts, the syscall
//! surface contracts use to reach storage and each other, compiled-code
//! caching and resource accounting.
//!
//! ## Call Flow
//!
//! ```text
//! ContractApi ──► VmManager ──► ContextRegistry.create
//!                    │
//!                    ▼
//!          InstanceCreator (backend) ──► CodeCache ──► WasmEngine.compile
//!                    │
//!                    ▼
//!          RunnableInstance.exec ◄──► SyscallDispatcher ──► ContractStore
//!                    │                      │
//!                    │                      └──► VmManager (nested calls)
//!                    ▼
//!          release + destroy context ──► CallOutcome
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Context ids are never reused | `domain/context.rs` - `ContextRegistry::create()` |
//! | A context never outlives its call | `service/manager.rs` - `VmManager::run()` |
//! | At most one compile per contract | `service/code_cache.rs` - `CodeCache` |
//! | Contract keys are namespaced | `domain/keys.rs` - `object_key()` |
//! | Infrastructure and trap failures evict code | `service/manager.rs` - `finish()` |
//! | Nested calls are depth-bounded | `service/manager.rs` - `invoke_nested()` |
//!
//! ## Error Classes
//!
//! | Class | Examples | Evicts Code |
//! |-------|----------|-------------|
//! | Validation | missing field, malformed args, bad name | no |
//! | Contract | status >= 400, missing output | no |
//! | Infrastructure | storage, engine, missing code | yes |
//! | Trap | gas exhausted, out of bounds, aborted | yes |
//! | Not found | unknown context, missing object | no |
//!
//! ## Storage Layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `\0code\0<name>` | Contract bytecode |
//! | `\0desc\0<name>` | Language tag (`go`, `c`) |
//! | `<name>-<key>` | Contract object |
//!
//! ## Usage Example
//!
//! ```ignore
//! use wasm_bridge::prelude::*;
//!
//! let registry = VmRegistry::new();
//! registry.register_interpreter("uwavm", Arc::new(engine));
//! let manager = VmManager::new(BridgeConfig::from_env(), &registry, store)?;
//!
//! let outcome = manager.invoke_contract("balanceOf", &args)?;
//! println!("Gas used: {}", outcome.gas);
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod service;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain
    pub use crate::domain::context::{ContextId, ContextInit, ContextRegistry, ExecutionContext};
    pub use crate::domain::keys::{
        contract_code_key, contract_desc_key, object_key, validate_contract_name, Language,
        INIT_METHOD,
    };
    pub use crate::domain::messages::{
        CallArgs, Response, SyscallKind, SyscallRequest, SyscallResponse, STATUS_OK,
    };
    pub use crate::domain::resources::{GasRates, ResourceLimits};
    pub use crate::domain::trap::{Trap, TrapKind};

    // Ports
    pub use crate::ports::inbound::{CallOutcome, ContractApi, ContractInvoker, SyscallHandler};
    pub use crate::ports::outbound::{
        AbortSignal, CodeLoad, ContextConfig, ContractStore, ExecContext, HostFunc,
        InstanceCreator, Resolver, RunnableInstance, WasmCode, WasmEngine,
    };

    // Errors
    pub use crate::errors::{BridgeError, ConfigError, EngineError, ErrorClass, StoreError};

    // Config
    pub use crate::config::BridgeConfig;

    // Adapters
    pub use crate::adapters::{
        DebugWriter, InMemoryStore, LruStore, PrefixedStore, ScriptedEngine, StoreProvider,
    };

    // Service
    pub use crate::service::{
        CodeCache, InterpCreator, ServiceStats, SyscallDispatcher, VmManager, VmRegistry,
    };

    pub use std::sync::Arc;
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// TESTS
// =============================================================================
