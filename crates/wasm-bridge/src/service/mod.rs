//! # Service Layer
//!
//! Bridge components that wire the domain to the ports:
//!
//! | Component | Module | Purpose |
//! |-----------|--------|---------|
//! | `SyscallDispatcher` | `syscall` | Serves contract syscalls |
//! | `MultiResolver` | `resolver` | Links host imports |
//! | `CodeCache` | `code_cache` | One compiled module per contract |
//! | `VmRegistry` | `registry` | Named backend constructors |
//! | `InterpCreator` | `interp` | Interpreter-family backend |
//! | `VmManager` | `manager` | Deploy/invoke orchestration |

pub mod code_cache;
pub mod interp;
pub mod manager;
pub mod registry;
pub mod resolver;
pub mod syscall;

pub use code_cache::{CodeCache, CodeFactory, CompiledCode};
pub use interp::{fetch_contract_code, BridgeInstance, InterpCreator};
pub use manager::{ServiceStats, VmManager};
pub use registry::{BackendCtor, BackendParts, VmRegistry};
pub use resolver::{GoRuntimeResolver, MultiResolver, SyscallResolver};
pub use syscall::{SyscallDispatcher, CONTRACT_CALL_MODULE};
