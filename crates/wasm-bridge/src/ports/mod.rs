//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions between the bridge and the outside world.
//!
//! - **Driving Ports (Inbound)**: `ContractApi`, `SyscallHandler`, `ContractInvoker`
//! - **Driven Ports (Outbound)**: `ContractStore`, `WasmEngine`, `InstanceCreator`
//! - No concrete implementations in this module

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
