//! # Driving Ports (API - Inbound)
//!
//! Interfaces exposed by the bridge:
//! - `ContractApi`: deploy and invoke, used by the host application
//! - `SyscallHandler`: syscalls issued by running contract code
//! - `ContractInvoker`: nested contract calls routed back to the orchestrator

use crate::domain::context::{ContextId, ExecutionContext};
use crate::domain::messages::{Response, SyscallRequest, SyscallResponse};
use crate::domain::resources::{GasRates, ResourceLimits};
use crate::errors::BridgeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// CALL OUTCOME
// =============================================================================

/// Result of a successful deploy or invoke.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    /// Output set by the contract.
    pub response: Response,
    /// Resources consumed, nested calls included.
    pub resources: ResourceLimits,
    /// `resources` converted with the configured rates.
    pub gas: u64,
}

impl CallOutcome {
    /// Builds an outcome, pricing `resources` with `rates`.
    #[must_use]
    pub fn new(response: Response, resources: ResourceLimits, rates: &GasRates) -> Self {
        Self {
            response,
            gas: resources.total_gas_with(rates),
            resources,
        }
    }

    /// Gas charged for the call.
    #[must_use]
    pub fn gas(&self) -> u64 {
        self.gas
    }
}

// =============================================================================
// CONTRACT API
// =============================================================================

/// Primary API for contract execution.
///
/// `args` is a flat byte mapping:
///
/// | Key | Deploy | Invoke |
/// |-----|--------|--------|
/// | `contract_name` | required | required |
/// | `contract_code` | required | - |
/// | `language` | required | required |
/// | `args` | required (JSON object) | required (JSON object) |
/// | `caller` | required | required |
pub trait ContractApi: Send + Sync {
    /// Stores a contract and runs its `initialize` method.
    fn deploy_contract(&self, args: &HashMap<String, Vec<u8>>)
        -> Result<CallOutcome, BridgeError>;

    /// Runs `method` of a deployed contract.
    fn invoke_contract(
        &self,
        method: &str,
        args: &HashMap<String, Vec<u8>>,
    ) -> Result<CallOutcome, BridgeError>;
}

// =============================================================================
// SYSCALLS
// =============================================================================

/// Serves syscalls issued by contract code.
pub trait SyscallHandler: Send + Sync {
    /// Executes `request` against the context `ctx_id`.
    fn dispatch(
        &self,
        ctx_id: ContextId,
        request: SyscallRequest,
    ) -> Result<SyscallResponse, BridgeError>;
}

/// Runs a contract on behalf of another running contract.
pub trait ContractInvoker: Send + Sync {
    /// Invokes `contract.method` with `caller_ctx` as the caller.
    ///
    /// A failing response of the callee is returned as a response so the
    /// calling contract can inspect it. Either way the callee's usage is
    /// added to `caller_ctx`.
    fn invoke_nested(
        &self,
        caller_ctx: &ExecutionContext,
        contract: &str,
        method: &str,
        args: HashMap<String, Vec<u8>>,
    ) -> Result<Response, BridgeError>;
}
