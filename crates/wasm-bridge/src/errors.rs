//! # Error Types
//!
//! All error types for the bridge. Every API boundary returns these as
//! values; no error is fatal to the host process.

use crate::domain::context::ContextId;
use crate::domain::messages::{Response, STATUS_INTERNAL_ERROR};
use crate::domain::resources::ResourceLimits;
use crate::domain::trap::Trap;
use thiserror::Error;

// =============================================================================
// ERROR CLASSES
// =============================================================================

/// Coarse classification deciding how the orchestrator reacts to a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed request; nothing was touched.
    Validation,
    /// The contract itself reported a failure; its code is still valid.
    Contract,
    /// Storage, backend or linking failure.
    Infrastructure,
    /// The interpreter aborted execution.
    Trap,
    /// Unknown context id or object key.
    NotFound,
}

// =============================================================================
// BRIDGE ERRORS
// =============================================================================

/// Errors surfaced by the bridge.
#[derive(Debug, Error, Clone)]
pub enum BridgeError {
    /// A required request field is absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The `args` field is not a JSON object of byte values.
    #[error("malformed args: {0}")]
    MalformedArgs(String),

    /// Contract name does not follow the naming rules.
    #[error("invalid contract name: {0:?}")]
    InvalidContractName(String),

    /// The contract returned a failing response. The call is still billed.
    #[error("contract error status:{status} message:{message}")]
    Contract {
        /// Status set by the contract (>= 400).
        status: i32,
        /// Status message set by the contract.
        message: String,
        /// Response payload set by the contract.
        body: Vec<u8>,
        /// Resources consumed, nested calls included.
        resources: ResourceLimits,
        /// `resources` converted with the configured rates.
        gas: u64,
    },

    /// The contract returned without calling `SetOutput`.
    #[error("internal error: contract {contract} produced no output")]
    MissingOutput {
        /// Contract that ran.
        contract: String,
    },

    /// Storage collaborator failure.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// No backend registered under this name.
    #[error("driver {0} not found")]
    BackendNotFound(String),

    /// No bytecode stored for the contract.
    #[error("get contract code for '{0}' error: code not found")]
    MissingCode(String),

    /// Stored bytecode is empty.
    #[error("empty wasm code for contract '{0}'")]
    EmptyCode(String),

    /// A compiled entry is still cached where a fresh compile was required.
    #[error("old contract code not purged: {0}")]
    StaleCode(String),

    /// Language tag has no known entry-point convention.
    #[error("bad runtime: unsupported language '{0}'")]
    UnsupportedLanguage(String),

    /// Interpreter failure that is not a trap (invalid module, no memory).
    #[error("engine error: {0}")]
    Engine(String),

    /// `PutObject` without a value.
    #[error("put nil value for key {key:?}")]
    NilValue {
        /// Key of the rejected write.
        key: String,
    },

    /// Nested contract calls went too deep.
    #[error("call depth exceeded: {depth} > {max}")]
    CallDepthExceeded {
        /// Depth the call would have run at.
        depth: u32,
        /// Configured `max_call_depth`.
        max: u32,
    },

    /// `ContractCall` addressed a module this bridge does not serve.
    #[error("unsupported module: {0}")]
    UnsupportedModule(String),

    /// The bridge was configured with unusable values.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The interpreter trapped.
    #[error(transparent)]
    Trap(#[from] Trap),

    /// No live context with this id.
    #[error("bad ctx id: {0}")]
    ContextNotFound(ContextId),

    /// `GetObject` on a key that does not exist.
    #[error("object not found for key: {0:?}")]
    ObjectNotFound(String),
}

impl BridgeError {
    /// Contract error carrying the failing `response` and what the call used.
    #[must_use]
    pub fn contract(response: Response, resources: ResourceLimits, gas: u64) -> Self {
        Self::Contract {
            status: response.status,
            message: response.message,
            body: response.body,
            resources,
            gas,
        }
    }

    /// Classifies the error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingField(_) | Self::MalformedArgs(_) | Self::InvalidContractName(_) => {
                ErrorClass::Validation
            }
            Self::Contract { .. } | Self::MissingOutput { .. } => ErrorClass::Contract,
            Self::Trap(_) => ErrorClass::Trap,
            Self::ContextNotFound(_) | Self::ObjectNotFound(_) => ErrorClass::NotFound,
            Self::Storage(_)
            | Self::BackendNotFound(_)
            | Self::MissingCode(_)
            | Self::EmptyCode(_)
            | Self::StaleCode(_)
            | Self::UnsupportedLanguage(_)
            | Self::Engine(_)
            | Self::NilValue { .. }
            | Self::CallDepthExceeded { .. }
            | Self::UnsupportedModule(_)
            | Self::Config(_) => ErrorClass::Infrastructure,
        }
    }

    /// Returns true if the contract's cached code must be dropped.
    #[must_use]
    pub fn evicts_code(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Infrastructure | ErrorClass::Trap
        )
    }

    /// Status code to report for this error.
    #[must_use]
    pub fn status(&self) -> i32 {
        match self {
            Self::Contract { status, .. } => *status,
            _ => STATUS_INTERNAL_ERROR,
        }
    }

    /// Gas billed for a call that ran to completion but failed.
    #[must_use]
    pub fn billed_gas(&self) -> u64 {
        match self {
            Self::Contract { gas, .. } => *gas,
            _ => 0,
        }
    }

    /// The trap, if this error is one.
    #[must_use]
    pub fn as_trap(&self) -> Option<&Trap> {
        match self {
            Self::Trap(trap) => Some(trap),
            _ => None,
        }
    }
}

// =============================================================================
// STORAGE ERRORS
// =============================================================================

/// Errors from the key-value store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend I/O failure.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Store is closed or not reachable.
    #[error("storage unavailable")]
    Unavailable,

    /// Capacity change rejected.
    #[error("new capacity {requested} must be larger than current {current}")]
    CapacityShrink {
        /// Capacity asked for.
        requested: usize,
        /// Capacity in effect.
        current: usize,
    },
}

// =============================================================================
// ENGINE ERRORS
// =============================================================================

/// Errors from the interpreter collaborator.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Bytecode could not be decoded.
    #[error("invalid module: {0}")]
    InvalidModule(String),

    /// Linking or execution trapped.
    #[error(transparent)]
    Trap(#[from] Trap),

    /// A host function called by the contract failed.
    #[error(transparent)]
    Host(Box<BridgeError>),

    /// Any other engine failure.
    #[error("{0}")]
    Other(String),
}

impl From<EngineError> for BridgeError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Trap(trap) => BridgeError::Trap(trap),
            EngineError::Host(err) => *err,
            other => BridgeError::Engine(other.to_string()),
        }
    }
}

// =============================================================================
// CONFIG ERRORS
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds an unusable value.
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Configuration document could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
}

// =============================================================================
// TESTS
// =============================================================================
