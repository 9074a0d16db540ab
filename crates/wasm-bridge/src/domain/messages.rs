//! # Syscall Messages
//!
//! Schema of the requests and responses exchanged across the host/guest
//! boundary. The wire encoding belongs to the engine; these are the decoded
//! shapes the dispatcher works with.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::context::ContextId;

/// Status of a successful response.
pub const STATUS_OK: i32 = 200;

/// Responses at or above this status are contract errors.
pub const STATUS_ERROR_THRESHOLD: i32 = 400;

/// Status reported when a contract returns without an output.
pub const STATUS_INTERNAL_ERROR: i32 = 500;

/// Header shared by every syscall request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallHeader {
    /// Context the contract is running under.
    pub ctx_id: ContextId,
}

/// Output of a contract call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Status code (200 on success, >= 400 on error).
    pub status: i32,
    /// Status message.
    pub message: String,
    /// Response payload.
    pub body: Vec<u8>,
}

impl Response {
    /// A successful response carrying `body`.
    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: STATUS_OK,
            message: String::new(),
            body: body.into(),
        }
    }

    /// A failing response.
    #[must_use]
    pub fn error(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: Vec::new(),
        }
    }

    /// True if the contract reported a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status >= STATUS_ERROR_THRESHOLD
    }
}

/// A single call argument.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgPair {
    /// Argument name.
    pub key: String,
    /// Raw argument value.
    pub value: Vec<u8>,
}

/// Arguments of the current call as seen by the contract.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallArgs {
    /// Method being called.
    pub method: String,
    /// Arguments, ascending by key.
    pub args: Vec<ArgPair>,
    /// Caller identity.
    pub caller: String,
}

impl CallArgs {
    /// Builds call args from an unordered mapping, sorting by key.
    #[must_use]
    pub fn new(method: &str, args: &HashMap<String, Vec<u8>>, caller: &str) -> Self {
        let mut pairs: Vec<ArgPair> = args
            .iter()
            .map(|(key, value)| ArgPair {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        pairs.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            method: method.to_string(),
            args: pairs,
            caller: caller.to_string(),
        }
    }

    /// Looks up an argument by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.args
            .binary_search_by(|pair| pair.key.as_str().cmp(key))
            .ok()
            .map(|idx| self.args[idx].value.as_slice())
    }
}

/// Kinds of syscall a contract can issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyscallKind {
    /// Write a data object.
    PutObject,
    /// Read a data object.
    GetObject,
    /// Delete a data object.
    DeleteObject,
    /// Fetch method, caller and args.
    GetCallArgs,
    /// Record the call output.
    SetOutput,
    /// Reserved value transfer.
    Transfer,
    /// Call another contract.
    ContractCall,
}

impl SyscallKind {
    /// Every syscall kind.
    pub const ALL: [SyscallKind; 7] = [
        Self::PutObject,
        Self::GetObject,
        Self::DeleteObject,
        Self::GetCallArgs,
        Self::SetOutput,
        Self::Transfer,
        Self::ContractCall,
    ];

    /// Import name the guest links against.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PutObject => "PutObject",
            Self::GetObject => "GetObject",
            Self::DeleteObject => "DeleteObject",
            Self::GetCallArgs => "GetCallArgs",
            Self::SetOutput => "SetOutput",
            Self::Transfer => "Transfer",
            Self::ContractCall => "ContractCall",
        }
    }

    /// Parses an import name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for SyscallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded syscall request. One variant per syscall, fixed fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyscallRequest {
    /// Write `value` under the contract's `key`. A missing value is rejected.
    PutObject {
        /// Object key, without the contract prefix.
        key: Vec<u8>,
        /// Value to store.
        value: Option<Vec<u8>>,
    },
    /// Read the contract's `key`.
    GetObject {
        /// Object key, without the contract prefix.
        key: Vec<u8>,
    },
    /// Delete the contract's `key`.
    DeleteObject {
        /// Object key, without the contract prefix.
        key: Vec<u8>,
    },
    /// Fetch method, caller and sorted args.
    GetCallArgs,
    /// Record the call output.
    SetOutput {
        /// Output to record.
        response: Response,
    },
    /// Reserved value transfer.
    Transfer {
        /// Paying account.
        from: String,
        /// Receiving account.
        to: String,
        /// Amount as a decimal string.
        amount: String,
    },
    /// Call another contract.
    ContractCall {
        /// Target VM module; only `wasm` is served.
        module: String,
        /// Callee contract name.
        contract: String,
        /// Callee method.
        method: String,
        /// Call arguments.
        args: Vec<ArgPair>,
    },
}

impl SyscallRequest {
    /// The syscall this request targets.
    #[must_use]
    pub fn kind(&self) -> SyscallKind {
        match self {
            Self::PutObject { .. } => SyscallKind::PutObject,
            Self::GetObject { .. } => SyscallKind::GetObject,
            Self::DeleteObject { .. } => SyscallKind::DeleteObject,
            Self::GetCallArgs => SyscallKind::GetCallArgs,
            Self::SetOutput { .. } => SyscallKind::SetOutput,
            Self::Transfer { .. } => SyscallKind::Transfer,
            Self::ContractCall { .. } => SyscallKind::ContractCall,
        }
    }
}

/// A syscall response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyscallResponse {
    /// No payload (put, delete, set output, transfer).
    Empty,
    /// Value read by `GetObject`.
    Value(Vec<u8>),
    /// Result of `GetCallArgs`.
    CallArgs(CallArgs),
    /// Result of `ContractCall`.
    Response(Response),
}
