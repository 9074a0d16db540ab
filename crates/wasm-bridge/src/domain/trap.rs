//! # Traps
//!
//! Fatal interpreter-level faults. Engines hand them back as values
//! (`Result<_, Trap>`); nothing in the bridge unwinds to report one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of reasons an execution can be aborted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapKind {
    /// Memory access out of bounds.
    OutOfBounds,
    /// Integer overflow on divide or truncation.
    IntegerOverflow,
    /// Integer divide by zero.
    DivideByZero,
    /// Conversion from NaN to integer.
    InvalidConversion,
    /// `unreachable` instruction executed.
    Unreachable,
    /// Invalid `call_indirect`.
    InvalidIndirectCall,
    /// Call stack exhausted.
    CallStackExhausted,
    /// Gas limit reached.
    GasExhausted,
    /// A function was called with an invalid argument.
    InvalidArgument,
    /// An imported symbol could not be resolved.
    SymbolNotFound {
        /// Import module.
        module: String,
        /// Import name.
        name: String,
    },
    /// An imported symbol does not match the host signature.
    SignatureMismatch {
        /// Import module.
        module: String,
        /// Import name.
        name: String,
    },
    /// Execution was force-terminated by the host.
    Aborted(String),
}

impl TrapKind {
    /// Human readable reason, embedded in every surfaced error.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::OutOfBounds => "memory access out of bound".to_string(),
            Self::IntegerOverflow => "integer overflow on divide or truncation".to_string(),
            Self::DivideByZero => "integer divide by zero".to_string(),
            Self::InvalidConversion => "conversion from NaN to integer".to_string(),
            Self::Unreachable => "unreachable instruction executed".to_string(),
            Self::InvalidIndirectCall => "invalid call_indirect".to_string(),
            Self::CallStackExhausted => "call stack exhausted".to_string(),
            Self::GasExhausted => "run out of gas limit".to_string(),
            Self::InvalidArgument => "invalid function argument".to_string(),
            Self::SymbolNotFound { module, name } => format!("{module}.{name} can't be resolved"),
            Self::SignatureMismatch { module, name } => {
                format!("{module}.{name} not match with host signature")
            }
            Self::Aborted(reason) => reason.clone(),
        }
    }
}

/// A trap raised while running contract code.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("trap error: {}", .kind.reason())]
pub struct Trap {
    kind: TrapKind,
}

impl Trap {
    /// Wraps a trap kind.
    #[must_use]
    pub fn new(kind: TrapKind) -> Self {
        Self { kind }
    }

    /// Trap raised by [`abort`](crate::ports::RunnableInstance::abort).
    #[must_use]
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::new(TrapKind::Aborted(reason.into()))
    }

    /// Unresolvable import.
    #[must_use]
    pub fn symbol_not_found(module: &str, name: &str) -> Self {
        Self::new(TrapKind::SymbolNotFound {
            module: module.to_string(),
            name: name.to_string(),
        })
    }

    /// The trap kind.
    #[must_use]
    pub fn kind(&self) -> &TrapKind {
        &self.kind
    }

    /// Reason string.
    #[must_use]
    pub fn reason(&self) -> String {
        self.kind.reason()
    }
}

impl From<TrapKind> for Trap {
    fn from(kind: TrapKind) -> Self {
        Self::new(kind)
    }
}
