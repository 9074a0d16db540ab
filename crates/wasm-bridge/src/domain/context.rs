//! # Execution Contexts
//!
//! One [`ExecutionContext`] exists per in-flight contract call. The
//! [`ContextRegistry`] hands out ids and is the only way the syscall
//! dispatcher can reach a context.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::messages::{CallArgs, Response};
use super::resources::ResourceLimits;

/// Integer handle correlating syscalls with the call that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextId(pub i64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a context is created with.
#[derive(Clone, Debug, Default)]
pub struct ContextInit {
    /// Contract being executed.
    pub contract_name: String,
    /// Method requested by the caller.
    pub method: String,
    /// Call arguments.
    pub args: HashMap<String, Vec<u8>>,
    /// Language tag of the contract runtime ("go", "c").
    pub language: String,
    /// Caller identity.
    pub caller: String,
    /// Nesting depth (0 for top-level calls).
    pub depth: u32,
}

/// Kernel-side state of one contract call.
#[derive(Debug)]
pub struct ExecutionContext {
    id: ContextId,
    contract_name: String,
    method: String,
    args: HashMap<String, Vec<u8>>,
    language: String,
    caller: String,
    depth: u32,
    output: Mutex<Option<Response>>,
    nested_usage: Mutex<ResourceLimits>,
}

impl ExecutionContext {
    /// Context id.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Contract name.
    #[must_use]
    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    /// Requested method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Raw argument mapping.
    #[must_use]
    pub fn args(&self) -> &HashMap<String, Vec<u8>> {
        &self.args
    }

    /// Language tag.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Caller identity.
    #[must_use]
    pub fn caller(&self) -> &str {
        &self.caller
    }

    /// Nesting depth.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Call args in deterministic (key-sorted) order.
    #[must_use]
    pub fn call_args(&self) -> CallArgs {
        CallArgs::new(&self.method, &self.args, &self.caller)
    }

    /// Output set by the contract, if any.
    #[must_use]
    pub fn output(&self) -> Option<Response> {
        self.output.lock().clone()
    }

    /// Stores the contract output, replacing any earlier one.
    pub fn set_output(&self, response: Response) {
        *self.output.lock() = Some(response);
    }

    /// Moves the output out of the context.
    pub fn take_output(&self) -> Option<Response> {
        self.output.lock().take()
    }

    /// Charges resources spent by a contract this call invoked.
    pub fn add_nested_usage(&self, used: &ResourceLimits) {
        self.nested_usage.lock().add(used);
    }

    /// Resources spent by nested contract calls so far.
    #[must_use]
    pub fn nested_usage(&self) -> ResourceLimits {
        *self.nested_usage.lock()
    }
}

#[derive(Default)]
struct RegistryInner {
    last_id: i64,
    contexts: HashMap<ContextId, Arc<ExecutionContext>>,
}

/// Allocates, tracks and destroys execution contexts.
///
/// Ids come from a counter that is never rewound, so an id is never handed
/// out twice even after its context has been destroyed.
#[derive(Default)]
pub struct ContextRegistry {
    inner: Mutex<RegistryInner>,
}

impl ContextRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a context with a fresh id.
    pub fn create(&self, init: ContextInit) -> Arc<ExecutionContext> {
        let mut inner = self.inner.lock();
        inner.last_id += 1;
        let id = ContextId(inner.last_id);
        let ctx = Arc::new(ExecutionContext {
            id,
            contract_name: init.contract_name,
            method: init.method,
            args: init.args,
            language: init.language,
            caller: init.caller,
            depth: init.depth,
            output: Mutex::new(None),
            nested_usage: Mutex::new(ResourceLimits::default()),
        });
        inner.contexts.insert(id, Arc::clone(&ctx));
        ctx
    }

    /// Looks a context up without removing it.
    #[must_use]
    pub fn get(&self, id: ContextId) -> Option<Arc<ExecutionContext>> {
        self.inner.lock().contexts.get(&id).cloned()
    }

    /// Removes a context. Unknown ids are ignored.
    pub fn destroy(&self, id: ContextId) {
        self.inner.lock().contexts.remove(&id);
    }

    /// Number of live contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().contexts.len()
    }

    /// True when no call is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
