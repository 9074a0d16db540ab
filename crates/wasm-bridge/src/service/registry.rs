//! # Backend Registry
//!
//! Named constructors for execution backends. Registries are plain values
//! owned by whoever builds the bridge; there is no process-wide table.

use crate::errors::BridgeError;
use crate::ports::inbound::SyscallHandler;
use crate::ports::outbound::{ContextConfig, ContractStore, InstanceCreator, WasmEngine};
use crate::service::interp::InterpCreator;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Everything a backend is built from.
#[derive(Clone)]
pub struct BackendParts {
    /// Serves syscalls issued by contracts.
    pub handler: Arc<dyn SyscallHandler>,
    /// Code and data store.
    pub store: Arc<dyn ContractStore>,
    /// Settings for every engine context.
    pub context: ContextConfig,
}

/// Backend constructor.
pub type BackendCtor =
    Box<dyn Fn(BackendParts) -> Result<Box<dyn InstanceCreator>, BridgeError> + Send + Sync>;

/// Registry of named execution backends.
#[derive(Default)]
pub struct VmRegistry {
    backends: RwLock<HashMap<String, BackendCtor>>,
}

impl VmRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ctor` under `name`, replacing any earlier registration.
    pub fn register(&self, name: &str, ctor: BackendCtor) {
        debug!(backend = name, "Registered backend");
        self.backends.write().insert(name.to_string(), ctor);
    }

    /// Registers an interpreter-family backend running on `engine`.
    pub fn register_interpreter<E: WasmEngine>(&self, name: &str, engine: Arc<E>) {
        self.register(
            name,
            Box::new(move |parts: BackendParts| -> Result<Box<dyn InstanceCreator>, BridgeError> {
                Ok(Box::new(InterpCreator::new(
                    Arc::clone(&engine),
                    parts.handler,
                    parts.store,
                    parts.context,
                )) as Box<dyn InstanceCreator>)
            }),
        );
    }

    /// Builds the backend registered as `name`.
    pub fn open(
        &self,
        name: &str,
        handler: Arc<dyn SyscallHandler>,
        store: Arc<dyn ContractStore>,
        context: ContextConfig,
    ) -> Result<Box<dyn InstanceCreator>, BridgeError> {
        let backends = self.backends.read();
        let ctor = backends
            .get(name)
            .ok_or_else(|| BridgeError::BackendNotFound(name.to_string()))?;
        ctor(BackendParts {
            handler,
            store,
            context,
        })
    }

    /// True if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.backends.read().contains_key(name)
    }

    /// Registered backend names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.read().keys().cloned().collect();
        names.sort();
        names
    }
}
