//! # Compiled Code Cache
//!
//! At most one compiled module per contract name. Entries are created
//! through a factory on a miss and dropped only by explicit removal. The
//! module is released once the last handle to it is gone, so calls still
//! running on an evicted entry keep a live module.
//!
//! Lookup, compile and insert run under one lock: two concurrent first
//! calls for the same contract compile once.

use crate::errors::BridgeError;
use crate::ports::outbound::WasmCode;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A compiled module and where it came from.
pub struct CompiledCode {
    name: String,
    digest: String,
    code: Arc<dyn WasmCode>,
}

impl CompiledCode {
    /// Wraps a module compiled from `bytecode`.
    pub fn new(name: &str, bytecode: &[u8], code: Arc<dyn WasmCode>) -> Self {
        Self {
            name: name.to_string(),
            digest: hex::encode(Sha256::digest(bytecode)),
            code,
        }
    }

    /// Contract name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hex SHA-256 of the bytecode.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The compiled module.
    #[must_use]
    pub fn code(&self) -> &Arc<dyn WasmCode> {
        &self.code
    }
}

impl Drop for CompiledCode {
    fn drop(&mut self) {
        debug!(contract = %self.name, digest = %self.digest, "Released contract code");
        self.code.release();
    }
}

impl fmt::Debug for CompiledCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCode")
            .field("name", &self.name)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

/// Builds the compiled code for a contract name.
pub type CodeFactory = Box<dyn Fn(&str) -> Result<CompiledCode, BridgeError> + Send + Sync>;

/// Per-contract cache of compiled modules.
pub struct CodeCache {
    factory: CodeFactory,
    codes: Mutex<HashMap<String, Arc<CompiledCode>>>,
}

impl CodeCache {
    /// Creates an empty cache filled through `factory`.
    pub fn new(factory: CodeFactory) -> Self {
        Self {
            factory,
            codes: Mutex::new(HashMap::new()),
        }
    }

    /// Compiles and caches `name`.
    ///
    /// An existing entry means an earlier one was never purged; that is
    /// reported as [`BridgeError::StaleCode`] instead of being reused.
    pub fn get_or_compile(&self, name: &str) -> Result<Arc<CompiledCode>, BridgeError> {
        let mut codes = self.codes.lock();
        if codes.contains_key(name) {
            return Err(BridgeError::StaleCode(name.to_string()));
        }
        self.compile_into(&mut codes, name)
    }

    /// Returns the cached entry for `name`, compiling it on a miss.
    pub fn acquire(&self, name: &str) -> Result<Arc<CompiledCode>, BridgeError> {
        let mut codes = self.codes.lock();
        if let Some(code) = codes.get(name) {
            return Ok(Arc::clone(code));
        }
        self.compile_into(&mut codes, name)
    }

    fn compile_into(
        &self,
        codes: &mut HashMap<String, Arc<CompiledCode>>,
        name: &str,
    ) -> Result<Arc<CompiledCode>, BridgeError> {
        let code = Arc::new((self.factory)(name)?);
        debug!(contract = name, digest = code.digest(), "Compiled contract code");
        codes.insert(name.to_string(), Arc::clone(&code));
        Ok(code)
    }

    /// Drops the entry for `name`. No-op when absent.
    pub fn remove(&self, name: &str) {
        if self.codes.lock().remove(name).is_some() {
            debug!(contract = name, "Evicted contract code");
        }
    }

    /// True if `name` is cached.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.codes.lock().contains_key(name)
    }

    /// Number of cached modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.lock().len()
    }

    /// True if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
