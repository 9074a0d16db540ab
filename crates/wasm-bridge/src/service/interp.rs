//! # Interpreter Backend
//!
//! [`InterpCreator`] is the backend for every interpreter-family engine. It
//! owns the contract [`CodeCache`]; its factory fetches bytecode from the
//! code key and links it against the Go runtime and syscall resolvers.
//!
//! Each call gets a fresh [`BridgeInstance`]: a new engine context bound to
//! the call's context id, with the language runtime installed, a debug
//! writer attached and an abort signal shared with the engine.

use crate::adapters::debug_writer::DebugWriter;
use crate::domain::context::ExecutionContext;
use crate::domain::keys::{contract_code_key, Language};
use crate::domain::resources::ResourceLimits;
use crate::errors::BridgeError;
use crate::ports::inbound::SyscallHandler;
use crate::ports::outbound::{
    AbortSignal, CodeLoad, ContextConfig, ContractStore, ExecContext, InstanceCreator, Resolver,
    RunnableInstance, WasmEngine,
};
use crate::service::code_cache::{CodeCache, CodeFactory, CompiledCode};
use crate::service::resolver::{GoRuntimeResolver, MultiResolver, SyscallResolver};
use std::sync::Arc;
use tracing::{debug, error};

/// Reads a contract's bytecode; missing and empty code are both errors.
pub fn fetch_contract_code(store: &dyn ContractStore, name: &str) -> Result<Vec<u8>, BridgeError> {
    let code = store
        .get(&contract_code_key(name))?
        .ok_or_else(|| BridgeError::MissingCode(name.to_string()))?;
    if code.is_empty() {
        return Err(BridgeError::EmptyCode(name.to_string()));
    }
    Ok(code)
}

/// Backend running contracts on a [`WasmEngine`].
pub struct InterpCreator<E: WasmEngine> {
    engine: Arc<E>,
    cache: CodeCache,
    config: ContextConfig,
}

impl<E: WasmEngine> InterpCreator<E> {
    /// Creates the backend. Syscalls issued by contracts go to `handler`.
    pub fn new(
        engine: Arc<E>,
        handler: Arc<dyn SyscallHandler>,
        store: Arc<dyn ContractStore>,
        config: ContextConfig,
    ) -> Self {
        let resolver: Arc<dyn Resolver> = Arc::new(MultiResolver::new(vec![
            Arc::new(GoRuntimeResolver),
            Arc::new(SyscallResolver::new(handler)),
        ]));
        let compiler = Arc::clone(&engine);
        let factory: CodeFactory = Box::new(move |name: &str| {
            let bytecode = fetch_contract_code(store.as_ref(), name)?;
            let code = compiler.compile(&bytecode, Arc::clone(&resolver))?;
            Ok(CompiledCode::new(name, &bytecode, code))
        });
        Self {
            engine,
            cache: CodeCache::new(factory),
            config,
        }
    }

    /// The engine this backend compiles with.
    #[must_use]
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Number of cached modules.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

impl<E: WasmEngine> InstanceCreator for InterpCreator<E> {
    fn create_instance(
        &self,
        ctx: &Arc<ExecutionContext>,
        load: CodeLoad,
    ) -> Result<Box<dyn RunnableInstance>, BridgeError> {
        let code = match load {
            CodeLoad::Compile => self.cache.get_or_compile(ctx.contract_name())?,
            CodeLoad::Reuse => self.cache.acquire(ctx.contract_name())?,
        };
        let exec = code.code().new_context(&self.config).map_err(|e| {
            error!(contract = ctx.contract_name(), error = %e, "create contract context error");
            BridgeError::from(e)
        })?;
        debug!(
            contract = ctx.contract_name(),
            ctx = %ctx.id(),
            digest = code.digest(),
            "Created instance"
        );
        BridgeInstance::new(Arc::clone(ctx), code, exec)
            .map(|i| Box::new(i) as Box<dyn RunnableInstance>)
    }

    fn evict(&self, contract: &str) {
        self.cache.remove(contract);
    }

    fn is_cached(&self, contract: &str) -> bool {
        self.cache.contains(contract)
    }
}

/// One contract call on an interpreter context.
///
/// Holds its compiled code, so an eviction during the call does not
/// release the module underneath it.
pub struct BridgeInstance {
    ctx: Arc<ExecutionContext>,
    exec: Box<dyn ExecContext>,
    signal: AbortSignal,
    released: bool,
    code: Arc<CompiledCode>,
}

impl BridgeInstance {
    /// Prepares `exec` for the call described by `ctx`.
    ///
    /// Unknown language tags skip runtime setup; they fail at
    /// [`entry_point`](RunnableInstance::entry_point).
    pub fn new(
        ctx: Arc<ExecutionContext>,
        code: Arc<CompiledCode>,
        exec: Box<dyn ExecContext>,
    ) -> Result<Self, BridgeError> {
        let mut instance = Self {
            ctx,
            exec,
            signal: AbortSignal::new(),
            released: false,
            code,
        };
        if let Ok(language) = Language::parse(instance.ctx.language()) {
            // Dropping `instance` on error releases the engine context.
            instance.exec.init_runtime(language)?;
        }
        instance.exec.bind_context(instance.ctx.id());
        instance.exec.set_debug_writer(Box::new(DebugWriter::new(
            instance.ctx.contract_name(),
            instance.ctx.id(),
        )));
        instance.exec.set_abort_signal(instance.signal.clone());
        Ok(instance)
    }
}

impl RunnableInstance for BridgeInstance {
    fn entry_point(&self) -> Result<String, BridgeError> {
        Ok(Language::parse(self.ctx.language())?.entry_point(self.ctx.method()))
    }

    fn exec(&mut self, entry: &str) -> Result<(), BridgeError> {
        if let Some(trap) = self.signal.trap() {
            return Err(trap.into());
        }
        if self.exec.memory_size().is_none() {
            return Err(BridgeError::Engine("bad contract, no memory".to_string()));
        }
        let params = Language::parse(self.ctx.language()).map_or(&[][..], Language::entry_params);
        let result = self.exec.exec(entry, params);
        if let Some(trap) = self.signal.trap() {
            return Err(trap.into());
        }
        result.map(|_| ()).map_err(|e| {
            error!(contract = self.ctx.contract_name(), error = %e, "exec contract error");
            BridgeError::from(e)
        })
    }

    fn resource_used(&self) -> ResourceLimits {
        ResourceLimits {
            cpu: self.exec.gas_used(),
            memory: self.exec.memory_size().unwrap_or(0),
            ..ResourceLimits::default()
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.exec.release();
        }
    }

    fn abort(&self, message: &str) {
        self.signal.raise(message);
    }

    fn abort_signal(&self) -> AbortSignal {
        self.signal.clone()
    }
}

impl Drop for BridgeInstance {
    fn drop(&mut self) {
        self.release();
        debug!(ctx = %self.ctx.id(), digest = self.code.digest(), "Dropped instance");
    }
}
