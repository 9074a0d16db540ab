//! # Syscall Dispatcher
//!
//! Serves the syscalls a running contract issues. Every operation first
//! resolves the context id through the [`ContextRegistry`]; an unknown id is
//! an error, never a panic. Data keys are namespaced `<contract>-<key>`.

use crate::domain::context::{ContextId, ContextRegistry, ExecutionContext};
use crate::domain::keys::object_key;
use crate::domain::messages::{ArgPair, CallArgs, Response, SyscallRequest, SyscallResponse};
use crate::errors::BridgeError;
use crate::ports::inbound::{ContractInvoker, SyscallHandler};
use crate::ports::outbound::ContractStore;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

/// Module name accepted by `ContractCall`.
pub const CONTRACT_CALL_MODULE: &str = "wasm";

/// Handler of contract syscalls.
pub struct SyscallDispatcher {
    contexts: Arc<ContextRegistry>,
    store: Arc<dyn ContractStore>,
    invoker: OnceLock<Weak<dyn ContractInvoker>>,
}

impl SyscallDispatcher {
    /// Creates a dispatcher over `contexts` and `store`.
    pub fn new(contexts: Arc<ContextRegistry>, store: Arc<dyn ContractStore>) -> Self {
        Self {
            contexts,
            store,
            invoker: OnceLock::new(),
        }
    }

    /// Installs the orchestrator serving `ContractCall`. Later calls are ignored.
    pub fn set_invoker(&self, invoker: Weak<dyn ContractInvoker>) {
        let _ = self.invoker.set(invoker);
    }

    fn context(&self, ctx_id: ContextId) -> Result<Arc<ExecutionContext>, BridgeError> {
        self.contexts
            .get(ctx_id)
            .ok_or(BridgeError::ContextNotFound(ctx_id))
    }

    /// Writes `value` under the contract's `key`. A missing value is rejected
    /// before storage is touched.
    pub fn put_object(
        &self,
        ctx_id: ContextId,
        key: &[u8],
        value: Option<&[u8]>,
    ) -> Result<(), BridgeError> {
        let ctx = self.context(ctx_id)?;
        let value = value.ok_or_else(|| BridgeError::NilValue {
            key: String::from_utf8_lossy(key).into_owned(),
        })?;
        let composite = object_key(ctx.contract_name(), key);
        self.store.put(&composite, value)?;
        debug!(ctx = %ctx_id, key = %String::from_utf8_lossy(&composite), "PutObject");
        Ok(())
    }

    /// Reads the contract's `key`. A missing key is an error.
    pub fn get_object(&self, ctx_id: ContextId, key: &[u8]) -> Result<Vec<u8>, BridgeError> {
        let ctx = self.context(ctx_id)?;
        let composite = object_key(ctx.contract_name(), key);
        self.store
            .get(&composite)?
            .ok_or_else(|| BridgeError::ObjectNotFound(String::from_utf8_lossy(&composite).into()))
    }

    /// Deletes the contract's `key`. A missing key is not an error.
    pub fn delete_object(&self, ctx_id: ContextId, key: &[u8]) -> Result<(), BridgeError> {
        let ctx = self.context(ctx_id)?;
        self.store.delete(&object_key(ctx.contract_name(), key))?;
        Ok(())
    }

    /// Method, caller and args (ascending by key) of the current call.
    pub fn get_call_args(&self, ctx_id: ContextId) -> Result<CallArgs, BridgeError> {
        Ok(self.context(ctx_id)?.call_args())
    }

    /// Records the call output, overwriting any earlier one.
    pub fn set_output(&self, ctx_id: ContextId, response: Response) -> Result<(), BridgeError> {
        let ctx = self.context(ctx_id)?;
        debug!(ctx = %ctx_id, status = response.status, "SetOutput");
        ctx.set_output(response);
        Ok(())
    }

    /// Reserved. Validates the context and does nothing else.
    pub fn transfer(
        &self,
        ctx_id: ContextId,
        _from: &str,
        _to: &str,
        _amount: &str,
    ) -> Result<(), BridgeError> {
        self.context(ctx_id).map(|_| ())
    }

    /// Invokes another contract with the calling contract as caller.
    pub fn contract_call(
        &self,
        ctx_id: ContextId,
        module: &str,
        contract: &str,
        method: &str,
        args: Vec<ArgPair>,
    ) -> Result<Response, BridgeError> {
        let ctx = self.context(ctx_id)?;
        if module != CONTRACT_CALL_MODULE {
            return Err(BridgeError::UnsupportedModule(module.to_string()));
        }
        let invoker = self
            .invoker
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| BridgeError::Engine("contract calls are not available".into()))?;
        let args: HashMap<String, Vec<u8>> =
            args.into_iter().map(|pair| (pair.key, pair.value)).collect();
        debug!(ctx = %ctx_id, callee = contract, method, "ContractCall");
        invoker.invoke_nested(&ctx, contract, method, args)
    }
}

impl SyscallHandler for SyscallDispatcher {
    fn dispatch(
        &self,
        ctx_id: ContextId,
        request: SyscallRequest,
    ) -> Result<SyscallResponse, BridgeError> {
        match request {
            SyscallRequest::PutObject { key, value } => self
                .put_object(ctx_id, &key, value.as_deref())
                .map(|()| SyscallResponse::Empty),
            SyscallRequest::GetObject { key } => {
                self.get_object(ctx_id, &key).map(SyscallResponse::Value)
            }
            SyscallRequest::DeleteObject { key } => self
                .delete_object(ctx_id, &key)
                .map(|()| SyscallResponse::Empty),
            SyscallRequest::GetCallArgs => {
                self.get_call_args(ctx_id).map(SyscallResponse::CallArgs)
            }
            SyscallRequest::SetOutput { response } => self
                .set_output(ctx_id, response)
                .map(|()| SyscallResponse::Empty),
            SyscallRequest::Transfer { from, to, amount } => self
                .transfer(ctx_id, &from, &to, &amount)
                .map(|()| SyscallResponse::Empty),
            SyscallRequest::ContractCall {
                module,
                contract,
                method,
                args,
            } => self
                .contract_call(ctx_id, &module, &contract, &method, args)
                .map(SyscallResponse::Response),
        }
    }
}
