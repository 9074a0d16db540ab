//! # Host Symbol Resolution
//!
//! Resolvers for imports of contract code. The interpreter backend links
//! every module against `MultiResolver[GoRuntimeResolver, SyscallResolver]`.

use crate::domain::messages::SyscallKind;
use crate::ports::inbound::SyscallHandler;
use crate::ports::outbound::{
    HostFunc, Resolver, RuntimeFunc, SyscallBinding, GO_RUNTIME_MODULE, SYSCALL_MODULE,
};
use std::sync::Arc;

/// Chains resolvers; the first one that knows a symbol wins.
#[derive(Default)]
pub struct MultiResolver {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl MultiResolver {
    /// Chains `resolvers` in lookup order.
    #[must_use]
    pub fn new(resolvers: Vec<Arc<dyn Resolver>>) -> Self {
        Self { resolvers }
    }
}

impl Resolver for MultiResolver {
    fn resolve_func(&self, module: &str, name: &str) -> Option<HostFunc> {
        self.resolvers
            .iter()
            .find_map(|r| r.resolve_func(module, name))
    }

    fn resolve_global(&self, module: &str, name: &str) -> Option<i64> {
        self.resolvers
            .iter()
            .find_map(|r| r.resolve_global(module, name))
    }
}

/// Resolves `env.<Syscall>` imports to dispatcher bindings.
pub struct SyscallResolver {
    handler: Arc<dyn SyscallHandler>,
}

impl SyscallResolver {
    /// Resolver whose bindings call into `handler`.
    pub fn new(handler: Arc<dyn SyscallHandler>) -> Self {
        Self { handler }
    }
}

impl Resolver for SyscallResolver {
    fn resolve_func(&self, module: &str, name: &str) -> Option<HostFunc> {
        if module != SYSCALL_MODULE {
            return None;
        }
        let kind = SyscallKind::from_name(name)?;
        Some(HostFunc::Syscall(SyscallBinding::new(
            kind,
            Arc::clone(&self.handler),
        )))
    }
}

/// Resolves the Go runtime support imports (`go.runtime.*`, `go.debug`).
#[derive(Clone, Copy, Debug, Default)]
pub struct GoRuntimeResolver;

impl Resolver for GoRuntimeResolver {
    fn resolve_func(&self, module: &str, name: &str) -> Option<HostFunc> {
        if module != GO_RUNTIME_MODULE {
            return None;
        }
        RuntimeFunc::from_name(name).map(HostFunc::Runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::ContextId;
    use crate::domain::messages::{SyscallRequest, SyscallResponse};
    use crate::domain::trap::TrapKind;
    use crate::errors::{BridgeError, EngineError};

    struct EchoHandler;

    impl SyscallHandler for EchoHandler {
        fn dispatch(
            &self,
            ctx_id: ContextId,
            _request: SyscallRequest,
        ) -> Result<SyscallResponse, BridgeError> {
            Ok(SyscallResponse::Value(ctx_id.0.to_le_bytes().to_vec()))
        }
    }

    struct ConstGlobals;

    impl Resolver for ConstGlobals {
        fn resolve_func(&self, _module: &str, _name: &str) -> Option<HostFunc> {
            None
        }
        fn resolve_global(&self, module: &str, name: &str) -> Option<i64> {
            (module == "env" && name == "STACKTOP").then_some(1024)
        }
    }

    fn chain() -> MultiResolver {
        MultiResolver::new(vec![
            Arc::new(GoRuntimeResolver),
            Arc::new(SyscallResolver::new(Arc::new(EchoHandler))),
            Arc::new(ConstGlobals),
        ])
    }

    #[test]
    fn test_chain_resolves_both_families() {
        let resolver = chain();
        assert!(matches!(
            resolver.resolve_func("go", "runtime.wasmExit"),
            Some(HostFunc::Runtime(RuntimeFunc::WasmExit))
        ));
        let Some(HostFunc::Syscall(binding)) = resolver.resolve_func("env", "PutObject") else {
            panic!("PutObject should resolve");
        };
        assert_eq!(binding.kind(), SyscallKind::PutObject);
        assert_eq!(resolver.resolve_global("env", "STACKTOP"), Some(1024));
    }

    #[test]
    fn test_unknown_symbols_unresolved() {
        let resolver = chain();
        assert!(resolver.resolve_func("env", "Unknown").is_none());
        assert!(resolver.resolve_func("go", "PutObject").is_none());
        assert!(resolver.resolve_func("wasi", "fd_write").is_none());
        assert!(resolver.resolve_global("env", "memoryBase").is_none());
    }

    #[test]
    fn test_binding_rejects_mismatched_request() {
        let resolver = chain();
        let Some(HostFunc::Syscall(binding)) = resolver.resolve_func("env", "GetObject") else {
            panic!("GetObject should resolve");
        };
        assert!(binding
            .call(ContextId(3), SyscallRequest::GetObject { key: vec![] })
            .is_ok());

        let err = binding
            .call(ContextId(3), SyscallRequest::GetCallArgs)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Trap(trap) if matches!(trap.kind(), TrapKind::SignatureMismatch { .. })
        ));
    }
}
