//! # Execution Orchestrator
//!
//! [`VmManager`] drives deploy and invoke requests end to end:
//!
//! 1. Validate the request and decode its `args` JSON
//! 2. (deploy) Persist bytecode and language tag
//! 3. Create a context, get an instance from the backend, run the entry
//! 4. Release the instance and destroy the context, always
//! 5. Turn the output and resource usage into a [`CallOutcome`]
//!
//! Failures whose class is infrastructure or trap evict the contract's
//! cached code. Validation, contract and not-found errors leave it alone.

use crate::config::BridgeConfig;
use crate::domain::context::{ContextId, ContextInit, ContextRegistry, ExecutionContext};
use crate::domain::keys::{contract_code_key, contract_desc_key, validate_contract_name, INIT_METHOD};
use crate::domain::messages::Response;
use crate::domain::trap::{Trap, TrapKind};
use crate::errors::BridgeError;
use crate::ports::inbound::{CallOutcome, ContractApi, ContractInvoker};
use crate::ports::outbound::{AbortSignal, CodeLoad, ContextConfig, ContractStore, InstanceCreator};
use crate::service::registry::VmRegistry;
use crate::service::syscall::SyscallDispatcher;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, instrument, warn};

/// Statistics for the bridge.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceStats {
    /// Deploy requests that reached execution.
    pub deploys: u64,
    /// Invocations, nested calls included.
    pub invocations: u64,
    /// Calls that produced an outcome.
    pub successes: u64,
    /// Calls that failed after validation.
    pub failures: u64,
    /// Code cache evictions.
    pub evictions: u64,
    /// Gas charged for calls that ran to completion, failing responses included.
    pub total_gas: u64,
}

/// A validated deploy or invoke request.
#[derive(Debug)]
struct CallRequest {
    contract_name: String,
    code: Option<Vec<u8>>,
    language: String,
    args: HashMap<String, Vec<u8>>,
    caller: String,
}

/// Argument value: UTF-8 text or raw bytes.
#[derive(Deserialize)]
#[serde(untagged)]
enum ArgValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<ArgValue> for Vec<u8> {
    fn from(value: ArgValue) -> Self {
        match value {
            ArgValue::Text(text) => text.into_bytes(),
            ArgValue::Bytes(bytes) => bytes,
        }
    }
}

fn required<'a>(
    args: &'a HashMap<String, Vec<u8>>,
    field: &'static str,
) -> Result<&'a [u8], BridgeError> {
    args.get(field)
        .map(Vec::as_slice)
        .ok_or(BridgeError::MissingField(field))
}

fn required_text(args: &HashMap<String, Vec<u8>>, field: &'static str) -> Result<String, BridgeError> {
    String::from_utf8(required(args, field)?.to_vec())
        .map_err(|_| BridgeError::MalformedArgs(format!("{field} is not valid UTF-8")))
}

/// Decodes the `args` JSON object.
fn decode_args(raw: &[u8]) -> Result<HashMap<String, Vec<u8>>, BridgeError> {
    let values: HashMap<String, ArgValue> =
        serde_json::from_slice(raw).map_err(|e| BridgeError::MalformedArgs(e.to_string()))?;
    Ok(values.into_iter().map(|(k, v)| (k, v.into())).collect())
}

impl CallRequest {
    fn parse(args: &HashMap<String, Vec<u8>>, with_code: bool) -> Result<Self, BridgeError> {
        let contract_name = String::from_utf8(required(args, "contract_name")?.to_vec())
            .map_err(|e| BridgeError::InvalidContractName(String::from_utf8_lossy(e.as_bytes()).into()))?;
        validate_contract_name(&contract_name)?;
        let code = if with_code {
            Some(required(args, "contract_code")?.to_vec())
        } else {
            None
        };
        let language = required_text(args, "language")?;
        let call_args = decode_args(required(args, "args")?)?;
        let caller = required_text(args, "caller")?;
        Ok(Self {
            contract_name,
            code,
            language,
            args: call_args,
            caller,
        })
    }
}

/// Deploys and invokes contracts on one backend.
pub struct VmManager {
    config: BridgeConfig,
    store: Arc<dyn ContractStore>,
    contexts: Arc<ContextRegistry>,
    backend: Box<dyn InstanceCreator>,
    running: Mutex<HashMap<ContextId, (String, AbortSignal)>>,
    stats: RwLock<ServiceStats>,
}

impl VmManager {
    /// Opens `config.backend` from `registry` over `store`.
    pub fn new(
        config: BridgeConfig,
        registry: &VmRegistry,
        store: Arc<dyn ContractStore>,
    ) -> Result<Arc<Self>, BridgeError> {
        config.validate()?;
        let contexts = Arc::new(ContextRegistry::new());
        let dispatcher = Arc::new(SyscallDispatcher::new(
            Arc::clone(&contexts),
            Arc::clone(&store),
        ));
        let backend = registry.open(
            &config.backend,
            dispatcher.clone(),
            Arc::clone(&store),
            ContextConfig {
                gas_limit: config.gas_limit,
            },
        )?;
        info!(backend = %config.backend, gas_limit = config.gas_limit, "Opened bridge backend");

        let manager = Arc::new(Self {
            config,
            store,
            contexts,
            backend,
            running: Mutex::new(HashMap::new()),
            stats: RwLock::new(ServiceStats::default()),
        });
        let invoker: Weak<VmManager> = Arc::downgrade(&manager);
        dispatcher.set_invoker(invoker);
        Ok(manager)
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> ServiceStats {
        self.stats.read().clone()
    }

    /// Language tag recorded when `name` was deployed.
    pub fn contract_language(&self, name: &str) -> Result<String, BridgeError> {
        let tag = self
            .store
            .get(&contract_desc_key(name))?
            .ok_or_else(|| BridgeError::MissingCode(name.to_string()))?;
        String::from_utf8(tag).map_err(|e| BridgeError::UnsupportedLanguage(e.to_string()))
    }

    /// True if compiled code for `name` is cached.
    #[must_use]
    pub fn is_cached(&self, name: &str) -> bool {
        self.backend.is_cached(name)
    }

    /// Number of calls in flight.
    #[must_use]
    pub fn live_contexts(&self) -> usize {
        self.contexts.len()
    }

    /// Aborts every in-flight call of `contract`. Returns how many were signalled.
    pub fn abort_contract(&self, contract: &str, message: &str) -> usize {
        let running = self.running.lock();
        let mut count = 0;
        for (name, signal) in running.values() {
            if name == contract {
                signal.raise(message);
                count += 1;
            }
        }
        if count > 0 {
            warn!(contract, count, reason = message, "Aborting running calls");
        }
        count
    }

    #[instrument(skip(self, request), fields(contract = %request.contract_name))]
    fn deploy(&self, request: CallRequest) -> Result<CallOutcome, BridgeError> {
        let name = request.contract_name.clone();
        self.stats.write().deploys += 1;
        let result = self.deploy_inner(request);
        self.finish(&name, INIT_METHOD, result)
    }

    fn deploy_inner(&self, request: CallRequest) -> Result<CallOutcome, BridgeError> {
        let code = request.code.unwrap_or_default();
        self.store
            .put(&contract_code_key(&request.contract_name), &code)?;
        self.store.put(
            &contract_desc_key(&request.contract_name),
            request.language.as_bytes(),
        )?;
        debug!(bytes = code.len(), language = %request.language, "Stored contract code");

        self.run(
            ContextInit {
                contract_name: request.contract_name,
                method: INIT_METHOD.to_string(),
                args: request.args,
                language: request.language,
                caller: request.caller,
                depth: 0,
            },
            CodeLoad::Compile,
        )
    }

    #[instrument(skip(self, init), fields(contract = %init.contract_name, depth = init.depth))]
    fn invoke(&self, init: ContextInit) -> Result<CallOutcome, BridgeError> {
        let name = init.contract_name.clone();
        let method = init.method.clone();
        self.stats.write().invocations += 1;
        let result = self.run(init, CodeLoad::Reuse);
        self.finish(&name, &method, result)
    }

    /// Records the result and evicts cached code on non-domain failures.
    fn finish(
        &self,
        contract: &str,
        method: &str,
        result: Result<CallOutcome, BridgeError>,
    ) -> Result<CallOutcome, BridgeError> {
        let mut stats = self.stats.write();
        match &result {
            Ok(outcome) => {
                stats.successes += 1;
                stats.total_gas = stats.total_gas.saturating_add(outcome.gas);
                info!(method, gas = outcome.gas, status = outcome.response.status, "Contract call succeeded");
            }
            Err(e) => {
                stats.failures += 1;
                stats.total_gas = stats.total_gas.saturating_add(e.billed_gas());
                if e.evicts_code() {
                    stats.evictions += 1;
                    self.backend.evict(contract);
                    warn!(method, error = %e, "Evicted contract code after failure");
                }
                error!(method, error = %e, "call contract error");
            }
        }
        result
    }

    /// Runs one call in a fresh context. The context never outlives the call.
    fn run(&self, init: ContextInit, load: CodeLoad) -> Result<CallOutcome, BridgeError> {
        let ctx = self.contexts.create(init);
        let result = self.run_in_context(&ctx, load);
        self.running.lock().remove(&ctx.id());
        self.contexts.destroy(ctx.id());
        result
    }

    fn run_in_context(
        &self,
        ctx: &Arc<ExecutionContext>,
        load: CodeLoad,
    ) -> Result<CallOutcome, BridgeError> {
        let mut instance = self.backend.create_instance(ctx, load)?;
        self.running.lock().insert(
            ctx.id(),
            (ctx.contract_name().to_string(), instance.abort_signal()),
        );

        let executed = instance.entry_point().and_then(|entry| instance.exec(&entry));
        let mut used = instance.resource_used();
        instance.release();
        executed?;

        used.add(&ctx.nested_usage());
        if used.exceed(&self.config.max_limits) {
            return Err(Trap::new(TrapKind::GasExhausted).into());
        }
        let response = ctx.take_output().ok_or_else(|| BridgeError::MissingOutput {
            contract: ctx.contract_name().to_string(),
        })?;
        let outcome = CallOutcome::new(response, used, &self.config.rates);
        if outcome.response.is_error() {
            return Err(BridgeError::contract(
                outcome.response,
                outcome.resources,
                outcome.gas,
            ));
        }
        Ok(outcome)
    }
}

impl ContractApi for VmManager {
    fn deploy_contract(&self, args: &HashMap<String, Vec<u8>>) -> Result<CallOutcome, BridgeError> {
        let request = CallRequest::parse(args, true)?;
        self.deploy(request)
    }

    fn invoke_contract(
        &self,
        method: &str,
        args: &HashMap<String, Vec<u8>>,
    ) -> Result<CallOutcome, BridgeError> {
        let request = CallRequest::parse(args, false)?;
        self.invoke(ContextInit {
            contract_name: request.contract_name,
            method: method.to_string(),
            args: request.args,
            language: request.language,
            caller: request.caller,
            depth: 0,
        })
    }
}

impl ContractInvoker for VmManager {
    fn invoke_nested(
        &self,
        caller_ctx: &ExecutionContext,
        contract: &str,
        method: &str,
        args: HashMap<String, Vec<u8>>,
    ) -> Result<Response, BridgeError> {
        let depth = caller_ctx.depth() + 1;
        if depth > self.config.max_call_depth {
            return Err(BridgeError::CallDepthExceeded {
                depth,
                max: self.config.max_call_depth,
            });
        }
        validate_contract_name(contract)?;
        let language = self.contract_language(contract)?;

        let result = self.invoke(ContextInit {
            contract_name: contract.to_string(),
            method: method.to_string(),
            args,
            language,
            caller: caller_ctx.contract_name().to_string(),
            depth,
        });
        match result {
            Ok(outcome) => {
                caller_ctx.add_nested_usage(&outcome.resources);
                Ok(outcome.response)
            }
            Err(BridgeError::Contract {
                status,
                message,
                body,
                resources,
                ..
            }) => {
                caller_ctx.add_nested_usage(&resources);
                Ok(Response {
                    status,
                    message,
                    body,
                })
            }
            Err(e) => Err(e),
        }
    }
}
