//! Shared fixtures for the bridge integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use wasm_bridge::prelude::*;

/// Routes bridge logs to the test output. Set `RUST_LOG=wasm_bridge=debug`
/// to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory store counting reads of contract code keys. Writes of contract
/// data objects can be made to fail.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryStore,
    code_reads: AtomicUsize,
    fail_object_writes: AtomicBool,
}

fn is_bridge_key(key: &[u8]) -> bool {
    key.first() == Some(&0)
}

impl CountingStore {
    pub fn code_reads(&self) -> usize {
        self.code_reads.load(Ordering::SeqCst)
    }

    /// Makes every later write of a contract data object fail with an I/O error.
    pub fn fail_object_writes(&self, fail: bool) {
        self.fail_object_writes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

impl ContractStore for CountingStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if key.starts_with(b"\0code\0") {
            self.code_reads.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        if !is_bridge_key(key) && self.fail_object_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io("disk full".to_string()));
        }
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.inner.delete(key)
    }
}

pub struct Bridge {
    pub manager: Arc<VmManager>,
    pub engine: Arc<ScriptedEngine>,
    pub store: Arc<CountingStore>,
}

pub fn bridge() -> Bridge {
    bridge_with(BridgeConfig::default())
}

pub fn bridge_with(config: BridgeConfig) -> Bridge {
    init_tracing();
    let engine = Arc::new(ScriptedEngine::new());
    let registry = VmRegistry::new();
    registry.register_interpreter(&config.backend, Arc::clone(&engine));
    let store = Arc::new(CountingStore::default());
    let manager = VmManager::new(config, &registry, store.clone()).unwrap();
    Bridge {
        manager,
        engine,
        store,
    }
}

pub fn request(name: &str, language: &str, args: &Value, caller: &str) -> HashMap<String, Vec<u8>> {
    let mut request = HashMap::new();
    request.insert("contract_name".to_string(), name.as_bytes().to_vec());
    request.insert("language".to_string(), language.as_bytes().to_vec());
    request.insert("args".to_string(), args.to_string().into_bytes());
    request.insert("caller".to_string(), caller.as_bytes().to_vec());
    request
}

pub fn deploy_request(
    name: &str,
    program: &Value,
    language: &str,
    args: &Value,
    caller: &str,
) -> HashMap<String, Vec<u8>> {
    let mut request = request(name, language, args, caller);
    request.insert(
        "contract_code".to_string(),
        program.to_string().into_bytes(),
    );
    request
}

/// Token contract: `initialize`, `balanceOf`, `transfer`, plus a few
/// misbehaving methods.
pub fn erc20_program() -> Value {
    json!({"exports": {"run": [
        {"op": "get_call_args"},
        {"op": "branch", "on": "${method}", "cases": {
            "initialize": [
                {"op": "put", "key": "totalSupply", "value": "${arg.initSupply}"},
                {"op": "put", "key": "balanceOf_${caller}", "value": "${arg.initSupply}"},
                {"op": "output", "body": "${arg.initSupply}"}
            ],
            "balanceOf": [
                {"op": "get", "key": "balanceOf_${arg.caller}", "into": "balance", "default": "0"},
                {"op": "output", "body": "${balance}"}
            ],
            "transfer": [
                {"op": "get", "key": "balanceOf_${caller}", "into": "from", "default": "0"},
                {"op": "require_ge", "lhs": "${from}", "rhs": "${arg.amount}",
                 "status": 403, "message": "balance not enough"},
                {"op": "sub", "into": "from", "lhs": "${from}", "rhs": "${arg.amount}"},
                {"op": "get", "key": "balanceOf_${arg.to}", "into": "to", "default": "0"},
                {"op": "add", "into": "to", "lhs": "${to}", "rhs": "${arg.amount}"},
                {"op": "put", "key": "balanceOf_${caller}", "value": "${from}"},
                {"op": "put", "key": "balanceOf_${arg.to}", "value": "${to}"},
                {"op": "output", "body": "ok"}
            ],
            "silent": [],
            "divide": [{"op": "trap", "kind": "divide_by_zero"}],
            "putNil": [{"op": "put_nil", "key": "broken"}],
            "lookup": [{"op": "get", "key": "missing", "into": "v"}],
            "spin": [{"op": "spin", "millis": 10000}, {"op": "output", "body": "done"}]
        }}
    ]}})
}

/// Deploys `erc20` with 1000000 tokens for alice.
pub fn deploy_erc20(bridge: &Bridge) -> CallOutcome {
    bridge
        .manager
        .deploy_contract(&deploy_request(
            "erc20",
            &erc20_program(),
            "go",
            &json!({"initSupply": "1000000"}),
            "alice",
        ))
        .unwrap()
}

pub fn invoke_erc20(bridge: &Bridge, method: &str, args: &Value) -> Result<CallOutcome, BridgeError> {
    bridge
        .manager
        .invoke_contract(method, &request("erc20", "go", args, "alice"))
}
