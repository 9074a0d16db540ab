//! # Bridge Integration Tests
//!
//! Deploy and invoke contracts end to end through `VmManager`, the
//! interpreter backend and the scripted engine.
//!
//! ## Test Categories
//!
//! 1. **Lifecycle** - deploy, invoke, code reuse, statistics
//! 2. **Failure Classes** - which failures evict cached code
//! 3. **Cross-Contract Calls** - caller identity, usage, depth limit
//! 4. **Storage Layout** - keys as seen by the physical store

mod common;

use common::*;
use serde_json::json;
use wasm_bridge::adapters::prefixed_key;
use wasm_bridge::prelude::*;

// =============================================================================
// LIFECYCLE
// =============================================================================

#[test]
fn test_erc20_deploy_then_invoke_reuses_code() {
    let bridge = bridge();

    let outcome = deploy_erc20(&bridge);
    assert_eq!(outcome.response.status, STATUS_OK);
    assert_eq!(outcome.response.body, b"1000000");
    assert_eq!(outcome.resources.cpu, 500);
    assert_eq!(outcome.resources.memory, 65536);
    assert_eq!(outcome.gas(), 2);
    assert_eq!(bridge.engine.compile_count(), 1);
    assert_eq!(bridge.store.code_reads(), 1);

    let outcome = invoke_erc20(&bridge, "balanceOf", &json!({"caller": "alice"})).unwrap();
    assert_eq!(outcome.response.body, b"1000000");
    assert_eq!(bridge.engine.compile_count(), 1);
    assert_eq!(bridge.store.code_reads(), 1);

    assert_eq!(bridge.manager.contract_language("erc20").unwrap(), "go");
    assert_eq!(bridge.manager.live_contexts(), 0);
}

#[test]
fn test_transfer_updates_balances() {
    let bridge = bridge();
    deploy_erc20(&bridge);

    let outcome = invoke_erc20(&bridge, "transfer", &json!({"to": "bob", "amount": "100"})).unwrap();
    assert_eq!(outcome.response.body, b"ok");

    let bob = invoke_erc20(&bridge, "balanceOf", &json!({"caller": "bob"})).unwrap();
    assert_eq!(bob.response.body, b"100");
    let alice = invoke_erc20(&bridge, "balanceOf", &json!({"caller": "alice"})).unwrap();
    assert_eq!(alice.response.body, b"999900");
}

#[test]
fn test_stats_track_calls() {
    let bridge = bridge();
    deploy_erc20(&bridge);
    invoke_erc20(&bridge, "balanceOf", &json!({"caller": "alice"})).unwrap();
    invoke_erc20(&bridge, "divide", &json!({})).unwrap_err();

    let stats = bridge.manager.stats();
    assert_eq!(stats.deploys, 1);
    assert_eq!(stats.invocations, 2);
    assert_eq!(stats.successes, 2);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.total_gas, 4);
}

#[test]
fn test_validation_touches_nothing() {
    let bridge = bridge();

    let mut request = deploy_request("erc20", &erc20_program(), "go", &json!({}), "alice");
    request.remove("caller");
    let err = bridge.manager.deploy_contract(&request).unwrap_err();
    assert!(matches!(err, BridgeError::MissingField("caller")));
    assert_eq!(err.class(), ErrorClass::Validation);

    let request = deploy_request("erc20", &erc20_program(), "go", &json!([1]), "alice");
    assert!(matches!(
        bridge.manager.deploy_contract(&request),
        Err(BridgeError::MalformedArgs(_))
    ));

    let request = deploy_request("9lives", &erc20_program(), "go", &json!({}), "alice");
    assert!(matches!(
        bridge.manager.deploy_contract(&request),
        Err(BridgeError::InvalidContractName(_))
    ));

    assert!(bridge.store.inner().is_empty());
    assert_eq!(bridge.engine.compile_count(), 0);
    assert_eq!(bridge.manager.stats().deploys, 0);
}

// =============================================================================
// FAILURE CLASSES
// =============================================================================

#[test]
fn test_contract_error_keeps_code() {
    let bridge = bridge();
    deploy_erc20(&bridge);

    let err = invoke_erc20(&bridge, "transfer", &json!({"to": "bob", "amount": "2000000"}))
        .unwrap_err();
    assert!(matches!(
        &err,
        BridgeError::Contract { status: 403, message, .. } if message == "balance not enough"
    ));
    assert_eq!(err.status(), 403);
    assert!(bridge.manager.is_cached("erc20"));

    invoke_erc20(&bridge, "balanceOf", &json!({"caller": "alice"})).unwrap();
    assert_eq!(bridge.engine.compile_count(), 1);
}

#[test]
fn test_contract_error_is_billed() {
    let bridge = bridge();
    deploy_erc20(&bridge);
    let before = bridge.manager.stats().total_gas;

    let err = invoke_erc20(&bridge, "transfer", &json!({"to": "bob", "amount": "2000000"}))
        .unwrap_err();
    let BridgeError::Contract { resources, gas, .. } = &err else {
        panic!("expected contract error, got {err:?}");
    };
    assert!(resources.cpu > 0);
    assert_eq!(resources.memory, 65536);
    assert!(*gas > 0);
    assert_eq!(err.billed_gas(), *gas);
    assert_eq!(bridge.manager.stats().total_gas, before + gas);
}

#[test]
fn test_failed_initialize_keeps_code() {
    let bridge = bridge();
    let program = json!({"exports": {"run": [
        {"op": "get_call_args"},
        {"op": "branch", "on": "${method}", "cases": {
            "initialize": [{"op": "output", "status": 403, "message": "not yet"}],
            "ping": [{"op": "output", "body": "pong"}]
        }}
    ]}});

    let err = bridge
        .manager
        .deploy_contract(&deploy_request("pinger", &program, "go", &json!({}), "alice"))
        .unwrap_err();
    assert!(matches!(&err, BridgeError::Contract { status: 403, .. }));
    assert!(bridge.manager.is_cached("pinger"));

    let outcome = bridge
        .manager
        .invoke_contract("ping", &request("pinger", "go", &json!({}), "alice"))
        .unwrap();
    assert_eq!(outcome.response.body, b"pong");
    assert_eq!(bridge.engine.compile_count(), 1);
    assert_eq!(bridge.store.code_reads(), 1);
}

#[test]
fn test_store_failure_evicts_code() {
    let bridge = bridge();
    deploy_erc20(&bridge);
    bridge.store.fail_object_writes(true);

    let err = invoke_erc20(&bridge, "transfer", &json!({"to": "bob", "amount": "100"}))
        .unwrap_err();
    assert!(matches!(&err, BridgeError::Storage(StoreError::Io(_))));
    assert_eq!(err.class(), ErrorClass::Infrastructure);
    assert!(!bridge.manager.is_cached("erc20"));
    assert_eq!(bridge.manager.live_contexts(), 0);

    bridge.store.fail_object_writes(false);
    invoke_erc20(&bridge, "balanceOf", &json!({"caller": "alice"})).unwrap();
    assert_eq!(bridge.engine.compile_count(), 2);
}

#[test]
fn test_store_failure_during_deploy_evicts_code() {
    let bridge = bridge();
    bridge.store.fail_object_writes(true);

    let request = deploy_request(
        "erc20",
        &erc20_program(),
        "go",
        &json!({"initSupply": "10"}),
        "alice",
    );
    let err = bridge.manager.deploy_contract(&request).unwrap_err();
    assert!(matches!(err, BridgeError::Storage(_)));
    assert!(!bridge.manager.is_cached("erc20"));
    assert_eq!(bridge.engine.compile_count(), 1);
}

#[test]
fn test_missing_output_is_internal_error() {
    let bridge = bridge();
    deploy_erc20(&bridge);

    let err = invoke_erc20(&bridge, "silent", &json!({})).unwrap_err();
    assert!(matches!(err, BridgeError::MissingOutput { .. }));
    assert_eq!(err.status(), 500);
    assert!(bridge.manager.is_cached("erc20"));
}

#[test]
fn test_trap_evicts_code() {
    let bridge = bridge();
    deploy_erc20(&bridge);

    let err = invoke_erc20(&bridge, "divide", &json!({})).unwrap_err();
    assert_eq!(err.to_string(), "trap error: integer divide by zero");
    assert_eq!(err.class(), ErrorClass::Trap);
    assert!(!bridge.manager.is_cached("erc20"));
    assert_eq!(bridge.engine.release_count(), 1);

    invoke_erc20(&bridge, "balanceOf", &json!({"caller": "alice"})).unwrap();
    assert_eq!(bridge.engine.compile_count(), 2);
    assert_eq!(bridge.store.code_reads(), 2);
}

#[test]
fn test_infrastructure_failure_evicts_code() {
    let bridge = bridge();
    deploy_erc20(&bridge);

    let err = invoke_erc20(&bridge, "putNil", &json!({})).unwrap_err();
    assert!(matches!(err, BridgeError::NilValue { .. }));
    assert!(!bridge.manager.is_cached("erc20"));
    assert!(!bridge.store.inner().has(&object_key("erc20", b"broken")).unwrap());
}

#[test]
fn test_missing_object_is_not_found() {
    let bridge = bridge();
    deploy_erc20(&bridge);

    let err = invoke_erc20(&bridge, "lookup", &json!({})).unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert!(bridge.manager.is_cached("erc20"));
}

#[test]
fn test_redeploy_of_cached_contract_is_stale() {
    let bridge = bridge();
    deploy_erc20(&bridge);

    let request = deploy_request(
        "erc20",
        &erc20_program(),
        "go",
        &json!({"initSupply": "5"}),
        "alice",
    );
    let err = bridge.manager.deploy_contract(&request).unwrap_err();
    assert!(matches!(err, BridgeError::StaleCode(_)));
    assert!(!bridge.manager.is_cached("erc20"));

    let outcome = bridge.manager.deploy_contract(&request).unwrap();
    assert_eq!(outcome.response.body, b"5");
    assert_eq!(bridge.engine.compile_count(), 2);
}

#[test]
fn test_unsupported_language_fails_before_exec() {
    let bridge = bridge();
    let request = deploy_request("erc20", &erc20_program(), "rust", &json!({}), "alice");

    let err = bridge.manager.deploy_contract(&request).unwrap_err();
    assert!(matches!(&err, BridgeError::UnsupportedLanguage(tag) if tag == "rust"));
    assert!(!bridge.manager.is_cached("erc20"));
    assert!(!bridge.store.inner().has(&object_key("erc20", b"totalSupply")).unwrap());
}

#[test]
fn test_unknown_backend() {
    let registry = VmRegistry::new();
    let config = BridgeConfig {
        backend: "wasmer".to_string(),
        ..BridgeConfig::default()
    };
    let result = VmManager::new(config, &registry, Arc::new(InMemoryStore::new()));
    assert!(matches!(result, Err(BridgeError::BackendNotFound(name)) if name == "wasmer"));
}

#[test]
fn test_engine_gas_limit_traps() {
    let bridge = bridge_with(BridgeConfig {
        gas_limit: 300,
        ..BridgeConfig::default()
    });
    let request = deploy_request(
        "erc20",
        &erc20_program(),
        "go",
        &json!({"initSupply": "1"}),
        "alice",
    );

    let err = bridge.manager.deploy_contract(&request).unwrap_err();
    assert_eq!(err.as_trap().map(Trap::kind), Some(&TrapKind::GasExhausted));
    assert!(!bridge.manager.is_cached("erc20"));
}

#[test]
fn test_usage_above_max_limits_traps() {
    let bridge = bridge_with(BridgeConfig {
        max_limits: ResourceLimits::new(450, ResourceLimits::MAX.memory, 0, 0),
        ..BridgeConfig::default()
    });
    let request = deploy_request(
        "erc20",
        &erc20_program(),
        "go",
        &json!({"initSupply": "1"}),
        "alice",
    );

    // Initialize costs 500 cpu
    let err = bridge.manager.deploy_contract(&request).unwrap_err();
    assert_eq!(err.as_trap().map(Trap::kind), Some(&TrapKind::GasExhausted));
}

// =============================================================================
// CROSS-CONTRACT CALLS
// =============================================================================

fn bank_program() -> serde_json::Value {
    json!({"exports": {"run": [
        {"op": "get_call_args"},
        {"op": "branch", "on": "${method}", "cases": {
            "initialize": [{"op": "output", "body": "ready"}],
            "check": [
                {"op": "call", "contract": "erc20", "method": "balanceOf",
                 "args": {"caller": "${arg.who}"}, "into": "balance"},
                {"op": "output", "body": "${balance}"}
            ],
            "pay": [
                {"op": "call", "contract": "erc20", "method": "transfer",
                 "args": {"to": "${arg.to}", "amount": "1"}, "into": "paid"},
                {"op": "output", "body": "${paid.status}"}
            ],
            "legacy": [
                {"op": "call", "module": "evm", "contract": "erc20", "method": "balanceOf"}
            ]
        }}
    ]}})
}

fn deploy_bank(bridge: &Bridge) {
    bridge
        .manager
        .deploy_contract(&deploy_request("bank", &bank_program(), "go", &json!({}), "alice"))
        .unwrap();
}

#[test]
fn test_nested_call_reads_callee_state() {
    let bridge = bridge();
    deploy_erc20(&bridge);
    deploy_bank(&bridge);

    let outcome = bridge
        .manager
        .invoke_contract("check", &request("bank", "go", &json!({"who": "alice"}), "carol"))
        .unwrap();
    assert_eq!(outcome.response.body, b"1000000");
    // 400 own + 400 for erc20.balanceOf
    assert_eq!(outcome.resources.cpu, 800);
    assert_eq!(outcome.resources.memory, 2 * 65536);
    assert_eq!(bridge.manager.stats().invocations, 2);
    assert_eq!(bridge.manager.live_contexts(), 0);
}

#[test]
fn test_nested_contract_error_is_returned_to_caller() {
    let bridge = bridge();
    deploy_erc20(&bridge);
    deploy_bank(&bridge);

    // The callee sees "bank" as caller, which holds no tokens.
    let outcome = bridge
        .manager
        .invoke_contract("pay", &request("bank", "go", &json!({"to": "dave"}), "alice"))
        .unwrap();
    assert_eq!(outcome.response.body, b"403");
    // The failed transfer is billed to bank: 400 own + the callee's work
    assert!(outcome.resources.cpu > 400);
    assert_eq!(outcome.resources.memory, 2 * 65536);
    assert!(bridge.manager.is_cached("erc20"));
    assert!(!bridge.store.inner().has(&object_key("erc20", b"balanceOf_dave")).unwrap());
}

#[test]
fn test_nested_call_module_must_be_wasm() {
    let bridge = bridge();
    deploy_erc20(&bridge);
    deploy_bank(&bridge);

    let err = bridge
        .manager
        .invoke_contract("legacy", &request("bank", "go", &json!({}), "alice"))
        .unwrap_err();
    assert!(matches!(&err, BridgeError::UnsupportedModule(module) if module == "evm"));
}

#[test]
fn test_call_depth_is_bounded() {
    let bridge = bridge_with(BridgeConfig {
        max_call_depth: 3,
        ..BridgeConfig::default()
    });
    let program = json!({"exports": {"run": [
        {"op": "get_call_args"},
        {"op": "branch", "on": "${method}", "cases": {
            "initialize": [{"op": "output", "body": "ready"}]
        }, "default": [
            {"op": "call", "contract": "loop", "method": "again", "into": "r"},
            {"op": "output", "body": "${r}"}
        ]}
    ]}});
    bridge
        .manager
        .deploy_contract(&deploy_request("loop", &program, "go", &json!({}), "alice"))
        .unwrap();

    let err = bridge
        .manager
        .invoke_contract("again", &request("loop", "go", &json!({}), "alice"))
        .unwrap_err();
    assert!(matches!(err, BridgeError::CallDepthExceeded { depth: 4, max: 3 }));
    assert_eq!(bridge.manager.live_contexts(), 0);
    assert_eq!(
        bridge.engine.contexts_created(),
        bridge.engine.contexts_released()
    );
}

// =============================================================================
// STORAGE LAYOUT
// =============================================================================

#[test]
fn test_layout_inside_logical_store() {
    init_tracing();
    let physical = Arc::new(InMemoryStore::new());
    let provider = StoreProvider::new(physical.clone());
    let registry = VmRegistry::new();
    registry.register_interpreter("uwavm", Arc::new(ScriptedEngine::new()));
    let manager = VmManager::new(BridgeConfig::default(), &registry, provider.handle("contracts"))
        .unwrap();

    manager
        .deploy_contract(&deploy_request(
            "erc20",
            &erc20_program(),
            "go",
            &json!({"initSupply": "7"}),
            "alice",
        ))
        .unwrap();

    let code = physical
        .get(&prefixed_key("contracts", &contract_code_key("erc20")))
        .unwrap();
    assert!(code.is_some());
    let supply = physical
        .get(&prefixed_key("contracts", &object_key("erc20", b"totalSupply")))
        .unwrap();
    assert_eq!(supply, Some(b"7".to_vec()));
    assert_eq!(
        physical.get(&prefixed_key("contracts", &contract_desc_key("erc20"))).unwrap(),
        Some(b"go".to_vec())
    );
}

#[test]
fn test_bridge_over_lru_store() {
    init_tracing();
    let config = BridgeConfig::from_json(r#"{"backend": "scripted", "lru_capacity": 64}"#).unwrap();
    let store = Arc::new(LruStore::from_config(&config));
    let registry = VmRegistry::new();
    registry.register_interpreter("scripted", Arc::new(ScriptedEngine::new()));
    let manager = VmManager::new(config, &registry, store.clone()).unwrap();

    manager
        .deploy_contract(&deploy_request(
            "erc20",
            &erc20_program(),
            "go",
            &json!({"initSupply": "3"}),
            "alice",
        ))
        .unwrap();
    let outcome = manager
        .invoke_contract("balanceOf", &request("erc20", "go", &json!({"caller": "alice"}), "alice"))
        .unwrap();
    assert_eq!(outcome.response.body, b"3");
    assert_eq!(store.len(), 4);
    assert_eq!(store.capacity(), 64);
}
