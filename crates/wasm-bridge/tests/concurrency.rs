//! # Concurrency Tests
//!
//! Many calls in flight on a multi-threaded runtime: one context per call,
//! no leaked contexts, one compile per contract, and host-side abort.

mod common;

use std::time::Duration;

use common::*;
use serde_json::json;
use wasm_bridge::prelude::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invocations_do_not_leak_contexts() {
    let bridge = bridge();
    deploy_erc20(&bridge);

    let mut handles = Vec::new();
    for i in 0..32 {
        let manager = Arc::clone(&bridge.manager);
        handles.push(tokio::task::spawn_blocking(move || {
            let owner = if i % 2 == 0 { "alice" } else { "nobody" };
            manager.invoke_contract(
                "balanceOf",
                &request("erc20", "go", &json!({"caller": owner}), "alice"),
            )
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.unwrap().unwrap();
        let expected: &[u8] = if i % 2 == 0 { b"1000000" } else { b"0" };
        assert_eq!(outcome.response.body, expected);
    }

    assert_eq!(bridge.manager.live_contexts(), 0);
    assert_eq!(bridge.engine.compile_count(), 1);
    assert_eq!(bridge.engine.contexts_created(), 33);
    assert_eq!(bridge.engine.contexts_released(), 33);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_calls_compile_once() {
    let bridge = bridge();
    deploy_erc20(&bridge);

    // A trap drops the cached code; the next calls race to recompile it.
    invoke_erc20(&bridge, "divide", &json!({})).unwrap_err();
    assert!(!bridge.manager.is_cached("erc20"));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let manager = Arc::clone(&bridge.manager);
        handles.push(tokio::task::spawn_blocking(move || {
            manager.invoke_contract(
                "balanceOf",
                &request("erc20", "go", &json!({"caller": "alice"}), "alice"),
            )
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(bridge.engine.compile_count(), 2);
    assert_eq!(bridge.store.code_reads(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abort_running_contract() {
    let bridge = bridge();
    deploy_erc20(&bridge);

    let manager = Arc::clone(&bridge.manager);
    let handle = tokio::task::spawn_blocking(move || {
        manager.invoke_contract("spin", &request("erc20", "go", &json!({}), "alice"))
    });

    let mut signalled = 0;
    for _ in 0..1000 {
        signalled = bridge.manager.abort_contract("erc20", "host shutdown");
        if signalled > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(signalled, 1);

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(
        err.as_trap().map(Trap::kind),
        Some(TrapKind::Aborted(reason)) if reason == "host shutdown"
    ));
    assert!(!bridge.manager.is_cached("erc20"));
    assert_eq!(bridge.manager.live_contexts(), 0);
    assert_eq!(bridge.manager.abort_contract("erc20", "again"), 0);
}
