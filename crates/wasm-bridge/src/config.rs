//! Configuration for the execution bridge.

use crate::domain::resources::{GasRates, ResourceLimits, MAX_RESOURCE_LIMIT};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;

/// Backend opened when none is configured.
pub const DEFAULT_BACKEND: &str = "uwavm";

/// Bridge configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name of the registered backend to open.
    pub backend: String,
    /// Gas limit handed to every engine context.
    pub gas_limit: u64,
    /// Usage above any of these fields fails the call with a gas trap.
    pub max_limits: ResourceLimits,
    /// Conversion rates used to report gas.
    pub rates: GasRates,
    /// Maximum nesting of contract-to-contract calls.
    pub max_call_depth: u32,
    /// Entry capacity of the LRU store.
    pub lru_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            gas_limit: MAX_RESOURCE_LIMIT,
            max_limits: ResourceLimits::MAX,
            rates: GasRates::default(),
            max_call_depth: 16,
            lru_capacity: 10_000,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `WASM_BRIDGE_*` environment variables.
    ///
    /// Unparseable values fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env::var("WASM_BRIDGE_BACKEND").unwrap_or(defaults.backend),

            gas_limit: env::var("WASM_BRIDGE_GAS_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.gas_limit),

            max_call_depth: env::var("WASM_BRIDGE_MAX_CALL_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_call_depth),

            lru_capacity: env::var("WASM_BRIDGE_LRU_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.lru_capacity),

            ..defaults
        }
    }

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the bridge cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "backend",
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_call_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.lru_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "lru_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
