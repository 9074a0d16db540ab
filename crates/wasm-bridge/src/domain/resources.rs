//! # Resource Accounting
//!
//! Raw resource counters reported by an instance and their conversion to gas.

use serde::{Deserialize, Serialize};

/// Upper bound used for every field of [`ResourceLimits::MAX`].
pub const MAX_RESOURCE_LIMIT: u64 = 0xFFFF_FFFF;

/// Per-resource conversion rates: `gas = ceil(amount / rate)`.
///
/// A rate of zero makes that resource free.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasRates {
    /// CPU units per gas.
    pub cpu: u64,
    /// Memory bytes per gas.
    pub memory: u64,
    /// Disk bytes per gas.
    pub disk: u64,
    /// Fee units per gas.
    pub fee: u64,
}

impl Default for GasRates {
    fn default() -> Self {
        Self {
            cpu: 1000,
            memory: 1_000_000,
            disk: 1,
            fee: 1,
        }
    }
}

/// Usage or limit of the four metered resources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU (instructions / gas reported by the interpreter).
    pub cpu: u64,
    /// Linear memory in bytes.
    pub memory: u64,
    /// Disk bytes written.
    pub disk: u64,
    /// Fee units.
    pub fee: u64,
}

impl ResourceLimits {
    /// The largest limit the bridge accepts.
    pub const MAX: Self = Self {
        cpu: MAX_RESOURCE_LIMIT,
        memory: MAX_RESOURCE_LIMIT,
        disk: MAX_RESOURCE_LIMIT,
        fee: MAX_RESOURCE_LIMIT,
    };

    /// Creates a usage record.
    #[must_use]
    pub const fn new(cpu: u64, memory: u64, disk: u64, fee: u64) -> Self {
        Self {
            cpu,
            memory,
            disk,
            fee,
        }
    }

    /// Total gas with the default [`GasRates`].
    #[must_use]
    pub fn total_gas(&self) -> u64 {
        self.total_gas_with(&GasRates::default())
    }

    /// Total gas: each field rounded up independently, then summed.
    #[must_use]
    pub fn total_gas_with(&self, rates: &GasRates) -> u64 {
        roundup(self.cpu, rates.cpu)
            .saturating_add(roundup(self.memory, rates.memory))
            .saturating_add(roundup(self.disk, rates.disk))
            .saturating_add(roundup(self.fee, rates.fee))
    }

    /// Accumulates `other` field by field.
    pub fn add(&mut self, other: &Self) -> &mut Self {
        self.cpu = self.cpu.saturating_add(other.cpu);
        self.memory = self.memory.saturating_add(other.memory);
        self.disk = self.disk.saturating_add(other.disk);
        self.fee = self.fee.saturating_add(other.fee);
        self
    }

    /// Reduces by `other` field by field, flooring at zero.
    pub fn sub(&mut self, other: &Self) -> &mut Self {
        self.cpu = self.cpu.saturating_sub(other.cpu);
        self.memory = self.memory.saturating_sub(other.memory);
        self.disk = self.disk.saturating_sub(other.disk);
        self.fee = self.fee.saturating_sub(other.fee);
        self
    }

    /// True if any single field is above the same field of `limit`.
    #[must_use]
    pub fn exceed(&self, limit: &Self) -> bool {
        self.cpu > limit.cpu
            || self.memory > limit.memory
            || self.disk > limit.disk
            || self.fee > limit.fee
    }
}

fn roundup(n: u64, scale: u64) -> u64 {
    if scale == 0 {
        return 0;
    }
    n.div_ceil(scale)
}
