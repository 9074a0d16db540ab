//! # Adapters Layer (Outer Hexagon)
//!
//! Concrete implementations of the driven ports.
//!
//! | Adapter | Port | Purpose |
//! |---------|------|---------|
//! | `InMemoryStore` | `ContractStore` | Unbounded map, tests and single process |
//! | `LruStore` | `ContractStore` | Bounded, evicts least recently used |
//! | `PrefixedStore` | `ContractStore` | Logical store over a shared one |
//! | `RocksDbStore` | `ContractStore` | Persistent (feature `rocksdb`) |
//! | `ScriptedEngine` | `WasmEngine` | Deterministic JSON-program engine |
//! | `DebugWriter` | `io::Write` | Contract debug output to the log |

pub mod debug_writer;
pub mod lru_store;
pub mod memory_store;
pub mod prefixed_store;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;
pub mod scripted_engine;

pub use debug_writer::{DebugWriter, DEBUG_FLUSH_THRESHOLD};
pub use lru_store::LruStore;
pub use memory_store::InMemoryStore;
pub use prefixed_store::{prefixed_key, PrefixedStore, StoreProvider};
#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbConfig, RocksDbStore};
pub use scripted_engine::{Op, ScriptedEngine};
