//! # Prefixed Store
//!
//! Many logical stores sharing one physical store. Keys are stored as
//! `<db-name>\0<key>`.

use crate::errors::StoreError;
use crate::ports::outbound::ContractStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

const DB_NAME_SEPARATOR: u8 = 0x00;

/// Physical key of `key` inside the logical store `db_name`.
#[must_use]
pub fn prefixed_key(db_name: &str, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(db_name.len() + 1 + key.len());
    out.extend_from_slice(db_name.as_bytes());
    out.push(DB_NAME_SEPARATOR);
    out.extend_from_slice(key);
    out
}

/// A named logical store over a shared physical store.
pub struct PrefixedStore {
    db_name: String,
    inner: Arc<dyn ContractStore>,
}

impl PrefixedStore {
    /// Logical store `db_name` inside `inner`.
    pub fn new(inner: Arc<dyn ContractStore>, db_name: &str) -> Self {
        Self {
            db_name: db_name.to_string(),
            inner,
        }
    }

    /// Name of the logical store.
    #[must_use]
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

impl ContractStore for PrefixedStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(&prefixed_key(&self.db_name, key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.inner.put(&prefixed_key(&self.db_name, key), value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.inner.delete(&prefixed_key(&self.db_name, key))
    }
}

/// Hands out one shared handle per logical store name.
pub struct StoreProvider {
    inner: Arc<dyn ContractStore>,
    handles: Mutex<HashMap<String, Arc<PrefixedStore>>>,
}

impl StoreProvider {
    /// Provider over `inner`.
    pub fn new(inner: Arc<dyn ContractStore>) -> Self {
        Self {
            inner,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Handle for `db_name`, created on first use.
    pub fn handle(&self, db_name: &str) -> Arc<PrefixedStore> {
        let mut handles = self.handles.lock();
        Arc::clone(handles.entry(db_name.to_string()).or_insert_with(|| {
            Arc::new(PrefixedStore::new(Arc::clone(&self.inner), db_name))
        }))
    }
}
