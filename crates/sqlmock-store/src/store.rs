//! Namespaced mock store
//!
//! Maps `namespace -> (key -> descriptor)`. All operations are synchronous
//! and guarded by a single `RwLock`; a full clear swaps the whole map under
//! one write lock.

use parking_lot::RwLock;
use sqlmock_core::{strip_file_reference, RESULT_STEP_NAME};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::descriptor::{MockDescriptor, RawMock};

/// Default namespace
pub const ROOT_NAMESPACE: &str = "root";

/// Namespace of file mocks, keyed by absolute SQL file path
pub const FILE_NAMESPACE: &str = "file";

/// Per-call options for store operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockOptions {
    /// Namespace to use instead of the default one
    pub namespace: Option<String>,
}

impl MockOptions {
    /// Options targeting the given namespace
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }

    /// Options targeting the file namespace
    pub fn file() -> Self {
        Self::namespace(FILE_NAMESPACE)
    }

    /// Namespace these options resolve to
    pub fn resolved_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(ROOT_NAMESPACE)
    }
}

type Namespaces = HashMap<String, HashMap<String, Arc<MockDescriptor>>>;

/// In-memory store of mock descriptors
#[derive(Default)]
pub struct MockStore {
    namespaces: RwLock<Namespaces>,
}

impl MockStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize `raw` and store it under `key`.
    ///
    /// The reserved result step name is refused.
    pub fn add_mock(&self, key: &str, raw: impl Into<RawMock>, options: &MockOptions) {
        let descriptor = Arc::new(MockDescriptor::from_raw(raw.into()));
        self.insert(key, descriptor, options);
    }

    /// Store an already normalized descriptor; `false` if the key is reserved
    pub fn insert(&self, key: &str, descriptor: Arc<MockDescriptor>, options: &MockOptions) -> bool {
        if key == RESULT_STEP_NAME {
            warn!("Refusing to register a mock under reserved key '{}'", key);
            return false;
        }

        let namespace = options.resolved_namespace();
        debug!(
            "Registering mock {}:{} (error={}, wait={:?}, once={})",
            namespace, key, descriptor.is_error, descriptor.wait, descriptor.once
        );

        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), descriptor);
        true
    }

    /// Descriptor stored under `key`, if any
    pub fn get_mock(&self, key: &str, options: &MockOptions) -> Option<Arc<MockDescriptor>> {
        if key == RESULT_STEP_NAME {
            return None;
        }

        let namespaces = self.namespaces.read();
        let found = namespaces
            .get(options.resolved_namespace())
            .and_then(|mocks| mocks.get(key))
            .cloned();
        trace!(
            "Lookup {}:{} -> {}",
            options.resolved_namespace(),
            key,
            if found.is_some() { "hit" } else { "miss" }
        );
        found
    }

    /// File mock for a `file://` reference or a bare absolute path
    pub fn get_file_mock(&self, reference: &str) -> Option<Arc<MockDescriptor>> {
        let path = strip_file_reference(reference).unwrap_or(reference);
        self.get_mock(path, &MockOptions::file())
    }

    /// Remove `key` from the resolved namespace, or every mock when `key` is `None`
    pub fn clear_mock(&self, key: Option<&str>, options: &MockOptions) {
        match key {
            None => self.clear_all(),
            Some(key) => {
                let namespace = options.resolved_namespace();
                let mut namespaces = self.namespaces.write();
                if let Some(mocks) = namespaces.get_mut(namespace) {
                    if mocks.remove(key).is_some() {
                        debug!("Cleared mock {}:{}", namespace, key);
                    }
                }
            }
        }
    }

    /// Remove every mock in every namespace
    pub fn clear_all(&self) {
        let previous = std::mem::take(&mut *self.namespaces.write());
        debug!("Cleared all mocks ({} namespace(s))", previous.len());
    }

    /// Remove the file mock stored under an absolute path
    pub fn clear_file_mock(&self, path: &str) {
        let path = strip_file_reference(path).unwrap_or(path);
        self.clear_mock(Some(path), &MockOptions::file());
    }

    /// Remove `key` only if it still holds `descriptor`.
    ///
    /// Returns whether this call removed it; `false` means another caller
    /// already took or replaced the entry.
    pub fn take_if_current(&self, namespace: &str, key: &str, descriptor: &Arc<MockDescriptor>) -> bool {
        let mut namespaces = self.namespaces.write();
        let Some(mocks) = namespaces.get_mut(namespace) else {
            return false;
        };

        match mocks.get(key) {
            Some(current) if Arc::ptr_eq(current, descriptor) => {
                mocks.remove(key);
                debug!("Disposed one-shot mock {}:{}", namespace, key);
                true
            }
            _ => false,
        }
    }

    /// Total number of mocks across namespaces
    pub fn len(&self) -> usize {
        self.namespaces.read().values().map(HashMap::len).sum()
    }

    /// Whether the store holds no mocks
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted keys of a namespace
    pub fn keys(&self, namespace: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .namespaces
            .read()
            .get(namespace)
            .map(|mocks| mocks.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Number of namespaces created so far
    pub fn namespace_count(&self) -> usize {
        self.namespaces.read().len()
    }
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("namespaces", &self.namespace_count())
            .field("mocks", &self.len())
            .finish()
    }
}
