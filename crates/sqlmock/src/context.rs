//! The mocking context shared by everything `attach` installs
//!
//! A [`MockingContext`] owns one mock store and one configuration. It is
//! created by [`crate::attach`] and shared by `Arc` between the engine's
//! interceptors and the test code registering mocks.

use parking_lot::RwLock;
use serde_json::Value;
use sqlmock_core::{resolve_sql_path, strip_file_reference, StepOptions};
use sqlmock_store::{MockDescriptor, MockOptions, MockStore, RawMock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::{MockConfig, MockConfigUpdate};
use crate::resolver::{MockMatch, MockResolver};

/// Mock store plus configuration for one mocked engine
#[derive(Debug, Default)]
pub struct MockingContext {
    store: MockStore,
    config: RwLock<MockConfig>,
}

impl MockingContext {
    /// Create a context with an empty store
    pub fn new(config: MockConfig) -> Self {
        Self {
            store: MockStore::new(),
            config: RwLock::new(config),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &MockStore {
        &self.store
    }

    /// Resolver over this context's store
    pub fn resolver(&self) -> MockResolver<'_> {
        MockResolver::new(&self.store)
    }

    /// Register a mock in the default namespace
    pub fn add_mock(&self, key: &str, raw: impl Into<RawMock>) {
        self.store.add_mock(key, raw, &MockOptions::default());
    }

    /// Register a mock with explicit options
    pub fn add_mock_with(&self, key: &str, raw: impl Into<RawMock>, options: &MockOptions) {
        self.store.add_mock(key, raw, options);
    }

    /// Register a mock for a SQL file and return the absolute path it is keyed by
    pub fn add_file_mock(&self, path: &str, raw: impl Into<RawMock>) -> PathBuf {
        let absolute = self.file_mock_path(path);
        self.store.add_mock(
            &absolute.to_string_lossy(),
            raw,
            &MockOptions::file(),
        );
        absolute
    }

    /// Absolute file mock key for `path`, resolved against `sql_file_base_path`
    pub fn file_mock_path(&self, path: &str) -> PathBuf {
        let base = self.config.read().sql_file_base_path.clone();
        resolve_sql_path(&base, path)
    }

    /// Mock in the default namespace
    pub fn get_mock(&self, key: &str) -> Option<Arc<MockDescriptor>> {
        self.store.get_mock(key, &MockOptions::default())
    }

    /// Mock with explicit options
    pub fn get_mock_with(&self, key: &str, options: &MockOptions) -> Option<Arc<MockDescriptor>> {
        self.store.get_mock(key, options)
    }

    /// File mock for a `file://` reference or a (relative or absolute) path
    pub fn get_file_mock(&self, path: &str) -> Option<Arc<MockDescriptor>> {
        let key = self.file_key(path);
        self.store.get_mock(&key, &MockOptions::file())
    }

    /// Remove a file mock by `file://` reference or path
    pub fn clear_file_mock(&self, path: &str) {
        let key = self.file_key(path);
        self.store.clear_mock(Some(&key), &MockOptions::file());
    }

    /// Remove `key` from the default namespace, or every mock when `None`
    pub fn clear_mock(&self, key: Option<&str>) {
        self.store.clear_mock(key, &MockOptions::default());
    }

    /// Remove `key` from the namespace in `options`, or every mock when `None`
    pub fn clear_mock_with(&self, key: Option<&str>, options: &MockOptions) {
        self.store.clear_mock(key, options);
    }

    /// Remove every mock
    pub fn clear_all(&self) {
        self.store.clear_all();
    }

    /// Mock to use for a step, consuming it if it is one-shot
    pub fn resolve_mock(&self, step: &str, options: &StepOptions) -> Option<Arc<MockDescriptor>> {
        self.resolve_match(step, options).map(|found| found.descriptor)
    }

    /// Like [`Self::resolve_mock`], with where the mock was found
    pub fn resolve_match(&self, step: &str, options: &StepOptions) -> Option<MockMatch> {
        self.resolver().resolve_mock(step, options)
    }

    /// Merge an update over the configuration
    pub fn set_mock_config(&self, update: MockConfigUpdate) {
        debug!("Updating mock configuration: {:?}", update);
        self.config.write().apply(update);
    }

    /// Snapshot of the configuration
    pub fn get_mock_config(&self) -> MockConfig {
        self.config.read().clone()
    }

    /// Single configuration option by name
    pub fn mock_config_value(&self, name: &str) -> Option<Value> {
        self.config.read().value(name)
    }

    /// Whether failed connections are treated as successful
    pub fn ignore_failed_connections(&self) -> bool {
        self.config.read().ignore_failed_connections
    }

    /// Register the mocks of a YAML fixture file; returns how many were added
    pub fn load_fixtures(&self, path: impl AsRef<Path>) -> anyhow::Result<usize> {
        crate::fixtures::load_file(self, path.as_ref())
    }

    /// Register the mocks of a YAML fixture document
    pub fn load_fixtures_str(&self, yaml: &str) -> anyhow::Result<usize> {
        crate::fixtures::load_str(self, yaml)
    }

    fn file_key(&self, path: &str) -> String {
        match strip_file_reference(path) {
            Some(absolute) => absolute.to_string(),
            None => self.file_mock_path(path).to_string_lossy().into_owned(),
        }
    }
}
