//! YAML mock fixtures
//!
//! A fixture document can set configuration and register mocks in bulk:
//!
//! ```yaml
//! config:
//!   sqlFileBasePath: /srv/app
//! mocks:
//!   - key: SELECT * FROM books
//!     result: [{ title: Kanban }]
//!   - key: insertBook
//!     result: { message: duplicate key }
//!     isError: true
//!     waitTime: 20
//!     once: true
//! files:
//!   - path: ./spec/userById
//!     result: { name: Neo }
//! ```
//!
//! `config` is applied before any mock is registered, so file mock paths
//! resolve against the base directory it sets.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use sqlmock_store::{MockOptions, MockSpec};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::config::MockConfigUpdate;
use crate::context::MockingContext;

/// A whole fixture document
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FixtureDocument {
    /// Configuration to apply first
    #[serde(default)]
    pub config: Option<MockConfigUpdate>,

    /// Mocks keyed by step name or statement text
    #[serde(default)]
    pub mocks: Vec<MockFixture>,

    /// Mocks keyed by SQL file path
    #[serde(default)]
    pub files: Vec<FileMockFixture>,
}

/// Result options shared by both fixture kinds
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureResult {
    /// Result value
    #[serde(default, alias = "mockResults")]
    pub result: Option<Value>,

    /// Deliver the result as a failure
    #[serde(default)]
    pub is_error: bool,

    /// Delay in milliseconds
    #[serde(default, alias = "waitMilliseconds")]
    pub wait_time: Option<f64>,

    /// Serve once
    #[serde(default, alias = "disposeAfterUse")]
    pub once: bool,

    // entry keys matching no field; rejected by `parse`
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

impl FixtureResult {
    fn check_keys(&self, entry: &str) -> Result<()> {
        match self.unknown.keys().next() {
            Some(key) => bail!("Unknown key '{}' in mock fixture for {}", key, entry),
            None => Ok(()),
        }
    }

    fn to_spec(&self) -> MockSpec {
        let mut spec = MockSpec::new();
        spec.mock_results = self.result.clone().map(Into::into);
        spec.is_error = Some(self.is_error);
        spec.wait_time = self.wait_time;
        spec.once = Some(self.once);
        spec
    }
}

/// A mock keyed by step name or statement text
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockFixture {
    /// Store key
    pub key: String,

    /// Namespace, default namespace when absent
    #[serde(default)]
    pub namespace: Option<String>,

    /// Result options
    #[serde(flatten)]
    pub result: FixtureResult,
}

/// A mock keyed by SQL file path
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMockFixture {
    /// Path relative to `sqlFileBasePath`
    pub path: String,

    /// Result options
    #[serde(flatten)]
    pub result: FixtureResult,
}

/// Parse a fixture document; unknown keys are rejected at every level
pub fn parse(yaml: &str) -> Result<FixtureDocument> {
    let document: FixtureDocument =
        serde_yaml::from_str(yaml).context("Failed to parse mock fixtures")?;

    for mock in &document.mocks {
        mock.result.check_keys(&format!("'{}'", mock.key))?;
    }
    for file in &document.files {
        file.result.check_keys(&format!("file '{}'", file.path))?;
    }
    Ok(document)
}

/// Apply a parsed document to a context; returns the number of mocks added
pub fn apply(context: &MockingContext, document: FixtureDocument) -> usize {
    if let Some(update) = document.config {
        context.set_mock_config(update);
    }

    for mock in &document.mocks {
        let options = MockOptions {
            namespace: mock.namespace.clone(),
        };
        context.add_mock_with(&mock.key, mock.result.to_spec(), &options);
    }

    for file in &document.files {
        context.add_file_mock(&file.path, file.result.to_spec());
    }

    document.mocks.len() + document.files.len()
}

pub(crate) fn load_str(context: &MockingContext, yaml: &str) -> Result<usize> {
    let count = apply(context, parse(yaml)?);
    info!("Loaded {} mock(s) from fixtures", count);
    Ok(count)
}

pub(crate) fn load_file(context: &MockingContext, path: &Path) -> Result<usize> {
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read mock fixtures from {}", path.display()))?;
    load_str(context, &yaml).with_context(|| format!("Invalid mock fixtures in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockConfig;
    use serde_json::json;
    use sqlmock_core::StepOptions;
    use std::time::Duration;

    const FIXTURES: &str = r#"
config:
  sqlFileBasePath: /srv/app
  ignoreFailedConnections: false
mocks:
  - key: SELECT * FROM books
    result:
      - title: Kanban
  - key: insertBook
    result: { message: duplicate key }
    isError: true
    waitTime: 20
    disposeAfterUse: true
  - key: audit
    namespace: custom
files:
  - path: ./spec/userById
    mockResults: { name: Neo }
"#;

    #[test]
    fn test_fixtures_register_mocks_and_config() {
        let context = MockingContext::new(MockConfig::default());
        let count = context.load_fixtures_str(FIXTURES).unwrap();
        assert_eq!(count, 4);

        assert!(!context.ignore_failed_connections());

        let books = context.get_mock("SELECT * FROM books").unwrap();
        assert_eq!(
            books.produce("s", &StepOptions::new()).into_value(),
            json!([{ "title": "Kanban" }])
        );

        let insert = context.get_mock("insertBook").unwrap();
        assert!(insert.is_error);
        assert!(insert.once);
        assert_eq!(insert.wait, Duration::from_millis(20));

        let audit = context
            .get_mock_with("audit", &MockOptions::namespace("custom"))
            .unwrap();
        assert!(audit.produce("audit", &StepOptions::new()).is_null());

        let user = context.get_file_mock("file:///srv/app/spec/userById.sql").unwrap();
        assert_eq!(
            user.produce("user", &StepOptions::new()).into_value(),
            json!({ "name": "Neo" })
        );
    }

    #[test]
    fn test_unknown_top_level_key_is_rejected() {
        let context = MockingContext::new(MockConfig::default());
        let err = context.load_fixtures_str("mock: []").unwrap_err();
        assert!(err.to_string().contains("Failed to parse mock fixtures"));
    }

    #[test]
    fn test_unknown_entry_key_is_rejected() {
        let context = MockingContext::new(MockConfig::default());
        let err = context
            .load_fixtures_str("mocks:\n  - key: insertBook\n    isEror: true\n")
            .unwrap_err();
        assert!(err.to_string().contains("Unknown key 'isEror'"));
        assert!(context.get_mock("insertBook").is_none());

        let err = context
            .load_fixtures_str("files:\n  - path: ./spec/userById\n    wait: 5\n")
            .unwrap_err();
        assert!(err.to_string().contains("Unknown key 'wait'"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let context = MockingContext::new(MockConfig::default());
        let err = context.load_fixtures("/definitely/not/here.yaml").unwrap_err();
        assert!(format!("{:#}", err).contains("/definitely/not/here.yaml"));
    }
}
