//! Engine strategies installed by `attach`
//!
//! [`MockingExecutor`] wraps the engine's real executor and answers steps
//! from the mock store when it can. The other types replace the engine's
//! connection policy, transaction hooks and file loader so that a mocked
//! engine runs without a backend.

use async_trait::async_trait;
use sqlmock_core::{
    file_reference, ConnectDecision, ConnectionErrorPolicy, CoreError, DataPacket, SqlFileLoader,
    StepExecutor, StepExecutorBase, StepOptions, StepSets, TransactionHandle, TransactionHooks,
    TransactionResult,
};
use sqlmock_store::MockOptions;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::context::MockingContext;

/// `executor_type` reported by [`MockingExecutor`]
pub const MOCKING_EXECUTOR_TYPE: &str = "mocking";

/// Executor answering steps from mocks and delegating the rest
pub struct MockingExecutor {
    inner: Arc<dyn StepExecutor>,
    context: Arc<MockingContext>,
}

impl MockingExecutor {
    /// Wrap `inner`
    pub fn new(inner: Arc<dyn StepExecutor>, context: Arc<MockingContext>) -> Self {
        Self { inner, context }
    }

    /// The wrapped executor
    pub fn inner(&self) -> Arc<dyn StepExecutor> {
        self.inner.clone()
    }

    /// The mocking context consulted per step
    pub fn context(&self) -> Arc<MockingContext> {
        self.context.clone()
    }
}

impl StepExecutorBase for MockingExecutor {
    fn executor_type(&self) -> &str {
        MOCKING_EXECUTOR_TYPE
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

#[async_trait]
impl StepExecutor for MockingExecutor {
    async fn execute_step(
        &self,
        step: &str,
        options: &StepOptions,
    ) -> Result<DataPacket, CoreError> {
        let Some(descriptor) = self.context.resolve_mock(step, options) else {
            trace!(
                "Step '{}' not mocked, delegating to {}",
                step,
                self.inner.executor_type()
            );
            return self.inner.execute_step(step, options).await;
        };

        let value = descriptor.produce(step, options);
        debug!(
            "Step '{}' mocked (error={}, wait={:?})",
            step, descriptor.is_error, descriptor.wait
        );
        settle(value, descriptor.is_error, descriptor.wait).await
    }
}

/// Deliver a mocked outcome after `wait`.
///
/// The delay runs in its own task, so dropping the returned future does not
/// cancel the settlement.
async fn settle(value: DataPacket, is_error: bool, wait: Duration) -> Result<DataPacket, CoreError> {
    let settlement = tokio::spawn(async move {
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        if is_error {
            Err(CoreError::Backend(value))
        } else {
            Ok(value)
        }
    });

    settlement
        .await
        .map_err(|e| CoreError::Other(format!("Mock settlement task failed: {}", e)))?
}

/// Connection error policy that can treat a failed connection as a success
pub struct MockConnectionPolicy {
    previous: Arc<dyn ConnectionErrorPolicy>,
    context: Arc<MockingContext>,
}

impl MockConnectionPolicy {
    /// Wrap the engine's previous policy
    pub fn new(previous: Arc<dyn ConnectionErrorPolicy>, context: Arc<MockingContext>) -> Self {
        Self { previous, context }
    }
}

impl ConnectionErrorPolicy for MockConnectionPolicy {
    fn on_connect_error(&self, error: CoreError) -> ConnectDecision {
        if self.context.ignore_failed_connections() {
            info!("Ignoring failed connection while mocking: {}", error);
            return ConnectDecision::Proceed;
        }
        self.previous.on_connect_error(error)
    }
}

/// Transaction hooks that never open a real transaction
#[derive(Debug, Default, Clone, Copy)]
pub struct MockTransactionHooks;

#[async_trait]
impl TransactionHooks for MockTransactionHooks {
    async fn begin(&self) -> Result<(), CoreError> {
        trace!("Skipping transaction begin");
        Ok(())
    }

    async fn done(&self, sets: StepSets) -> Result<TransactionResult, CoreError> {
        Ok(TransactionResult {
            sets,
            transaction: Arc::new(NoopTransaction),
        })
    }

    async fn abort(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Transaction whose commit and rollback do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransaction;

#[async_trait]
impl TransactionHandle for NoopTransaction {
    async fn commit(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn rollback(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// File loader returning a `file://` reference for mocked SQL files
pub struct MockingFileLoader {
    inner: Arc<dyn SqlFileLoader>,
    context: Arc<MockingContext>,
}

impl MockingFileLoader {
    /// Wrap the engine's previous loader
    pub fn new(inner: Arc<dyn SqlFileLoader>, context: Arc<MockingContext>) -> Self {
        Self { inner, context }
    }
}

impl SqlFileLoader for MockingFileLoader {
    fn resolve_path(&self, path: &str) -> PathBuf {
        self.inner.resolve_path(path)
    }

    fn from_file(&self, path: &str) -> Result<String, CoreError> {
        let absolute = self.inner.resolve_path(path);
        let key = absolute.to_string_lossy();

        if self
            .context
            .get_mock_with(&key, &MockOptions::file())
            .is_some()
        {
            debug!("SQL file {} is mocked", key);
            return Ok(file_reference(&absolute));
        }

        self.inner.from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MockConfig, MockConfigUpdate};
    use serde_json::json;
    use sqlmock_core::{FailFastPolicy, FsSqlFileLoader, OfflineExecutor};
    use sqlmock_store::MockSpec;
    use tokio::time::Instant;

    fn context() -> Arc<MockingContext> {
        Arc::new(MockingContext::new(MockConfig::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_mocked_step_settles_after_wait() {
        let context = context();
        context.add_mock("slow", MockSpec::new().result(json!("r")).wait(Duration::from_millis(50)));
        let executor = MockingExecutor::new(Arc::new(OfflineExecutor), context);

        let started = Instant::now();
        let result = executor.execute_step("slow", &StepOptions::new()).await.unwrap();

        assert_eq!(result.into_value(), json!("r"));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_error_mock_payload_is_verbatim() {
        let context = context();
        let payload = json!({ "message": "Violation of PRIMARY KEY", "number": 2627 });
        context.add_mock("insert", MockSpec::new().result(payload.clone()).error());
        let executor = MockingExecutor::new(Arc::new(OfflineExecutor), context);

        let err = executor
            .execute_step("insert", &StepOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::Backend(DataPacket::new(payload)));
    }

    #[tokio::test]
    async fn test_unmocked_step_is_delegated() {
        let executor = MockingExecutor::new(Arc::new(OfflineExecutor), context());
        assert_eq!(executor.executor_type(), MOCKING_EXECUTOR_TYPE);

        let err = executor
            .execute_step("users", &StepOptions::query("SELECT 1"))
            .await
            .unwrap_err();
        assert_eq!(err.backend_payload().unwrap().as_value()["step"], "users");
    }

    #[test]
    fn test_connection_policy_follows_config() {
        let context = context();
        let policy = MockConnectionPolicy::new(Arc::new(FailFastPolicy), context.clone());
        let error = CoreError::Connection("refused".to_string());

        assert_eq!(policy.on_connect_error(error.clone()), ConnectDecision::Proceed);

        context.set_mock_config(MockConfigUpdate::new().ignore_failed_connections(false));
        assert_eq!(policy.on_connect_error(error.clone()), ConnectDecision::Fail(error));
    }

    #[tokio::test]
    async fn test_transaction_hooks_are_noops() {
        let hooks = MockTransactionHooks;
        hooks.begin().await.unwrap();

        let mut sets = StepSets::new();
        sets.insert("a".to_string(), DataPacket::new(json!(1)));
        let result = hooks.done(sets).await.unwrap();

        assert_eq!(result.sets["a"].as_value(), &json!(1));
        result.transaction.commit().await.unwrap();
        result.transaction.rollback().await.unwrap();
    }

    #[test]
    fn test_file_loader_returns_reference_for_mocked_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.sql"), "SELECT 'real'").unwrap();

        let mut config = MockConfig::default();
        config.sql_file_base_path = dir.path().to_path_buf();
        let context = Arc::new(MockingContext::new(config));
        let absolute = context.add_file_mock("mocked", json!([]));

        let loader = MockingFileLoader::new(Arc::new(FsSqlFileLoader::new(dir.path())), context);

        assert_eq!(loader.from_file("mocked").unwrap(), file_reference(&absolute));
        assert_eq!(loader.from_file("real").unwrap(), "SELECT 'real'");
    }
}
