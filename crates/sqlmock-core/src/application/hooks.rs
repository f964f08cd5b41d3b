//! Connection and transaction strategies used by the engine
//!
//! The engine never hard-codes how a connection error is handled or how a
//! transaction is opened and closed; it asks these strategy objects, which
//! can be swapped on a [`crate::SqlEngine`] at any time.

use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{CoreError, DataPacket, StepExecutor, StepExecutorBase, StepOptions, StepSets};

/// Opens the connection a context runs on
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open (or verify) a connection
    async fn connect(&self) -> Result<(), CoreError>;
}

/// Connector used when no backend is configured; every attempt fails
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineConnector;

#[async_trait]
impl Connector for OfflineConnector {
    async fn connect(&self) -> Result<(), CoreError> {
        Err(CoreError::Connection("no backend configured".to_string()))
    }
}

/// What a context does after its connection attempt failed
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectDecision {
    /// Carry on as if the connection succeeded
    Proceed,
    /// Fail the context with the given error
    Fail(CoreError),
}

/// Handles errors raised while a context is connecting
pub trait ConnectionErrorPolicy: Send + Sync {
    /// Decide how to continue after a failed connection attempt
    fn on_connect_error(&self, error: CoreError) -> ConnectDecision;
}

/// Default policy: a failed connection fails the context
#[derive(Debug, Default, Clone, Copy)]
pub struct FailFastPolicy;

impl ConnectionErrorPolicy for FailFastPolicy {
    fn on_connect_error(&self, error: CoreError) -> ConnectDecision {
        warn!("Connection failed: {}", error);
        ConnectDecision::Fail(error)
    }
}

/// Commit/rollback capability handed back by a completed transaction context
#[async_trait]
pub trait TransactionHandle: Send + Sync {
    /// Commit the transaction
    async fn commit(&self) -> Result<(), CoreError>;

    /// Roll the transaction back
    async fn rollback(&self) -> Result<(), CoreError>;
}

/// Result of a transaction context: the step results plus the open transaction
#[derive(Clone)]
pub struct TransactionResult {
    /// Accumulated step results keyed by step name
    pub sets: StepSets,

    /// Transaction to commit or roll back
    pub transaction: Arc<dyn TransactionHandle>,
}

impl fmt::Debug for TransactionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionResult")
            .field("sets", &self.sets)
            .finish_non_exhaustive()
    }
}

/// Begin and done phases of a transaction context
#[async_trait]
pub trait TransactionHooks: Send + Sync {
    /// Open the transaction before the first step runs
    async fn begin(&self) -> Result<(), CoreError>;

    /// Build the result once every step succeeded
    async fn done(&self, sets: StepSets) -> Result<TransactionResult, CoreError>;

    /// Undo the transaction after a step failed
    async fn abort(&self) -> Result<(), CoreError>;
}

const BEGIN_STEP: &str = "__begin__";
const COMMIT_STEP: &str = "__commit__";
const ROLLBACK_STEP: &str = "__rollback__";

/// Transaction hooks that issue transaction statements through the backend
#[derive(Clone)]
pub struct BackendTransactionHooks {
    executor: Arc<dyn StepExecutor>,
}

impl BackendTransactionHooks {
    /// Create hooks bound to the given backend executor
    pub fn new(executor: Arc<dyn StepExecutor>) -> Self {
        Self { executor }
    }
}

async fn run_statement(
    executor: &Arc<dyn StepExecutor>,
    step: &str,
    sql: &str,
) -> Result<(), CoreError> {
    debug!("Issuing {} on {}", sql, executor.executor_type());
    executor
        .execute_step(step, &StepOptions::query(sql))
        .await
        .map(|_| ())
        .map_err(|e| match e {
            CoreError::Backend(payload) => CoreError::Transaction(format!("{} failed: {}", sql, payload)),
            other => other,
        })
}

#[async_trait]
impl TransactionHooks for BackendTransactionHooks {
    async fn begin(&self) -> Result<(), CoreError> {
        run_statement(&self.executor, BEGIN_STEP, "BEGIN TRANSACTION").await
    }

    async fn done(&self, sets: StepSets) -> Result<TransactionResult, CoreError> {
        Ok(TransactionResult {
            sets,
            transaction: Arc::new(BackendTransaction {
                executor: self.executor.clone(),
            }),
        })
    }

    async fn abort(&self) -> Result<(), CoreError> {
        run_statement(&self.executor, ROLLBACK_STEP, "ROLLBACK TRANSACTION").await
    }
}

struct BackendTransaction {
    executor: Arc<dyn StepExecutor>,
}

#[async_trait]
impl TransactionHandle for BackendTransaction {
    async fn commit(&self) -> Result<(), CoreError> {
        run_statement(&self.executor, COMMIT_STEP, "COMMIT TRANSACTION").await
    }

    async fn rollback(&self) -> Result<(), CoreError> {
        run_statement(&self.executor, ROLLBACK_STEP, "ROLLBACK TRANSACTION").await
    }
}

/// Executor used when no backend is configured; every step fails
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineExecutor;

impl StepExecutorBase for OfflineExecutor {
    fn executor_type(&self) -> &str {
        "offline"
    }
}

#[async_trait]
impl StepExecutor for OfflineExecutor {
    async fn execute_step(
        &self,
        step: &str,
        _options: &StepOptions,
    ) -> Result<DataPacket, CoreError> {
        Err(CoreError::Backend(DataPacket::new(json!({
            "message": "no backend configured",
            "step": step,
        }))))
    }
}
