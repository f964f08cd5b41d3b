//!
//! sqlmock-core - Step execution contract for SQL runtimes
//!
//! This crate defines the contract a SQL runtime exposes to sqlmock: the
//! per-step executor, connection and transaction strategies, and SQL file
//! loading. It also ships a reference step engine built on that contract so
//! the mock layer can be used and tested without a database.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use std::any::Any;

/// Domain layer - context runs, steps and events
pub mod domain;

/// Application services - the step engine and its strategies
pub mod application;

/// Core types
pub mod types;

/// Error types
pub mod error;

pub use application::engine::{SqlContext, SqlEngine, SqlEngineBuilder, TransactionContext};
pub use application::extensions::Extensions;
pub use application::file_loader::{
    file_reference, resolve_sql_path, strip_file_reference, FsSqlFileLoader, SqlFileLoader,
    FILE_REFERENCE_PREFIX,
};
pub use application::hooks::{
    BackendTransactionHooks, ConnectDecision, ConnectionErrorPolicy, Connector, FailFastPolicy,
    OfflineConnector, OfflineExecutor, TransactionHandle, TransactionHooks, TransactionResult,
};
pub use domain::context::{ContextId, ContextKind, ContextStatus};
pub use domain::events::ContextEvent;
pub use domain::step::StepRequest;
pub use error::CoreError;
pub use types::{DataPacket, StepOptions, StepSets};

/// Step name used by single-statement calls (`execute`, `first`)
pub const RESULT_STEP_NAME: &str = "__result__";

/// Non-async base trait for step executors
/// This trait is object-safe and used as a marker trait
pub trait StepExecutorBase: Send + Sync {
    /// Name of the executor implementation
    fn executor_type(&self) -> &str;

    /// Concrete executor for downcasting, when the implementation exposes it
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}

/// Runs a single named step against a backend
///
/// A step failure is reported as `CoreError::Backend` carrying the backend's
/// error payload; other variants describe failures outside the backend.
#[async_trait]
pub trait StepExecutor: StepExecutorBase {
    /// Execute one step and return its result
    async fn execute_step(
        &self,
        step: &str,
        options: &StepOptions,
    ) -> Result<DataPacket, CoreError>;
}
