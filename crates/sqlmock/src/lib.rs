//!
//! sqlmock - Mock SQL results for a step-based SQL engine
//!
//! [`attach`] installs a [`MockingContext`] on a [`SqlEngine`]: steps whose
//! name, query, prepared statement, procedure or SQL file has a registered
//! mock are answered from the mock (optionally delayed or as a failure)
//! instead of reaching the backend.
//!
//! ```no_run
//! # async fn demo() -> Result<(), sqlmock_core::CoreError> {
//! use serde_json::json;
//! use sqlmock_core::{SqlEngine, StepOptions};
//!
//! let mut engine = SqlEngine::new();
//! let mocks = sqlmock::attach(&mut engine, None);
//! mocks.add_mock("SELECT * FROM books", json!([{ "title": "Kanban" }]));
//!
//! let books = engine.execute(StepOptions::query("SELECT * FROM books")).await?;
//! assert_eq!(books.into_value(), json!([{ "title": "Kanban" }]));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use sqlmock_core::{SqlEngine, StepExecutorBase};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Mock configuration
pub mod config;

/// Shared mocking context
pub mod context;

/// YAML fixtures
pub mod fixtures;

/// Engine strategies installed by `attach`
pub mod interceptor;

/// Ordered mock lookup
pub mod resolver;

pub use config::{MockConfig, MockConfigUpdate};
pub use context::MockingContext;
pub use interceptor::{
    MockConnectionPolicy, MockTransactionHooks, MockingExecutor, MockingFileLoader,
    NoopTransaction, MOCKING_EXECUTOR_TYPE,
};
pub use resolver::{MockMatch, MockResolver};
pub use sqlmock_store::{MockDescriptor, MockOptions, MockSpec, RawMock, FILE_NAMESPACE, ROOT_NAMESPACE};

/// Install mocking on an engine and return its context.
///
/// The configuration starts from defaults overridden by the environment,
/// then `update` is applied. If the engine is already mocked, only `update`
/// is applied and the existing context is returned. An executor that is
/// already a [`MockingExecutor`] is never wrapped again; its context is
/// adopted instead.
pub fn attach(engine: &mut SqlEngine, update: Option<MockConfigUpdate>) -> Arc<MockingContext> {
    if let Some(context) = mocking(engine) {
        debug!("Engine already mocked, reusing its context");
        if let Some(update) = update {
            context.set_mock_config(update);
        }
        return context;
    }

    let executor = engine.executor();
    let installed = executor
        .as_any()
        .and_then(|any| any.downcast_ref::<MockingExecutor>())
        .map(MockingExecutor::context);

    let context = match installed {
        Some(context) => {
            debug!("Engine executor is already a mocking executor, adopting its context");
            if let Some(update) = update {
                context.set_mock_config(update);
            }
            context
        }
        None => {
            if executor.executor_type() == MOCKING_EXECUTOR_TYPE {
                warn!("Executor reports type '{}' but is not a MockingExecutor", MOCKING_EXECUTOR_TYPE);
            }
            let mut config = MockConfig::from_env();
            if let Some(update) = update {
                config.apply(update);
            }
            let context = Arc::new(MockingContext::new(config));
            engine.set_executor(Arc::new(MockingExecutor::new(executor, context.clone())));
            context
        }
    };

    let policy = MockConnectionPolicy::new(engine.connection_policy(), context.clone());
    engine.set_connection_policy(Arc::new(policy));
    engine.set_transaction_hooks(Arc::new(MockTransactionHooks));
    let loader = MockingFileLoader::new(engine.file_loader(), context.clone());
    engine.set_file_loader(Arc::new(loader));

    engine.extensions_mut().insert(context.clone());
    info!("Mocking attached to engine");
    context
}

/// The mocking context attached to an engine, if any
pub fn mocking(engine: &SqlEngine) -> Option<Arc<MockingContext>> {
    engine.extensions().get::<MockingContext>()
}
