//! Shared test fixtures for sqlmock integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use std::sync::Arc;

use sqlmock::{attach, MockingContext};
use sqlmock_core::{CoreError, DataPacket, SqlEngine, StepExecutor, StepExecutorBase, StepOptions};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize test tracing
pub fn init_test_tracing() {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sqlmock=debug".parse().unwrap())
                .add_directive("sqlmock_store=debug".parse().unwrap()),
        )
        .with_test_writer()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

// The real backend the mocking executor wraps
mock! {
    pub Backend {}

    #[async_trait]
    impl StepExecutor for Backend {
        async fn execute_step(&self, step: &str, options: &StepOptions) -> Result<DataPacket, CoreError>;
    }
}

impl StepExecutorBase for MockBackend {
    fn executor_type(&self) -> &str {
        "mock-backend"
    }
}

/// Offline engine with mocking attached
pub fn mocked_engine() -> (SqlEngine, Arc<MockingContext>) {
    init_test_tracing();
    let mut engine = SqlEngine::new();
    let context = attach(&mut engine, None);
    (engine, context)
}

/// Engine over the given backend with mocking attached
pub fn mocked_engine_with(backend: MockBackend) -> (SqlEngine, Arc<MockingContext>) {
    init_test_tracing();
    let mut engine = SqlEngine::builder().executor(Arc::new(backend)).build();
    let context = attach(&mut engine, None);
    (engine, context)
}
