//! Engine tests driving contexts against a mocked backend

use async_trait::async_trait;
use mockall::mock;
use mockall::Sequence;
use serde_json::json;
use std::sync::Arc;

use sqlmock_core::{
    ConnectDecision, ConnectionErrorPolicy, Connector, CoreError, DataPacket, FsSqlFileLoader,
    SqlEngine, StepExecutor, StepExecutorBase, StepOptions,
};
use tracing_subscriber::{fmt, EnvFilter};

fn init_test_tracing() {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

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

struct Online;

#[async_trait]
impl Connector for Online {
    async fn connect(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

struct Lenient;

impl ConnectionErrorPolicy for Lenient {
    fn on_connect_error(&self, _error: CoreError) -> ConnectDecision {
        ConnectDecision::Proceed
    }
}

fn engine_with(backend: MockBackend) -> SqlEngine {
    SqlEngine::builder()
        .executor(Arc::new(backend))
        .connector(Arc::new(Online))
        .build()
}

#[tokio::test]
async fn transaction_context_begins_and_commits() {
    init_test_tracing();

    let mut backend = MockBackend::new();
    let mut seq = Sequence::new();
    backend
        .expect_execute_step()
        .withf(|step, options| step == "__begin__" && options.query.as_deref() == Some("BEGIN TRANSACTION"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(DataPacket::null()));
    backend
        .expect_execute_step()
        .withf(|step, _| step == "insert")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(DataPacket::new(json!({ "rowsAffected": 1 }))));
    backend
        .expect_execute_step()
        .withf(|step, options| step == "__commit__" && options.query.as_deref() == Some("COMMIT TRANSACTION"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(DataPacket::null()));

    let result = engine_with(backend)
        .transaction_context()
        .step("insert", StepOptions::query("INSERT INTO books VALUES (1)"))
        .end()
        .await
        .unwrap();

    assert_eq!(result.sets["insert"].as_value()["rowsAffected"], 1);
    result.transaction.commit().await.unwrap();
}

#[tokio::test]
async fn transaction_context_rolls_back_on_step_failure() {
    init_test_tracing();

    let mut backend = MockBackend::new();
    backend
        .expect_execute_step()
        .withf(|step, _| step == "__begin__")
        .times(1)
        .returning(|_, _| Ok(DataPacket::null()));
    backend
        .expect_execute_step()
        .withf(|step, _| step == "insert")
        .times(1)
        .returning(|_, _| Err(CoreError::Backend(DataPacket::new(json!({ "number": 2627 })))));
    backend
        .expect_execute_step()
        .withf(|step, _| step == "__rollback__")
        .times(1)
        .returning(|_, _| Ok(DataPacket::null()));
    backend
        .expect_execute_step()
        .withf(|step, _| step == "after")
        .never();

    let err = engine_with(backend)
        .transaction_context()
        .step("insert", StepOptions::query("INSERT INTO books VALUES (1)"))
        .step("after", StepOptions::query("SELECT 1"))
        .end()
        .await
        .unwrap_err();

    assert_eq!(err.backend_payload().unwrap().as_value()["number"], 2627);
}

#[tokio::test]
async fn lenient_policy_continues_without_connection() {
    let mut backend = MockBackend::new();
    backend
        .expect_execute_step()
        .times(1)
        .returning(|_, _| Ok(DataPacket::new(json!([{ "id": 7 }]))));

    let engine = SqlEngine::builder()
        .executor(Arc::new(backend))
        .connection_policy(Arc::new(Lenient))
        .build();

    let row = engine.first(StepOptions::query("SELECT 7 AS id")).await.unwrap();
    assert_eq!(row.as_value()["id"], 7);
}

#[tokio::test]
async fn steps_are_not_run_when_connection_fails() {
    let mut backend = MockBackend::new();
    backend.expect_execute_step().never();

    let engine = SqlEngine::builder().executor(Arc::new(backend)).build();
    let result = engine.execute(StepOptions::query("SELECT 1")).await;

    assert!(matches!(result, Err(CoreError::Connection(_))));
}

#[test]
fn engine_loads_sql_files_relative_to_base() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("books.sql"), "SELECT * FROM books").unwrap();

    let mut engine = SqlEngine::new();
    engine.set_file_loader(Arc::new(FsSqlFileLoader::new(dir.path())));

    assert_eq!(engine.from_file("books").unwrap(), "SELECT * FROM books");
    assert!(matches!(engine.from_file("nope"), Err(CoreError::FileLoad(_))));
}
