use crate::{
    application::extensions::Extensions,
    application::file_loader::{FsSqlFileLoader, SqlFileLoader},
    application::hooks::{
        BackendTransactionHooks, ConnectDecision, ConnectionErrorPolicy, Connector,
        FailFastPolicy, OfflineConnector, OfflineExecutor, TransactionHooks, TransactionResult,
    },
    domain::context::{ContextId, ContextKind, ContextRun, ContextStatus},
    domain::events::ContextEvent,
    domain::step::{validate_steps, StepRequest},
    CoreError, DataPacket, StepExecutor, StepExecutorBase, StepOptions, StepSets, RESULT_STEP_NAME,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The step engine: a set of swappable strategies plus context factories
///
/// Every collaborator (executor, connector, connection error policy,
/// transaction hooks, SQL file loader) is held behind a trait object and can
/// be replaced after construction. Contexts snapshot the strategies when
/// they are created.
#[derive(Clone)]
pub struct SqlEngine {
    executor: Arc<dyn StepExecutor>,
    connector: Arc<dyn Connector>,
    connection_policy: Arc<dyn ConnectionErrorPolicy>,
    transaction_hooks: Arc<dyn TransactionHooks>,
    file_loader: Arc<dyn SqlFileLoader>,
    extensions: Extensions,
}

impl SqlEngine {
    /// Engine with offline defaults: no backend, fail-fast connections
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start building an engine
    pub fn builder() -> SqlEngineBuilder {
        SqlEngineBuilder::default()
    }

    /// Current step executor
    pub fn executor(&self) -> Arc<dyn StepExecutor> {
        self.executor.clone()
    }

    /// Replace the step executor.
    ///
    /// Transaction hooks built from the previous executor keep using it.
    pub fn set_executor(&mut self, executor: Arc<dyn StepExecutor>) {
        debug!("Engine executor set to {}", executor.executor_type());
        self.executor = executor;
    }

    /// Current connector
    pub fn connector(&self) -> Arc<dyn Connector> {
        self.connector.clone()
    }

    /// Replace the connector
    pub fn set_connector(&mut self, connector: Arc<dyn Connector>) {
        self.connector = connector;
    }

    /// Current connection error policy
    pub fn connection_policy(&self) -> Arc<dyn ConnectionErrorPolicy> {
        self.connection_policy.clone()
    }

    /// Replace the connection error policy
    pub fn set_connection_policy(&mut self, policy: Arc<dyn ConnectionErrorPolicy>) {
        self.connection_policy = policy;
    }

    /// Current transaction hooks
    pub fn transaction_hooks(&self) -> Arc<dyn TransactionHooks> {
        self.transaction_hooks.clone()
    }

    /// Replace the transaction hooks
    pub fn set_transaction_hooks(&mut self, hooks: Arc<dyn TransactionHooks>) {
        self.transaction_hooks = hooks;
    }

    /// Current SQL file loader
    pub fn file_loader(&self) -> Arc<dyn SqlFileLoader> {
        self.file_loader.clone()
    }

    /// Replace the SQL file loader
    pub fn set_file_loader(&mut self, loader: Arc<dyn SqlFileLoader>) {
        self.file_loader = loader;
    }

    /// State attached to this engine by other crates
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable access to attached state
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// New context running steps without a transaction
    pub fn plain_context(&self) -> SqlContext {
        SqlContext::new(self.clone(), ContextKind::Plain)
    }

    /// New context running steps inside a transaction
    pub fn transaction_context(&self) -> TransactionContext {
        TransactionContext {
            inner: SqlContext::new(self.clone(), ContextKind::Transaction),
        }
    }

    /// Run a single statement and return its result
    pub async fn execute(&self, options: StepOptions) -> Result<DataPacket, CoreError> {
        let mut sets = self
            .plain_context()
            .step(RESULT_STEP_NAME, options)
            .end()
            .await?;
        Ok(sets.remove(RESULT_STEP_NAME).unwrap_or_else(DataPacket::null))
    }

    /// Run a single statement and return the first row of its result
    pub async fn first(&self, options: StepOptions) -> Result<DataPacket, CoreError> {
        Ok(self.execute(options).await?.first_row())
    }

    /// Load SQL text through the current file loader
    pub fn from_file(&self, path: &str) -> Result<String, CoreError> {
        self.file_loader.from_file(path)
    }
}

impl Default for SqlEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SqlEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlEngine")
            .field("executor", &self.executor.executor_type())
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SqlEngine`]
#[derive(Default)]
pub struct SqlEngineBuilder {
    executor: Option<Arc<dyn StepExecutor>>,
    connector: Option<Arc<dyn Connector>>,
    connection_policy: Option<Arc<dyn ConnectionErrorPolicy>>,
    transaction_hooks: Option<Arc<dyn TransactionHooks>>,
    file_loader: Option<Arc<dyn SqlFileLoader>>,
}

impl SqlEngineBuilder {
    /// Use the given step executor (the backend)
    pub fn executor(mut self, executor: Arc<dyn StepExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Use the given connector
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Use the given connection error policy
    pub fn connection_policy(mut self, policy: Arc<dyn ConnectionErrorPolicy>) -> Self {
        self.connection_policy = Some(policy);
        self
    }

    /// Use the given transaction hooks
    pub fn transaction_hooks(mut self, hooks: Arc<dyn TransactionHooks>) -> Self {
        self.transaction_hooks = Some(hooks);
        self
    }

    /// Use the given SQL file loader
    pub fn file_loader(mut self, loader: Arc<dyn SqlFileLoader>) -> Self {
        self.file_loader = Some(loader);
        self
    }

    /// Build the engine, filling gaps with the offline defaults
    pub fn build(self) -> SqlEngine {
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(OfflineExecutor));
        let transaction_hooks = self
            .transaction_hooks
            .unwrap_or_else(|| Arc::new(BackendTransactionHooks::new(executor.clone())));

        SqlEngine {
            executor,
            connector: self.connector.unwrap_or_else(|| Arc::new(OfflineConnector)),
            connection_policy: self
                .connection_policy
                .unwrap_or_else(|| Arc::new(FailFastPolicy)),
            transaction_hooks,
            file_loader: self
                .file_loader
                .unwrap_or_else(|| Arc::new(FsSqlFileLoader::default())),
            extensions: Extensions::new(),
        }
    }
}

struct Failure {
    step: Option<String>,
    error: CoreError,
}

impl From<CoreError> for Failure {
    fn from(error: CoreError) -> Self {
        Self { step: None, error }
    }
}

/// An ordered list of named steps run on one connection
///
/// Steps run one after another in the order they were added; the first
/// failure stops the context.
pub struct SqlContext {
    engine: SqlEngine,
    steps: Vec<StepRequest>,
    run: ContextRun,
    events: broadcast::Sender<ContextEvent>,
    transaction_open: bool,
}

impl SqlContext {
    fn new(engine: SqlEngine, kind: ContextKind) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            engine,
            steps: Vec::new(),
            run: ContextRun::new(kind),
            events,
            transaction_open: false,
        }
    }

    /// Context ID
    pub fn id(&self) -> &ContextId {
        &self.run.id
    }

    /// Current status
    pub fn status(&self) -> &ContextStatus {
        &self.run.status
    }

    /// Queue a step
    pub fn step(mut self, name: impl Into<String>, options: StepOptions) -> Self {
        self.steps.push(StepRequest::new(name, options));
        self
    }

    /// Receive the events this context emits from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    /// Run all steps and return their results keyed by step name
    pub async fn end(mut self) -> Result<StepSets, CoreError> {
        match self.execute().await {
            Ok(()) => {
                self.run.complete()?;
                self.publish();
                info!(
                    "Context {} completed with {} step(s)",
                    self.run.id,
                    self.run.sets.len()
                );
                Ok(std::mem::take(&mut self.run.sets))
            }
            Err(failure) => self.fail(failure),
        }
    }

    async fn execute(&mut self) -> Result<(), Failure> {
        validate_steps(&self.steps)?;

        self.transition(ContextStatus::Connecting)?;
        if let Err(error) = self.engine.connector.connect().await {
            match self.engine.connection_policy.on_connect_error(error) {
                ConnectDecision::Proceed => {
                    debug!("Context {} continues after failed connection", self.run.id)
                }
                ConnectDecision::Fail(error) => return Err(error.into()),
            }
        }
        self.transition(ContextStatus::Connected)?;

        if self.run.kind == ContextKind::Transaction {
            self.transition(ContextStatus::BeginningTransaction)?;
            self.engine.transaction_hooks.begin().await?;
            self.transaction_open = true;
        }

        let steps = std::mem::take(&mut self.steps);
        let executor = self.engine.executor.clone();

        for step in &steps {
            self.transition(ContextStatus::Executing(step.name.clone()))?;
            debug!(
                "Context {} executing step '{}' via {}",
                self.run.id,
                step.name,
                executor.executor_type()
            );

            match executor.execute_step(&step.name, &step.options).await {
                Ok(result) => {
                    self.run.complete_step(&step.name, result)?;
                    self.publish();
                }
                Err(error) => {
                    return Err(Failure {
                        step: Some(step.name.clone()),
                        error,
                    })
                }
            }
        }

        Ok(())
    }

    fn transition(&mut self, next: ContextStatus) -> Result<(), CoreError> {
        self.run.transition(next)?;
        self.publish();
        Ok(())
    }

    fn fail<T>(&mut self, failure: Failure) -> Result<T, CoreError> {
        match &failure.step {
            Some(step) => warn!("Context {} failed at step '{}': {}", self.run.id, step, failure.error),
            None => warn!("Context {} failed: {}", self.run.id, failure.error),
        }
        self.run.fail(failure.step, failure.error.clone())?;
        self.publish();
        Err(failure.error)
    }

    fn publish(&mut self) {
        for event in self.run.take_events() {
            // no subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

/// A [`SqlContext`] whose steps run inside a transaction
///
/// On success the transaction is handed back open, alongside the step
/// results; on a step failure it is rolled back before the error is returned.
pub struct TransactionContext {
    inner: SqlContext,
}

impl TransactionContext {
    /// Context ID
    pub fn id(&self) -> &ContextId {
        self.inner.id()
    }

    /// Queue a step
    pub fn step(mut self, name: impl Into<String>, options: StepOptions) -> Self {
        self.inner = self.inner.step(name, options);
        self
    }

    /// Receive the events this context emits from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.inner.subscribe()
    }

    /// Run all steps and return their results plus the open transaction
    pub async fn end(mut self) -> Result<TransactionResult, CoreError> {
        let hooks = self.inner.engine.transaction_hooks.clone();

        match self.inner.execute().await {
            Ok(()) => {
                let result = match hooks.done(self.inner.run.sets.clone()).await {
                    Ok(result) => result,
                    Err(error) => return self.inner.fail(error.into()),
                };
                self.inner.run.complete()?;
                self.inner.publish();
                info!("Transaction context {} completed", self.inner.run.id);
                Ok(result)
            }
            Err(failure) => {
                if self.inner.transaction_open {
                    if let Err(e) = hooks.abort().await {
                        warn!(
                            "Rollback after failure in context {} failed: {}",
                            self.inner.run.id, e
                        );
                    }
                }
                self.inner.fail(failure)
            }
        }
    }
}
