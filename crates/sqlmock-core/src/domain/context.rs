use crate::{
    domain::events::ContextEvent,
    CoreError, DataPacket, StepSets,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a context run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub String);

impl ContextId {
    /// Generate a new random context ID
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextKind {
    /// Steps run one after another without a transaction
    Plain,
    /// Steps run inside a transaction that is handed back on completion
    Transaction,
}

/// Context status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextStatus {
    /// Created, not started
    Idle,

    /// Opening a connection
    Connecting,

    /// Connection available
    Connected,

    /// Opening a transaction
    BeginningTransaction,

    /// Executing the named step
    Executing(String),

    /// All steps completed
    Done,

    /// Context failed
    Failed,
}

impl ContextStatus {
    /// Whether the status ends the context
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContextStatus::Done | ContextStatus::Failed)
    }

    fn can_transition_to(&self, next: &ContextStatus) -> bool {
        use ContextStatus::*;

        match (self, next) {
            (_, Failed) => !self.is_terminal(),
            (Idle, Connecting) => true,
            (Connecting, Connected) => true,
            (Connected, BeginningTransaction | Executing(_) | Done) => true,
            (BeginningTransaction, Executing(_) | Done) => true,
            (Executing(_), Executing(_) | Done) => true,
            _ => false,
        }
    }
}

/// Aggregate: one run of a plain or transaction context
#[derive(Debug)]
pub struct ContextRun {
    /// Unique identifier
    pub id: ContextId,

    /// Plain or transaction
    pub kind: ContextKind,

    /// Current status
    pub status: ContextStatus,

    /// Results of completed steps keyed by step name
    pub sets: StepSets,

    /// Error if the context failed
    pub error: Option<CoreError>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,

    events: Vec<ContextEvent>,
}

impl ContextRun {
    /// Create a new idle context run
    pub fn new(kind: ContextKind) -> Self {
        let now = Utc::now();
        Self {
            id: ContextId::new_v4(),
            kind,
            status: ContextStatus::Idle,
            sets: StepSets::with_capacity(8),
            error: None,
            created_at: now,
            updated_at: now,
            events: Vec::with_capacity(8),
        }
    }

    /// Move to the given status
    pub fn transition(&mut self, next: ContextStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(&next) {
            return Err(CoreError::StepExecution(format!(
                "Cannot move context from {:?} to {:?}",
                self.status, next
            )));
        }

        let from = std::mem::replace(&mut self.status, next.clone());
        self.updated_at = Utc::now();
        self.events.push(ContextEvent::StateChanged {
            context_id: self.id.clone(),
            from,
            to: next,
            timestamp: self.updated_at,
        });
        Ok(())
    }

    /// Record the result of the step currently executing
    pub fn complete_step(&mut self, step: &str, result: DataPacket) -> Result<(), CoreError> {
        match &self.status {
            ContextStatus::Executing(current) if current == step => {}
            other => {
                return Err(CoreError::StepExecution(format!(
                    "Cannot complete step '{}' while context is {:?}",
                    step, other
                )))
            }
        }

        self.sets.insert(step.to_string(), result.clone());
        self.updated_at = Utc::now();
        self.events.push(ContextEvent::StepCompleted {
            context_id: self.id.clone(),
            step: step.to_string(),
            result,
            timestamp: self.updated_at,
        });
        Ok(())
    }

    /// Complete the context successfully
    pub fn complete(&mut self) -> Result<(), CoreError> {
        self.transition(ContextStatus::Done)?;
        self.events.push(ContextEvent::Completed {
            context_id: self.id.clone(),
            sets: self.sets.clone(),
            timestamp: self.updated_at,
        });
        Ok(())
    }

    /// Set the context as failed
    pub fn fail(&mut self, step: Option<String>, error: CoreError) -> Result<(), CoreError> {
        self.transition(ContextStatus::Failed)?;
        self.error = Some(error.clone());
        self.events.push(ContextEvent::Failed {
            context_id: self.id.clone(),
            step,
            error,
            timestamp: self.updated_at,
        });
        Ok(())
    }

    /// Get and clear all recorded events
    pub fn take_events(&mut self) -> Vec<ContextEvent> {
        std::mem::take(&mut self.events)
    }
}
