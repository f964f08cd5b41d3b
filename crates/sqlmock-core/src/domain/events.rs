use crate::domain::context::{ContextId, ContextStatus};
use crate::{CoreError, DataPacket, StepSets};
use chrono::{DateTime, Utc};

/// Events emitted by a running context.
///
/// Subscribers receive them through [`crate::SqlContext::subscribe`]; the
/// terminal events carry the accumulated step results or the failure.
#[derive(Debug, Clone)]
pub enum ContextEvent {
    /// The context moved to a new status
    StateChanged {
        /// Context the event belongs to
        context_id: ContextId,
        /// Previous status
        from: ContextStatus,
        /// New status
        to: ContextStatus,
        /// When the transition happened
        timestamp: DateTime<Utc>,
    },

    /// A step produced its result
    StepCompleted {
        /// Context the event belongs to
        context_id: ContextId,
        /// Step name
        step: String,
        /// Step result
        result: DataPacket,
        /// When the step completed
        timestamp: DateTime<Utc>,
    },

    /// All steps completed
    Completed {
        /// Context the event belongs to
        context_id: ContextId,
        /// Accumulated step results
        sets: StepSets,
        /// When the context completed
        timestamp: DateTime<Utc>,
    },

    /// The context failed
    Failed {
        /// Context the event belongs to
        context_id: ContextId,
        /// Step that failed, if the failure happened while executing one
        step: Option<String>,
        /// The failure
        error: CoreError,
        /// When the context failed
        timestamp: DateTime<Utc>,
    },
}

impl ContextEvent {
    /// Returns the type of the event as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            ContextEvent::StateChanged { .. } => "context.state_changed",
            ContextEvent::StepCompleted { .. } => "step.completed",
            ContextEvent::Completed { .. } => "context.completed",
            ContextEvent::Failed { .. } => "context.failed",
        }
    }

    /// Returns the context ID this event is associated with
    pub fn context_id(&self) -> &ContextId {
        match self {
            ContextEvent::StateChanged { context_id, .. }
            | ContextEvent::StepCompleted { context_id, .. }
            | ContextEvent::Completed { context_id, .. }
            | ContextEvent::Failed { context_id, .. } => context_id,
        }
    }

    /// Returns the timestamp when the event occurred
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ContextEvent::StateChanged { timestamp, .. }
            | ContextEvent::StepCompleted { timestamp, .. }
            | ContextEvent::Completed { timestamp, .. }
            | ContextEvent::Failed { timestamp, .. } => *timestamp,
        }
    }

    /// Whether this event ends the context
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContextEvent::Completed { .. } | ContextEvent::Failed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let id = ContextId("ctx-1".to_string());
        let now = Utc::now();
        let event = ContextEvent::Completed {
            context_id: id.clone(),
            sets: StepSets::new(),
            timestamp: now,
        };

        assert_eq!(event.event_type(), "context.completed");
        assert_eq!(event.context_id(), &id);
        assert_eq!(event.timestamp(), now);
        assert!(event.is_terminal());

        let event = ContextEvent::StateChanged {
            context_id: id,
            from: ContextStatus::Idle,
            to: ContextStatus::Connecting,
            timestamp: now,
        };
        assert_eq!(event.event_type(), "context.state_changed");
        assert!(!event.is_terminal());
    }
}
