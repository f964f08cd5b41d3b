use crate::{CoreError, StepOptions, RESULT_STEP_NAME};
use std::collections::HashSet;

/// A named step queued on a context, ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct StepRequest {
    /// Step name; also the key of the step's result in the accumulated sets
    pub name: String,

    /// Invocation options handed to the executor
    pub options: StepOptions,
}

impl StepRequest {
    /// Create a new step request
    pub fn new(name: impl Into<String>, options: StepOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}

/// Check a step list before a context starts running it.
///
/// Step names must be non-empty and unique. The internal result step name is
/// only accepted when it is the sole step (the single-statement `execute`
/// path).
pub fn validate_steps(steps: &[StepRequest]) -> Result<(), CoreError> {
    let mut seen = HashSet::with_capacity(steps.len());

    for step in steps {
        if step.name.is_empty() {
            return Err(CoreError::StepExecution("step name cannot be empty".to_string()));
        }
        if step.name == RESULT_STEP_NAME && steps.len() > 1 {
            return Err(CoreError::StepExecution(format!(
                "step name '{}' is reserved",
                RESULT_STEP_NAME
            )));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(CoreError::StepExecution(format!(
                "duplicate step name: {}",
                step.name
            )));
        }
    }

    Ok(())
}
