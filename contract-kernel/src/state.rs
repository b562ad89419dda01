//! Per-request execution state machine.

use contract_primitives::ExecutionId;
use thiserror::Error;
use tracing::debug;

use crate::failure::FailureKind;

/// States an execution passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Request received, not yet shape-checked.
    ReceivingRequest,
    /// Template document loaded and its metadata checked.
    TemplateLoaded,
    /// Input validated against the template's input schema.
    InputValidated,
    /// Prompt rendered from the template and input.
    PromptRendered,
    /// Model returned a response.
    ModelInvoked,
    /// Model output validated against the output schema.
    OutputValidated,
    /// Execution finished successfully.
    Completed,
    /// Execution stopped; absorbing.
    Failed(FailureKind),
}

impl ExecutionState {
    /// Returns `true` once no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

/// Events that move an execution forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// The template was found and is usable.
    LoadTemplate,
    /// The input satisfied its schema.
    ValidateInput,
    /// The prompt was rendered.
    RenderPrompt,
    /// The model answered.
    InvokeModel,
    /// The model output satisfied its schema.
    ValidateOutput,
    /// Finish the execution.
    Complete,
    /// Stop the execution with the given failure kind.
    Fail(FailureKind),
}

/// Tracks the state of one execution and the path it took.
#[derive(Debug, Clone)]
pub struct ExecutionMachine {
    execution_id: ExecutionId,
    state: ExecutionState,
    history: Vec<ExecutionState>,
}

impl ExecutionMachine {
    /// Starts a machine in [`ExecutionState::ReceivingRequest`].
    #[must_use]
    pub fn new(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            state: ExecutionState::ReceivingRequest,
            history: vec![ExecutionState::ReceivingRequest],
        }
    }

    /// Returns the execution identifier.
    #[must_use]
    pub const fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ExecutionState {
        self.state
    }

    /// Returns every state entered so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[ExecutionState] {
        &self.history
    }

    /// Applies `event`, returning the resulting state.
    ///
    /// Output validation may be skipped: `Complete` is accepted straight from
    /// `ModelInvoked` when no output schema applies.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidTransition`] when `event` is not allowed
    /// from the current state. Terminal states accept no events.
    pub fn apply(&mut self, event: ExecutionEvent) -> StateResult<ExecutionState> {
        use ExecutionEvent as E;
        use ExecutionState as S;

        let next = match (self.state, event) {
            (S::Completed | S::Failed(_), _) => None,
            (_, E::Fail(kind)) => Some(S::Failed(kind)),
            (S::ReceivingRequest, E::LoadTemplate) => Some(S::TemplateLoaded),
            (S::TemplateLoaded, E::ValidateInput) => Some(S::InputValidated),
            (S::InputValidated, E::RenderPrompt) => Some(S::PromptRendered),
            (S::PromptRendered, E::InvokeModel) => Some(S::ModelInvoked),
            (S::ModelInvoked, E::ValidateOutput) => Some(S::OutputValidated),
            (S::ModelInvoked | S::OutputValidated, E::Complete) => Some(S::Completed),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(StateError::InvalidTransition {
                execution_id: self.execution_id,
                from: self.state,
                event,
            });
        };

        debug!(
            execution_id = %self.execution_id,
            from = ?self.state,
            to = ?next_state,
            "execution state transition"
        );
        self.state = next_state;
        self.history.push(next_state);
        Ok(next_state)
    }

    /// Returns `true` if the execution entered `state` at some point.
    #[must_use]
    pub fn reached(&self, state: ExecutionState) -> bool {
        self.history.contains(&state)
    }
}

/// Errors emitted by the execution state machine.
#[derive(Debug, Error)]
pub enum StateError {
    /// Transition was not permitted from the current state.
    #[error("invalid execution transition from {from:?} via {event:?} for execution {execution_id}")]
    InvalidTransition {
        /// Execution whose transition failed.
        execution_id: ExecutionId,
        /// State prior to the attempted transition.
        from: ExecutionState,
        /// Event that triggered the failure.
        event: ExecutionEvent,
    },
}

/// Result alias used for state machine operations.
pub type StateResult<T> = Result<T, StateError>;
