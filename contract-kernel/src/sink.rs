//! Observers notified when an execution finishes.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::outcome::{ExecutionOutcome, ModelOutput};

/// Observer trait used to capture execution outcomes (for logging, auditing, etc.).
pub trait ExecutionSink: Send + Sync {
    /// Records the outcome of one execution.
    fn record(&self, outcome: &ExecutionOutcome);
}

/// Sink implementation that logs to tracing.
#[derive(Debug, Default)]
pub struct TracingExecutionSink;

impl ExecutionSink for TracingExecutionSink {
    fn record(&self, outcome: &ExecutionOutcome) {
        let template_id = outcome.template_id().unwrap_or_default();
        match (outcome.success(), outcome.failure()) {
            (Some(success), _) => {
                let validated = matches!(success.output(), ModelOutput::Validated(_));
                info!(
                    execution_id = %outcome.execution_id(),
                    template_id,
                    validated,
                    prompt_chars = success.prompt().len(),
                    "execution completed"
                );
            }
            (None, Some(failure)) => {
                warn!(
                    execution_id = %outcome.execution_id(),
                    template_id,
                    code = failure.kind().code(),
                    status = failure.status(),
                    errors = failure.errors().len(),
                    message = failure.message(),
                    "execution failed"
                );
            }
            (None, None) => {}
        }
    }
}

/// Sink used during testing to capture outcomes.
#[derive(Debug, Default)]
pub struct CollectingSink {
    results: Mutex<Vec<ExecutionOutcome>>,
}

impl CollectingSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Removes and returns the collected outcomes.
    #[must_use]
    pub fn drain(&self) -> Vec<ExecutionOutcome> {
        let mut lock = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        lock.drain(..).collect()
    }
}

impl ExecutionSink for CollectingSink {
    fn record(&self, outcome: &ExecutionOutcome) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
    }
}
