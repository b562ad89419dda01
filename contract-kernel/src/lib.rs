//! Execution orchestrator for prompt contracts.
//!
//! An execution loads a template, validates the caller's input against the
//! template's input schema, renders the prompt, invokes a model and validates
//! the model's output against the output schema. Every step is tracked by an
//! [`ExecutionMachine`] and every failure is reported as an
//! [`ExecutionFailure`] with a stable code and HTTP status.

#![warn(missing_docs, clippy::pedantic)]

mod audit;
mod executor;
mod failure;
mod outcome;
mod request;
mod sink;
mod state;

pub use audit::{AuditReport, AuditStatus, TemplateAudit, TemplateAuditor};
pub use executor::{ContractExecutor, DEFAULT_MODEL_TIMEOUT};
pub use failure::{ExecutionFailure, FailureKind};
pub use outcome::{ExecutionOutcome, ExecutionSuccess, ModelOutput, UNVALIDATED_OUTPUT_WARNING};
pub use request::ExecutionRequest;
pub use sink::{CollectingSink, ExecutionSink, TracingExecutionSink};
pub use state::{ExecutionEvent, ExecutionMachine, ExecutionState, StateError, StateResult};
