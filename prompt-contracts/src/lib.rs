//! Contract-validated LLM prompt execution.
//!
//! This facade bundles the workspace crates behind feature flags so users can
//! depend on just the pieces they need, for example only the schema resolver
//! and validator.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use contract_primitives as primitives;

/// Document storage and caching.
pub use contract_store as store;

/// Schema dereferencing and contract validation (enabled by `schema` feature).
#[cfg(feature = "schema")]
pub use contract_schema as schema;

/// Prompt templates (enabled by `prompts` feature).
#[cfg(feature = "prompts")]
pub use contract_prompts as prompts;

/// Model adapters and provider registry (enabled by `adapters` feature).
#[cfg(feature = "adapters")]
pub use contract_adapters as adapters;

/// Execution orchestrator (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use contract_kernel as kernel;

/// Service configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use contract_config as config;

/// HTTP router and service wiring (enabled by `server` feature).
#[cfg(feature = "server")]
pub use contract_server as server;
