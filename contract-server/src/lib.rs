//! HTTP surface and service wiring for prompt contracts.

#![warn(missing_docs, clippy::pedantic)]

pub mod routes;
pub mod telemetry;
pub mod wiring;

pub use routes::{ApiError, AppState, create_router};
