//! Model adapters used by the execution orchestrator.
//!
//! Providers implement [`ModelAdapter`](traits::ModelAdapter) and are selected
//! at request time through a [`ProviderRegistry`](registry::ProviderRegistry).

#![warn(missing_docs, clippy::pedantic)]

pub mod openai;
pub mod registry;
pub mod repair;
pub mod traits;

mod error;
mod http_client;
