//! typeahead: incremental search dispatcher for a content catalog.
//!
//! Turns a stream of keystrokes into a small number of backend searches:
//! - Debounced input, with a minimum query length
//! - TTL result cache with batch eviction
//! - Deduplicated, concurrency-limited execution queue
//! - Per-key cancellation and linear-backoff retry
//! - Client-side filtering fallback when a category has no search endpoint
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        CLI (interactive)  /  MCP (rmcp)     │
//! └─────────────────┬───────────────────────────┘
//!                   │ keystrokes / queries
//! ┌─────────────────▼───────────────────────────┐
//! │                 Debouncer                    │
//! └─────────────────┬───────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────┐
//! │                Dispatcher                    │
//! │  cache ─ scheduler ─ cancellation ─ retry   │
//! └─────────────────┬───────────────────────────┘
//!                   │ tokio::spawn per admitted key
//! ┌─────────────────▼───────────────────────────┐
//! │              SearchExecutor                  │
//! │     lookup, or bulk fetch + local filter    │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!    ┌──────────────▼──────────────┐
//!    │   SearchBackend (reqwest)   │
//!    └─────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod fmt;
#[cfg(feature = "mcp")]
pub mod server;
pub mod services;
pub mod tools;
pub mod types;

pub use config::{BackendConfig, Config, DispatcherConfig};
pub use error::{BackendError, Error, ExecuteError, Result};
pub use services::{
    Debouncer, Delivery, DeliveryOutcome, Dispatcher, DispatcherStatus, HttpBackend,
    SearchBackend, SearchOutcome,
};
pub use types::{Category, Record, SearchKey};
