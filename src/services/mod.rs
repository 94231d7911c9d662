//! Dispatcher pipeline: cache, cancellation, retry, scheduling, execution.

mod backend;
mod cache;
mod cancel;
mod debounce;
mod dispatcher;
pub mod executor;
mod http;
mod retry;
pub mod scheduler;

pub use backend::SearchBackend;
pub use cache::ResultCache;
pub use cancel::CancellationRegistry;
pub use debounce::Debouncer;
pub use dispatcher::{Delivery, DeliveryOutcome, Dispatcher, DispatcherStatus, SearchOutcome};
pub use executor::{filter_records, SearchExecutor};
pub use http::HttpBackend;
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{Admission, Enqueued, KeyState, QueueEntry, Scheduler};
