//! Common test utilities for typeahead integration tests.
//!
//! Provides a scripted `MockBackend` and `TestEnv`, which wires a dispatcher
//! to it. Tests run on paused tokio time, so backend latency and retry delays
//! elapse instantly but in a deterministic order.

#![allow(dead_code)] // Test utilities may not all be used in every test file

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use typeahead::error::{BackendError, BackendResult};
use typeahead::services::{Debouncer, Dispatcher, SearchBackend};
use typeahead::types::{normalize_query, Category, Record};
use typeahead::DispatcherConfig;

/// Which backend operation a call was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Lookup,
    BulkFetch,
}

/// One recorded backend call.
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub category: Category,
    pub query: String,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    latency: Duration,
    latency_for: HashMap<String, Duration>,
    /// Remaining scripted failures per normalized query
    failures: HashMap<String, usize>,
    not_found: HashSet<Category>,
    collections: HashMap<Category, Vec<Record>>,
    responses: HashMap<String, Vec<Record>>,
    calls: Vec<Call>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Scripted in-memory backend.
///
/// By default every lookup succeeds immediately with one record titled
/// `"<query> result"`.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

/// Decrements the in-flight count even when the call is dropped mid-sleep.
struct InFlight<'a>(&'a MockBackend);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.state.lock().unwrap().in_flight -= 1;
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latency applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = latency;
    }

    /// Latency for lookups of one query, overriding the default.
    pub fn set_latency_for(&self, query: &str, latency: Duration) {
        self.state
            .lock()
            .unwrap()
            .latency_for
            .insert(normalize_query(query), latency);
    }

    /// The next `times` lookups of `query` fail with a transport error.
    pub fn fail_next(&self, query: &str, times: usize) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(normalize_query(query), times);
    }

    /// Every lookup of `query` fails.
    pub fn fail_always(&self, query: &str) {
        self.fail_next(query, usize::MAX);
    }

    /// Lookups in `category` report `NotFound`.
    pub fn set_not_found(&self, category: Category) {
        self.state.lock().unwrap().not_found.insert(category);
    }

    /// Records returned by `bulk_fetch` for `category`.
    pub fn set_collection(&self, category: Category, records: Vec<Record>) {
        self.state
            .lock()
            .unwrap()
            .collections
            .insert(category, records);
    }

    /// Records returned by lookups of `query`.
    pub fn set_response(&self, query: &str, records: Vec<Record>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(normalize_query(query), records);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn lookups_for(&self, query: &str) -> Vec<Call> {
        let query = normalize_query(query);
        self.calls()
            .into_iter()
            .filter(|c| c.kind == CallKind::Lookup && c.query == query)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    /// Records the call and returns its latency.
    fn begin(&self, kind: CallKind, category: Category, query: &str) -> Duration {
        let mut state = self.state.lock().unwrap();
        let query = normalize_query(query);
        let latency = state
            .latency_for
            .get(&query)
            .copied()
            .unwrap_or(state.latency);
        state.calls.push(Call {
            kind,
            category,
            query,
            at: Instant::now(),
        });
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);
        latency
    }

    fn lookup_result(&self, category: Category, query: &str) -> BackendResult<Vec<Record>> {
        let mut state = self.state.lock().unwrap();
        if state.not_found.contains(&category) {
            return Err(BackendError::NotFound { category });
        }
        let query = normalize_query(query);
        if let Some(remaining) = state.failures.get_mut(&query) {
            if *remaining > 0 {
                *remaining = remaining.saturating_sub(1);
                return Err(BackendError::Transport("connection reset".into()));
            }
        }
        Ok(state
            .responses
            .get(&query)
            .cloned()
            .unwrap_or_else(|| vec![record(json!({ "title": format!("{query} result") }))]))
    }
}

impl SearchBackend for MockBackend {
    async fn lookup(&self, category: Category, query: &str) -> BackendResult<Vec<Record>> {
        let latency = self.begin(CallKind::Lookup, category, query);
        let _guard = InFlight(self);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.lookup_result(category, query)
    }

    async fn bulk_fetch(&self, category: Category) -> BackendResult<Vec<Record>> {
        let latency = self.begin(CallKind::BulkFetch, category, "");
        let _guard = InFlight(self);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let records = self
            .state
            .lock()
            .unwrap()
            .collections
            .get(&category)
            .cloned()
            .unwrap_or_default();
        Ok(records)
    }
}

/// Builds a record from a JSON object literal.
pub fn record(value: Value) -> Record {
    serde_json::from_value(value).expect("record must be a JSON object")
}

/// A dispatcher wired to a mock backend.
pub struct TestEnv {
    pub backend: Arc<MockBackend>,
    pub dispatcher: Dispatcher<Arc<MockBackend>>,
    pub config: DispatcherConfig,
}

impl TestEnv {
    /// Creates an environment with default settings.
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        let backend = Arc::new(MockBackend::new());
        let dispatcher = Dispatcher::new(Arc::clone(&backend), &config);
        Self {
            backend,
            dispatcher,
            config,
        }
    }

    pub fn debouncer(&self, category: Category) -> Debouncer<Arc<MockBackend>> {
        Debouncer::new(self.dispatcher.clone(), category, &self.config)
    }

    /// Advances paused time, letting spawned tasks run.
    pub async fn advance(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
