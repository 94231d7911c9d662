//! Dispatcher façade: cache check, queueing, execution, retry and delivery.
//!
//! All mutable state lives in one `State` behind a `Mutex` that is never held
//! across an await. Executor runs are spawned tokio tasks which report back
//! through `Inner::complete`; every state transition republishes the status
//! snapshot on a `watch` channel.

use crate::config::DispatcherConfig;
use crate::error::{ExecuteError, ExecuteResult};
use crate::services::{
    Admission, CancellationRegistry, Enqueued, KeyState, QueueEntry, ResultCache, RetryDecision,
    RetryPolicy, Scheduler, SearchBackend, SearchExecutor,
};
use crate::types::{Category, Record, SearchKey};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Buffered deliveries per subscriber before it starts lagging.
const DELIVERY_CHANNEL_CAPACITY: usize = 64;

/// Progress snapshot for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispatcherStatus {
    /// Waiting in the queue
    pub pending: usize,
    /// Currently executing
    pub active: usize,
    /// Failed and waiting out a backoff delay
    pub retrying: usize,
    /// Unexpired cache entries
    pub cached: usize,
    /// Searches that finished with fresh results
    pub completed: u64,
    /// Searches that ran out of retries
    pub exhausted: u64,
}

impl DispatcherStatus {
    /// No work queued, running or waiting to retry.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.pending == 0 && self.active == 0 && self.retrying == 0
    }
}

/// How a delivered result list was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Cached,
    Fresh,
    /// Retries exhausted; `records` is empty
    Exhausted,
}

/// A result list handed to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub key: SearchKey,
    pub records: Vec<Record>,
    pub outcome: DeliveryOutcome,
}

/// What [`Dispatcher::search`] did with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Served from cache and delivered immediately.
    Cached(Vec<Record>),
    /// New pipeline created.
    Queued,
    /// The key already has a pipeline in the given state.
    InFlight(KeyState),
    /// Below the minimum query length; nothing dispatched.
    TooShort,
    /// The dispatcher has been torn down.
    Closed,
}

struct State {
    cache: ResultCache,
    scheduler: Scheduler,
    cancellations: CancellationRegistry,
    /// Latest requested key per category
    latest: HashMap<Category, SearchKey>,
    /// What the UI should render per category
    shown: HashMap<Category, Delivery>,
    closed: bool,
}

impl State {
    /// Answer for `key` when its delivery may have been missed.
    ///
    /// `None` while the key is still queued, running or retrying. Otherwise
    /// the cached records, else the shown delivery if it is for `key`
    /// (this covers exhaustion), else `Some(None)`.
    fn settled(&mut self, key: &SearchKey) -> Option<Option<Delivery>> {
        if let Some(records) = self.cache.get(key) {
            return Some(Some(Delivery {
                key: key.clone(),
                records,
                outcome: DeliveryOutcome::Cached,
            }));
        }
        if self.scheduler.state(key).is_some() {
            return None;
        }
        Some(
            self.shown
                .get(&key.category)
                .filter(|d| &d.key == key)
                .cloned(),
        )
    }

    fn snapshot(&self) -> DispatcherStatus {
        DispatcherStatus {
            pending: self.scheduler.queued_len(),
            active: self.scheduler.active_len(),
            retrying: self.scheduler.retrying_len(),
            cached: self.cache.live_len(),
            completed: self.scheduler.completed(),
            exhausted: self.scheduler.exhausted(),
        }
    }
}

struct Inner<B> {
    executor: SearchExecutor<B>,
    retry: RetryPolicy,
    min_query_len: usize,
    state: Mutex<State>,
    status_tx: watch::Sender<DispatcherStatus>,
    deliveries: broadcast::Sender<Delivery>,
    shutdown: CancellationToken,
}

/// Public entry point for the search pipeline.
///
/// Cheap to clone; clones share one pipeline. Must be used from within a
/// tokio runtime because searches are executed on spawned tasks.
pub struct Dispatcher<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: SearchBackend> Dispatcher<B> {
    pub fn new(backend: B, config: &DispatcherConfig) -> Self {
        let shutdown = CancellationToken::new();
        let state = State {
            cache: ResultCache::from_config(config),
            scheduler: Scheduler::new(config.concurrency_limit),
            cancellations: CancellationRegistry::new(shutdown.clone()),
            latest: HashMap::new(),
            shown: HashMap::new(),
            closed: false,
        };
        let (status_tx, _) = watch::channel(DispatcherStatus::default());
        let (deliveries, _) = broadcast::channel(DELIVERY_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                executor: SearchExecutor::new(backend),
                retry: RetryPolicy::from_config(config),
                min_query_len: config.min_query_len,
                state: Mutex::new(state),
                status_tx,
                deliveries,
                shutdown,
            }),
        }
    }

    /// Dispatches `text` in `category`.
    ///
    /// A fresh cache entry is delivered immediately; otherwise the search is
    /// queued unless the same key is already queued, running or retrying.
    pub fn search(&self, text: &str, category: Category) -> SearchOutcome {
        if text.trim().chars().count() < self.inner.min_query_len {
            return SearchOutcome::TooShort;
        }
        let entry = QueueEntry::new(text, category);

        let outcome = {
            let mut state = self.inner.lock();
            if state.closed {
                return SearchOutcome::Closed;
            }
            state.latest.insert(category, entry.key.clone());

            if let Some(records) = state.cache.get(&entry.key) {
                tracing::debug!(key = %entry.key, "cache hit");
                self.inner.deliver(
                    &mut state,
                    Delivery {
                        key: entry.key,
                        records: records.clone(),
                        outcome: DeliveryOutcome::Cached,
                    },
                );
                self.inner.publish_status(&state);
                return SearchOutcome::Cached(records);
            }

            let key = entry.key.clone();
            match state.scheduler.enqueue(entry) {
                Enqueued::Queued => {
                    tracing::debug!(%key, "queued");
                    SearchOutcome::Queued
                }
                Enqueued::Duplicate(existing) => {
                    tracing::debug!(%key, ?existing, "already in flight");
                    SearchOutcome::InFlight(existing)
                }
            }
        };

        Inner::drain(&self.inner);
        outcome
    }

    /// Dispatches and waits for the delivery for this key.
    ///
    /// Returns `None` if the query is too short, the dispatcher is torn down
    /// while waiting, or the key is cancelled and never delivered (callers
    /// should bound the wait with a timeout in that case). If this receiver
    /// lags past the delivery, the answer is recovered from the cache or the
    /// category's shown results, else `None`.
    pub async fn query(&self, text: &str, category: Category) -> Option<Delivery> {
        let mut rx = self.subscribe();
        let key = SearchKey::new(category, text);

        match self.search(text, category) {
            SearchOutcome::Cached(records) => {
                return Some(Delivery {
                    key,
                    records,
                    outcome: DeliveryOutcome::Cached,
                })
            }
            SearchOutcome::TooShort | SearchOutcome::Closed => return None,
            SearchOutcome::Queued | SearchOutcome::InFlight(_) => {}
        }

        loop {
            tokio::select! {
                () = self.inner.shutdown.cancelled() => return None,
                msg = rx.recv() => match msg {
                    Ok(delivery) if delivery.key == key => return Some(delivery),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "delivery subscriber lagged");
                        let settled = self.inner.lock().settled(&key);
                        if let Some(delivery) = settled {
                            return delivery;
                        }
                    }
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Cancels the pipeline for one key. Returns whether it had one.
    ///
    /// An in-flight execution is abandoned and its result discarded.
    pub fn cancel(&self, text: &str, category: Category) -> bool {
        let key = SearchKey::new(category, text);
        let removed = {
            let mut state = self.inner.lock();
            let removed = state.scheduler.remove(&key);
            state.cancellations.cancel(&key);
            self.inner.publish_status(&state);
            removed
        };
        if let Some(was) = removed {
            tracing::debug!(%key, ?was, "cancelled");
        }
        Inner::drain(&self.inner);
        removed.is_some()
    }

    /// Clears shown results and cancels all pending work for `category`.
    pub fn clear_category(&self, category: Category) {
        {
            let mut state = self.inner.lock();
            let removed = state.scheduler.remove_category(category);
            state.cancellations.cancel_category(category);
            state.latest.remove(&category);
            state.shown.remove(&category);
            self.inner.publish_status(&state);
            if !removed.is_empty() {
                tracing::debug!(%category, cancelled = removed.len(), "category cleared");
            }
        }
        Inner::drain(&self.inner);
    }

    /// Cancels all in-flight work, pending retries and debounce timers.
    ///
    /// Further searches return [`SearchOutcome::Closed`]. Idempotent.
    pub fn teardown(&self) {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        self.inner.shutdown.cancel();
        state.cancellations.cancel_all();
        state.scheduler.clear();
        state.cache.clear();
        state.latest.clear();
        state.shown.clear();
        self.inner.publish_status(&state);
        tracing::debug!("dispatcher torn down");
    }

    /// Recomputed status snapshot.
    #[must_use]
    pub fn status(&self) -> DispatcherStatus {
        self.inner.lock().snapshot()
    }

    /// Results to render for `category`: the latest delivery for the
    /// category's most recent query, or empty.
    #[must_use]
    pub fn results(&self, category: Category) -> Vec<Record> {
        self.inner
            .lock()
            .shown
            .get(&category)
            .map(|d| d.records.clone())
            .unwrap_or_default()
    }

    /// Receives every delivery from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.inner.deliveries.subscribe()
    }

    /// Observes status snapshots as they are published.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<DispatcherStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Waits until nothing is queued, running or retrying.
    pub async fn wait_idle(&self) {
        let mut rx = self.watch_status();
        // The sender lives as long as `self`, so this only ends on idle
        let _ = rx.wait_for(DispatcherStatus::is_idle).await;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Token cancelled on teardown; lets helpers (debounce timers) stop with us.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    #[must_use]
    pub fn min_query_len(&self) -> usize {
        self.inner.min_query_len
    }
}

impl<B: SearchBackend> Inner<B> {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_status(&self, state: &State) {
        self.status_tx.send_replace(state.snapshot());
    }

    /// Broadcasts `delivery`; records it for rendering if it answers the
    /// category's latest query.
    fn deliver(&self, state: &mut State, delivery: Delivery) {
        let category = delivery.key.category;
        if state.latest.get(&category) == Some(&delivery.key) {
            state.shown.insert(category, delivery.clone());
        }
        // No subscribers is not an error
        let _ = self.deliveries.send(delivery);
    }

    /// Admits queued entries while slots are free and spawns their executions.
    fn drain(inner: &Arc<Self>) {
        let admissions: Vec<(Admission, CancellationToken)> = {
            let mut state = inner.lock();
            if state.closed {
                return;
            }
            let admitted = state.scheduler.admit_all();
            if admitted.is_empty() {
                return;
            }
            let admissions = admitted
                .into_iter()
                .map(|adm| {
                    let token = state.cancellations.register(&adm.entry.key);
                    (adm, token)
                })
                .collect();
            inner.publish_status(&state);
            admissions
        };

        for (admission, token) in admissions {
            tracing::debug!(
                key = %admission.entry.key,
                attempt = admission.entry.attempt,
                "executing"
            );
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                let result = inner
                    .executor
                    .execute(&admission.entry.query, admission.entry.category, &token)
                    .await;
                Inner::complete(&inner, admission, &token, result);
            });
        }
    }

    /// Applies an execution result. Stale or duplicate completions are ignored.
    fn complete(
        inner: &Arc<Self>,
        admission: Admission,
        token: &CancellationToken,
        result: ExecuteResult<Vec<Record>>,
    ) {
        let Admission {
            mut entry,
            generation,
        } = admission;

        {
            let mut state = inner.lock();
            if !state.scheduler.is_current(&entry.key, generation) {
                tracing::debug!(key = %entry.key, "discarding stale completion");
                return;
            }

            // Cancellation may have raced the result; re-check under the lock
            let result = if token.is_cancelled() {
                Err(ExecuteError::Aborted)
            } else {
                result
            };

            match result {
                Ok(records) => {
                    state.scheduler.succeed(&entry.key, generation);
                    state.cancellations.remove(&entry.key);
                    tracing::debug!(key = %entry.key, hits = records.len(), "search succeeded");
                    state.cache.put(entry.key.clone(), records.clone());
                    inner.deliver(
                        &mut state,
                        Delivery {
                            key: entry.key,
                            records,
                            outcome: DeliveryOutcome::Fresh,
                        },
                    );
                }
                Err(ExecuteError::Aborted) => {
                    state.scheduler.abort(&entry.key, generation);
                    state.cancellations.remove(&entry.key);
                    tracing::debug!(key = %entry.key, "search aborted");
                }
                Err(ExecuteError::Failed(err)) => match inner.retry.decide(entry.attempt) {
                    RetryDecision::Retry { attempt, delay } => {
                        state.scheduler.park_for_retry(&entry.key, generation);
                        entry.attempt = attempt;
                        tracing::info!(
                            key = %entry.key,
                            attempt,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "search failed, retrying"
                        );
                        let waiter = Arc::clone(inner);
                        let token = token.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                biased;
                                () = token.cancelled() => {}
                                () = tokio::time::sleep(delay) => Inner::requeue(&waiter, entry),
                            }
                        });
                    }
                    RetryDecision::Exhausted => {
                        state.scheduler.exhaust(&entry.key, generation);
                        state.cancellations.remove(&entry.key);
                        tracing::warn!(
                            key = %entry.key,
                            attempts = entry.attempt + 1,
                            error = %err,
                            "search retries exhausted"
                        );
                        inner.deliver(
                            &mut state,
                            Delivery {
                                key: entry.key,
                                records: Vec::new(),
                                outcome: DeliveryOutcome::Exhausted,
                            },
                        );
                    }
                },
            }
            inner.publish_status(&state);
        }

        Inner::drain(inner);
    }

    /// Retrying → Queued, unless the key was cancelled meanwhile.
    fn requeue(inner: &Arc<Self>, entry: QueueEntry) {
        {
            let mut state = inner.lock();
            if state.closed {
                return;
            }
            let key = entry.key.clone();
            if !state.scheduler.requeue(entry) {
                return;
            }
            tracing::debug!(%key, "requeued for retry");
            inner.publish_status(&state);
        }
        Inner::drain(inner);
    }
}

// Compile-time assertions for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<DispatcherStatus>();
    assert_send_sync::<Delivery>();
};
