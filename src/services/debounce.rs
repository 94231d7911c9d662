//! Keystroke debouncing in front of the dispatcher.

use crate::config::DispatcherConfig;
use crate::services::{Dispatcher, SearchBackend};
use crate::types::Category;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

struct DebounceState {
    category: Category,
    text: String,
    timer: Option<JoinHandle<()>>,
}

/// Turns a stream of input-field changes into one dispatch per quiet period.
///
/// Each call to [`Debouncer::on_input_change`] replaces the pending timer, so
/// at most one timer exists per input stream.
pub struct Debouncer<B> {
    dispatcher: Dispatcher<B>,
    delay: Duration,
    min_len: usize,
    state: Mutex<DebounceState>,
}

impl<B: SearchBackend> Debouncer<B> {
    pub fn new(dispatcher: Dispatcher<B>, category: Category, config: &DispatcherConfig) -> Self {
        Self::with_delay(dispatcher, category, config.debounce())
    }

    /// Uses `delay` as the quiet period; the minimum length comes from the dispatcher.
    pub fn with_delay(dispatcher: Dispatcher<B>, category: Category, delay: Duration) -> Self {
        let min_len = dispatcher.min_query_len();
        Self {
            dispatcher,
            delay,
            min_len,
            state: Mutex::new(DebounceState {
                category,
                text: String::new(),
                timer: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DebounceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the field's new contents and restarts the quiet-period timer.
    ///
    /// Input shorter than the minimum clears the category's results and
    /// cancels its pending work instead of scheduling a dispatch.
    pub fn on_input_change(&self, text: &str) {
        let mut state = self.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        text.clone_into(&mut state.text);
        let category = state.category;

        if text.trim().chars().count() < self.min_len {
            drop(state);
            self.dispatcher.clear_category(category);
            return;
        }

        let dispatcher = self.dispatcher.clone();
        let shutdown = dispatcher.shutdown_token();
        let delay = self.delay;
        let text = text.to_string();
        state.timer = Some(tokio::spawn(async move {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let outcome = dispatcher.search(&text, category);
                    tracing::debug!(%category, ?outcome, "debounced dispatch");
                }
            }
        }));
    }

    /// Switches category and re-debounces the current text under it.
    pub fn set_category(&self, category: Category) {
        let text = {
            let mut state = self.lock();
            if state.category == category {
                return;
            }
            state.category = category;
            state.text.clone()
        };
        if !text.is_empty() {
            self.on_input_change(&text);
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.lock().category
    }

    /// Drops the pending timer, if any.
    pub fn cancel(&self) {
        if let Some(timer) = self.lock().timer.take() {
            timer.abort();
        }
    }

    /// True while a timer is waiting to fire.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.lock()
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl<B> Drop for Debouncer<B> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }
}
