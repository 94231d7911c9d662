//! Dispatcher status tool.

use crate::services::{Dispatcher, DispatcherStatus, SearchBackend};
use serde::Serialize;

/// Output for the status tool.
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    #[serde(flatten)]
    pub status: DispatcherStatus,
    /// Nothing queued, running or retrying
    pub idle: bool,
}

/// Returns a fresh status snapshot.
#[must_use]
pub fn execute_status<B: SearchBackend>(dispatcher: &Dispatcher<B>) -> StatusOutput {
    let status = dispatcher.status();
    StatusOutput {
        idle: status.is_idle(),
        status,
    }
}
