//! Search-related tools: dispatch-and-wait, shown results, cancellation.

use crate::services::{DeliveryOutcome, Dispatcher, SearchBackend};
use crate::types::{Category, Record};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Input for the search tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchInput {
    /// Search text as typed
    pub query: String,
    /// Category to search: courses, instructors, lessons or posts
    pub category: Category,
    /// Maximum results to return (default: 20)
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// Output for the search tool.
#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub query: String,
    pub category: Category,
    /// Returned records (opaque JSON objects)
    pub results: Vec<Record>,
    /// Number of results returned
    pub total_returned: usize,
    /// Whether more results exist beyond the limit
    pub has_more: bool,
    /// cached, fresh, or exhausted (all retries failed; results empty)
    pub outcome: DeliveryOutcome,
}

/// Executes the search tool, waiting at most `wait` for a delivery.
///
/// Exhausted retries are not an error: they come back as an empty result
/// list with `outcome = exhausted`.
///
/// # Errors
///
/// Returns an error string if the query is too short, the wait times out, or
/// the dispatcher has shut down.
pub async fn execute_search<B: SearchBackend>(
    dispatcher: &Dispatcher<B>,
    input: SearchInput,
    wait: Duration,
) -> Result<SearchOutput, String> {
    let min = dispatcher.min_query_len();
    if input.query.trim().chars().count() < min {
        return Err(format!(
            "Query too short: at least {min} characters are required"
        ));
    }

    let delivery = tokio::time::timeout(wait, dispatcher.query(&input.query, input.category))
        .await
        .map_err(|_| {
            format!(
                "Search timed out after {}ms; it keeps running and will be cached when it completes",
                wait.as_millis()
            )
        })?
        .ok_or_else(|| "Dispatcher is shut down".to_string())?;

    let has_more = delivery.records.len() > input.limit;
    let results: Vec<Record> = delivery.records.into_iter().take(input.limit).collect();

    Ok(SearchOutput {
        total_returned: results.len(),
        has_more,
        results,
        query: input.query,
        category: input.category,
        outcome: delivery.outcome,
    })
}

/// Input for the results tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResultsInput {
    /// Category whose current results to return
    pub category: Category,
}

/// Output for the results tool.
#[derive(Debug, Serialize)]
pub struct ResultsOutput {
    pub category: Category,
    pub results: Vec<Record>,
    pub total: usize,
}

/// Returns what the UI would currently render for a category.
#[must_use]
pub fn execute_results<B: SearchBackend>(
    dispatcher: &Dispatcher<B>,
    input: ResultsInput,
) -> ResultsOutput {
    let results = dispatcher.results(input.category);
    ResultsOutput {
        category: input.category,
        total: results.len(),
        results,
    }
}

/// Input for the cancel tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CancelInput {
    /// Search text to cancel
    pub query: String,
    /// Category of the search
    pub category: Category,
}

/// Output for the cancel tool.
#[derive(Debug, Serialize)]
pub struct CancelOutput {
    /// True if the search was queued, running or retrying
    pub cancelled: bool,
}

/// Cancels one search pipeline.
#[must_use]
pub fn execute_cancel<B: SearchBackend>(
    dispatcher: &Dispatcher<B>,
    input: CancelInput,
) -> CancelOutput {
    CancelOutput {
        cancelled: dispatcher.cancel(&input.query, input.category),
    }
}
