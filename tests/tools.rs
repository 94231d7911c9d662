//! Tool-layer tests: the operations exposed over the CLI and MCP.

mod common;

use common::{record, TestEnv};
use serde_json::json;
use std::time::Duration;
use typeahead::services::DeliveryOutcome;
use typeahead::tools::{
    execute_cancel, execute_results, execute_search, execute_status, CancelInput, ResultsInput,
    SearchInput,
};
use typeahead::Category;

const WAIT: Duration = Duration::from_secs(30);

fn search_input(query: &str, category: Category, limit: usize) -> SearchInput {
    SearchInput {
        query: query.to_string(),
        category,
        limit,
    }
}

// ============================================================================
// search
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_search_returns_results() {
    let env = TestEnv::new();
    let out = execute_search(&env.dispatcher, search_input("rust", Category::Courses, 20), WAIT)
        .await
        .unwrap();

    assert_eq!(out.outcome, DeliveryOutcome::Fresh);
    assert_eq!(out.total_returned, 1);
    assert!(!out.has_more);
}

#[tokio::test(start_paused = true)]
async fn test_search_respects_limit() {
    let env = TestEnv::new();
    let many = (0..10)
        .map(|i| record(json!({ "title": format!("Course {i}") })))
        .collect();
    env.backend.set_response("course", many);

    let out = execute_search(&env.dispatcher, search_input("course", Category::Courses, 3), WAIT)
        .await
        .unwrap();
    assert_eq!(out.total_returned, 3);
    assert!(out.has_more);
}

#[tokio::test(start_paused = true)]
async fn test_search_too_short_is_error() {
    let env = TestEnv::new();
    let err = execute_search(&env.dispatcher, search_input("r", Category::Courses, 20), WAIT)
        .await
        .unwrap_err();
    assert!(err.contains("too short"));
}

#[tokio::test(start_paused = true)]
async fn test_search_timeout_is_error() {
    let env = TestEnv::new();
    env.backend.set_latency(Duration::from_secs(60));

    let err = execute_search(
        &env.dispatcher,
        search_input("rust", Category::Courses, 20),
        Duration::from_secs(5),
    )
    .await
    .unwrap_err();
    assert!(err.contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_search_exhausted_is_empty_not_error() {
    let env = TestEnv::new();
    env.backend.fail_always("rust");

    let out = execute_search(&env.dispatcher, search_input("rust", Category::Courses, 20), WAIT)
        .await
        .unwrap();
    assert_eq!(out.outcome, DeliveryOutcome::Exhausted);
    assert!(out.results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_search_after_teardown_is_error() {
    let env = TestEnv::new();
    env.dispatcher.teardown();

    let err = execute_search(&env.dispatcher, search_input("rust", Category::Courses, 20), WAIT)
        .await
        .unwrap_err();
    assert!(err.contains("shut down"));
}

#[test]
fn test_search_input_defaults_limit() {
    let input: SearchInput =
        serde_json::from_value(json!({ "query": "rust", "category": "lessons" })).unwrap();
    assert_eq!(input.limit, 20);
    assert_eq!(input.category, Category::Lessons);
}

// ============================================================================
// results / cancel / status
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_results_reflect_latest_delivery() {
    let env = TestEnv::new();
    execute_search(&env.dispatcher, search_input("rust", Category::Posts, 20), WAIT)
        .await
        .unwrap();

    let out = execute_results(
        &env.dispatcher,
        ResultsInput {
            category: Category::Posts,
        },
    );
    assert_eq!(out.total, 1);

    let empty = execute_results(
        &env.dispatcher,
        ResultsInput {
            category: Category::Courses,
        },
    );
    assert_eq!(empty.total, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_reports_whether_search_existed() {
    let env = TestEnv::new();
    env.backend.set_latency(Duration::from_millis(500));
    env.dispatcher.search("rust", Category::Courses);

    let input = || CancelInput {
        query: "rust".into(),
        category: Category::Courses,
    };
    assert!(execute_cancel(&env.dispatcher, input()).cancelled);
    assert!(!execute_cancel(&env.dispatcher, input()).cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_status_serializes_flat() {
    let env = TestEnv::new();
    env.backend.set_latency(Duration::from_millis(500));
    env.dispatcher.search("rust", Category::Courses);

    let out = execute_status(&env.dispatcher);
    assert!(!out.idle);

    let value = serde_json::to_value(&out).unwrap();
    assert_eq!(value["active"], 1);
    assert_eq!(value["pending"], 0);
    assert_eq!(value["idle"], false);
}
