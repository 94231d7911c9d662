//! Runs one search against the backend.
//!
//! The primary lookup is raced against the search's cancellation token. When
//! the category has no query endpoint the executor falls back to fetching the
//! whole collection and filtering it locally.

use crate::error::{ExecuteError, ExecuteResult};
use crate::services::SearchBackend;
use crate::types::{normalize_query, Category, Record};
use tokio_util::sync::CancellationToken;

/// Keeps the records whose category filter fields contain `query`, ignoring case.
#[must_use]
pub fn filter_records(records: Vec<Record>, category: Category, query: &str) -> Vec<Record> {
    let needle = normalize_query(query);
    if needle.is_empty() {
        return records;
    }
    let fields = category.filter_fields();
    records
        .into_iter()
        .filter(|r| r.matches_any(fields, &needle))
        .collect()
}

/// Search executor over a [`SearchBackend`].
#[derive(Debug)]
pub struct SearchExecutor<B> {
    backend: B,
}

impl<B: SearchBackend> SearchExecutor<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Looks up `query` in `category`.
    ///
    /// # Errors
    ///
    /// - `ExecuteError::Aborted` if `token` fires before a result is ready
    /// - `ExecuteError::Failed` for any backend failure other than a
    ///   category-level not-found on the primary lookup
    pub async fn execute(
        &self,
        query: &str,
        category: Category,
        token: &CancellationToken,
    ) -> ExecuteResult<Vec<Record>> {
        let records = tokio::select! {
            biased;
            () = token.cancelled() => return Err(ExecuteError::Aborted),
            result = self.run(query, category) => result?,
        };

        // A result that raced cancellation is still discarded
        if token.is_cancelled() {
            return Err(ExecuteError::Aborted);
        }
        Ok(records)
    }

    async fn run(&self, query: &str, category: Category) -> ExecuteResult<Vec<Record>> {
        match self.backend.lookup(category, query).await {
            Ok(records) => Ok(records),
            Err(e) if e.is_not_found() => {
                tracing::debug!(%category, "search endpoint missing, filtering bulk fetch");
                let all = self.backend.bulk_fetch(category).await?;
                Ok(filter_records(all, category, query))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(title: &str, description: &str) -> Record {
        let mut map = serde_json::Map::new();
        map.insert("title".into(), json!(title));
        map.insert("description".into(), json!(description));
        Record(map)
    }

    #[test]
    fn test_filter_case_insensitive_any_field() {
        let records = vec![
            record("ABC of Rust", "intro"),
            record("Go", "learn the abc quickly"),
            record("Python", "nothing here"),
        ];
        let hits = filter_records(records, Category::Courses, "AbC");
        let titles: Vec<_> = hits.iter().filter_map(Record::label).collect();
        assert_eq!(titles, vec!["ABC of Rust", "Go"]);
    }

    #[test]
    fn test_filter_ignores_fields_outside_category() {
        // "description" is not a lesson filter field
        let records = vec![record("Loops", "abc")];
        assert!(filter_records(records, Category::Lessons, "abc").is_empty());
    }

    #[test]
    fn test_filter_empty_query_keeps_all() {
        let records = vec![record("a", "b"), record("c", "d")];
        assert_eq!(filter_records(records, Category::Courses, "  ").len(), 2);
    }
}
