//! The remote search capability, as seen by the dispatcher.

use crate::error::BackendResult;
use crate::types::{Category, Record};
use std::future::Future;
use std::sync::Arc;

/// Remote lookup by category and query.
///
/// `lookup` reports [`BackendError::NotFound`](crate::error::BackendError::NotFound)
/// when the category has no query endpoint at all; an empty match list is a
/// successful `Ok(vec![])`.
pub trait SearchBackend: Send + Sync + 'static {
    /// Query-parameterized lookup.
    fn lookup(
        &self,
        category: Category,
        query: &str,
    ) -> impl Future<Output = BackendResult<Vec<Record>>> + Send;

    /// Full collection for `category`, used by the fallback path.
    fn bulk_fetch(&self, category: Category)
        -> impl Future<Output = BackendResult<Vec<Record>>> + Send;
}

impl<B: SearchBackend> SearchBackend for Arc<B> {
    fn lookup(
        &self,
        category: Category,
        query: &str,
    ) -> impl Future<Output = BackendResult<Vec<Record>>> + Send {
        (**self).lookup(category, query)
    }

    fn bulk_fetch(
        &self,
        category: Category,
    ) -> impl Future<Output = BackendResult<Vec<Record>>> + Send {
        (**self).bulk_fetch(category)
    }
}
