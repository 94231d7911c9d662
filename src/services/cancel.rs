//! Cancellation handles for in-flight searches.
//!
//! Every handle is a child of one root token, so cancelling the root (on
//! teardown) reaches every search even if the registry has already let go
//! of its handle.

use crate::types::{Category, SearchKey};
use ahash::AHashMap;
use tokio_util::sync::CancellationToken;

/// One cancellation token per search key.
#[derive(Debug)]
pub struct CancellationRegistry {
    root: CancellationToken,
    handles: AHashMap<SearchKey, CancellationToken>,
}

impl CancellationRegistry {
    #[must_use]
    pub fn new(root: CancellationToken) -> Self {
        Self {
            root,
            handles: AHashMap::new(),
        }
    }

    /// Returns the handle for `key`, creating one if none is registered.
    ///
    /// A key keeps the same handle across retries until it is removed.
    pub fn register(&mut self, key: &SearchKey) -> CancellationToken {
        self.handles
            .entry(key.clone())
            .or_insert_with(|| self.root.child_token())
            .clone()
    }

    /// Signals and forgets the handle for `key`. Returns whether one existed.
    pub fn cancel(&mut self, key: &SearchKey) -> bool {
        match self.handles.remove(key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every handle belonging to `category`.
    pub fn cancel_category(&mut self, category: Category) -> usize {
        let mut cancelled = 0;
        self.handles.retain(|key, token| {
            if key.category == category {
                token.cancel();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        cancelled
    }

    /// Cancels every registered handle.
    pub fn cancel_all(&mut self) {
        for (_, token) in self.handles.drain() {
            token.cancel();
        }
    }

    /// Forgets the handle for `key` without signalling it (terminal states).
    pub fn remove(&mut self, key: &SearchKey) {
        self.handles.remove(key);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(category: Category, q: &str) -> SearchKey {
        SearchKey::new(category, q)
    }

    #[test]
    fn test_register_reuses_handle() {
        let mut reg = CancellationRegistry::new(CancellationToken::new());
        let a1 = reg.register(&key(Category::Courses, "rust"));
        let a2 = reg.register(&key(Category::Courses, "rust"));
        reg.cancel(&key(Category::Courses, "rust"));
        assert!(a1.is_cancelled());
        assert!(a2.is_cancelled());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_cancel_is_per_key() {
        let mut reg = CancellationRegistry::new(CancellationToken::new());
        let a = reg.register(&key(Category::Courses, "rust"));
        let b = reg.register(&key(Category::Courses, "go"));
        assert!(reg.cancel(&key(Category::Courses, "rust")));
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!reg.cancel(&key(Category::Courses, "rust")));
    }

    #[test]
    fn test_cancel_category() {
        let mut reg = CancellationRegistry::new(CancellationToken::new());
        let a = reg.register(&key(Category::Posts, "rust"));
        let b = reg.register(&key(Category::Posts, "go"));
        let c = reg.register(&key(Category::Lessons, "rust"));
        assert_eq!(reg.cancel_category(Category::Posts), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(!c.is_cancelled());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_root_cancel_reaches_removed_handles() {
        let root = CancellationToken::new();
        let mut reg = CancellationRegistry::new(root.clone());
        let a = reg.register(&key(Category::Courses, "rust"));
        reg.remove(&key(Category::Courses, "rust"));
        assert!(!a.is_cancelled());
        root.cancel();
        assert!(a.is_cancelled());
    }

    #[test]
    fn test_cancel_all() {
        let mut reg = CancellationRegistry::new(CancellationToken::new());
        let handles: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|q| reg.register(&key(Category::Instructors, q)))
            .collect();
        reg.cancel_all();
        assert!(handles.iter().all(CancellationToken::is_cancelled));
        assert!(reg.is_empty());
    }
}
