//! Type-safe newtypes for typeahead.
//!
//! These newtypes give the dispatcher's identities (categories, search keys,
//! remote records) compile-time safety and one place for normalization rules.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Logical search category, selected by the UI tabs.
///
/// Each category maps to a distinct remote endpoint and carries the record
/// fields used when results have to be filtered client-side.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Courses,
    Instructors,
    Lessons,
    Posts,
}

impl Category {
    /// All categories, in tab order.
    pub const ALL: [Self; 4] = [Self::Courses, Self::Instructors, Self::Lessons, Self::Posts];

    /// Default endpoint path segment for this category.
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Courses => "courses",
            Self::Instructors => "instructors",
            Self::Lessons => "lessons",
            Self::Posts => "posts",
        }
    }

    /// Record fields searched by the fallback filter.
    #[must_use]
    pub const fn filter_fields(self) -> &'static [&'static str] {
        match self {
            Self::Courses => &["title", "description", "instructor"],
            Self::Instructors => &["name", "bio", "expertise"],
            Self::Lessons => &["title", "summary", "course"],
            Self::Posts => &["title", "body", "author"],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "courses" | "course" => Ok(Self::Courses),
            "instructors" | "instructor" => Ok(Self::Instructors),
            "lessons" | "lesson" => Ok(Self::Lessons),
            "posts" | "post" => Ok(Self::Posts),
            other => Err(format!(
                "Invalid category: '{other}'. Valid categories: courses, instructors, lessons, posts"
            )),
        }
    }
}

/// Normalizes raw query text: trims, collapses whitespace runs, lowercases.
#[must_use]
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Identity of a logical search: category plus normalized query text.
///
/// Two inputs that differ only in case or spacing share a key, so they share
/// one cache entry and one in-flight pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SearchKey {
    pub category: Category,
    pub query: String,
}

impl SearchKey {
    #[must_use]
    pub fn new(category: Category, text: &str) -> Self {
        Self {
            category,
            query: normalize_query(text),
        }
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.category, self.query)
    }
}

/// One record returned by the remote search capability.
///
/// Records are opaque JSON objects; the dispatcher only reads string fields
/// when filtering fallback results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    /// Returns a string field, if present and a string.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// True when any of `fields` contains `needle`, ignoring case.
    ///
    /// `needle` must already be lowercase (see [`normalize_query`]).
    #[must_use]
    pub fn matches_any(&self, fields: &[&str], needle: &str) -> bool {
        fields.iter().any(|name| {
            self.field(name)
                .is_some_and(|value| value.to_lowercase().contains(needle))
        })
    }

    /// Short label for display: first present of `title`/`name`.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.field("title").or_else(|| self.field("name"))
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

// Compile-time assertions for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<Category>();
    assert_send_sync::<SearchKey>();
    assert_send_sync::<Record>();
};
