//! Cache key construction.
//!
//! A key is the operation name followed by its positional arguments in call
//! order and then its named arguments sorted by name, all joined with `:`.
//! Only values with a stable textual form implement [`KeyFragment`], so two
//! calls with equal arguments always map to the same key. Text fragments have
//! the separator and glob metacharacters backslash-escaped, so caller input can
//! neither forge extra segments nor widen an invalidation pattern.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::PostListFilter;

const SEPARATOR: &str = ":";

pub const POST_BY_SLUG: &str = "post-by-slug";
pub const POST_BY_ID: &str = "post-by-id";
pub const POSTS_LIST: &str = "posts:list";
pub const POSTS_SEARCH: &str = "posts:search";

/// Matches every cached post listing.
pub const POSTS_LIST_PATTERN: &str = "posts:list:*";
/// Matches every cached search result page.
pub const POSTS_SEARCH_PATTERN: &str = "posts:search:*";

/// A value that can take part in a cache key.
pub trait KeyFragment {
    fn fragment(&self) -> String;
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, ':' | '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl KeyFragment for str {
    fn fragment(&self) -> String {
        escape_text(self)
    }
}

impl KeyFragment for String {
    fn fragment(&self) -> String {
        escape_text(self)
    }
}

impl KeyFragment for bool {
    fn fragment(&self) -> String {
        self.to_string()
    }
}

impl KeyFragment for Uuid {
    fn fragment(&self) -> String {
        self.to_string()
    }
}

impl<T: KeyFragment> KeyFragment for Option<T> {
    fn fragment(&self) -> String {
        match self {
            Some(value) => value.fragment(),
            None => "none".to_string(),
        }
    }
}

impl<T: KeyFragment + ?Sized> KeyFragment for &T {
    fn fragment(&self) -> String {
        (**self).fragment()
    }
}

macro_rules! integer_fragment {
    ($($ty:ty),*) => {
        $(impl KeyFragment for $ty {
            fn fragment(&self) -> String {
                self.to_string()
            }
        })*
    };
}

integer_fragment!(i32, i64, u32, u64, usize);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn builder(operation: &'static str) -> CacheKeyBuilder {
        CacheKeyBuilder {
            operation,
            positional: Vec::new(),
            named: BTreeMap::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    operation: &'static str,
    positional: Vec<String>,
    named: BTreeMap<&'static str, String>,
}

impl CacheKeyBuilder {
    pub fn arg(mut self, value: impl KeyFragment) -> Self {
        self.positional.push(value.fragment());
        self
    }

    pub fn named(mut self, name: &'static str, value: impl KeyFragment) -> Self {
        self.named.insert(name, value.fragment());
        self
    }

    pub fn build(self) -> CacheKey {
        let mut parts = Vec::with_capacity(1 + self.positional.len() + self.named.len());
        parts.push(self.operation.to_string());
        parts.extend(self.positional);
        parts.extend(
            self.named
                .into_iter()
                .map(|(name, value)| format!("{name}{SEPARATOR}{value}")),
        );
        CacheKey(parts.join(SEPARATOR))
    }
}

pub fn post_by_slug(slug: &str) -> CacheKey {
    CacheKey::builder(POST_BY_SLUG).arg(slug).build()
}

pub fn post_by_id(id: Uuid) -> CacheKey {
    CacheKey::builder(POST_BY_ID).arg(id).build()
}

pub fn posts_list(filter: PostListFilter, page: PageRequest) -> CacheKey {
    CacheKey::builder(POSTS_LIST)
        .named("published", filter.published)
        .named("author", filter.author_id)
        .named("page", page.page())
        .named("limit", page.limit())
        .build()
}

pub fn posts_search(query: &str, page: PageRequest) -> CacheKey {
    CacheKey::builder(POSTS_SEARCH)
        .arg(query)
        .named("page", page.page())
        .named("limit", page.limit())
        .build()
}
