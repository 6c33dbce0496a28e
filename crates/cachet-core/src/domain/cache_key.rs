//! Cache key namespace: `"<resource>:<id>"`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(resource: &str, id: impl fmt::Display) -> Self {
        Self(format!("{resource}:{id}"))
    }

    /// Prefix shared by every key of `resource`, for bulk invalidation.
    pub fn prefix(resource: &str) -> String {
        format!("{resource}:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_namespaced_by_resource() {
        let key = CacheKey::new("example", 42);
        assert_eq!(key.as_str(), "example:42");
        assert!(key.as_str().starts_with(&CacheKey::prefix("example")));
        assert!(!key.as_str().starts_with(&CacheKey::prefix("exam")));
    }
}
