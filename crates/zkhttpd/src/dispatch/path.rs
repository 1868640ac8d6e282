//! Resolution of caller paths against the configured node prefix.

/// Prepends the configured prefix to caller-supplied node paths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathResolver {
    prefix: String,
}

impl PathResolver {
    /// Builds a resolver, trimming trailing `/` from `prefix`.
    #[must_use]
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: prefix.as_ref().trim_end_matches('/').to_owned(),
        }
    }

    /// The trimmed prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolves `path` against the prefix.
    ///
    /// An empty prefix or an empty path leaves `path` unchanged.
    #[must_use]
    pub fn resolve(&self, path: &str) -> String {
        if self.prefix.is_empty() || path.is_empty() {
            path.to_owned()
        } else if path.starts_with('/') {
            format!("{}{path}", self.prefix)
        } else {
            format!("{}/{path}", self.prefix)
        }
    }
}
