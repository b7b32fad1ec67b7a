//! Path prefix matching.
//!
//! # Responsibilities
//! - Match the request path against a service's prefixes, in order
//! - Compute the forwarded path when prefix stripping is enabled
//!
//! # Design Decisions
//! - Path matching is case-sensitive and purely textual
//! - Empty prefix list = always matches (wildcard), path unchanged
//! - First match wins (declaration order)
//! - No regex to guarantee O(n) matching

/// Compiled path rules of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRules {
    prefixes: Vec<String>,
    strip_prefix: bool,
}

impl PathRules {
    pub fn new(prefixes: Vec<String>, strip_prefix: bool) -> Self {
        Self {
            prefixes,
            strip_prefix,
        }
    }

    /// Rules that forward every path unchanged.
    pub fn match_all() -> Self {
        Self::new(Vec::new(), false)
    }

    /// Returns the first prefix that `path` starts with.
    pub fn matched_prefix(&self, path: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .map(String::as_str)
            .find(|prefix| path.starts_with(prefix))
    }

    /// Returns the path to forward, or `None` if no prefix matches.
    ///
    /// Stripping removes exactly the matched text. `/ap` against `/api`
    /// leaves `i`, which is forwarded as `/i`.
    pub fn rewrite(&self, path: &str) -> Option<String> {
        if self.prefixes.is_empty() {
            return Some(path.to_string());
        }

        let prefix = self.matched_prefix(path)?;
        if !self.strip_prefix {
            return Some(path.to_string());
        }

        let rest = &path[prefix.len()..];
        Some(if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{}", rest)
        })
    }
}
