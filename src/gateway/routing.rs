//! Placeholder parsing, route translation, and route-table matching.
//!
//! A configured route carries exactly one `{name}` placeholder.
//! [`RoutePattern::translate`] turns it into one of three shapes:
//! an exact path (no placeholder), a single-segment capture (placeholder
//! is the last segment) or a greedy capture that swallows the remainder
//! of the path and later has the literal suffix stripped.
//!
//! [`RouteTable::match_path`] scores every pattern that matches a
//! request path by specificity: exact beats single-segment beats greedy,
//! and longer literal text wins ties. The first declared route wins
//! when scores are equal.

use std::fmt;

use crate::error::StratumError;

/// Return the placeholder name between the first `{` and the first `}`.
///
/// The opener check runs first, so `"user_id}"` reports a missing `{`.
/// A `}` that precedes the first `{` counts as a missing closer.
pub fn extract_placeholder(route: &str) -> Result<&str, StratumError> {
    let Some(start) = route.find('{') else {
        return Err(malformed(route, "no '{' found in route"));
    };
    match route.find('}') {
        Some(end) if end > start => Ok(&route[start + 1..end]),
        _ => Err(malformed(route, "no '}' found after '{' in route")),
    }
}

fn malformed(route: &str, reason: &'static str) -> StratumError {
    StratumError::MalformedRoute {
        route: route.to_string(),
        reason,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    /// No placeholder; the path must match verbatim.
    Exact(String),
    /// Placeholder is the final segment: `/users/{id}`.
    Segment { prefix: String, name: String },
    /// Content follows the placeholder: `/users/{id}/avatar`.
    Greedy {
        prefix: String,
        name: String,
        suffix: String,
    },
}

impl RoutePattern {
    /// Translate a configured route into its matching shape.
    ///
    /// Routes without a well-formed placeholder pass through as exact
    /// paths; validation rejects those before a table is built.
    #[must_use]
    pub fn translate(route: &str) -> Self {
        let (Some(start), Some(end)) = (route.find('{'), route.find('}')) else {
            return Self::Exact(route.to_string());
        };
        if end < start {
            return Self::Exact(route.to_string());
        }

        let prefix = route[..start].to_string();
        let name = route[start + 1..end].to_string();
        let suffix = &route[end + 1..];

        if suffix.is_empty() {
            Self::Segment { prefix, name }
        } else {
            Self::Greedy {
                prefix,
                name,
                suffix: suffix.to_string(),
            }
        }
    }

    /// Return the raw captured text if `path` matches this pattern.
    ///
    /// For exact patterns the capture is empty.
    #[must_use]
    pub fn captures<'p>(&self, path: &'p str) -> Option<&'p str> {
        match self {
            Self::Exact(exact) => (path == exact).then_some(""),
            Self::Segment { prefix, .. } => path
                .strip_prefix(prefix.as_str())
                .filter(|rest| !rest.contains('/')),
            Self::Greedy { prefix, .. } => path.strip_prefix(prefix.as_str()),
        }
    }

    /// Turn a captured value into the identifier, stripping the literal
    /// suffix of greedy patterns when present.
    #[must_use]
    pub fn identifier<'c>(&self, captured: &'c str) -> &'c str {
        match self {
            Self::Greedy { suffix, .. } => captured
                .strip_suffix(suffix.as_str())
                .unwrap_or(captured),
            _ => captured,
        }
    }

    fn specificity(&self) -> (u8, usize) {
        match self {
            Self::Exact(exact) => (2, exact.len()),
            Self::Segment { prefix, .. } => (1, prefix.len()),
            Self::Greedy { prefix, suffix, .. } => (0, prefix.len() + suffix.len()),
        }
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => f.write_str(exact),
            Self::Segment { prefix, name } => write!(f, "{prefix}:{name}"),
            Self::Greedy { prefix, name, .. } => write!(f, "{prefix}*{name}"),
        }
    }
}

/// Ordered set of patterns, each bound to a payload.
#[derive(Debug)]
pub struct RouteTable<T> {
    entries: Vec<(RoutePattern, T)>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RouteTable<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, pattern: RoutePattern, value: T) {
        self.entries.push((pattern, value));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoutePattern, &T)> {
        self.entries.iter().map(|(pattern, value)| (pattern, value))
    }

    /// Find the most specific pattern matching `path`.
    #[must_use]
    pub fn match_path<'p>(&self, path: &'p str) -> Option<(&RoutePattern, &T, &'p str)> {
        let mut best: Option<((u8, usize), usize, &'p str)> = None;

        for (idx, (pattern, _)) in self.entries.iter().enumerate() {
            let Some(captured) = pattern.captures(path) else {
                continue;
            };
            let score = pattern.specificity();
            match best {
                Some((best_score, _, _)) if best_score >= score => {}
                _ => best = Some((score, idx, captured)),
            }
        }

        best.map(|(_, idx, captured)| {
            let (pattern, value) = &self.entries[idx];
            (pattern, value, captured)
        })
    }
}
