//! Metrics snapshot normalization and structural comparison
//!
//! A snapshot is the raw text a monitor endpoint returns, one metric per line
//! in the form `<path> <value> <timestamp>` (Graphite plaintext). Comparison
//! happens in three steps:
//!
//! 1. [`RelevanceFilter`] keeps lines of the subsystem under test
//! 2. [`NormalizedSnapshot::from_raw`] filters and sorts lines so emission
//!    order does not matter
//! 3. [`NormalizedSnapshot::paths`] strips value and timestamp, leaving a
//!    [`PathProjection`] that only describes the shape of the metrics
//!
//! # Example
//!
//! ```
//! use metricmatch::snapshot::{NormalizedSnapshot, RelevanceFilter};
//!
//! let filter = RelevanceFilter::default();
//! let live = NormalizedSnapshot::from_raw("mongo_b 2 100\nhttp_x 1 100\nmongo_a 1 100", &filter);
//! assert_eq!(live.as_str(), "mongo_a 1 100\nmongo_b 2 100");
//! assert_eq!(live.paths().as_str(), "mongo_a\nmongo_b");
//! ```

use std::collections::BTreeMap;
use std::fmt;

/// Default subsystem tag
pub const DEFAULT_SUBSYSTEM_TAG: &str = "mongo";

/// Error markers excluded by default
///
/// These errors sometimes appear while the service is starting up and are
/// not reproducible on demand.
pub const DEFAULT_EXCLUDED_MARKERS: [&str; 2] =
    ["mongo_error=network", "mongo_error=cluster-unavailable"];

/// Decides whether a metric line belongs to the subsystem under test
///
/// A line is relevant iff it contains the subsystem tag and none of the
/// excluded markers. Markers win over the tag match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceFilter {
    subsystem_tag: String,
    excluded_markers: Vec<String>,
}

impl RelevanceFilter {
    /// Create a filter for an arbitrary subsystem tag and marker set
    pub fn new<T, I, M>(subsystem_tag: T, excluded_markers: I) -> Self
    where
        T: Into<String>,
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        Self {
            subsystem_tag: subsystem_tag.into(),
            excluded_markers: excluded_markers.into_iter().map(Into::into).collect(),
        }
    }

    /// Get the subsystem tag
    pub fn subsystem_tag(&self) -> &str {
        &self.subsystem_tag
    }

    /// Get the excluded markers
    pub fn excluded_markers(&self) -> &[String] {
        &self.excluded_markers
    }

    pub fn is_relevant(&self, line: &str) -> bool {
        if !line.contains(self.subsystem_tag.as_str()) {
            return false;
        }

        !self
            .excluded_markers
            .iter()
            .any(|marker| line.contains(marker.as_str()))
    }
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSYSTEM_TAG, DEFAULT_EXCLUDED_MARKERS)
    }
}

/// Relevant lines of a snapshot, sorted by full line text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedSnapshot(String);

impl NormalizedSnapshot {
    /// Filter and sort a raw snapshot
    ///
    /// Lines are split with [`split_lines`]. Sorting is byte-wise on the
    /// whole line (path, value and timestamp), duplicates are kept. Lines
    /// are joined with `\n` without a trailing newline.
    pub fn from_raw(raw: &str, filter: &RelevanceFilter) -> Self {
        let mut lines: Vec<&str> = split_lines(raw)
            .into_iter()
            .filter(|line| filter.is_relevant(line))
            .collect();
        lines.sort_unstable();
        Self(lines.join("\n"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn line_count(&self) -> usize {
        split_lines(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path-only view of this snapshot
    pub fn paths(&self) -> PathProjection {
        PathProjection(hide_values(&self.0))
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metric paths of a normalized snapshot, values and timestamps removed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathProjection(String);

impl PathProjection {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        split_lines(&self.0).into_iter()
    }

    /// Multiset difference against the expected projection
    pub fn diff(&self, expected: &PathProjection) -> PathDiff {
        let mut balance: BTreeMap<&str, i64> = BTreeMap::new();
        for path in expected.lines() {
            *balance.entry(path).or_default() += 1;
        }
        for path in self.lines() {
            *balance.entry(path).or_default() -= 1;
        }

        let mut diff = PathDiff::default();
        for (path, count) in balance {
            // positive: expected more often than seen
            for _ in 0..count.max(0) {
                diff.missing.push(path.to_string());
            }
            for _ in 0..(-count).max(0) {
                diff.unexpected.push(path.to_string());
            }
        }
        diff
    }
}

impl fmt::Display for PathProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Paths present on one side of a comparison only
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathDiff {
    /// In the fixture, not in the live snapshot
    pub missing: Vec<String>,
    /// In the live snapshot, not in the fixture
    pub unexpected: Vec<String>,
}

impl PathDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Split text into lines on every Unicode line boundary
///
/// Breaks on `\n`, `\r`, `\x0b`, `\x0c`, `\x1c`, `\x1d`, `\x1e`, `\u{85}`,
/// `\u{2028}` and `\u{2029}`; `\r\n` counts as one break. Separators are not
/// part of the returned lines and a separator at the end of the input does
/// not produce a trailing empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..i]);
        start = i + c.len_utf8();
        if c == '\r' && matches!(chars.peek(), Some((_, '\n'))) {
            chars.next();
            start += 1;
        }
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n'
            | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Drop the value and timestamp of every line
///
/// Each line is split from the right on single spaces, at most twice, and
/// only the leftmost part is kept. Lines with fewer tokens keep whatever is
/// left of the first split (`"a b"` becomes `"a"`, `"a"` stays `"a"`).
pub fn hide_values(metrics: &str) -> String {
    split_lines(metrics)
        .into_iter()
        .map(|line| line.rsplitn(3, ' ').last().unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}
