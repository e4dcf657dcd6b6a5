//! Property tests for snapshot normalization.
//!
//! Invariants tested:
//! - Normalization keeps exactly the relevant lines, only reordered
//! - Normalization is idempotent
//! - Stripping values keeps line count and order
//! - Equal paths compare equal whatever the values

use metricmatch::snapshot::{NormalizedSnapshot, RelevanceFilter, hide_values};
use proptest::prelude::*;

/// One metric line, sometimes relevant, sometimes an excluded error line
fn metric_line() -> impl Strategy<Value = String> {
    let path = prop_oneof![
        "mongo_[a-z]{1,8}",
        "mongo\\.pool\\.[a-z-]{1,8}",
        "http_[a-z]{1,8}",
        Just("mongo_error=network".to_string()),
        Just("mongo.errors;mongo_error=cluster-unavailable".to_string()),
    ];
    (path, 0u32..1000, 1_600_000_000u64..1_700_000_000u64)
        .prop_map(|(path, value, ts)| format!("{} {} {}", path, value, ts))
}

fn snapshot() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(metric_line(), 0..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: the normalized snapshot is the sorted multiset of relevant lines
    #[test]
    fn normalize_keeps_exactly_relevant_lines(lines in snapshot()) {
        let filter = RelevanceFilter::default();
        let normalized = NormalizedSnapshot::from_raw(&lines.join("\n"), &filter);

        let mut expected: Vec<&str> = lines
            .iter()
            .map(String::as_str)
            .filter(|l| filter.is_relevant(l))
            .collect();
        expected.sort();

        let actual: Vec<&str> = if normalized.is_empty() {
            Vec::new()
        } else {
            normalized.as_str().split('\n').collect()
        };
        prop_assert_eq!(actual, expected);
    }

    /// Property: normalizing twice changes nothing
    #[test]
    fn normalize_is_idempotent(lines in snapshot()) {
        let filter = RelevanceFilter::default();
        let once = NormalizedSnapshot::from_raw(&lines.join("\n"), &filter);
        let twice = NormalizedSnapshot::from_raw(once.as_str(), &filter);
        prop_assert_eq!(once, twice);
    }

    /// Property: emission order does not matter
    #[test]
    fn normalize_ignores_input_order(lines in snapshot()) {
        let filter = RelevanceFilter::default();
        let mut reversed = lines.clone();
        reversed.reverse();
        prop_assert_eq!(
            NormalizedSnapshot::from_raw(&lines.join("\n"), &filter),
            NormalizedSnapshot::from_raw(&reversed.join("\n"), &filter)
        );
    }

    /// Property: stripping values keeps one path per line, in order
    #[test]
    fn hide_values_preserves_line_count_and_order(lines in snapshot()) {
        let filter = RelevanceFilter::default();
        let normalized = NormalizedSnapshot::from_raw(&lines.join("\n"), &filter);
        let stripped = hide_values(normalized.as_str());

        prop_assert_eq!(stripped.lines().count(), normalized.line_count());
        for (path, line) in stripped.lines().zip(normalized.as_str().lines()) {
            prop_assert!(line.starts_with(path));
            prop_assert_eq!(line[path.len()..].split(' ').count(), 3);
        }
    }

    /// Property: changing values and timestamps never changes the paths
    #[test]
    fn paths_ignore_values(
        paths in prop::collection::vec("mongo_[a-z]{1,8}", 0..20),
        offset in 1u32..1000,
    ) {
        let filter = RelevanceFilter::default();
        let live: Vec<String> = paths.iter().map(|p| format!("{} 1 100", p)).collect();
        let fixture: Vec<String> = paths
            .iter()
            .map(|p| format!("{} {} {}", p, offset, 100 + offset))
            .collect();

        let live = NormalizedSnapshot::from_raw(&live.join("\n"), &filter);
        let fixture = NormalizedSnapshot::from_raw(&fixture.join("\n"), &filter);
        prop_assert_eq!(live.paths(), fixture.paths());
    }
}
