//! Shared testing utilities: a scripted in-memory backend and dataset fixtures.

pub use pretty_assertions;

mod mock;

pub use mock::{fingerprint, MockBackend};

use counterpoint_common::{Dataset, DatasetRow};

/// `n` rows with ids `0..n`, questions `"q{i}"` and three human answers each.
pub fn dataset_with_questions(n: usize) -> Dataset {
    let rows = (0..n as u64)
        .map(|i| {
            DatasetRow::new(
                i,
                format!("q{i}"),
                vec![format!("h{i}a"), format!("h{i}b"), format!("h{i}c")],
            )
        })
        .collect();
    Dataset::from_rows(rows).unwrap_or_default()
}

/// Owned strings from string literals.
pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
