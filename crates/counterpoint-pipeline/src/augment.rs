//! Dataset copy with one response column per model policy.

use std::collections::HashMap;

use counterpoint_common::Dataset;
use serde_json::Value;
use tracing::debug;

use crate::replies::{PolicyReplies, ReplyStore};

/// Column name holding `policy`'s replies.
pub fn response_column(policy: &str) -> String {
    format!("{policy}_response")
}

/// Adds `<policy>_response` to every row for each model policy in `store`.
/// Rows the store has no replies for get an empty list. The `"human"`
/// entry is not copied; the rows already carry their human answers.
pub fn augment(dataset: &Dataset, store: &ReplyStore) -> Dataset {
    let mut copy = dataset.clone();
    for (policy, replies) in store.iter() {
        let PolicyReplies::Model(rows) = replies else {
            continue;
        };
        let by_id: HashMap<u64, &Vec<String>> = rows.iter().map(|r| (r.0, &r.1)).collect();
        let column = response_column(policy);
        for row in copy.rows_mut() {
            let value = by_id
                .get(&row.id)
                .map(|replies| Value::from(replies.to_vec()))
                .unwrap_or_else(|| Value::Array(vec![]));
            row.set_column(column.clone(), value);
        }
        debug!(policy, column = %column, "response column added");
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replies::{HumanRow, ModelRow};
    use counterpoint_common::DatasetRow;
    use serde_json::json;

    #[test]
    fn test_augment_adds_one_column_per_model_policy() {
        let dataset = Dataset::from_rows(vec![
            DatasetRow::new(3, "a", vec!["h".into()]),
            DatasetRow::new(8, "b", vec![]),
        ])
        .unwrap();
        let mut store = ReplyStore::new();
        store.insert_model("gpt", vec![ModelRow(3, vec!["r1".into(), "r2".into()]), ModelRow(8, vec![])]);
        store.insert_model("llama", vec![ModelRow(8, vec!["only".into()])]);
        store.set_human(vec![HumanRow(3, vec![vec!["h".into(); 2]])]);

        let out = augment(&dataset, &store);

        let first = out.get(3).unwrap();
        assert_eq!(first.column("gpt_response"), Some(&json!(["r1", "r2"])));
        assert_eq!(first.column("llama_response"), Some(&json!([])));
        assert_eq!(first.column("human_response"), None);
        assert_eq!(out.get(8).unwrap().column("llama_response"), Some(&json!(["only"])));
        // The input is untouched.
        assert!(dataset.get(3).unwrap().column("gpt_response").is_none());
    }
}
