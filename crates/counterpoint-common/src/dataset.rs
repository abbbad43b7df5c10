//! Tabular question/answer dataset.
//!
//! Every row carries a stable `id` assigned when the dataset is loaded:
//! taken from the record when it has one, otherwise the record's position
//! in the input file. Filtering never renumbers rows, so ids recorded in
//! cache files keep pointing at the same question after rows are dropped.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cache_file;
use crate::error::{CounterpointError, Result};

/// One question with its human and generated answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub id: u64,
    pub question: String,
    #[serde(default)]
    pub human_answers: Vec<String>,
    #[serde(default)]
    pub generated_answers: Vec<String>,
    /// Columns this crate does not interpret, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DatasetRow {
    pub fn new(id: u64, question: impl Into<String>, human_answers: Vec<String>) -> Self {
        Self {
            id,
            question: question.into(),
            human_answers,
            generated_answers: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Sets (or replaces) an extra column.
    pub fn set_column(&mut self, name: impl Into<String>, value: Value) {
        self.extra.insert(name.into(), value);
    }

    pub fn column(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Older exports name the generated answers this way.
const LEGACY_GENERATED_COLUMN: &str = "chatgpt_answers";

/// Input record shape: [`DatasetRow`] with an optional id and optional
/// generated answers.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<u64>,
    question: String,
    #[serde(default)]
    human_answers: Vec<String>,
    #[serde(default)]
    generated_answers: Option<Vec<String>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl RawRecord {
    /// `generated_answers` wins when both columns are present; the legacy
    /// column then stays in `extra` untouched.
    fn into_row(mut self, position: usize, path: &Path) -> Result<DatasetRow> {
        let generated_answers = match self.generated_answers {
            Some(answers) => answers,
            None => match self.extra.remove(LEGACY_GENERATED_COLUMN) {
                Some(value) => serde_json::from_value(value)
                    .map_err(|e| CounterpointError::serialization(path, e))?,
                None => Vec::new(),
            },
        };
        Ok(DatasetRow {
            id: self.id.unwrap_or(position as u64),
            question: self.question,
            human_answers: self.human_answers,
            generated_answers,
            extra: self.extra,
        })
    }
}

/// Ordered collection of [`DatasetRow`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Dataset {
    rows: Vec<DatasetRow>,
}

impl Dataset {
    /// Builds a dataset from rows that already carry ids.
    pub fn from_rows(rows: Vec<DatasetRow>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(row.id) {
                return Err(CounterpointError::Dataset(format!("duplicate row id {}", row.id)));
            }
        }
        Ok(Self { rows })
    }

    /// Loads a JSON array of records, or JSON Lines when the extension is `.jsonl`.
    pub fn load(path: &Path) -> Result<Self> {
        let records: Vec<RawRecord> = if path.extension().is_some_and(|e| e == "jsonl") {
            let text = fs::read_to_string(path).map_err(|e| CounterpointError::io(path, e))?;
            text.lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| {
                    serde_json::from_str(line).map_err(|e| CounterpointError::serialization(path, e))
                })
                .collect::<Result<_>>()?
        } else {
            cache_file::read_json(path)?
        };

        let rows = records
            .into_iter()
            .enumerate()
            .map(|(position, record)| record.into_row(position, path))
            .collect::<Result<Vec<_>>>()?;

        let dataset = Self::from_rows(rows)?;
        debug!(path = %path.display(), rows = dataset.len(), "dataset loaded");
        Ok(dataset)
    }

    /// Writes the dataset as an indented JSON array of records.
    pub fn save(&self, path: &Path) -> Result<()> {
        cache_file::write_json_pretty(path, self)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [DatasetRow] {
        &mut self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DatasetRow> {
        self.rows.iter()
    }

    pub fn get(&self, id: u64) -> Option<&DatasetRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    /// Question texts in row order.
    pub fn questions(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.question.clone()).collect()
    }

    /// Keeps rows with at least `min` human answers.
    pub fn with_min_human_answers(&self, min: usize) -> Self {
        Self {
            rows: self
                .rows
                .iter()
                .filter(|row| row.human_answers.len() >= min)
                .cloned()
                .collect(),
        }
    }

    /// Drops the rows whose id is listed. Unknown ids are ignored.
    pub fn without_ids(&self, ids: &[u64]) -> Self {
        let drop: HashSet<u64> = ids.iter().copied().collect();
        Self {
            rows: self
                .rows
                .iter()
                .filter(|row| !drop.contains(&row.id))
                .cloned()
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a DatasetRow;
    type IntoIter = std::slice::Iter<'a, DatasetRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
