//! Reply store: policy name → per-row completions.
//!
//! JSON layout, keys in insertion order:
//!
//! ```json
//! {
//!   "gpt":   [[0, ["r1", "r2", "r3"]], [1, []]],
//!   "human": [[0, [["a", "a", "a"], ["b", "b", "b"]]]]
//! }
//! ```
//!
//! Model rows pair a row id with its completions. The reserved `"human"`
//! entry pairs a row id with each human answer repeated N times, so it has
//! the same shape per answer as a model row. Alongside the JSON file the
//! store keeps an `rkyv` snapshot (same path, `.rkyv` extension) for quick
//! reloads.

use std::fmt;
use std::path::{Path, PathBuf};

use counterpoint_common::{cache_file, CacheState, CounterpointError};
use rkyv::rancor::Error as RkyvError;
use rkyv::util::AlignedVec;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::Result;

pub const HUMAN_POLICY: &str = "human";
const SNAPSHOT_EXTENSION: &str = "rkyv";

/// `[row id, [completion, ...]]`
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize,
)]
pub struct ModelRow(pub u64, pub Vec<String>);

/// `[row id, [[answer × N], ...]]`
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize,
)]
pub struct HumanRow(pub u64, pub Vec<Vec<String>>);

#[derive(Debug, Clone, PartialEq, Serialize, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[serde(untagged)]
pub enum PolicyReplies {
    Model(Vec<ModelRow>),
    Human(Vec<HumanRow>),
}

impl PolicyReplies {
    pub fn row_count(&self) -> usize {
        match self {
            PolicyReplies::Model(rows) => rows.len(),
            PolicyReplies::Human(rows) => rows.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
struct PolicyEntry {
    name: String,
    replies: PolicyReplies,
}

#[derive(Debug, Clone, Default, PartialEq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub struct ReplyStore {
    entries: Vec<PolicyEntry>,
}

/// Each answer repeated `n` times, one group per answer.
pub fn replicate_answers(answers: &[String], n: usize) -> Vec<Vec<String>> {
    answers.iter().map(|answer| vec![answer.clone(); n]).collect()
}

impl ReplyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, policy: &str) -> bool {
        self.entries.iter().any(|e| e.name == policy)
    }

    pub fn get(&self, policy: &str) -> Option<&PolicyReplies> {
        self.entries.iter().find(|e| e.name == policy).map(|e| &e.replies)
    }

    pub fn model_rows(&self, policy: &str) -> Option<&[ModelRow]> {
        match self.get(policy)? {
            PolicyReplies::Model(rows) => Some(rows),
            PolicyReplies::Human(_) => None,
        }
    }

    pub fn human_rows(&self) -> Option<&[HumanRow]> {
        match self.get(HUMAN_POLICY)? {
            PolicyReplies::Human(rows) => Some(rows),
            PolicyReplies::Model(_) => None,
        }
    }

    pub fn insert_model(&mut self, policy: impl Into<String>, rows: Vec<ModelRow>) {
        self.put(policy.into(), PolicyReplies::Model(rows));
    }

    /// Replaces the `"human"` entry.
    pub fn set_human(&mut self, rows: Vec<HumanRow>) {
        self.put(HUMAN_POLICY.to_string(), PolicyReplies::Human(rows));
    }

    fn put(&mut self, name: String, replies: PolicyReplies) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.replies = replies,
            None => self.entries.push(PolicyEntry { name, replies }),
        }
    }

    /// Policy names in insertion order, `"human"` included.
    pub fn policies(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PolicyReplies)> {
        self.entries.iter().map(|e| (e.name.as_str(), &e.replies))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load(path: &Path) -> Result<CacheState<Self>> {
        Ok(CacheState::probe(path)?)
    }

    /// Writes the JSON file and the binary snapshot next to it.
    pub fn save(&self, path: &Path) -> Result<()> {
        cache_file::write_json(path, self)?;
        self.save_snapshot(&Self::snapshot_path(path))
    }

    pub fn snapshot_path(path: &Path) -> PathBuf {
        path.with_extension(SNAPSHOT_EXTENSION)
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let bytes = rkyv::to_bytes::<RkyvError>(self).map_err(|e| CounterpointError::Snapshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        cache_file::write_bytes(path, &bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "reply snapshot written");
        Ok(())
    }

    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let raw = cache_file::read_bytes(path)?;
        // Archived data must be read from an aligned buffer.
        let mut aligned = AlignedVec::<16>::with_capacity(raw.len());
        aligned.extend_from_slice(&raw);
        let store = rkyv::from_bytes::<Self, RkyvError>(&aligned).map_err(|e| {
            CounterpointError::Snapshot { path: path.to_path_buf(), reason: e.to_string() }
        })?;
        Ok(store)
    }
}

impl Serialize for ReplyStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, &entry.replies)?;
        }
        map.end()
    }
}

struct ReplyStoreVisitor;

impl<'de> Visitor<'de> for ReplyStoreVisitor {
    type Value = ReplyStore;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of policy name to reply rows")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<ReplyStore, A::Error> {
        let mut store = ReplyStore::new();
        while let Some(name) = map.next_key::<String>()? {
            let replies = if name == HUMAN_POLICY {
                PolicyReplies::Human(map.next_value()?)
            } else {
                PolicyReplies::Model(map.next_value()?)
            };
            store.put(name, replies);
        }
        Ok(store)
    }
}

impl<'de> Deserialize<'de> for ReplyStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(ReplyStoreVisitor)
    }
}
