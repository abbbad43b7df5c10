//! Embeddings of every reply in a [`ReplyStore`].
//!
//! Model rows embed their N completions. Human rows embed each human answer
//! once (the N copies in a group are identical). The whole result is one
//! JSON object written after the last policy, and an existing file is
//! returned as-is.

use std::fmt;
use std::path::Path;

use counterpoint_common::{cache_file, progress, CacheState};
use counterpoint_llm::LlmBackend;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use crate::error::Result;
use crate::replies::{PolicyReplies, ReplyStore};

/// `[row id, [vector per reply]]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedRow(pub u64, pub Vec<Vec<f64>>);

/// Policy → embedded rows, in the order of the store they came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyEmbeddings {
    entries: Vec<(String, Vec<EmbeddedRow>)>,
}

impl ReplyEmbeddings {
    pub fn get(&self, policy: &str) -> Option<&[EmbeddedRow]> {
        self.entries
            .iter()
            .find(|(name, _)| name == policy)
            .map(|(_, rows)| rows.as_slice())
    }

    pub fn policies(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ReplyEmbeddings {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, rows) in &self.entries {
            map.serialize_entry(name, rows)?;
        }
        map.end()
    }
}

struct ReplyEmbeddingsVisitor;

impl<'de> Visitor<'de> for ReplyEmbeddingsVisitor {
    type Value = ReplyEmbeddings;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of policy name to embedded rows")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut entries = Vec::new();
        while let Some((name, rows)) = map.next_entry::<String, Vec<EmbeddedRow>>()? {
            entries.push((name, rows));
        }
        Ok(ReplyEmbeddings { entries })
    }
}

impl<'de> Deserialize<'de> for ReplyEmbeddings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(ReplyEmbeddingsVisitor)
    }
}

fn texts_of(replies: &PolicyReplies) -> Vec<(u64, Vec<String>)> {
    match replies {
        PolicyReplies::Model(rows) => rows.iter().map(|r| (r.0, r.1.clone())).collect(),
        PolicyReplies::Human(rows) => rows
            .iter()
            .map(|r| (r.0, r.1.iter().filter_map(|group| group.first().cloned()).collect()))
            .collect(),
    }
}

pub async fn embed_replies(
    backend: &dyn LlmBackend,
    store: &ReplyStore,
    cache_path: &Path,
) -> Result<ReplyEmbeddings> {
    if let CacheState::Complete(cached) = CacheState::<ReplyEmbeddings>::probe(cache_path)? {
        info!(path = %cache_path.display(), policies = cached.len(), "reply embeddings loaded from cache");
        return Ok(cached);
    }

    let mut embeddings = ReplyEmbeddings::default();
    for (policy, replies) in store.iter() {
        let rows = texts_of(replies);
        let pb = progress::progress_bar(rows.len(), policy);
        let mut embedded = Vec::with_capacity(rows.len());
        for (id, texts) in rows {
            let vectors = if texts.is_empty() { Vec::new() } else { backend.embed_many(&texts).await? };
            embedded.push(EmbeddedRow(id, vectors));
            pb.inc(1);
        }
        pb.finish_and_clear();
        info!(policy, rows = embedded.len(), "policy replies embedded");
        embeddings.entries.push((policy.to_string(), embedded));
    }

    cache_file::write_json(cache_path, &embeddings)?;
    Ok(embeddings)
}
