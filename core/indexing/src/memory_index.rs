use anyhow::Result;
use chrono::NaiveDate;
use daylife_schemas::MemoryRecord;
use daylife_timeline::{format_day, next_n_day, same_day_previous_month};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use crate::embedding::EmbeddingEngine;
use crate::vector_store::{InMemoryVectorStore, VectorStore};

/// Days of recent history in a short-term digest, including the day itself
const RECENT_DAYS: i64 = 4;
const WEEK_DAYS: i64 = 7;
const TOPIC_MATCHES: usize = 2;

struct IndexState {
    records: Vec<MemoryRecord>,
    topics: InMemoryVectorStore,
}

/// Append-only store of past days' events, searchable by date and by topic
pub struct MemoryIndex {
    key: String,
    state: RwLock<IndexState>,
    embedder: Arc<dyn EmbeddingEngine>,
}

impl MemoryIndex {
    pub fn new(key: impl Into<String>, embedder: Arc<dyn EmbeddingEngine>) -> Self {
        Self {
            key: key.into(),
            state: RwLock::new(IndexState {
                records: Vec::new(),
                topics: InMemoryVectorStore::new(),
            }),
            embedder,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&self, record: MemoryRecord) -> Result<()> {
        let embedding = self.embedder.embed(&record.events)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let row_id = state.records.len().to_string();
        state.topics.add(&row_id, embedding)?;
        debug!("Memory index {} stored record for {}", self.key, record.date);
        state.records.push(record);

        Ok(())
    }

    /// Copy of this index with `pending` added; this index is left unchanged
    pub fn staged(&self, pending: MemoryRecord) -> Result<MemoryIndex> {
        let records = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone();

        let staged = MemoryIndex::new(self.key.clone(), self.embedder.clone());
        for record in records.into_iter().chain(std::iter::once(pending)) {
            staged.add(record)?;
        }
        Ok(staged)
    }

    pub fn search_by_date(&self, date: &str) -> Vec<MemoryRecord> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .iter()
            .filter(|r| r.date == date)
            .cloned()
            .collect()
    }

    /// Up to `top_k` records ranked by similarity of their events to `topic`
    pub fn search_by_topic(&self, topic: &str, top_k: usize) -> Result<Vec<MemoryRecord>> {
        let query = self.embedder.embed(topic)?;

        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let hits = state.topics.search(&query, top_k)?;

        Ok(hits
            .into_iter()
            .filter_map(|(row_id, _)| row_id.parse::<usize>().ok())
            .filter_map(|row| state.records.get(row).cloned())
            .collect())
    }

    /// Digest of what the persona should have fresh in mind after `date`.
    ///
    /// Collects, in order: the four days ending at `date`; the same day last
    /// month and the same weekday last week, both counted from the day after
    /// `date`; then up to two records similar to `topic_hint` from days not
    /// already collected.
    pub fn compose_short_term_memory(&self, topic_hint: &str, date: NaiveDate) -> Result<String> {
        let mut collected: Vec<MemoryRecord> = Vec::new();

        for offset in (0..RECENT_DAYS).rev() {
            collected.extend(self.search_by_date(&format_day(next_n_day(date, -offset))));
        }

        let anchor = next_n_day(date, 1);
        for cycle_day in [same_day_previous_month(anchor), next_n_day(anchor, -WEEK_DAYS)] {
            collected.extend(self.search_by_date(&format_day(cycle_day)));
        }

        if !topic_hint.trim().is_empty() {
            let mut covered: HashSet<String> = collected.iter().map(|r| r.date.clone()).collect();
            let candidates = self.search_by_topic(topic_hint, self.len())?;

            let mut added = 0;
            for record in candidates {
                if added == TOPIC_MATCHES {
                    break;
                }
                if covered.insert(record.date.clone()) {
                    collected.push(record);
                    added += 1;
                }
            }
        }

        debug!(
            "Short-term memory for {} built from {} records",
            format_day(date),
            collected.len()
        );

        Ok(collected
            .iter()
            .map(|r| r.events.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// One [`MemoryIndex`] per key, all fed from a shared history.
///
/// A new index starts with every record published so far; records published
/// later are appended to every live index.
pub struct MemoryRegistry {
    embedder: Arc<dyn EmbeddingEngine>,
    indexes: RwLock<HashMap<String, Arc<MemoryIndex>>>,
    history: RwLock<Vec<MemoryRecord>>,
}

impl MemoryRegistry {
    pub fn new(embedder: Arc<dyn EmbeddingEngine>) -> Self {
        Self {
            embedder,
            indexes: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }

    /// Registry whose history starts with `records`, e.g. days remembered from an earlier run
    pub fn with_history(embedder: Arc<dyn EmbeddingEngine>, records: Vec<MemoryRecord>) -> Self {
        let registry = Self::new(embedder);
        *registry
            .history
            .write()
            .unwrap_or_else(PoisonError::into_inner) = records;
        registry
    }

    pub fn index_for(&self, key: &str) -> Result<Arc<MemoryIndex>> {
        let mut indexes = self.indexes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = indexes.get(key) {
            return Ok(index.clone());
        }

        let index = Arc::new(MemoryIndex::new(key, self.embedder.clone()));
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        for record in history.iter() {
            index.add(record.clone())?;
        }

        info!("Created memory index {} with {} records", key, history.len());
        indexes.insert(key.to_string(), index.clone());
        Ok(index)
    }

    pub fn publish(&self, record: MemoryRecord) -> Result<()> {
        let indexes = self.indexes.read().unwrap_or_else(PoisonError::into_inner);
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);

        for index in indexes.values() {
            index.add(record.clone())?;
        }
        info!("Published memory for {} to {} indexes", record.date, indexes.len());
        history.push(record);

        Ok(())
    }

    pub fn history(&self) -> Vec<MemoryRecord> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
