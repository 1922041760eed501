use anyhow::Result;
use std::cmp::Ordering;

use crate::embedding::cosine_similarity;

/// Nearest-neighbour lookup over stored embeddings
pub trait VectorStore: Send + Sync {
    fn add(&mut self, id: &str, embedding: Vec<f32>) -> Result<()>;
    fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<(String, f32)>>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Brute-force store; ties keep insertion order
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    rows: Vec<(String, Vec<f32>)>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn add(&mut self, id: &str, embedding: Vec<f32>) -> Result<()> {
        self.rows.push((id.to_string(), embedding));
        Ok(())
    }

    fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        let mut scores: Vec<(String, f32)> = self
            .rows
            .iter()
            .map(|(id, embedding)| (id.clone(), cosine_similarity(query_embedding, embedding)))
            .collect();

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scores.truncate(k);

        Ok(scores)
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}
