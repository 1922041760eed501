use anyhow::Result;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

/// Standard size for MiniLM-style sentence embeddings
pub const EMBEDDING_DIM: usize = 384;

/// Turns text into a fixed-size vector for similarity ranking
pub trait EmbeddingEngine: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic local embedder: hashes character unigrams and bigrams into
/// buckets. Works for Chinese text where whitespace tokenization does not.
pub struct HashingEmbedder {
    dim: usize,
    cache: RwLock<HashMap<String, Vec<f32>>>,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim: dim.max(1),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn bucket<T: Hash>(&self, feature: T) -> usize {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        (hasher.finish() % self.dim as u64) as usize
    }

    fn compute(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dim];
        let chars: Vec<char> = text
            .chars()
            .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation())
            .collect();

        for c in &chars {
            embedding[self.bucket(c)] += 1.0;
        }
        for pair in chars.windows(2) {
            embedding[self.bucket((pair[0], pair[1]))] += 2.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in embedding.iter_mut() {
                *value /= norm;
            }
        }
        embedding
    }
}

impl EmbeddingEngine for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(text)
        {
            return Ok(cached.clone());
        }

        let embedding = self.compute(text);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(text.to_string(), embedding.clone());

        Ok(embedding)
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}
