pub mod embedding;
pub mod memory_index;
pub mod vector_store;

pub use embedding::{cosine_similarity, EmbeddingEngine, HashingEmbedder, EMBEDDING_DIM};
pub use memory_index::{MemoryIndex, MemoryRegistry};
pub use vector_store::{InMemoryVectorStore, VectorStore};
