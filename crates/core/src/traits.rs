use crate::error::RagError;
use crate::models::ScoredChunk;
use async_trait::async_trait;

#[async_trait]
pub trait Embedder {
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

/// Read-only nearest-neighbour lookup over the chunks of one collection.
#[async_trait]
pub trait VectorIndex {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RagError>;
}

#[async_trait]
pub trait Generator {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, RagError>;
}
