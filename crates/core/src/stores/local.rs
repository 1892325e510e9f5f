use crate::error::RagError;
use crate::models::{Chunk, ScoredChunk, SimilarityMetric};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const INDEX_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexRecord {
    chunk: Chunk,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    collection: String,
    embedding_model: String,
    metric: SimilarityMetric,
    dimensions: usize,
    built_at: DateTime<Utc>,
    records: Vec<IndexRecord>,
}

/// Directory-backed vector collection. The whole collection lives in one
/// JSON file and is held in memory once opened; it is never mutated after
/// `create`, so a shared reference may serve any number of sessions.
#[derive(Debug)]
pub struct LocalVectorStore {
    directory: PathBuf,
    collection: String,
    embedding_model: String,
    metric: SimilarityMetric,
    dimensions: usize,
    built_at: DateTime<Utc>,
    records: Vec<IndexRecord>,
}

impl LocalVectorStore {
    pub fn collection_path(directory: &Path, collection: &str) -> PathBuf {
        directory.join(format!("{collection}.json"))
    }

    /// Replaces whatever is stored in `directory` with a fresh collection.
    pub async fn create(
        directory: &Path,
        collection: &str,
        embedding_model: &str,
        metric: SimilarityMetric,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, RagError> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::IndexUnavailable(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = embeddings.iter().find(|vector| vector.len() != dimensions) {
            return Err(RagError::IndexUnavailable(format!(
                "embedding dimension {} != {}",
                bad.len(),
                dimensions
            )));
        }

        if tokio::fs::try_exists(directory).await? {
            warn!(directory = %directory.display(), "existing vector index found, removing it");
            tokio::fs::remove_dir_all(directory).await?;
        }
        tokio::fs::create_dir_all(directory).await?;

        let store = Self {
            directory: directory.to_path_buf(),
            collection: collection.to_string(),
            embedding_model: embedding_model.to_string(),
            metric,
            dimensions,
            built_at: Utc::now(),
            records: chunks
                .into_iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| IndexRecord { chunk, embedding })
                .collect(),
        };
        store.persist().await?;

        info!(
            directory = %directory.display(),
            collection,
            records = store.records.len(),
            dimensions,
            "vector index written"
        );
        Ok(store)
    }

    pub async fn open(directory: &Path, collection: &str) -> Result<Self, RagError> {
        if !tokio::fs::try_exists(directory).await.unwrap_or(false) {
            return Err(RagError::IndexNotFound(directory.to_path_buf()));
        }

        let path = Self::collection_path(directory, collection);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(RagError::IndexNotFound(path));
        }

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|error| RagError::IndexUnavailable(format!("{}: {error}", path.display())))?;
        let file: IndexFile = serde_json::from_str(&raw)
            .map_err(|error| RagError::IndexUnavailable(format!("{}: {error}", path.display())))?;

        if file.version > INDEX_SCHEMA_VERSION {
            return Err(RagError::IndexUnavailable(format!(
                "index schema version {} is newer than supported {}",
                file.version, INDEX_SCHEMA_VERSION
            )));
        }

        if file.collection != collection {
            return Err(RagError::IndexUnavailable(format!(
                "file holds collection {} instead of {}",
                file.collection, collection
            )));
        }

        if let Some(bad) = file
            .records
            .iter()
            .find(|record| record.embedding.len() != file.dimensions)
        {
            return Err(RagError::IndexUnavailable(format!(
                "record {} has embedding dimension {} != {}",
                bad.chunk.chunk_id,
                bad.embedding.len(),
                file.dimensions
            )));
        }

        info!(
            collection,
            records = file.records.len(),
            embedding_model = %file.embedding_model,
            built_at = %file.built_at.to_rfc3339(),
            "vector index opened"
        );

        Ok(Self {
            directory: directory.to_path_buf(),
            collection: file.collection,
            embedding_model: file.embedding_model,
            metric: file.metric,
            dimensions: file.dimensions,
            built_at: file.built_at,
            records: file.records,
        })
    }

    async fn persist(&self) -> Result<(), RagError> {
        let file = IndexFile {
            version: INDEX_SCHEMA_VERSION,
            collection: self.collection.clone(),
            embedding_model: self.embedding_model.clone(),
            metric: self.metric,
            dimensions: self.dimensions,
            built_at: self.built_at,
            records: self.records.clone(),
        };

        let path = Self::collection_path(&self.directory, &self.collection);
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec(&file)?).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.records.iter().map(|record| &record.chunk)
    }
}

#[async_trait]
impl VectorIndex for LocalVectorStore {
    fn len(&self) -> usize {
        self.records.len()
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        if self.records.is_empty() {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimensions {
            return Err(RagError::IndexUnavailable(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<ScoredChunk> = self
            .records
            .iter()
            .map(|record| ScoredChunk {
                chunk: record.chunk.clone(),
                score: self.metric.score(&record.embedding, query_vector),
            })
            .collect();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceOffset;
    use tempfile::tempdir;

    fn chunk(index: u64, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("chunk-{index}"),
            text: text.to_string(),
            source_offset: SourceOffset {
                page: 1,
                chunk_index: index,
            },
        }
    }

    async fn sample_store(directory: &Path) -> LocalVectorStore {
        LocalVectorStore::create(
            directory,
            "road_users_code_rag",
            "test-model",
            SimilarityMetric::Cosine,
            vec![chunk(0, "speed limits"), chunk(1, "parking"), chunk(2, "signals")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn open_reads_back_what_create_wrote() {
        let dir = tempdir().unwrap();
        let index_dir = dir.path().join("chroma_db");
        sample_store(&index_dir).await;

        let opened = LocalVectorStore::open(&index_dir, "road_users_code_rag")
            .await
            .unwrap();
        assert_eq!(opened.len(), 3);
        assert_eq!(opened.dimensions(), 2);
        assert_eq!(opened.embedding_model(), "test-model");
        assert_eq!(opened.chunks().next().map(|c| c.text.as_str()), Some("speed limits"));
    }

    #[tokio::test]
    async fn search_ranks_by_similarity_and_honours_top_k() {
        let dir = tempdir().unwrap();
        let store = sample_store(dir.path()).await;

        let hits = store.search(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_id, "chunk-0");
        assert_eq!(hits[1].chunk.chunk_id, "chunk-2");
    }

    #[tokio::test]
    async fn missing_directory_is_index_not_found() {
        let dir = tempdir().unwrap();
        let result = LocalVectorStore::open(&dir.path().join("absent"), "road_users_code_rag").await;
        assert!(matches!(result, Err(RagError::IndexNotFound(_))));
    }

    #[tokio::test]
    async fn missing_collection_file_is_index_not_found() {
        let dir = tempdir().unwrap();
        sample_store(dir.path()).await;
        let result = LocalVectorStore::open(dir.path(), "other_collection").await;
        assert!(matches!(result, Err(RagError::IndexNotFound(_))));
    }

    #[tokio::test]
    async fn corrupt_collection_file_is_unavailable() {
        let dir = tempdir().unwrap();
        std::fs::write(
            LocalVectorStore::collection_path(dir.path(), "road_users_code_rag"),
            b"{not json",
        )
        .unwrap();
        let result = LocalVectorStore::open(dir.path(), "road_users_code_rag").await;
        assert!(matches!(result, Err(RagError::IndexUnavailable(_))));
    }

    #[tokio::test]
    async fn record_shorter_than_header_dimension_is_unavailable() {
        let dir = tempdir().unwrap();
        let file = IndexFile {
            version: INDEX_SCHEMA_VERSION,
            collection: "road_users_code_rag".to_string(),
            embedding_model: "test-model".to_string(),
            metric: SimilarityMetric::Cosine,
            dimensions: 2,
            built_at: Utc::now(),
            records: vec![IndexRecord {
                chunk: chunk(0, "short"),
                embedding: vec![1.0],
            }],
        };
        std::fs::write(
            LocalVectorStore::collection_path(dir.path(), "road_users_code_rag"),
            serde_json::to_vec(&file).unwrap(),
        )
        .unwrap();

        let result = LocalVectorStore::open(dir.path(), "road_users_code_rag").await;
        assert!(matches!(result, Err(RagError::IndexUnavailable(message)) if message.contains("chunk-0")));
    }

    #[tokio::test]
    async fn wrong_query_dimension_is_unavailable() {
        let dir = tempdir().unwrap();
        let store = sample_store(dir.path()).await;
        let result = store.search(&[1.0, 0.0, 0.0], 4).await;
        assert!(matches!(result, Err(RagError::IndexUnavailable(_))));
    }

    #[tokio::test]
    async fn create_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join("stale.bin");
        std::fs::write(&stale, b"old").unwrap();

        sample_store(dir.path()).await;
        assert!(!stale.exists());
    }
}
