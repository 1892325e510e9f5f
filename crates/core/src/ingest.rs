use crate::chunking::build_chunks;
use crate::config::RagConfig;
use crate::error::{IngestError, RagError};
use crate::extractor::extract_page_texts;
use crate::models::{Chunk, IngestionOptions};
use crate::stores::LocalVectorStore;
use crate::traits::{Embedder, VectorIndex};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Extracts and splits the source document.
pub fn ingest_document(path: &Path, options: &IngestionOptions) -> Result<Vec<Chunk>, IngestError> {
    if !path.exists() {
        return Err(IngestError::SourceNotFound(path.to_path_buf()));
    }

    let checksum = digest_file(path)?;
    let pages = extract_page_texts(path)?;
    let chunks = build_chunks(&pages, options)?;

    info!(
        path = %path.display(),
        checksum = %checksum,
        pages = pages.len(),
        chunks = chunks.len(),
        "document split into chunks"
    );
    Ok(chunks)
}

/// Embeds every chunk and writes a fresh collection, replacing any index
/// already in `config.index_dir`.
pub async fn build_index<E>(
    chunks: Vec<Chunk>,
    embedder: &E,
    config: &RagConfig,
) -> Result<LocalVectorStore, RagError>
where
    E: Embedder + Sync + ?Sized,
{
    let total = chunks.len();
    let mut embeddings = Vec::with_capacity(total);

    for (position, chunk) in chunks.iter().enumerate() {
        embeddings.push(embedder.embed(&chunk.text).await?);
        if (position + 1) % 50 == 0 || position + 1 == total {
            debug!(embedded = position + 1, total, "embedding chunks");
        }
    }

    let store = LocalVectorStore::create(
        &config.index_dir,
        &config.collection,
        embedder.model_name(),
        config.metric,
        chunks,
        embeddings,
    )
    .await?;

    info!(
        collection = %config.collection,
        records = store.len(),
        model = embedder.model_name(),
        "vector index built"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::testing::chunk;
    use tempfile::tempdir;

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.pdf");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        let second = digest_file(&file_path)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn missing_source_document_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = ingest_document(
            &dir.path().join("road_users_code_2020_eng.pdf"),
            &IngestionOptions::default(),
        );
        assert!(matches!(result, Err(IngestError::SourceNotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn built_index_can_be_reopened() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config = RagConfig {
            index_dir: dir.path().join("chroma_db"),
            ..RagConfig::default()
        };
        let embedder = CharacterNgramEmbedder { dimensions: 16 };
        let chunks = vec![chunk(0, "stop at red lights"), chunk(1, "yield to pedestrians")];

        let built = build_index(chunks, &embedder, &config).await?;
        assert_eq!(built.len(), 2);

        let reopened = LocalVectorStore::open(&config.index_dir, &config.collection).await?;
        assert_eq!(reopened.dimensions(), 16);
        assert_eq!(reopened.embedding_model(), "char-trigram");
        Ok(())
    }
}
