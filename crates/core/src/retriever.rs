use crate::error::RagError;
use crate::models::RetrievedContext;
use crate::traits::{Embedder, VectorIndex};
use std::collections::HashSet;
use tracing::debug;

/// Runs every query variant against the index and merges the hits.
#[derive(Debug, Clone, Copy)]
pub struct MultiQueryRetriever {
    top_k: usize,
}

impl MultiQueryRetriever {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k: top_k.max(1),
        }
    }

    /// Any index failure aborts the whole retrieval; no partial context is
    /// returned.
    pub async fn retrieve<E, V>(
        &self,
        embedder: &E,
        index: &V,
        variants: &[String],
    ) -> Result<RetrievedContext, RagError>
    where
        E: Embedder + Sync + ?Sized,
        V: VectorIndex + Sync + ?Sized,
    {
        let mut seen = HashSet::new();
        let mut context = RetrievedContext::default();

        for variant in variants {
            let query_vector = embedder.embed(variant).await?;
            let hits = index.search(&query_vector, self.top_k).await?;
            debug!(variant = %variant, hits = hits.len(), "variant retrieved");

            for hit in hits {
                if seen.insert(hit.chunk.text.clone()) {
                    context.chunks.push(hit.chunk);
                }
            }
        }

        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scored, FixedEmbedder, ScriptedIndex};

    fn variants(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[tokio::test]
    async fn shared_chunk_appears_once() {
        let index = ScriptedIndex::new(vec![
            Ok(vec![scored(0, "limit is 30", 0.9), scored(1, "zones", 0.5)]),
            Ok(vec![scored(0, "limit is 30", 0.8), scored(2, "signs", 0.4)]),
        ]);

        let context = MultiQueryRetriever::new(4)
            .retrieve(&FixedEmbedder, &index, &variants(&["a", "b"]))
            .await
            .unwrap();

        let texts: Vec<_> = context.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["limit is 30", "zones", "signs"]);
        assert_eq!(index.calls(), 2);
    }

    #[tokio::test]
    async fn dedupe_is_by_content_not_id() {
        let index = ScriptedIndex::new(vec![
            Ok(vec![scored(0, "same words", 0.9)]),
            Ok(vec![scored(7, "same words", 0.9)]),
        ]);

        let context = MultiQueryRetriever::new(4)
            .retrieve(&FixedEmbedder, &index, &variants(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context.chunks[0].chunk_id, "chunk-0");
    }

    #[tokio::test]
    async fn index_failure_aborts_retrieval() {
        let index = ScriptedIndex::new(vec![
            Ok(vec![scored(0, "ok", 0.9)]),
            Err("collection closed".to_string()),
        ]);

        let result = MultiQueryRetriever::new(4)
            .retrieve(&FixedEmbedder, &index, &variants(&["a", "b"]))
            .await;
        assert!(matches!(result, Err(RagError::IndexUnavailable(_))));
    }

    #[tokio::test]
    async fn top_k_is_passed_to_the_index() {
        let index = ScriptedIndex::returning(vec![
            scored(0, "a", 0.9),
            scored(1, "b", 0.8),
            scored(2, "c", 0.7),
        ]);

        let context = MultiQueryRetriever::new(2)
            .retrieve(&FixedEmbedder, &index, &variants(&["q"]))
            .await
            .unwrap();
        assert_eq!(context.len(), 2);
    }
}
