//! Scripted collaborators shared by the unit tests.

use crate::error::RagError;
use crate::models::{Chunk, ScoredChunk, SourceOffset};
use crate::traits::{Embedder, Generator, VectorIndex};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn chunk(index: u64, text: &str) -> Chunk {
    Chunk {
        chunk_id: format!("chunk-{index}"),
        text: text.to_string(),
        source_offset: SourceOffset {
            page: 1,
            chunk_index: index,
        },
    }
}

pub fn scored(index: u64, text: &str, score: f32) -> ScoredChunk {
    ScoredChunk {
        chunk: chunk(index, text),
        score,
    }
}

/// Replies from a queue; once drained every call fails.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, RagError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, RagError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RagError::GenerationError("script exhausted".to_string())))
    }
}

/// Never answers within any reasonable timeout.
pub struct StalledGenerator;

#[async_trait]
impl Generator for StalledGenerator {
    fn model_name(&self) -> &str {
        "stalled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, RagError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

pub struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
        Ok(vec![1.0, 0.0])
    }
}

/// Serves one scripted result per search call, repeating the last one.
pub struct ScriptedIndex {
    results: Vec<Result<Vec<ScoredChunk>, String>>,
    calls: AtomicUsize,
}

impl ScriptedIndex {
    pub fn new(results: Vec<Result<Vec<ScoredChunk>, String>>) -> Self {
        Self {
            results,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn returning(hits: Vec<ScoredChunk>) -> Self {
        Self::new(vec![Ok(hits)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    fn len(&self) -> usize {
        self.results
            .iter()
            .map(|result| result.as_ref().map(Vec::len).unwrap_or(0))
            .sum()
    }

    async fn search(
        &self,
        _query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let slot = call.min(self.results.len().saturating_sub(1));
        match self.results.get(slot) {
            Some(Ok(hits)) => Ok(hits.iter().take(top_k).cloned().collect()),
            Some(Err(details)) => Err(RagError::IndexUnavailable(details.clone())),
            None => Ok(Vec::new()),
        }
    }
}
