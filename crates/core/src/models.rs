use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a chunk came from inside the source document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceOffset {
    pub page: u32,
    pub chunk_index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    pub source_offset: SourceOffset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Human,
    #[serde(alias = "AI")]
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Human => f.write_str("Human"),
            Role::Assistant => f.write_str("Assistant"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Chunks retrieved for one query, deduplicated by content in rank order.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub chunks: Vec<Chunk>,
}

impl RetrievedContext {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    DotProduct,
    Euclidean,
}

impl SimilarityMetric {
    /// Larger is more similar for every metric.
    pub fn score(self, left: &[f32], right: &[f32]) -> f32 {
        match self {
            SimilarityMetric::Cosine => {
                let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
                let norm_left = left.iter().map(|v| v * v).sum::<f32>().sqrt();
                let norm_right = right.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm_left == 0.0 || norm_right == 0.0 {
                    return 0.0;
                }
                dot / (norm_left * norm_right)
            }
            SimilarityMetric::DotProduct => left.iter().zip(right).map(|(a, b)| a * b).sum(),
            SimilarityMetric::Euclidean => -left
                .iter()
                .zip(right)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

impl std::str::FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "cosine" => Ok(SimilarityMetric::Cosine),
            "dot" | "dot_product" => Ok(SimilarityMetric::DotProduct),
            "euclidean" | "l2" => Ok(SimilarityMetric::Euclidean),
            other => Err(format!("unknown similarity metric: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}
