use crate::models::SimilarityMetric;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_COLLECTION: &str = "road_users_code_rag";
pub const DEFAULT_INDEX_DIR: &str = "./chroma_db/road_users_code_rag";
pub const DEFAULT_HISTORY_PATH: &str = "road_users_chat_history.json";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_CHAT_MODEL: &str = "mistral";

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub index_dir: PathBuf,
    pub collection: String,
    pub history_path: PathBuf,
    pub ollama_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub top_k: usize,
    pub metric: SimilarityMetric,
    pub expansion_variants: usize,
    pub include_original_query: bool,
    pub history_window: usize,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub generation_timeout: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            collection: DEFAULT_COLLECTION.to_string(),
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            top_k: 4,
            metric: SimilarityMetric::Cosine,
            expansion_variants: 5,
            include_original_query: false,
            history_window: 10,
            generation_timeout: Duration::from_secs(120),
        }
    }
}
