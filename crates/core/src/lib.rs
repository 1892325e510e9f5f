pub mod chunking;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod evaluation;
pub mod expander;
pub mod extractor;
pub mod history;
pub mod ingest;
pub mod models;
pub mod ollama;
pub mod retriever;
pub mod session;
pub mod stores;
pub mod traits;

#[cfg(test)]
mod testing;

pub use chunking::{build_chunks, normalize_whitespace, RecursiveSplitter};
pub use config::RagConfig;
pub use context::{assemble_prompt, format_history};
pub use embeddings::{CharacterNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, RagError};
pub use evaluation::{
    read_test_cases, run_evaluation, write_results, EvaluationReport, EvaluationRow, TestCase,
};
pub use expander::{parse_variants, QueryExpander};
pub use extractor::{extract_page_texts, PageText, PdfExtractor};
pub use history::HistoryStore;
pub use ingest::{build_index, digest_file, ingest_document};
pub use models::{
    Chunk, IngestionOptions, Query, RetrievedContext, Role, ScoredChunk, SimilarityMetric,
    SourceOffset, Turn,
};
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaGenerator};
pub use retriever::MultiQueryRetriever;
pub use session::{Answer, ChatSession};
pub use stores::LocalVectorStore;
pub use traits::{Embedder, Generator, VectorIndex};
