use crate::config::RagConfig;
use crate::context::assemble_prompt;
use crate::error::RagError;
use crate::expander::QueryExpander;
use crate::history::HistoryStore;
use crate::models::{Query, Turn};
use crate::retriever::MultiQueryRetriever;
use crate::stores::LocalVectorStore;
use crate::traits::{Embedder, Generator, VectorIndex};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of one completed exchange.
#[derive(Debug)]
pub struct Answer {
    pub text: String,
    pub variants: Vec<String>,
    pub context_chunks: usize,
    /// Set when the exchange succeeded but the history could not be written.
    pub persist_error: Option<RagError>,
}

/// One user's conversation over a loaded index. Every collaborator is
/// injected so each can be replaced independently.
pub struct ChatSession<E, V, G>
where
    E: Embedder,
    V: VectorIndex,
    G: Generator,
{
    id: Uuid,
    embedder: E,
    index: V,
    generator: G,
    history: HistoryStore,
    expander: QueryExpander,
    retriever: MultiQueryRetriever,
    include_original_query: bool,
    history_window: usize,
    generation_timeout: Duration,
}

impl<E, G> ChatSession<E, LocalVectorStore, G>
where
    E: Embedder + Send + Sync,
    G: Generator + Send + Sync,
{
    /// Opens the configured index, then the history file. A missing index
    /// fails before the history file is touched.
    pub async fn open(config: &RagConfig, embedder: E, generator: G) -> Result<Self, RagError> {
        let index = LocalVectorStore::open(&config.index_dir, &config.collection).await?;

        if index.embedding_model() != embedder.model_name() {
            warn!(
                index_model = index.embedding_model(),
                query_model = embedder.model_name(),
                "index was built with a different embedding model"
            );
        }

        let history = HistoryStore::open(&config.history_path);
        Ok(Self::new(embedder, index, generator, history, config))
    }
}

impl<E, V, G> ChatSession<E, V, G>
where
    E: Embedder + Send + Sync,
    V: VectorIndex + Send + Sync,
    G: Generator + Send + Sync,
{
    pub fn new(
        embedder: E,
        index: V,
        generator: G,
        history: HistoryStore,
        config: &RagConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            embedder,
            index,
            generator,
            history,
            expander: QueryExpander::new(config.expansion_variants, config.generation_timeout),
            retriever: MultiQueryRetriever::new(config.top_k),
            include_original_query: config.include_original_query,
            history_window: config.history_window,
            generation_timeout: config.generation_timeout,
        }
    }

    pub fn history(&self) -> &[Turn] {
        self.history.turns()
    }

    pub fn history_store(&self) -> &HistoryStore {
        &self.history
    }

    pub fn index(&self) -> &V {
        &self.index
    }

    pub fn save_history(&self) -> Result<(), RagError> {
        self.history.save()
    }

    pub fn clear_history(&mut self) -> Result<(), RagError> {
        self.history.clear()?;
        info!(session = %self.id, "conversation history cleared");
        Ok(())
    }

    /// Expands, retrieves, generates and records one exchange.
    ///
    /// The question is recorded before any collaborator is called, so a
    /// failed exchange leaves exactly one new Human turn and nothing is
    /// saved. A successful one appends the answer and saves once.
    pub async fn process_query(&mut self, question: &str) -> Result<Answer, RagError> {
        let query = Query::new(question.trim());
        if query.is_blank() {
            return Err(RagError::InvalidQuery("question is empty".to_string()));
        }

        self.history.append(Turn::human(query.text.clone()));
        let recent = self.history.recent(self.history_window).to_vec();

        let mut variants = self
            .expander
            .expand_or_original(&self.generator, &query.text)
            .await;
        if self.include_original_query && !variants.contains(&query.text) {
            variants.insert(0, query.text.clone());
        }

        let context = self
            .retriever
            .retrieve(&self.embedder, &self.index, &variants)
            .await?;

        let prompt = assemble_prompt(&context, &recent, &query.text);
        let generation = self.generator.generate(&prompt);
        let text = match tokio::time::timeout(self.generation_timeout, generation).await {
            Ok(Ok(text)) => text,
            Ok(Err(error)) if error.is_generation_failure() => return Err(error),
            Ok(Err(error)) => return Err(RagError::GenerationError(error.to_string())),
            Err(_) => return Err(RagError::GenerationTimeout(self.generation_timeout)),
        };

        self.history.append(Turn::assistant(text.clone()));
        let persist_error = self.history.save().err();
        if let Some(error) = &persist_error {
            warn!(session = %self.id, %error, "exchange completed but history was not saved");
        }

        info!(
            session = %self.id,
            variants = variants.len(),
            context_chunks = context.len(),
            history_turns = self.history.len(),
            "exchange completed"
        );

        Ok(Answer {
            text,
            variants,
            context_chunks: context.len(),
            persist_error,
        })
    }
}
