//! Thin HTTP client for a local Ollama server: text generation, embeddings
//! and model pulls. Every request is non-streaming.

use crate::error::RagError;
use crate::traits::{Embedder, Generator};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base: Url,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, RagError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        Ok(Self {
            base: Url::parse(&normalized)?,
            client: Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RagError> {
        Ok(self.base.join(path)?)
    }

    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String, RagError> {
        let url = self.endpoint("api/generate")?;
        let response = self
            .client
            .post(url)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|error| RagError::GenerationError(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| RagError::GenerationError(error.to_string()))?;

        if !status.is_success() {
            return Err(RagError::GenerationError(format!(
                "{model} returned {status}: {}",
                body.trim()
            )));
        }

        parse_generate_body(&body)
    }

    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, RagError> {
        let url = self.endpoint("api/embeddings")?;
        let failed = |details: String| RagError::Embedding {
            model: model.to_string(),
            details,
        };

        let response = self
            .client
            .post(url)
            .json(&EmbeddingRequest {
                model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|error| failed(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| failed(error.to_string()))?;

        if !status.is_success() {
            return Err(failed(format!("status {status}: {}", body.trim())));
        }

        parse_embedding_body(&body).map_err(failed)
    }

    pub async fn pull(&self, model: &str) -> Result<(), RagError> {
        info!(model, "pulling model");
        let response = self
            .client
            .post(self.endpoint("api/pull")?)
            .json(&PullRequest {
                name: model,
                stream: false,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RagError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!("pull {model} returned {}", response.status()),
            });
        }

        let payload: PullResponse = response.json().await?;
        if let Some(error) = payload.error {
            return Err(RagError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!("pull {model}: {error}"),
            });
        }

        debug!(model, status = ?payload.status, "model pulled");
        Ok(())
    }
}

fn parse_generate_body(body: &str) -> Result<String, RagError> {
    let payload: GenerateResponse = serde_json::from_str(body)
        .map_err(|error| RagError::GenerationError(format!("malformed response: {error}")))?;

    if let Some(error) = payload.error {
        return Err(RagError::GenerationError(error));
    }

    payload
        .response
        .ok_or_else(|| RagError::GenerationError("response field missing".to_string()))
}

fn parse_embedding_body(body: &str) -> Result<Vec<f32>, String> {
    let payload: EmbeddingResponse =
        serde_json::from_str(body).map_err(|error| format!("malformed response: {error}"))?;

    if let Some(error) = payload.error {
        return Err(error);
    }

    match payload.embedding {
        Some(vector) if !vector.is_empty() => Ok(vector),
        _ => Err("empty embedding".to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
}

impl OllamaGenerator {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        self.client.generate(&self.model, prompt).await
    }
}

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.client.embed(&self.model, text).await
    }
}
