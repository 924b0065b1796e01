//! `Embedder` backed by an Ollama embedding model.

use crate::client::OllamaClient;
use async_trait::async_trait;
use scribe_config::OllamaConfig;
use scribe_core::{Embedder, Error, Result};

/// Embeds text with an Ollama embedding model.
#[derive(Clone)]
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

    /// Build from the `[ollama]` config section.
    pub fn from_config(config: &OllamaConfig) -> crate::OllamaResult<Self> {
        Ok(Self::new(
            OllamaClient::from_config(config)?,
            config.embedding_model.clone(),
        ))
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client
            .embed(&self.model, text)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}
