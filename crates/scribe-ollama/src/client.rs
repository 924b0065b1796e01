//! Ollama HTTP client.

use crate::error::{OllamaError, OllamaResult};
use crate::types::*;
use reqwest::{Client, Response};
use scribe_config::OllamaConfig;
use std::time::Duration;
use tracing::{debug, info};

/// Client for interacting with Ollama's API.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    host: String,
    timeout: Duration,
}

impl OllamaClient {
    /// Create a new client from configuration.
    pub fn from_config(config: &OllamaConfig) -> OllamaResult<Self> {
        Self::with_timeout(&config.host, Duration::from_secs(config.timeout_seconds))
    }

    /// Create a new client with default settings.
    pub fn new(host: impl Into<String>) -> OllamaResult<Self> {
        Self::with_timeout(&host.into(), Duration::from_secs(120))
    }

    /// Create a client with an explicit request timeout.
    ///
    /// Vision generation on large pages can take minutes, so OCR callers
    /// usually build their own client with a longer timeout.
    pub fn with_timeout(host: &str, timeout: Duration) -> OllamaResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OllamaError::Http)?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Check if Ollama server is available.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.host);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// List all available models.
    pub async fn list_models(&self) -> OllamaResult<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.host);
        debug!("Listing models from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response, None).await?;

        let list: ListModelsResponse = response.json().await?;
        Ok(list.models)
    }

    /// Check if a specific model is available.
    pub async fn has_model(&self, model: &str) -> OllamaResult<bool> {
        let models = self.list_models().await?;
        // Check both exact match and model without tag
        Ok(models
            .iter()
            .any(|m| m.name == model || m.name.starts_with(&format!("{}:", model))))
    }

    /// List models currently loaded into memory.
    pub async fn running_models(&self) -> OllamaResult<Vec<RunningModel>> {
        let url = format!("{}/api/ps", self.host);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response, None).await?;

        let list: RunningModelsResponse = response.json().await?;
        Ok(list.models)
    }

    /// Generate embeddings for text.
    pub async fn embed(&self, model: &str, text: &str) -> OllamaResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.host);
        debug!(
            "Generating embedding with model {} for text length {}",
            model,
            text.len()
        );

        let request = EmbeddingRequest {
            model: model.to_string(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response, Some(model)).await?;

        let embedding_response: EmbeddingResponse = response.json().await?;
        debug!(
            "Generated embedding with {} dimensions",
            embedding_response.embedding.len()
        );

        Ok(embedding_response.embedding)
    }

    /// Generate text (non-streaming).
    pub async fn generate(&self, request: GenerateRequest) -> OllamaResult<GenerateResponse> {
        let url = format!("{}/api/generate", self.host);
        debug!(
            "Generating with model {} ({} images)",
            request.model,
            request.images.len()
        );

        // Ensure streaming is off for this method
        let mut request = request;
        request.stream = false;

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response, Some(&request.model)).await?;

        let generate_response: GenerateResponse = response.json().await?;
        Ok(generate_response)
    }

    /// Evict a model from memory.
    pub async fn unload(&self, model: &str) -> OllamaResult<()> {
        let request = GenerateRequest::new(model, "").with_keep_alive(0);
        self.generate(request).await?;
        info!("Unloaded model {}", model);
        Ok(())
    }

    fn map_send_error(&self, e: reqwest::Error) -> OllamaError {
        if e.is_connect() {
            OllamaError::ServerNotRunning {
                host: self.host.clone(),
            }
        } else if e.is_timeout() {
            OllamaError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            OllamaError::Http(e)
        }
    }

    async fn check_status(response: Response, model: Option<&str>) -> OllamaResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();

        if let Some(model) = model {
            if text.contains("not found") || status.as_u16() == 404 {
                return Err(OllamaError::ModelNotFound {
                    model: model.to_string(),
                });
            }
        }

        Err(OllamaError::ApiError {
            status: status.as_u16(),
            message: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = OllamaConfig::default();
        let client = OllamaClient::from_config(&config).unwrap();
        assert_eq!(client.host(), "http://localhost:11434");
    }

    #[test]
    fn test_host_trailing_slash_trimmed() {
        let client = OllamaClient::new("http://gpu-box:11434/").unwrap();
        assert_eq!(client.host(), "http://gpu-box:11434");
    }

    #[test]
    fn test_vision_request_serialization() {
        let request = GenerateRequest::new("qwen2.5vl:7b", "Read this page")
            .with_image("aGVsbG8=".to_string())
            .with_json_format()
            .with_options(GenerateOptions::new().with_temperature(0.0));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["images"][0], "aGVsbG8=");
        assert_eq!(json["format"], "json");
        assert_eq!(json["stream"], false);
        assert!(json.get("keep_alive").is_none());
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_unload_request_has_zero_keep_alive() {
        let request = GenerateRequest::new("m", "").with_keep_alive(0);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["keep_alive"], 0);
        assert!(json.get("images").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_not_running() {
        let client = OllamaClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(!client.is_available().await);
        let err = client.list_models().await.unwrap_err();
        assert!(matches!(
            err,
            OllamaError::ServerNotRunning { .. } | OllamaError::Timeout { .. } | OllamaError::Http(_)
        ));
    }
}
