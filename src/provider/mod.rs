//! Completion provider interface
//!
//! The assistant talks to an Ollama-compatible text-completion service.
//! [`CompletionProvider`] is the seam; [`OllamaClient`] is the HTTP
//! implementation.

pub mod modelfile;
mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ollama::{DEFAULT_BASE_URL, OllamaClient};

use crate::Result;

/// Sampling parameters sent with every generation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// Body of a generation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: SamplingOptions,
}

impl GenerateRequest {
    /// Non-streaming request with the given sampling
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, options: SamplingOptions) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
            options,
        }
    }
}

/// Successful generation response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
}

/// An installed model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

/// Model inventory response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// Reachability snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderStatus {
    pub running: bool,
    pub models: Vec<ModelInfo>,
}

/// A text-completion service
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion and return the response text
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ProviderUnreachable`] on transport failure or
    /// [`crate::Error::Provider`] on a non-success status
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    /// List installed models
    ///
    /// # Errors
    ///
    /// Same as [`CompletionProvider::generate`]
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Create a model from a Modelfile, returning the status lines reported
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-success status, or a reported error line
    async fn create_model(&self, name: &str, modelfile: &str) -> Result<Vec<String>>;

    /// Whether the provider answers, and with which models
    async fn status(&self) -> ProviderStatus {
        match self.list_models().await {
            Ok(models) => ProviderStatus {
                running: true,
                models,
            },
            Err(e) => {
                tracing::debug!(error = %e, "completion provider not reachable");
                ProviderStatus::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_wire_shape() {
        let request = GenerateRequest::new("llama3", "hi", SamplingOptions::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "llama3");
        assert_eq!(json["prompt"], "hi");
        assert_eq!(json["stream"], false);
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!((json["options"]["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_tags_response_tolerates_extra_fields() {
        let tags: TagsResponse = serde_json::from_str(
            r#"{"models":[{"name":"llama3:latest","size":42,"digest":"abc","details":{}}]}"#,
        )
        .unwrap();
        assert_eq!(tags.models[0].name, "llama3:latest");
        assert_eq!(tags.models[0].size, Some(42));

        let empty: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.models.is_empty());
    }
}
