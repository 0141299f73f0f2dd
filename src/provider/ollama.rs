//! Ollama HTTP client

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::{CompletionProvider, GenerateRequest, GenerateResponse, ModelInfo, TagsResponse};
use crate::{Error, Result};

/// Default Ollama endpoint
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct CreateModelRequest<'a> {
    name: &'a str,
    modelfile: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CreateStatusLine {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Completion provider backed by an Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    /// Create a client for `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl CompletionProvider for OllamaClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        tracing::debug!(model = %request.model, prompt_len = request.prompt.len(), "generate");

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        let body: GenerateResponse = response.json().await?;

        tracing::debug!(model = %request.model, response_len = body.response.len(), "generated");
        Ok(body.response)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models)
    }

    async fn create_model(&self, name: &str, modelfile: &str) -> Result<Vec<String>> {
        tracing::info!(name, "creating model");

        let response = self
            .client
            .post(self.url("/api/create"))
            .json(&CreateModelRequest {
                name,
                modelfile,
                stream: true,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;

        let mut statuses = Vec::new();
        let mut buffer: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport_error)?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(status) = parse_status_line(&String::from_utf8_lossy(&line))? {
                    statuses.push(status);
                }
            }
        }

        if let Some(status) = parse_status_line(&String::from_utf8_lossy(&buffer))? {
            statuses.push(status);
        }

        tracing::info!(name, steps = statuses.len(), "model created");
        Ok(statuses)
    }
}

/// Parse one NDJSON status line; blank lines yield `None`
fn parse_status_line(line: &str) -> Result<Option<String>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let parsed: CreateStatusLine = serde_json::from_str(line)?;
    if let Some(error) = parsed.error {
        return Err(Error::Provider {
            status: 200,
            body: error,
        });
    }

    Ok(parsed.status)
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::ProviderUnreachable(e.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Provider { status, body })
}
