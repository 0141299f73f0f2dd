//! Tiered response resolution
//!
//! Tiers run strictly in order and the first success wins:
//!
//! 1. explicitly selected specialized model
//! 2. specialized model found in the inventory, for domain queries
//! 3. keyword dataset (no provider call)
//! 4. topic-augmented prompt
//! 5. plain conversational prompt
//!
//! Failures in tiers 1-4 fall through silently. Only a tier 5 failure is
//! returned to the caller.

use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::knowledge::{Dataset, TopicRecord, TopicTable, format_for_prompt};
use crate::provider::{CompletionProvider, GenerateRequest, SamplingOptions};
use crate::text::normalize_output;
use crate::{Error, Result};

/// Keywords that mark a query as belonging to the specialized domain
pub const DOMAIN_KEYWORDS: &[&str] = &[
    "multiverse",
    "universe",
    "dimension",
    "reality",
    "spiral",
    "key room",
    "kagi",
    "void",
    "hive",
    "baron",
    "louise",
    "meridian",
    "order",
    "map room",
    "presence",
];

/// Name used when the speaker's name is unknown
pub const GENERIC_LISTENER: &str = "friend";

/// Which tier produced a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    MultiverseModel,
    MultiverseDataset,
    PretrainedData,
    BaseModel,
}

impl ResponseSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MultiverseModel => "multiverse-model",
            Self::MultiverseDataset => "multiverse-dataset",
            Self::PretrainedData => "pretrained-data",
            Self::BaseModel => "base-model",
        }
    }
}

impl std::fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Normalized reply text
    pub text: String,
    /// Tier that produced it
    pub source: ResponseSource,
}

/// Naming convention for specialized models
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecializedModels {
    /// Canonical specialized model name (e.g. "multiverse-rtc")
    pub canonical: String,
    /// Case-insensitive marker any specialized model name contains
    pub marker: String,
}

impl Default for SpecializedModels {
    fn default() -> Self {
        Self {
            canonical: "multiverse-rtc".to_string(),
            marker: "multiverse".to_string(),
        }
    }
}

impl SpecializedModels {
    /// Whether `model` follows the specialized naming convention
    #[must_use]
    pub fn is_specialized(&self, model: &str) -> bool {
        model == self.canonical
            || (!self.marker.is_empty() && model.to_lowercase().contains(&self.marker.to_lowercase()))
    }
}

/// Resolver settings
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Model used when none is selected
    pub default_model: String,
    /// Specialized model convention
    pub specialized: SpecializedModels,
    /// Sampling for every generation call
    pub sampling: SamplingOptions,
    /// Assistant name used in prompts
    pub assistant_name: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_model: "llama3".to_string(),
            specialized: SpecializedModels::default(),
            sampling: SamplingOptions::default(),
            assistant_name: "R3".to_string(),
        }
    }
}

/// Chooses among knowledge sources before falling back to a plain model call
pub struct ResponseResolver {
    provider: Arc<dyn CompletionProvider>,
    dataset: Arc<Dataset>,
    topics: Arc<TopicTable>,
    config: ResolverConfig,
    rng: Mutex<StdRng>,
}

impl ResponseResolver {
    /// Create a resolver with OS-seeded randomness
    #[must_use]
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        dataset: Arc<Dataset>,
        topics: Arc<TopicTable>,
        config: ResolverConfig,
    ) -> Self {
        Self::with_rng(provider, dataset, topics, config, StdRng::from_entropy())
    }

    /// Create a resolver with an explicit random source
    #[must_use]
    pub fn with_rng(
        provider: Arc<dyn CompletionProvider>,
        dataset: Arc<Dataset>,
        topics: Arc<TopicTable>,
        config: ResolverConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            provider,
            dataset,
            topics,
            config,
            rng: Mutex::new(rng),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a reply for `input` spoken by `name`
    ///
    /// An empty `selected_model` means the configured default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyInput`] for blank input, otherwise the base
    /// tier's provider error when every tier fails
    pub async fn resolve(&self, input: &str, name: &str, selected_model: &str) -> Result<Resolution> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::EmptyInput);
        }

        tracing::info!(model = selected_model, input, "resolving reply");

        if let Some(text) = self.try_selected_specialized(input, selected_model).await {
            return Ok(Self::finish(&text, ResponseSource::MultiverseModel));
        }

        if let Some(text) = self.try_inventory_specialized(input).await {
            return Ok(Self::finish(&text, ResponseSource::MultiverseModel));
        }

        if let Some(text) = self.try_dataset(input) {
            return Ok(Self::finish(&text, ResponseSource::MultiverseDataset));
        }

        let model = if selected_model.is_empty() {
            self.config.default_model.as_str()
        } else {
            selected_model
        };

        if let Some(topic) = self.topics.find_matching(input) {
            tracing::debug!(topic = %topic.topic, "topic matched");
            let prompt = self.topic_prompt(input, name, topic);
            match self.generate(model, prompt).await {
                Ok(text) => return Ok(Self::finish(&text, ResponseSource::PretrainedData)),
                Err(e) => tracing::warn!(error = %e, model, "topic tier failed"),
            }
        }

        let prompt = self.base_prompt(input, name);
        match self.generate(model, prompt).await {
            Ok(text) => Ok(Self::finish(&text, ResponseSource::BaseModel)),
            Err(e) => {
                tracing::error!(error = %e, model, "base tier failed");
                Err(e)
            }
        }
    }

    /// Tier 1
    async fn try_selected_specialized(&self, input: &str, selected_model: &str) -> Option<String> {
        if selected_model.is_empty() || !self.config.specialized.is_specialized(selected_model) {
            return None;
        }

        tracing::debug!(model = selected_model, "using selected specialized model");
        self.generate(selected_model, input.to_string())
            .await
            .map_err(|e| tracing::warn!(error = %e, model = selected_model, "selected specialized model failed"))
            .ok()
    }

    /// Tier 2
    async fn try_inventory_specialized(&self, input: &str) -> Option<String> {
        if !is_domain_query(input) {
            return None;
        }

        let models = match self.provider.list_models().await {
            Ok(models) => models,
            Err(e) => {
                tracing::debug!(error = %e, "model inventory unavailable");
                return None;
            }
        };

        let Some(model) = models
            .iter()
            .find(|m| self.config.specialized.is_specialized(&m.name))
        else {
            tracing::debug!("no specialized model installed");
            return None;
        };

        tracing::debug!(model = %model.name, "using installed specialized model");
        self.generate(&model.name, input.to_string())
            .await
            .map_err(|e| tracing::warn!(error = %e, model = %model.name, "installed specialized model failed"))
            .ok()
    }

    /// Tier 3
    fn try_dataset(&self, input: &str) -> Option<String> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let reply = self.dataset.lookup(input, &mut *rng).map(ToString::to_string);
        if reply.is_some() {
            tracing::debug!("dataset matched");
        }
        reply
    }

    async fn generate(&self, model: &str, prompt: String) -> Result<String> {
        let request = GenerateRequest::new(model, prompt, self.config.sampling);
        self.provider.generate(&request).await
    }

    fn finish(text: &str, source: ResponseSource) -> Resolution {
        tracing::info!(%source, "reply resolved");
        Resolution {
            text: normalize_output(text),
            source,
        }
    }

    fn base_prompt(&self, input: &str, name: &str) -> String {
        let assistant = &self.config.assistant_name;
        let (listener, speaker) = listener_names(name);
        format!(
            "You are {assistant}, a helpful voice assistant talking to {listener}.
You are friendly and conversational.
Keep your responses concise and conversational, as they will be spoken aloud.
DO NOT repeat the user's question in your response.
DO NOT start your response with phrases like \"The [topic] is\" or similar repetitions.

Respond to the following input from {speaker}:

{input}"
        )
    }

    fn topic_prompt(&self, input: &str, name: &str, topic: &TopicRecord) -> String {
        let assistant = &self.config.assistant_name;
        let (listener, speaker) = listener_names(name);
        let expertise = topic.topic.replace('_', " ");
        let data = format_for_prompt(topic);
        format!(
            "You are {assistant}, a helpful voice assistant talking to {listener}.
You are an expert in {expertise}.

{data}
Use the pretrained data above to provide a clear, accurate response.
Keep your response under 3-4 sentences and make it conversational, as it will be spoken aloud.
DO NOT repeat the user's question in your response.
DO NOT start your response with phrases like \"The [topic] is\" or similar repetitions.
DO NOT mention that you're using pretrained data in your response.

Respond to the following input from {speaker}:

{input}"
        )
    }
}

/// Whether `input` mentions the specialized domain
#[must_use]
pub fn is_domain_query(input: &str) -> bool {
    let input = input.to_lowercase();
    !input.is_empty() && DOMAIN_KEYWORDS.iter().any(|k| input.contains(k))
}

fn listener_names(name: &str) -> (&str, &str) {
    let name = name.trim();
    if name.is_empty() {
        ("a user", "the user")
    } else {
        (name, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_tags_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ResponseSource::PretrainedData).unwrap(),
            "\"pretrained-data\""
        );
        assert_eq!(ResponseSource::MultiverseModel.to_string(), "multiverse-model");
    }

    #[test]
    fn test_specialized_naming_convention() {
        let specialized = SpecializedModels::default();
        assert!(specialized.is_specialized("multiverse-rtc"));
        assert!(specialized.is_specialized("Multiverse-Custom:latest"));
        assert!(!specialized.is_specialized("llama3"));
    }

    #[test]
    fn test_domain_query_detection() {
        assert!(is_domain_query("Tell me about the Key Room"));
        assert!(is_domain_query("what is the SPIRAL"));
        assert!(!is_domain_query("what time is it"));
        assert!(!is_domain_query(""));
    }

    #[test]
    fn test_listener_names_fallback() {
        assert_eq!(listener_names(""), ("a user", "the user"));
        assert_eq!(listener_names("Bob"), ("Bob", "Bob"));
    }
}
