use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use scanner_core::Settings;

use crate::error::EngineError;

/// One system + user exchange with a chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Capability object for the external model provider.
///
/// Returns the raw response text; making sense of it is the caller's job.
/// Transport and provider failures are `EngineError::Upstream`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, EngineError>;
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Box<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, EngineError> {
        (**self).complete(request).await
    }
}

fn map_backend(provider: &str) -> Result<LLMBackend, EngineError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(EngineError::UnknownProvider(other.to_string())),
    }
}

/// `ModelClient` backed by the `llm` crate. A provider handle is built per call.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            provider: settings.provider.clone(),
            api_key: settings.api_key.clone(),
        }
    }
}

#[async_trait]
impl ModelClient for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, EngineError> {
        let backend = map_backend(&self.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&request.model)
            .system(&request.system)
            .temperature(request.temperature);

        if !self.api_key.is_empty() {
            builder = builder.api_key(&self.api_key);
        }

        let llm = builder
            .build()
            .map_err(|e| EngineError::Build(e.to_string()))?;

        let messages = vec![ChatMessage::user().content(&request.user).build()];

        tracing::debug!(provider = %self.provider, model = %request.model, "sending chat request");
        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| EngineError::Upstream(e.to_string()))?;

        // Empty output is left for the parser to flag, like any other unusable text.
        let text = response.text().unwrap_or_default();
        if text.trim().is_empty() {
            tracing::warn!(model = %request.model, "model returned no text");
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_map_to_backends() {
        for provider in ["openai", "anthropic", "google", "ollama", "groq", "mistral", "deepseek"] {
            assert!(map_backend(provider).is_ok(), "{provider}");
        }
    }

    #[test]
    fn unknown_provider_is_rejected_before_any_call() {
        let err = map_backend("watson").unwrap_err();
        assert!(matches!(err, EngineError::UnknownProvider(ref p) if p == "watson"));
    }

    #[tokio::test]
    async fn client_with_unknown_provider_fails_without_network() {
        let settings = Settings {
            provider: "watson".to_string(),
            ..Settings::default()
        };
        let client = LlmClient::new(&settings);
        let request = CompletionRequest {
            model: "m".to_string(),
            system: "s".to_string(),
            user: "u".to_string(),
            temperature: 0.0,
        };
        assert!(matches!(
            client.complete(&request).await,
            Err(EngineError::UnknownProvider(_))
        ));
    }
}
