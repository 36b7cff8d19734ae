//! LLM provider factory.
//!
//! Creates LLM clients from the provider name in the application
//! configuration, resolving endpoints and checking required secrets.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("groq", "openai", "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key for providers that require it
/// * `timeout` - Optional per-request timeout
///
/// # Errors
/// Returns error if:
/// - Provider is unknown
/// - Required secrets are missing
/// - Client initialization fails
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Option<Duration>,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;
    let base_url = endpoint.unwrap_or_else(|| provider_type.default_endpoint());

    match provider_type {
        ProviderType::Ollama => {
            let mut client = OllamaClient::with_base_url(base_url);
            if let Some(timeout) = timeout {
                client = client.with_timeout(timeout).map_err(|e| e.to_string())?;
            }
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI | ProviderType::Groq => {
            let api_key = api_key.ok_or_else(|| {
                format!("{} provider requires API key", provider_type.as_str())
            })?;
            let mut client = OpenAiClient::new(provider_type.as_str(), base_url, api_key);
            if let Some(timeout) = timeout {
                client = client.with_timeout(timeout).map_err(|e| e.to_string())?;
            }
            Ok(Arc::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None, None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client(
            "ollama",
            Some("http://localhost:8080"),
            None,
            Some(Duration::from_secs(5)),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_groq_requires_api_key() {
        match create_client("groq", None, None, None) {
            Err(err) => assert!(err.contains("groq provider requires API key")),
            Ok(_) => panic!("Expected error for Groq without API key"),
        }
    }

    #[test]
    fn test_create_groq_client() {
        let client = create_client("groq", None, Some("gsk_test"), None).unwrap();
        assert_eq!(client.provider_name(), "groq");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None, None) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
