//! Supported vision models and provider construction.

use std::sync::Arc;

use anyhow::Result;

use crate::middleware::credentials::{ApiKey, Credentials};
use crate::providers::gemini::GeminiProvider;
use crate::providers::openai::OpenAiProvider;
use crate::providers::{ProviderDyn, ProviderError, ProviderId, RetryConfig};

// ---------------------------------------------------------------------------
// Model lists
// ---------------------------------------------------------------------------

pub const GEMINI_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-1.5-flash",
];

pub const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini"];

pub const GROQ_MODELS: &[&str] = &[
    "meta-llama/llama-4-scout-17b-16e-instruct",
    "meta-llama/llama-4-maverick-17b-128e-instruct",
];

/// Vision-capable models for a provider. The first entry is the default.
pub fn models_for_provider(provider: ProviderId) -> &'static [&'static str] {
    match provider {
        ProviderId::Gemini => GEMINI_MODELS,
        ProviderId::OpenAi => OPENAI_MODELS,
        ProviderId::Groq => GROQ_MODELS,
    }
}

pub fn default_model(provider: ProviderId) -> &'static str {
    models_for_provider(provider)[0]
}

pub fn is_known_model(provider: ProviderId, model: &str) -> bool {
    models_for_provider(provider).contains(&model)
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// Providers that have a key configured, in declaration order.
pub fn available_providers(credentials: &Credentials) -> Vec<ProviderId> {
    ProviderId::ALL
        .into_iter()
        .filter(|id| credentials.is_configured(*id))
        .collect()
}

/// Providers to offer the user: the configured ones, or just the default
/// provider when nothing is configured yet.
pub fn selectable_providers(credentials: &Credentials) -> Vec<ProviderId> {
    let available = available_providers(credentials);
    if available.is_empty() {
        vec![ProviderId::default()]
    } else {
        available
    }
}

// ---------------------------------------------------------------------------
// Instantiation
// ---------------------------------------------------------------------------

/// Instantiate the adapter for `provider`.
///
/// A missing key is reported as [`ProviderError::MissingKey`]. `base_url`
/// overrides the vendor's default endpoint.
pub fn build_provider(
    provider: ProviderId,
    api_key: Option<&ApiKey>,
    base_url: Option<&str>,
    retry: RetryConfig,
) -> Result<Arc<dyn ProviderDyn>> {
    let api_key = api_key
        .cloned()
        .ok_or(ProviderError::MissingKey(provider))?;

    let built: Arc<dyn ProviderDyn> = match (provider, base_url) {
        (ProviderId::Gemini, None) => Arc::new(GeminiProvider::new(api_key).with_retry(retry)),
        (ProviderId::Gemini, Some(url)) => {
            Arc::new(GeminiProvider::with_base_url(api_key, url).with_retry(retry))
        }
        (ProviderId::OpenAi, None) => Arc::new(OpenAiProvider::new(api_key).with_retry(retry)),
        (ProviderId::Groq, None) => Arc::new(OpenAiProvider::groq(api_key).with_retry(retry)),
        (id @ (ProviderId::OpenAi | ProviderId::Groq), Some(url)) => {
            Arc::new(OpenAiProvider::with_base_url(id, api_key, url).with_retry(retry))
        }
    };
    Ok(built)
}

/// [`build_provider`] with the key taken from `credentials`.
pub fn provider_from_credentials(
    provider: ProviderId,
    credentials: &Credentials,
    base_url: Option<&str>,
) -> Result<Arc<dyn ProviderDyn>> {
    build_provider(
        provider,
        credentials.get(Some(provider)),
        base_url,
        RetryConfig::default(),
    )
}
