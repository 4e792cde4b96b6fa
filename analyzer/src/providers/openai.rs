use anyhow::{Context, Result, anyhow};

use crate::middleware::credentials::ApiKey;
use crate::providers::{
    AnalysisRequest, AnalysisResponse, Provider, ProviderError, ProviderId, RetryConfig, Usage,
    build_client, retry_after_secs, status_error, with_retry,
};

/// Adapter for the OpenAI chat completions API and compatible endpoints.
///
/// Groq exposes the same vision message format under its own base URL, so
/// both vendors share this adapter.
pub struct OpenAiProvider {
    id: ProviderId,
    api_key: ApiKey,
    base_url: String,
    client: reqwest::Client,
    retry: RetryConfig,
}

impl OpenAiProvider {
    pub const OPENAI_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const GROQ_BASE_URL: &'static str = "https://api.groq.com/openai/v1";

    /// Create an OpenAI provider with the given API key.
    pub fn new(api_key: ApiKey) -> Self {
        Self::with_base_url(ProviderId::OpenAi, api_key, Self::OPENAI_BASE_URL)
    }

    /// Create a Groq provider with the given API key.
    pub fn groq(api_key: ApiKey) -> Self {
        Self::with_base_url(ProviderId::Groq, api_key, Self::GROQ_BASE_URL)
    }

    /// Create a provider for `id` with a custom base URL.
    pub fn with_base_url(id: ProviderId, api_key: ApiKey, base_url: impl Into<String>) -> Self {
        Self {
            id,
            api_key,
            base_url: base_url.into(),
            client: build_client(),
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> Result<url::Url> {
        let raw = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        url::Url::parse(&raw)
            .with_context(|| format!("invalid {} endpoint: {raw}", self.id.display_name()))
    }

    /// Build a single user message holding the prompt and the image as a
    /// base64 `data:` URL.
    pub fn prepare_request(request: &AnalysisRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": request.prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": request.image.data_url() }
                    }
                ]
            }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }

    /// Extract the first choice's text and the usage block.
    pub fn parse_response(
        vendor: &str,
        json: &serde_json::Value,
    ) -> Result<(String, Option<Usage>)> {
        let choices = json["choices"]
            .as_array()
            .ok_or_else(|| anyhow!("Invalid {vendor} response: missing choices"))?;

        let text = match choices.first() {
            Some(choice) => {
                let message = &choice["message"];
                match message["content"].as_str().map(str::trim) {
                    Some(content) if !content.is_empty() => content.to_string(),
                    _ => {
                        let detail = match message["refusal"].as_str() {
                            Some(refusal) => format!("{vendor} refused the request: {refusal}"),
                            None => {
                                let reason = choice["finish_reason"].as_str().unwrap_or("unknown");
                                format!("{vendor} returned no text (finish reason: {reason})")
                            }
                        };
                        return Err(ProviderError::RequestFailed(detail).into());
                    }
                }
            }
            None => format!("No response received from {vendor}"),
        };

        let tokens = |u: &serde_json::Value, field: &str| {
            u[field]
                .as_u64()
                .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
        };
        let usage = json
            .get("usage")
            .filter(|u| !u.is_null())
            .map(|u| Usage {
                prompt_tokens: tokens(u, "prompt_tokens"),
                completion_tokens: tokens(u, "completion_tokens"),
                total_tokens: tokens(u, "total_tokens"),
            });

        Ok((text, usage))
    }
}

impl Provider for OpenAiProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let vendor = self.id.display_name();
        let url = self.endpoint()?;
        let body = Self::prepare_request(request);

        let (text, usage) = with_retry(&self.retry, || async {
            let response = self
                .client
                .post(url.clone())
                .bearer_auth(self.api_key.expose())
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let retry_after = retry_after_secs(response.headers());
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(status_error(vendor, status, retry_after, &error_text));
            }

            let json: serde_json::Value = response.json().await?;
            Self::parse_response(vendor, &json)
        })
        .await?;

        Ok(AnalysisResponse {
            provider: self.id,
            model: request.model.clone(),
            text,
            usage,
        })
    }
}
