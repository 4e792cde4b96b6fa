use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::middleware::credentials::ApiKey;
use crate::providers::{
    AnalysisRequest, AnalysisResponse, Provider, ProviderId, RetryConfig, Usage, build_client,
    retry_after_secs, status_error, with_retry,
};

/// Adapter for Google's Gemini `generateContent` API.
pub struct GeminiProvider {
    api_key: ApiKey,
    base_url: String,
    client: reqwest::Client,
    retry: RetryConfig,
}

impl GeminiProvider {
    pub const DEFAULT_BASE_URL: &'static str =
        "https://generativelanguage.googleapis.com/v1beta";

    /// Nucleus sampling settings sent with every request.
    const TOP_P: f64 = 0.95;
    const TOP_K: u32 = 64;

    /// Create a new Gemini provider with the given API key.
    pub fn new(api_key: ApiKey) -> Self {
        Self::with_base_url(api_key, Self::DEFAULT_BASE_URL)
    }

    /// Create a new Gemini provider with a custom base URL.
    pub fn with_base_url(api_key: ApiKey, base_url: impl Into<String>) -> Self {
        Self {
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

    fn endpoint(&self, model: &str) -> Result<url::Url> {
        let raw = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );
        url::Url::parse(&raw).with_context(|| format!("invalid Gemini endpoint: {raw}"))
    }

    /// Build the JSON body: the prompt text part followed by the image.
    pub fn prepare_request(request: &AnalysisRequest) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": request.prompt },
                    {
                        "inline_data": {
                            "mime_type": request.image.mime_type,
                            "data": request.image.to_base64(),
                        }
                    }
                ]
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
                "topP": Self::TOP_P,
                "topK": Self::TOP_K,
            }
        })
    }

    /// Extract the text and usage from a `generateContent` reply.
    pub fn parse_response(body: &str) -> Result<(String, Option<Usage>)> {
        let reply: GenerateContentResponse =
            serde_json::from_str(body).context("Invalid Gemini response")?;

        let Some(candidate) = reply.candidates.into_iter().next() else {
            if let Some(reason) = reply.prompt_feedback.and_then(|f| f.block_reason) {
                bail!("Gemini blocked the prompt: {reason}");
            }
            bail!("Invalid Gemini response: no candidates");
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            match candidate.finish_reason {
                Some(reason) => bail!("Gemini returned no text (finish reason: {reason})"),
                None => bail!("Gemini returned no text"),
            }
        }

        let usage = reply.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok((text, usage))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl Provider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let url = self.endpoint(&request.model)?;
        let body = Self::prepare_request(request);

        let (text, usage) = with_retry(&self.retry, || async {
            let response = self
                .client
                .post(url.clone())
                .header("x-goog-api-key", self.api_key.expose())
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let retry_after = retry_after_secs(response.headers());
            let text = response.text().await?;
            if !status.is_success() {
                return Err(status_error("Gemini", status, retry_after, &text));
            }
            Self::parse_response(&text)
        })
        .await?;

        Ok(AnalysisResponse {
            provider: ProviderId::Gemini,
            model: request.model.clone(),
            text,
            usage,
        })
    }
}
