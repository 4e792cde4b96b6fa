pub mod catalog;
pub mod gemini;
pub mod openai;
pub mod retry;

// Re-export for convenience
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use retry::{RetryConfig, with_retry};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Provider-level errors that can be mapped into [`anyhow::Error`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0:?} (expected gemini, openai or groq)")]
    UnknownProvider(String),
    #[error("{0} API key not configured")]
    MissingKey(ProviderId),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("{vendor} API error: HTTP {status} - {body}")]
    Http {
        vendor: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("request failed: {0}")]
    RequestFailed(String),
}

/// Map a non-success HTTP response onto a provider error.
///
/// Statuses without a dedicated variant become [`ProviderError::Http`], which
/// [`retry`] classifies by status code alone.
pub(crate) fn status_error(
    vendor: &str,
    status: reqwest::StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> anyhow::Error {
    match status.as_u16() {
        401 | 403 => ProviderError::Auth(format!("{vendor}: HTTP {status} - {body}")).into(),
        404 => ProviderError::ModelNotFound(format!("{vendor}: {body}")).into(),
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(1),
        }
        .into(),
        _ => ProviderError::Http {
            vendor: vendor.to_string(),
            status,
            body: body.to_string(),
        }
        .into(),
    }
}

/// Read the `Retry-After` header as whole seconds, if present.
pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

pub(crate) fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Provider identifiers
// ---------------------------------------------------------------------------

/// The closed set of supported vision API vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[default]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    Groq,
}

impl ProviderId {
    /// Every provider, in the order they are offered to the user.
    pub const ALL: [ProviderId; 3] = [ProviderId::Gemini, ProviderId::OpenAi, ProviderId::Groq];

    /// Parse a provider name, ignoring ASCII case.
    ///
    /// Returns `None` for anything outside the supported set; surrounding
    /// whitespace is not stripped.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.slug().eq_ignore_ascii_case(name))
    }

    /// Canonical lowercase identifier (`"gemini"`, `"openai"`, `"groq"`).
    pub fn slug(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Groq => "groq",
        }
    }

    /// Human-readable vendor name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::OpenAi => "OpenAI",
            Self::Groq => "Groq",
        }
    }

    /// Name of the credentials-file entry and environment variable holding
    /// this provider's key.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Groq => "GROQ_API_KEY",
        }
    }

    /// Reverse of [`ProviderId::env_var`].
    pub fn from_env_var(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.env_var() == name)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ProviderError::UnknownProvider(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Common types
// ---------------------------------------------------------------------------

/// An encoded image attached to a request.
#[derive(Clone)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageAttachment {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }

    /// Standard base64 encoding of the image bytes.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// `data:` URL as accepted by OpenAI-style `image_url` content parts.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

impl fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Request to describe a single image.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub model: String,
    pub prompt: String,
    pub image: ImageAttachment,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The model's answer for one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub provider: ProviderId,
    pub model: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Common interface for the vision providers.
///
/// Each adapter translates an [`AnalysisRequest`] into its vendor's wire
/// format and the vendor's reply back into an [`AnalysisResponse`].
pub trait Provider: Send + Sync {
    /// Which vendor this adapter talks to.
    fn id(&self) -> ProviderId;

    /// Send one image and prompt, returning the model's text.
    fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> impl Future<Output = anyhow::Result<AnalysisResponse>> + Send;
}

/// Boxed future alias for an analysis result.
type AnalyzeFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<AnalysisResponse>> + Send + 'a>>;

/// Object-safe version of [`Provider`], using boxed futures.
///
/// Auto-implemented for every `T: Provider + 'static`.
pub trait ProviderDyn: Send + Sync {
    fn provider_id(&self) -> ProviderId;

    fn analyze_dyn<'a>(&'a self, request: &'a AnalysisRequest) -> AnalyzeFuture<'a>;
}

impl<T: Provider + 'static> ProviderDyn for T {
    fn provider_id(&self) -> ProviderId {
        self.id()
    }

    fn analyze_dyn<'a>(&'a self, request: &'a AnalysisRequest) -> AnalyzeFuture<'a> {
        Box::pin(self.analyze(request))
    }
}
