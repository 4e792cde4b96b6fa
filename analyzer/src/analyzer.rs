//! Routes images to a provider and collects the answers.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use crate::images::ImageInfo;
use crate::providers::{AnalysisRequest, AnalysisResponse, ProviderDyn};

pub const DEFAULT_PROMPT: &str = "I want a short answer for which trash type do you see in the image [cardboard, glass, metal, paper, plastic or other]";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 100;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Everything about a request except the image.
#[derive(Debug, Clone)]
pub struct AnalysisParams {
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl AnalysisParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: DEFAULT_PROMPT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            bail!("prompt must not be empty");
        }
        if self.model.trim().is_empty() {
            bail!("model must not be empty");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            bail!("temperature must be between 0 and 2, got {}", self.temperature);
        }
        if self.max_tokens == 0 {
            bail!("max tokens must be positive");
        }
        Ok(())
    }

    pub fn request_for(&self, image: &ImageInfo) -> AnalysisRequest {
        AnalysisRequest {
            model: self.model.clone(),
            prompt: self.prompt.trim().to_string(),
            image: image.attachment(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Result for one image of a batch.
#[derive(Debug, Serialize)]
pub struct AnalysisOutcome {
    pub name: String,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<AnalysisResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// `name: text`, or `name: ERROR: message`.
    pub fn summary_line(&self) -> String {
        match (&self.response, &self.error) {
            (_, Some(error)) => format!("{}: ERROR: {}", self.name, error),
            (Some(response), None) => format!("{}: {}", self.name, response.text.trim()),
            (None, None) => format!("{}: ERROR: no response", self.name),
        }
    }
}

/// Send one request to `provider`.
pub async fn analyze_image(
    provider: &dyn ProviderDyn,
    request: &AnalysisRequest,
) -> Result<AnalysisResponse> {
    let started = Instant::now();
    let result = provider.analyze_dyn(request).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match &result {
        Ok(response) => tracing::info!(
            provider = provider.provider_id().slug(),
            model = %request.model,
            latency_ms,
            total_tokens = response.usage.map(|u| u.total_tokens),
            "Analysis complete"
        ),
        Err(e) => tracing::warn!(
            provider = provider.provider_id().slug(),
            model = %request.model,
            latency_ms,
            error = %e,
            "Analysis failed"
        ),
    }
    result
}

/// Analyze every image with at most `concurrency` requests in flight.
///
/// Outcomes come back in input order; a failure for one image does not stop
/// the others. Invalid parameters fail before any request is sent.
pub async fn analyze_batch(
    provider: &dyn ProviderDyn,
    images: &[ImageInfo],
    params: &AnalysisParams,
    concurrency: usize,
) -> Result<Vec<AnalysisOutcome>> {
    params.validate()?;

    let mut outcomes: Vec<(usize, AnalysisOutcome)> = stream::iter(images.iter().enumerate())
        .map(|(index, image)| async move {
            let request = params.request_for(image);
            let (response, error) = match analyze_image(provider, &request).await {
                Ok(response) => (Some(response), None),
                Err(e) => (None, Some(format!("{e:#}"))),
            };
            let outcome = AnalysisOutcome {
                name: image.name.clone(),
                path: image.path.clone(),
                response,
                error,
            };
            (index, outcome)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    outcomes.sort_by_key(|(index, _)| *index);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}
