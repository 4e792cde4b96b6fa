//! Trash Analyzer - classify photos of trash with multimodal LLM APIs.
//!
//! Images are picked explicitly or sampled from a local dataset, re-encoded
//! as JPEG and sent with a prompt to one of:
//! - Gemini (`generateContent`)
//! - OpenAI (chat completions with image content)
//! - Groq (OpenAI-compatible endpoint)
//!
//! API keys come from a local credentials file, the environment or the OS
//! keychain; see [`middleware::credentials`].

pub mod analyzer;
pub mod images;
pub mod middleware;
pub mod providers;
