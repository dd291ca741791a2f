pub mod client;
pub mod gemini;
pub mod openai;
pub mod perplexity;

pub use client::{LlmClient, Prompt, ProviderKind};

use crate::config::ProviderConfig;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stage: String,
    /// Ask the provider to ground the answer with live web search, where supported.
    pub web_search: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: String,
    pub citations: Vec<String>,
    pub grounding_metadata: Option<serde_json::Value>,
    pub provider: String,
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse>;
    fn name(&self) -> &str;
    fn config(&self) -> &ProviderConfig;
}
