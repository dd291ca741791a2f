use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::{GenerateRequest, GenerateResponse, Provider};
use crate::config::ProviderConfig;

pub struct PerplexityProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl PerplexityProvider {
    pub fn new(config: ProviderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, config })
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    #[serde(default)]
    citations: Vec<String>,
    #[serde(default)]
    search_results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct SearchResult {
    url: String,
}

#[derive(Deserialize)]
struct PerplexityError {
    error: PerplexityErrorDetail,
}

#[derive(Deserialize)]
struct PerplexityErrorDetail {
    message: String,
}

impl ChatResponse {
    fn into_generate_response(self) -> GenerateResponse {
        let first = self.choices.into_iter().next();
        let finish_reason = first
            .as_ref()
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_default();
        let content = first.and_then(|c| c.message.content).unwrap_or_default();

        // Newer models report sources only through `search_results`.
        let citations = if self.citations.is_empty() {
            self.search_results.into_iter().map(|r| r.url).collect()
        } else {
            self.citations
        };

        let (input_tokens, output_tokens) = self
            .usage
            .map_or((0, 0), |u| (u.prompt_tokens, u.completion_tokens));

        GenerateResponse {
            content,
            model: self.model,
            input_tokens,
            output_tokens,
            finish_reason,
            citations,
            grounding_metadata: None,
            provider: String::new(),
        }
    }
}

#[async_trait::async_trait]
impl Provider for PerplexityProvider {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| anyhow::anyhow!("invalid API key header: {e}"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut messages = Vec::with_capacity(2);
        if !req.system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: req.system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: req.prompt.clone(),
        });

        let body = ChatRequest {
            model: req.model.clone(),
            messages,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<PerplexityError>(&error_body) {
                return Err(anyhow::anyhow!(
                    "Perplexity API error ({}): {}",
                    status,
                    err.error.message
                ));
            }
            return Err(anyhow::anyhow!(
                "Perplexity API error ({}): {}",
                status,
                error_body
            ));
        }

        let resp: ChatResponse = response.json().await?;
        Ok(resp.into_generate_response())
    }

    fn name(&self) -> &str {
        "perplexity"
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}
