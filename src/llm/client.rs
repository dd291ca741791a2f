use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tracing::Instrument;

use super::{GenerateRequest, GenerateResponse, Provider};
use crate::config::Config;
use crate::error::AppError;
use crate::telemetry::metrics::{GEN_AI_ERROR_COUNT, GEN_AI_OPERATION_DURATION, GEN_AI_TOKEN_USAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Perplexity,
    Gemini,
    OpenAi,
}

/// A rendered prompt plus the stage it belongs to.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub stage: &'static str,
    pub system: String,
    pub user: String,
    pub web_search: bool,
}

/// Dispatches prompts to the configured providers. Calls are never retried:
/// each one is raced against the provider's timeout and the first failure is
/// returned to the caller.
#[derive(Clone)]
pub struct LlmClient {
    pub perplexity: Arc<dyn Provider>,
    pub gemini: Arc<dyn Provider>,
    pub openai: Arc<dyn Provider>,
}

impl LlmClient {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            perplexity: Arc::new(super::perplexity::PerplexityProvider::new(
                config.perplexity.clone(),
            )?),
            gemini: Arc::new(super::gemini::GeminiProvider::new(config.gemini.clone())?),
            openai: Arc::new(super::openai::OpenAIProvider::new(config.openai.clone())),
        })
    }

    pub fn provider(&self, kind: ProviderKind) -> &dyn Provider {
        match kind {
            ProviderKind::Perplexity => self.perplexity.as_ref(),
            ProviderKind::Gemini => self.gemini.as_ref(),
            ProviderKind::OpenAi => self.openai.as_ref(),
        }
    }

    pub async fn generate(
        &self,
        kind: ProviderKind,
        prompt: Prompt,
    ) -> Result<GenerateResponse, AppError> {
        let provider = self.provider(kind);
        let settings = provider.config();

        if settings.api_key.is_none() {
            return Err(AppError::Config(format!(
                "{}_API_KEY is not set",
                provider.name().to_uppercase()
            )));
        }

        let req = GenerateRequest {
            model: settings.model.clone(),
            system: prompt.system,
            prompt: prompt.user,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            stage: prompt.stage.to_string(),
            web_search: prompt.web_search,
        };

        generate_with_timeout(
            provider,
            &req,
            Duration::from_secs(settings.timeout_secs),
        )
        .await
    }
}

pub async fn generate_with_timeout(
    provider: &dyn Provider,
    req: &GenerateRequest,
    timeout: Duration,
) -> Result<GenerateResponse, AppError> {
    let provider_name = provider.name().to_string();
    let start = Instant::now();

    let span = tracing::info_span!(
        "gen_ai.chat",
        otel.name = %format!("gen_ai.chat {}", req.model),
        gen_ai.operation.name = "chat",
        gen_ai.provider.name = %provider_name,
        gen_ai.request.model = %req.model,
        gen_ai.request.temperature = req.temperature,
        gen_ai.request.max_tokens = req.max_tokens as i64,
        gen_ai.response.model = tracing::field::Empty,
        gen_ai.usage.input_tokens = tracing::field::Empty,
        gen_ai.usage.output_tokens = tracing::field::Empty,
        research.stage = %req.stage,
        otel.status_code = tracing::field::Empty,
        error.type = tracing::field::Empty,
    );

    let result = tokio::time::timeout(timeout, provider.generate(req).instrument(span.clone()))
        .await;
    let duration = start.elapsed().as_secs_f64();

    let provider_kv = KeyValue::new("gen_ai.provider.name", provider_name.clone());
    let model_kv = KeyValue::new("gen_ai.request.model", req.model.clone());

    match result {
        Ok(Ok(mut resp)) => {
            resp.provider = provider_name;

            span.record("gen_ai.response.model", resp.model.as_str());
            span.record("gen_ai.usage.input_tokens", resp.input_tokens as i64);
            span.record("gen_ai.usage.output_tokens", resp.output_tokens as i64);

            GEN_AI_TOKEN_USAGE.record(
                f64::from(resp.input_tokens),
                &[
                    KeyValue::new("gen_ai.token.type", "input"),
                    provider_kv.clone(),
                    model_kv.clone(),
                ],
            );
            GEN_AI_TOKEN_USAGE.record(
                f64::from(resp.output_tokens),
                &[
                    KeyValue::new("gen_ai.token.type", "output"),
                    provider_kv.clone(),
                    model_kv.clone(),
                ],
            );
            GEN_AI_OPERATION_DURATION.record(duration, &[provider_kv, model_kv]);

            tracing::info!(
                provider = %resp.provider,
                model = %resp.model,
                stage = %req.stage,
                duration_s = duration,
                "LLM call completed"
            );

            Ok(resp)
        }
        Ok(Err(err)) => {
            let kind = classify_error(&err);
            span.record("otel.status_code", "ERROR");
            span.record("error.type", kind);
            GEN_AI_ERROR_COUNT.add(
                1,
                &[provider_kv, model_kv, KeyValue::new("error.type", kind)],
            );
            tracing::error!(
                provider = %provider_name,
                stage = %req.stage,
                error = %err,
                "LLM call failed"
            );

            Err(AppError::Llm(format!("{provider_name}: {err}")))
        }
        Err(_) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.type", "timeout");
            GEN_AI_ERROR_COUNT.add(
                1,
                &[provider_kv, model_kv, KeyValue::new("error.type", "timeout")],
            );
            tracing::error!(
                provider = %provider_name,
                stage = %req.stage,
                timeout_s = timeout.as_secs(),
                "LLM call timed out"
            );

            Err(AppError::Timeout {
                provider: provider_name,
                seconds: timeout.as_secs(),
            })
        }
    }
}

fn classify_error(err: &anyhow::Error) -> &'static str {
    let msg = err.to_string().to_lowercase();
    if msg.contains("rate limit") || msg.contains("429") {
        "rate_limit"
    } else if msg.contains("timeout") || msg.contains("timed out") {
        "timeout"
    } else if msg.contains("401")
        || msg.contains("403")
        || msg.contains("auth")
        || msg.contains("api key")
    {
        "auth_error"
    } else if msg.contains("400") || msg.contains("422") || msg.contains("invalid") {
        "invalid_request"
    } else if msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("server")
    {
        "server_error"
    } else if msg.contains("connect") || msg.contains("dns") || msg.contains("reset") {
        "network_error"
    } else {
        "unknown_error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    struct SlowProvider {
        config: ProviderConfig,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Provider for SlowProvider {
        async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            tokio::time::sleep(self.delay).await;
            Ok(GenerateResponse {
                content: format!("echo: {}", req.prompt),
                model: req.model.clone(),
                ..GenerateResponse::default()
            })
        }

        fn name(&self) -> &str {
            "slow"
        }

        fn config(&self) -> &ProviderConfig {
            &self.config
        }
    }

    struct FailingProvider(ProviderConfig);

    #[async_trait::async_trait]
    impl Provider for FailingProvider {
        async fn generate(&self, _req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            Err(anyhow::anyhow!("503 service unavailable"))
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn config(&self) -> &ProviderConfig {
            &self.0
        }
    }

    fn provider_config() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("test-key".to_string()),
            ..Config::default().perplexity
        }
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: "test-model".to_string(),
            system: String::new(),
            prompt: "hello".to_string(),
            temperature: 0.2,
            max_tokens: 100,
            stage: "test".to_string(),
            web_search: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported_distinctly() {
        let provider = SlowProvider {
            config: provider_config(),
            delay: Duration::from_secs(300),
        };

        let err = generate_with_timeout(&provider, &request(), Duration::from_secs(120))
            .await
            .unwrap_err();

        match err {
            AppError::Timeout { provider, seconds } => {
                assert_eq!(provider, "slow");
                assert_eq!(seconds, 120);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_provider_wins_the_race() {
        let provider = SlowProvider {
            config: provider_config(),
            delay: Duration::from_secs(1),
        };

        let resp = tokio_test::assert_ok!(
            generate_with_timeout(&provider, &request(), Duration::from_secs(60)).await
        );
        assert_eq!(resp.content, "echo: hello");
        assert_eq!(resp.provider, "slow");
    }

    #[tokio::test]
    async fn test_provider_error_is_not_retried() {
        let provider = FailingProvider(provider_config());
        let err = generate_with_timeout(&provider, &request(), Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Llm(ref msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_a_config_error() {
        let unkeyed = Arc::new(FailingProvider(Config::default().gemini));
        let client = LlmClient {
            perplexity: unkeyed.clone(),
            gemini: unkeyed.clone(),
            openai: unkeyed,
        };

        let err = client
            .generate(
                ProviderKind::Gemini,
                Prompt {
                    stage: "test",
                    system: String::new(),
                    user: "hi".to_string(),
                    web_search: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(ref msg) if msg == "FAILING_API_KEY is not set"));
    }

    #[test]
    fn test_classify_error_categories() {
        let cases = vec![
            ("status 429: too many requests", "rate_limit"),
            ("request timed out", "timeout"),
            ("401 unauthorized", "auth_error"),
            ("invalid model name", "invalid_request"),
            ("502 bad gateway", "server_error"),
            ("connection refused", "network_error"),
            ("something unexpected", "unknown_error"),
        ];

        for (msg, expected) in cases {
            let err = anyhow::anyhow!("{}", msg);
            assert_eq!(classify_error(&err), expected, "classify_error({msg:?})");
        }
    }
}
