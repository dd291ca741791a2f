use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::llm::{LlmClient, Prompt, ProviderKind};
use crate::prompts;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitedAnalysis {
    pub analysis: String,
    pub citations: Vec<String>,
    pub model: String,
    pub time_taken: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundedAnalysis {
    pub analysis: String,
    pub model: String,
    pub time_taken: u64,
    pub grounding_metadata: Option<Value>,
}

fn company_prompt(company_name: &str) -> Prompt {
    Prompt {
        stage: "analyze_company",
        system: prompts::SYSTEM_ANALYST.to_string(),
        user: prompts::render(
            prompts::COMPANY_ANALYSIS,
            &[("company_name", company_name)],
        ),
        web_search: true,
    }
}

#[tracing::instrument(
    name = "research analyze_company_perplexity",
    skip(llm),
    fields(research.citations)
)]
pub async fn analyze_company_perplexity(
    llm: &LlmClient,
    company_name: &str,
) -> Result<CitedAnalysis, AppError> {
    let start = Instant::now();
    let resp = llm
        .generate(ProviderKind::Perplexity, company_prompt(company_name))
        .await?;

    tracing::Span::current().record("research.citations", resp.citations.len());

    Ok(CitedAnalysis {
        analysis: resp.content,
        citations: resp.citations,
        model: resp.model,
        time_taken: start.elapsed().as_millis() as u64,
    })
}

#[tracing::instrument(
    name = "research analyze_company_gemini",
    skip(llm),
    fields(research.grounded)
)]
pub async fn analyze_company_gemini(
    llm: &LlmClient,
    company_name: &str,
) -> Result<GroundedAnalysis, AppError> {
    let start = Instant::now();
    let resp = llm
        .generate(ProviderKind::Gemini, company_prompt(company_name))
        .await?;

    tracing::Span::current().record("research.grounded", resp.grounding_metadata.is_some());

    Ok(GroundedAnalysis {
        analysis: resp.content,
        model: resp.model,
        time_taken: start.elapsed().as_millis() as u64,
        grounding_metadata: resp.grounding_metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_company_prompt_substitutes_name() {
        let prompt = company_prompt("Booz Allen Hamilton");
        assert!(prompt.user.contains("\"Booz Allen Hamilton\""));
        assert!(!prompt.user.contains("{{"));
        assert!(prompt.web_search);
    }

    #[test]
    fn test_cited_analysis_serializes_camel_case() {
        let value = serde_json::to_value(CitedAnalysis {
            analysis: "text".to_string(),
            citations: vec!["https://a".to_string()],
            model: "sonar-pro".to_string(),
            time_taken: 1500,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({
                "analysis": "text",
                "citations": ["https://a"],
                "model": "sonar-pro",
                "timeTaken": 1500
            })
        );
    }

    #[test]
    fn test_grounded_analysis_keeps_null_metadata() {
        let value = serde_json::to_value(GroundedAnalysis {
            analysis: "text".to_string(),
            model: "gemini-2.5-flash".to_string(),
            time_taken: 10,
            grounding_metadata: None,
        })
        .unwrap();
        assert!(value["groundingMetadata"].is_null());
        assert_eq!(value["timeTaken"], 10);
    }
}
