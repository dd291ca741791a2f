use std::time::Instant;

use serde::Serialize;

use crate::error::AppError;
use crate::llm::{LlmClient, Prompt, ProviderKind};
use crate::prompts;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub summary: String,
    pub time_taken: u64,
}

#[tracing::instrument(
    name = "research summarize",
    skip(llm, detailed_analysis),
    fields(input.chars = detailed_analysis.len())
)]
pub async fn summarize(llm: &LlmClient, detailed_analysis: &str) -> Result<Summary, AppError> {
    let start = Instant::now();
    let prompt = Prompt {
        stage: "summarize",
        system: prompts::SYSTEM_ANALYST.to_string(),
        user: prompts::render(
            prompts::SUMMARY,
            &[("detailed_analysis", detailed_analysis)],
        ),
        web_search: false,
    };

    let resp = llm.generate(ProviderKind::Gemini, prompt).await?;

    Ok(Summary {
        summary: resp.content,
        time_taken: start.elapsed().as_millis() as u64,
    })
}
