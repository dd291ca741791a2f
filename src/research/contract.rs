use std::time::Instant;

use serde::Serialize;

use crate::error::AppError;
use crate::llm::{LlmClient, Prompt, ProviderKind};
use crate::prompts;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractResearch {
    pub contract_info: String,
    pub time_taken: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsResearch {
    pub tools_info: String,
    pub time_taken: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GaoResearch {
    pub gao_info: String,
    pub time_taken: u64,
}

/// Context shared by the follow-up research stages.
#[derive(Debug, Clone, Copy)]
pub struct AwardContext<'a> {
    pub award_id: &'a str,
    pub recipient_name: &'a str,
}

fn follow_up_prompt(
    stage: &'static str,
    template: &str,
    award: AwardContext<'_>,
    contract_info: &str,
    web_search: bool,
) -> Prompt {
    Prompt {
        stage,
        system: prompts::SYSTEM_ANALYST.to_string(),
        user: prompts::render(
            template,
            &[
                ("award_id", award.award_id),
                ("recipient_name", award.recipient_name),
                ("contract_info", contract_info),
            ],
        ),
        web_search,
    }
}

#[tracing::instrument(name = "research contract", skip(llm, description))]
pub async fn research_contract(
    llm: &LlmClient,
    award_id: &str,
    recipient_name: &str,
    description: &str,
) -> Result<ContractResearch, AppError> {
    let start = Instant::now();
    let description = if description.trim().is_empty() {
        "(no description provided)"
    } else {
        description
    };

    let prompt = Prompt {
        stage: "research_contract",
        system: prompts::SYSTEM_ANALYST.to_string(),
        user: prompts::render(
            prompts::CONTRACT_RESEARCH,
            &[
                ("award_id", award_id),
                ("recipient_name", recipient_name),
                ("description", description),
            ],
        ),
        web_search: true,
    };

    let resp = llm.generate(ProviderKind::Perplexity, prompt).await?;

    Ok(ContractResearch {
        contract_info: resp.content,
        time_taken: start.elapsed().as_millis() as u64,
    })
}

#[tracing::instrument(name = "research tools", skip(llm, contract_info))]
pub async fn research_tools(
    llm: &LlmClient,
    award: AwardContext<'_>,
    contract_info: &str,
) -> Result<ToolsResearch, AppError> {
    let start = Instant::now();
    let prompt = follow_up_prompt(
        "research_tools",
        prompts::TOOLS_RESEARCH,
        award,
        contract_info,
        false,
    );

    let resp = llm.generate(ProviderKind::OpenAi, prompt).await?;

    Ok(ToolsResearch {
        tools_info: resp.content,
        time_taken: start.elapsed().as_millis() as u64,
    })
}

#[tracing::instrument(name = "research gao", skip(llm, contract_info))]
pub async fn research_gao(
    llm: &LlmClient,
    award: AwardContext<'_>,
    contract_info: &str,
) -> Result<GaoResearch, AppError> {
    let start = Instant::now();
    let prompt = follow_up_prompt(
        "research_gao",
        prompts::GAO_RESEARCH,
        award,
        contract_info,
        true,
    );

    let resp = llm.generate(ProviderKind::Perplexity, prompt).await?;

    Ok(GaoResearch {
        gao_info: resp.content,
        time_taken: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_up_prompt_fills_every_placeholder() {
        let award = AwardContext {
            award_id: "CONT_AWD_X",
            recipient_name: "Acme Corp",
        };
        for template in [prompts::TOOLS_RESEARCH, prompts::GAO_RESEARCH] {
            let prompt = follow_up_prompt("t", template, award, "Cloud hosting for VA", false);
            assert!(prompt.user.contains("CONT_AWD_X"));
            assert!(prompt.user.contains("Acme Corp"));
            assert!(prompt.user.contains("Cloud hosting for VA"));
            assert!(!prompt.user.contains("{{"));
        }
    }

    #[test]
    fn test_research_payloads_use_expected_keys() {
        let tools = serde_json::to_value(ToolsResearch {
            tools_info: "x".to_string(),
            time_taken: 5,
        })
        .unwrap();
        assert_eq!(tools["toolsInfo"], "x");

        let gao = serde_json::to_value(GaoResearch {
            gao_info: "y".to_string(),
            time_taken: 5,
        })
        .unwrap();
        assert_eq!(gao["gaoInfo"], "y");

        let contract = serde_json::to_value(ContractResearch {
            contract_info: "z".to_string(),
            time_taken: 5,
        })
        .unwrap();
        assert_eq!(contract["contractInfo"], "z");
        assert_eq!(contract["timeTaken"], 5);
    }
}
