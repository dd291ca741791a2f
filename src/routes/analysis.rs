use axum::{Json, extract::State};
use serde::Deserialize;

use super::{AppJson, required};
use crate::AppState;
use crate::error::AppResult;
use crate::research::{
    self, AwardContext, CitedAnalysis, ContractResearch, GaoResearch, GroundedAnalysis, Summary,
    ToolsResearch,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyBody {
    #[serde(default)]
    pub company_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractBody {
    #[serde(default)]
    pub award_id: Option<String>,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of the tools and GAO follow-ups, which build on contract research.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpBody {
    #[serde(default)]
    pub contract_info: Option<String>,
    #[serde(default)]
    pub award_id: Option<String>,
    #[serde(default)]
    pub recipient_name: Option<String>,
}

impl FollowUpBody {
    fn validate(&self) -> AppResult<(AwardContext<'_>, &str)> {
        let contract_info = required(self.contract_info.as_deref(), "contractInfo")?;
        let award = AwardContext {
            award_id: required(self.award_id.as_deref(), "awardId")?,
            recipient_name: required(self.recipient_name.as_deref(), "recipientName")?,
        };
        Ok((award, contract_info))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryBody {
    #[serde(default)]
    pub detailed_analysis: Option<String>,
}

pub async fn analyze_perplexity(
    State(state): State<AppState>,
    AppJson(body): AppJson<CompanyBody>,
) -> AppResult<Json<CitedAnalysis>> {
    let company = required(body.company_name.as_deref(), "companyName")?;
    Ok(Json(
        research::analyze_company_perplexity(&state.llm, company).await?,
    ))
}

pub async fn analyze_gemini(
    State(state): State<AppState>,
    AppJson(body): AppJson<CompanyBody>,
) -> AppResult<Json<GroundedAnalysis>> {
    let company = required(body.company_name.as_deref(), "companyName")?;
    Ok(Json(research::analyze_company_gemini(&state.llm, company).await?))
}

pub async fn research_contract(
    State(state): State<AppState>,
    AppJson(body): AppJson<ContractBody>,
) -> AppResult<Json<ContractResearch>> {
    let award_id = required(body.award_id.as_deref(), "awardId")?;
    let recipient = required(body.recipient_name.as_deref(), "recipientName")?;
    let description = body.description.as_deref().unwrap_or_default();

    Ok(Json(
        research::research_contract(&state.llm, award_id, recipient, description).await?,
    ))
}

pub async fn research_tools(
    State(state): State<AppState>,
    AppJson(body): AppJson<FollowUpBody>,
) -> AppResult<Json<ToolsResearch>> {
    let (award, contract_info) = body.validate()?;
    Ok(Json(
        research::research_tools(&state.llm, award, contract_info).await?,
    ))
}

pub async fn research_gao(
    State(state): State<AppState>,
    AppJson(body): AppJson<FollowUpBody>,
) -> AppResult<Json<GaoResearch>> {
    let (award, contract_info) = body.validate()?;
    Ok(Json(
        research::research_gao(&state.llm, award, contract_info).await?,
    ))
}

pub async fn summarize(
    State(state): State<AppState>,
    AppJson(body): AppJson<SummaryBody>,
) -> AppResult<Json<Summary>> {
    let analysis = required(body.detailed_analysis.as_deref(), "detailedAnalysis")?;
    Ok(Json(research::summarize(&state.llm, analysis).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_up_requires_every_field() {
        let body: FollowUpBody = serde_json::from_value(serde_json::json!({
            "contractInfo": "Cloud hosting for VA",
            "awardId": "36C10B22N1028",
        }))
        .unwrap();
        let err = body.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: recipientName is required");
    }

    #[test]
    fn test_follow_up_trims_values() {
        let body: FollowUpBody = serde_json::from_value(serde_json::json!({
            "contractInfo": " info ",
            "awardId": " W91 ",
            "recipientName": " Acme ",
        }))
        .unwrap();
        let (award, info) = body.validate().unwrap();
        assert_eq!(award.award_id, "W91");
        assert_eq!(award.recipient_name, "Acme");
        assert_eq!(info, "info");
    }
}
