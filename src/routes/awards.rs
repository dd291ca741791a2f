use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{AppJson, required};
use crate::AppState;
use crate::error::AppResult;
use crate::usaspending::query::today;

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub keywords: Option<String>,
}

/// Passes the USAspending search response through unchanged.
pub async fn search(
    State(state): State<AppState>,
    AppJson(body): AppJson<SearchBody>,
) -> AppResult<Json<Value>> {
    let keywords = required(body.keywords.as_deref(), "keywords")?;

    let results = crate::search::search(
        &state.usaspending,
        keywords,
        state.config.search_window_years,
        today(),
    )
    .await?;

    Ok(Json(results))
}

pub async fn award_details(
    State(state): State<AppState>,
    Path(award_id): Path<String>,
) -> AppResult<Json<Value>> {
    let award_id = required(Some(&award_id), "awardId")?;
    let details = state.usaspending.get_award_details(award_id).await?;

    Ok(Json(json!({
        "awardId": award_id,
        "endpoint": state.usaspending.award_endpoint(award_id),
        "details": details,
    })))
}
