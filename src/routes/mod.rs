pub mod analysis;
pub mod awards;
pub mod export;
pub mod health;

use axum::Router;
use axum::extract::FromRequest;
use axum::response::Html;
use axum::routing::{get, post};

use crate::AppState;
use crate::error::{AppError, AppResult};

/// `Json` extractor whose rejections are reported as 400 `AppError`s.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health::health))
        .route("/api/search", post(awards::search))
        .route("/api/award/details/{award_id}", get(awards::award_details))
        .route("/api/analyze/perplexity", post(analysis::analyze_perplexity))
        .route("/api/analyze/gemini", post(analysis::analyze_gemini))
        .route("/api/research/contract", post(analysis::research_contract))
        .route("/api/research/tools", post(analysis::research_tools))
        .route("/api/research/gao", post(analysis::research_gao))
        .route("/api/summarize/gemini", post(analysis::summarize))
        .route("/api/generate-word-doc", post(export::word_document))
        .route("/api/generate-usaspending-pdf", post(export::usaspending_pdf))
        .route("/api/generate-fpds-pdf", post(export::fpds_pdf))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

/// Returns the trimmed value, or a 400 naming the missing field.
pub(crate) fn required<'a>(value: Option<&'a str>, field: &str) -> AppResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("{field} is required"))),
    }
}
