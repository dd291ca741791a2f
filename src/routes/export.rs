use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use opentelemetry::KeyValue;
use serde::Deserialize;
use serde_json::Value;

use super::{AppJson, required};
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::export::{
    PdfSource, WordExport, build_word_document, export_award_pdf, parse_page_url,
    sanitize_file_stem,
};
use crate::telemetry::metrics::EXPORT_DOCUMENTS;

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordBody {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub grounding_metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub award_id: Option<String>,
}

fn attachment(content_type: &str, file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

pub async fn word_document(AppJson(body): AppJson<WordBody>) -> AppResult<Response> {
    let content = required(body.content.as_deref(), "content")?.to_string();
    let export = WordExport {
        title: body.title.unwrap_or_default(),
        company_name: body.company_name.unwrap_or_default(),
        model: body.model.unwrap_or_default(),
        content,
        grounding_metadata: body.grounding_metadata,
    };

    let stem = match sanitize_file_stem(&export.company_name) {
        s if s.is_empty() => "analysis".to_string(),
        s => format!("{s}-analysis"),
    };

    let result = tokio::task::spawn_blocking(move || build_word_document(&export))
        .await
        .map_err(|e| AppError::Internal(format!("Word export task failed: {e}")))?;

    EXPORT_DOCUMENTS.add(
        1,
        &[
            KeyValue::new("format", "docx"),
            KeyValue::new("outcome", if result.is_ok() { "ok" } else { "error" }),
        ],
    );

    Ok(attachment(DOCX_CONTENT_TYPE, &format!("{stem}.docx"), result?))
}

async fn award_pdf(state: AppState, source: PdfSource, body: PdfBody) -> AppResult<Response> {
    let url = parse_page_url(required(body.url.as_deref(), "url")?)?;
    let award_id = body
        .award_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    let file_name = source.file_name(award_id.as_deref());

    let bytes = export_award_pdf(source, url, award_id, state.config.export.clone()).await?;

    Ok(attachment("application/pdf", &file_name, bytes))
}

pub async fn usaspending_pdf(
    State(state): State<AppState>,
    AppJson(body): AppJson<PdfBody>,
) -> AppResult<Response> {
    award_pdf(state, PdfSource::UsaSpending, body).await
}

pub async fn fpds_pdf(
    State(state): State<AppState>,
    AppJson(body): AppJson<PdfBody>,
) -> AppResult<Response> {
    award_pdf(state, PdfSource::Fpds, body).await
}
