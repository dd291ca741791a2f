//! Document exports: award pages printed to PDF behind a generated cover,
//! and analysis text converted to Word.

pub mod browser;
pub mod cover;
pub mod docx;
pub mod markdown;

use chrono::Local;
use opentelemetry::KeyValue;
use reqwest::Url;
use tracing::Instrument;

pub use browser::{page_to_pdf, parse_page_url, settle_delay_for};
pub use cover::{CoverPage, CoverTheme, prepend_cover, render_cover};
pub use docx::{WordExport, build_word_document};
pub use markdown::{Block, markdown_to_blocks};

use crate::config::ExportConfig;
use crate::error::AppError;
use crate::telemetry::metrics::EXPORT_DOCUMENTS;

/// Which public site an award PDF is printed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfSource {
    UsaSpending,
    Fpds,
}

impl PdfSource {
    pub fn theme(self) -> CoverTheme {
        match self {
            PdfSource::UsaSpending => CoverTheme::Purple,
            PdfSource::Fpds => CoverTheme::Orange,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PdfSource::UsaSpending => "USAspending",
            PdfSource::Fpds => "FPDS",
        }
    }

    fn subtitle(self) -> &'static str {
        match self {
            PdfSource::UsaSpending => "Award summary from USAspending.gov",
            PdfSource::Fpds => "Contract action report from FPDS.gov",
        }
    }

    /// Attachment name, e.g. `usaspending-CONT_AWD_123.pdf`.
    pub fn file_name(self, award_id: Option<&str>) -> String {
        let prefix = self.label().to_lowercase();
        match award_id.map(sanitize_file_stem).filter(|s| !s.is_empty()) {
            Some(stem) => format!("{prefix}-{stem}.pdf"),
            None => format!("{prefix}-award.pdf"),
        }
    }
}

pub fn sanitize_file_stem(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Prints `url`, prepends a cover for `source`, and returns the merged PDF.
///
/// The work runs in its own task so that a dropped request future cannot
/// interrupt browser teardown or temp file cleanup.
#[tracing::instrument(
    name = "export award_pdf",
    skip(source, url, config),
    fields(source = source.label(), url = %url)
)]
pub async fn export_award_pdf(
    source: PdfSource,
    url: Url,
    award_id: Option<String>,
    config: ExportConfig,
) -> Result<Vec<u8>, AppError> {
    let result = run_detached(async move {
        let content = page_to_pdf(&url, &config).await?;

        let cover = CoverPage {
            title: "Contract Award Report".to_string(),
            subtitle: source.subtitle().to_string(),
            award_id,
            generated: Local::now().date_naive(),
            theme: source.theme(),
        };

        tokio::task::spawn_blocking(move || prepend_cover(render_cover(&cover)?, content))
            .await
            .map_err(|e| AppError::Internal(format!("PDF merge task failed: {e}")))?
    })
    .await;

    let outcome = if result.is_ok() { "ok" } else { "error" };
    EXPORT_DOCUMENTS.add(
        1,
        &[
            KeyValue::new("format", "pdf"),
            KeyValue::new("source", source.label()),
            KeyValue::new("outcome", outcome),
        ],
    );

    result
}

/// Runs `work` on its own task inside the caller's span.
async fn run_detached<F, T>(work: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work.instrument(tracing::Span::current()))
        .await
        .map_err(|e| AppError::Internal(format!("PDF export task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detached_work_stays_in_callers_span() {
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry());

        let name = run_detached(async {
            Ok(tracing::Span::current().metadata().map(|m| m.name()))
        })
        .instrument(tracing::info_span!("export award_pdf"))
        .await
        .unwrap();

        assert_eq!(name, Some("export award_pdf"));
    }

    async fn crash() -> Result<(), AppError> {
        panic!("renderer crashed")
    }

    #[tokio::test]
    async fn test_detached_panic_is_internal_error() {
        let err = run_detached(crash()).await.unwrap_err();

        assert!(
            matches!(err, AppError::Internal(ref msg) if msg.contains("PDF export task failed"))
        );
    }

    #[test]
    fn test_sources_map_to_cover_colors() {
        assert_eq!(PdfSource::UsaSpending.theme(), CoverTheme::Purple);
        assert_eq!(PdfSource::Fpds.theme(), CoverTheme::Orange);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            PdfSource::UsaSpending.file_name(Some("CONT_AWD_W91/0001")),
            "usaspending-CONT_AWD_W91_0001.pdf"
        );
        assert_eq!(PdfSource::Fpds.file_name(None), "fpds-award.pdf");
        assert_eq!(PdfSource::Fpds.file_name(Some("  ")), "fpds-award.pdf");
    }
}
