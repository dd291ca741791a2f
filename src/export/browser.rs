use std::time::{Duration, Instant};

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, PrintToPdfParams, SetLifecycleEventsEnabledParams,
};
use futures::{Stream, StreamExt, future};
use opentelemetry::KeyValue;
use reqwest::Url;
use tempfile::NamedTempFile;

use super::cover::write_temp_pdf;
use crate::config::ExportConfig;
use crate::error::AppError;
use crate::telemetry::metrics::EXPORT_RENDER_DURATION;

const PAPER_WIDTH_IN: f64 = 8.5;
const PAPER_HEIGHT_IN: f64 = 11.0;
const MARGIN_IN: f64 = 0.4;
const NETWORK_IDLE: &str = "networkIdle";

/// FPDS pages keep loading after the navigation event fires.
pub fn settle_delay_for(url: &Url, config: &ExportConfig) -> Duration {
    let is_fpds = url
        .host_str()
        .is_some_and(|host| host == "fpds.gov" || host.ends_with(".fpds.gov"));
    if is_fpds {
        Duration::from_millis(config.fpds_settle_ms)
    } else {
        Duration::from_millis(config.settle_ms)
    }
}

/// Accepts only absolute http(s) URLs.
pub fn parse_page_url(raw: &str) -> Result<Url, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::Validation("url is required".to_string()));
    }
    let url = Url::parse(raw).map_err(|e| AppError::Validation(format!("invalid url: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::Validation(format!(
            "unsupported url scheme: {other}"
        ))),
    }
}

fn print_params() -> PrintToPdfParams {
    PrintToPdfParams {
        print_background: Some(true),
        paper_width: Some(PAPER_WIDTH_IN),
        paper_height: Some(PAPER_HEIGHT_IN),
        margin_top: Some(MARGIN_IN),
        margin_bottom: Some(MARGIN_IN),
        margin_left: Some(MARGIN_IN),
        margin_right: Some(MARGIN_IN),
        ..Default::default()
    }
}

fn browser_config(config: &ExportConfig) -> Result<BrowserConfig, AppError> {
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .request_timeout(Duration::from_secs(config.navigation_timeout_secs));
    if let Some(path) = &config.chrome_executable {
        builder = builder.chrome_executable(path);
    }
    builder
        .build()
        .map_err(|e| AppError::Render(format!("invalid browser configuration: {e}")))
}

/// Prints `url` to a temporary PDF with an isolated headless browser.
///
/// The browser lives only for this call. Page and browser are closed before
/// returning regardless of outcome.
#[tracing::instrument(name = "export page_to_pdf", skip(url, config), fields(url = %url))]
pub async fn page_to_pdf(url: &Url, config: &ExportConfig) -> Result<NamedTempFile, AppError> {
    let start = Instant::now();

    let (mut browser, mut handler) = Browser::launch(browser_config(config)?)
        .await
        .map_err(|e| AppError::Render(format!("failed to launch browser: {e}")))?;
    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    let page = match browser.new_page("about:blank").await {
        Ok(page) => Some(page),
        Err(e) => {
            tracing::error!(error = %e, "failed to open browser page");
            None
        }
    };

    let result = match &page {
        Some(page) => print_page(page, url, config).await,
        None => Err(AppError::Render("failed to open browser page".to_string())),
    };

    if let Some(page) = page
        && let Err(e) = page.close().await
    {
        tracing::warn!(error = %e, "failed to close page");
    }
    if let Err(e) = browser.close().await {
        tracing::warn!(error = %e, "failed to close browser");
    }
    if let Err(e) = browser.wait().await {
        tracing::warn!(error = %e, "browser process did not exit cleanly");
    }
    handler_task.abort();

    let outcome = if result.is_ok() { "ok" } else { "error" };
    EXPORT_RENDER_DURATION.record(
        start.elapsed().as_secs_f64(),
        &[KeyValue::new("outcome", outcome)],
    );

    let bytes = result?;
    tracing::info!(bytes = bytes.len(), "page rendered");
    write_temp_pdf(&bytes)
}

fn cdp_err(context: &'static str) -> impl Fn(chromiumoxide::error::CdpError) -> AppError {
    move |e| AppError::Render(format!("{context}: {e}"))
}

/// Navigates, then waits for the main frame's `networkIdle` lifecycle event
/// and the host's settle delay before printing.
async fn print_page(page: &Page, url: &Url, config: &ExportConfig) -> Result<Vec<u8>, AppError> {
    let timeout = Duration::from_secs(config.navigation_timeout_secs);
    let deadline = tokio::time::Instant::now() + timeout;

    page.execute(SetLifecycleEventsEnabledParams::new(true))
        .await
        .map_err(cdp_err("failed to enable lifecycle events"))?;
    let events = page
        .event_listener::<EventLifecycleEvent>()
        .await
        .map_err(cdp_err("failed to subscribe to lifecycle events"))?;

    let navigate = page.execute(NavigateParams::new(url.as_str()));
    let navigation = tokio::time::timeout_at(deadline, navigate)
        .await
        .map_err(|_| {
            AppError::Render(format!(
                "navigation did not finish within {}s",
                timeout.as_secs()
            ))
        })?
        .map_err(cdp_err("navigation failed"))?
        .result;
    if let Some(error) = navigation.error_text {
        return Err(AppError::Render(format!("navigation failed: {error}")));
    }

    let frame_id = navigation.frame_id;
    let loader_id = navigation.loader_id;
    let names = events.filter_map(move |event| {
        let current = event.frame_id == frame_id
            && loader_id.as_ref().is_none_or(|id| *id == event.loader_id);
        future::ready(current.then(|| event.name.clone()))
    });
    wait_for_network_idle(names, deadline, timeout).await?;

    tokio::time::sleep(settle_delay_for(url, config)).await;

    page.pdf(print_params())
        .await
        .map_err(cdp_err("failed to print page"))
}

/// Consumes lifecycle event names until `networkIdle` or `deadline`.
async fn wait_for_network_idle<S>(
    names: S,
    deadline: tokio::time::Instant,
    timeout: Duration,
) -> Result<(), AppError>
where
    S: Stream<Item = String>,
{
    let idle = async {
        let mut names = std::pin::pin!(names);
        while let Some(name) = names.next().await {
            if name == NETWORK_IDLE {
                return true;
            }
        }
        false
    };

    match tokio::time::timeout_at(deadline, idle).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::Render(
            "browser closed before the page went idle".to_string(),
        )),
        Err(_) => Err(AppError::Render(format!(
            "page did not reach network idle within {}s",
            timeout.as_secs()
        ))),
    }
}
