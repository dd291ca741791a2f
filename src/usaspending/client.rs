use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use reqwest::Method;
use serde_json::Value;

use super::error::ClientError;
use super::query::{self, SearchQuery};
use crate::config::UsaSpendingConfig;
use crate::telemetry::metrics::{
    USASPENDING_REQUEST_DURATION, USASPENDING_REQUESTS_TOTAL, USASPENDING_RETRY_COUNT,
};

pub const SEARCH_PATH: &str = "search/spending_by_award/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt `attempt` (counted from 0): 1s, 2s, 4s...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[derive(Clone)]
pub struct UsaSpendingClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    page_delay: Duration,
}

impl UsaSpendingClient {
    pub fn new(config: &UsaSpendingConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("award-research/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy {
                max_attempts: config.retry_attempts.max(1),
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
            },
            page_delay: Duration::from_millis(config.page_delay_ms),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn award_endpoint(&self, award_id: &str) -> String {
        self.endpoint(&format!("awards/{}/", urlencoding::encode(award_id)))
    }

    #[tracing::instrument(
        name = "usaspending.search",
        skip(self, query),
        fields(
            search.page = query.effective_page(),
            search.limit = query.effective_limit(),
            search.results,
        )
    )]
    pub async fn search_contracts(&self, query: &SearchQuery) -> Result<Value, ClientError> {
        let body = serde_json::to_value(query.to_request_body(query::today()))?;
        let response = self
            .make_request(Method::POST, &self.endpoint(SEARCH_PATH), Some(&body))
            .await?;

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        tracing::Span::current().record("search.results", results);

        Ok(response)
    }

    #[tracing::instrument(name = "usaspending.award_details", skip(self))]
    pub async fn get_award_details(&self, award_id: &str) -> Result<Value, ClientError> {
        let url = self.award_endpoint(award_id);
        match self.make_request(Method::GET, &url, None).await {
            Err(ClientError::Rejected { status: 404, .. }) => {
                Err(ClientError::NotFound(award_id.to_string()))
            }
            other => other,
        }
    }

    pub async fn search_by_recipient(
        &self,
        recipient: &str,
        options: SearchQuery,
    ) -> Result<Value, ClientError> {
        self.search_contracts(&SearchQuery {
            recipient: Some(recipient.to_string()),
            ..options
        })
        .await
    }

    pub async fn search_by_agency(
        &self,
        agency: &str,
        options: SearchQuery,
    ) -> Result<Value, ClientError> {
        self.search_contracts(&SearchQuery {
            agencies: vec![agency.to_string()],
            ..options
        })
        .await
    }

    pub async fn search_by_naics(
        &self,
        naics_code: &str,
        options: SearchQuery,
    ) -> Result<Value, ClientError> {
        self.search_contracts(&SearchQuery {
            naics_codes: vec![naics_code.to_string()],
            ..options
        })
        .await
    }

    pub async fn search_by_min_amount(
        &self,
        min_amount: f64,
        options: SearchQuery,
    ) -> Result<Value, ClientError> {
        self.search_contracts(&SearchQuery {
            min_amount: Some(min_amount),
            ..options
        })
        .await
    }

    /// Walks pages starting at `query.page` until a short page or `max_results`.
    #[tracing::instrument(name = "usaspending.fetch_all", skip(self, query), fields(pages, total))]
    pub async fn fetch_all(
        &self,
        query: &SearchQuery,
        max_results: Option<usize>,
    ) -> Result<Vec<Value>, ClientError> {
        if max_results == Some(0) {
            return Ok(Vec::new());
        }

        let page_size = query.effective_limit() as usize;
        let mut page = query.effective_page();
        let mut pages = 0u32;
        let mut all = Vec::new();

        loop {
            let body = self
                .search_contracts(&SearchQuery {
                    page,
                    ..query.clone()
                })
                .await?;
            pages += 1;

            let results = match body.get("results") {
                Some(Value::Array(results)) => results.clone(),
                _ => Vec::new(),
            };
            let fetched = results.len();
            all.extend(results);

            if let Some(cap) = max_results
                && all.len() >= cap
            {
                all.truncate(cap);
                break;
            }
            if fetched < page_size {
                break;
            }

            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }

        let span = tracing::Span::current();
        span.record("pages", pages);
        span.record("total", all.len());

        Ok(all)
    }

    pub async fn make_request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let max_attempts = self.retry.max_attempts;
        let mut last_err = None;

        for attempt in 0..max_attempts {
            let start = Instant::now();
            let result = self.send_once(method.clone(), url, body).await;
            let elapsed = start.elapsed().as_secs_f64();

            match result {
                Ok(value) => {
                    record_attempt(&method, "success", elapsed);
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    record_attempt(&method, err.kind(), elapsed);
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        status = err.status(),
                        error = %err,
                        "USAspending request failed, not retrying"
                    );
                    return Err(err);
                }
                Err(err) => {
                    record_attempt(&method, err.kind(), elapsed);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        url,
                        status = err.status(),
                        error = %err,
                        "USAspending request failed"
                    );
                    last_err = Some(err);

                    if attempt + 1 < max_attempts {
                        let delay = self.retry.backoff(attempt);
                        USASPENDING_RETRY_COUNT
                            .add(1, &[KeyValue::new("http.method", method.to_string())]);
                        tracing::debug!(
                            delay_ms = delay.as_millis() as u64,
                            "Backing off before retry"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let last_error =
            last_err.map_or_else(|| "no attempts made".to_string(), |e| e.to_string());
        tracing::error!(
            attempts = max_attempts,
            url,
            error = %last_error,
            "USAspending retries exhausted"
        );

        Err(ClientError::RetriesExhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::from_status(status.as_u16(), error_message(&text)));
        }

        if text.trim().is_empty() {
            return Err(ClientError::EmptyBody);
        }

        match serde_json::from_str::<Value>(&text)? {
            Value::Null => Err(ClientError::EmptyBody),
            value => Ok(value),
        }
    }
}

fn record_attempt(method: &Method, outcome: &'static str, elapsed_secs: f64) {
    let attrs = [
        KeyValue::new("http.method", method.to_string()),
        KeyValue::new("outcome", outcome),
    ];
    USASPENDING_REQUESTS_TOTAL.add(1, &attrs);
    USASPENDING_REQUEST_DURATION.record(elapsed_secs, &attrs);
}

/// USAspending error bodies carry the reason in `detail` or `message`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> UsaSpendingClient {
        UsaSpendingClient::new(&UsaSpendingConfig {
            base_url: base_url.to_string(),
            ..UsaSpendingConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_backoff_doubles_from_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.backoff(40) >= Duration::from_secs(1 << 20));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = client("https://api.usaspending.gov/api/v2/");
        assert_eq!(
            client.endpoint(SEARCH_PATH),
            "https://api.usaspending.gov/api/v2/search/spending_by_award/"
        );
    }

    #[test]
    fn test_award_endpoint_percent_encodes_id() {
        let client = client("https://api.usaspending.gov/api/v2");
        assert_eq!(
            client.award_endpoint("CONT_AWD_N1028_3600_D0003/3600"),
            "https://api.usaspending.gov/api/v2/awards/CONT_AWD_N1028_3600_D0003%2F3600/"
        );
    }

    #[test]
    fn test_zero_attempts_config_still_tries_once() {
        let client = UsaSpendingClient::new(&UsaSpendingConfig {
            retry_attempts: 0,
            ..UsaSpendingConfig::default()
        })
        .unwrap();
        assert_eq!(client.retry_policy().max_attempts, 1);
    }

    #[test]
    fn test_error_message_prefers_detail() {
        assert_eq!(error_message(r#"{"detail": "Invalid filter"}"#), "Invalid filter");
        assert_eq!(error_message(r#"{"message": "nope"}"#), "nope");
        assert_eq!(error_message("plain text"), "plain text");
    }
}
