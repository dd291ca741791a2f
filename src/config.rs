use std::env;
use std::str::FromStr;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
    pub search_window_years: u32,
    pub usaspending: UsaSpendingConfig,
    pub perplexity: ProviderConfig,
    pub gemini: ProviderConfig,
    pub openai: ProviderConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone)]
pub struct UsaSpendingConfig {
    pub base_url: String,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub timeout_secs: u64,
    pub page_delay_ms: u64,
}

impl Default for UsaSpendingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.usaspending.gov/api/v2".to_string(),
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            timeout_secs: 30,
            page_delay_ms: 500,
        }
    }
}

/// Settings shared by every generative-AI provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub base_url: String,
}

impl ProviderConfig {
    fn perplexity() -> Self {
        Self {
            api_key: None,
            model: "sonar-pro".to_string(),
            max_tokens: 4000,
            temperature: 0.2,
            timeout_secs: 120,
            base_url: "https://api.perplexity.ai".to_string(),
        }
    }

    fn gemini() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            max_tokens: 8192,
            temperature: 0.3,
            timeout_secs: 90,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    fn openai() -> Self {
        Self {
            api_key: None,
            model: "gpt-4.1".to_string(),
            max_tokens: 4096,
            temperature: 0.3,
            timeout_secs: 60,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    fn from_env(prefix: &str, defaults: Self) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: env::var(format!("{prefix}_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: env::var(format!("{prefix}_MODEL")).unwrap_or(defaults.model),
            max_tokens: parse_var(&format!("{prefix}_MAX_TOKENS"), defaults.max_tokens)?,
            temperature: parse_var(&format!("{prefix}_TEMPERATURE"), defaults.temperature)?,
            timeout_secs: parse_var(&format!("{prefix}_TIMEOUT_SECS"), defaults.timeout_secs)?,
            base_url: env::var(format!("{prefix}_BASE_URL")).unwrap_or(defaults.base_url),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub chrome_executable: Option<String>,
    pub navigation_timeout_secs: u64,
    pub settle_ms: u64,
    pub fpds_settle_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            navigation_timeout_secs: 60,
            settle_ms: 2000,
            fpds_settle_ms: 5000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            environment: "development".to_string(),
            otel_service_name: "award-research".to_string(),
            otel_exporter_endpoint: "http://localhost:4317".to_string(),
            search_window_years: 10,
            usaspending: UsaSpendingConfig::default(),
            perplexity: ProviderConfig::perplexity(),
            gemini: ProviderConfig::gemini(),
            openai: ProviderConfig::openai(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let usaspending = UsaSpendingConfig::default();
        let export = ExportConfig::default();

        Ok(Self {
            port: parse_var("PORT", defaults.port)?,
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or(defaults.otel_service_name),
            otel_exporter_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or(defaults.otel_exporter_endpoint),
            search_window_years: parse_var("SEARCH_WINDOW_YEARS", defaults.search_window_years)?,
            usaspending: UsaSpendingConfig {
                base_url: env::var("USASPENDING_BASE_URL").unwrap_or(usaspending.base_url),
                retry_attempts: parse_var(
                    "USASPENDING_RETRY_ATTEMPTS",
                    usaspending.retry_attempts,
                )?,
                retry_base_delay_ms: parse_var(
                    "USASPENDING_RETRY_DELAY_MS",
                    usaspending.retry_base_delay_ms,
                )?,
                timeout_secs: parse_var("USASPENDING_TIMEOUT_SECS", usaspending.timeout_secs)?,
                page_delay_ms: parse_var("USASPENDING_PAGE_DELAY_MS", usaspending.page_delay_ms)?,
            },
            perplexity: ProviderConfig::from_env("PERPLEXITY", ProviderConfig::perplexity())?,
            gemini: ProviderConfig::from_env("GEMINI", ProviderConfig::gemini())?,
            openai: ProviderConfig::from_env("OPENAI", ProviderConfig::openai())?,
            export: ExportConfig {
                chrome_executable: env::var("CHROME_EXECUTABLE").ok(),
                navigation_timeout_secs: parse_var(
                    "PDF_NAVIGATION_TIMEOUT_SECS",
                    export.navigation_timeout_secs,
                )?,
                settle_ms: parse_var("PDF_SETTLE_MS", export.settle_ms)?,
                fpds_settle_ms: parse_var("PDF_FPDS_SETTLE_MS", export.fpds_settle_ms)?,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid {}", std::any::type_name::<T>())),
        _ => Ok(default),
    }
}
