pub mod config;
pub mod error;
pub mod export;
pub mod llm;
pub mod prompts;
pub mod research;
pub mod routes;
pub mod search;
pub mod telemetry;
pub mod usaspending;

use config::Config;
use llm::LlmClient;
use usaspending::UsaSpendingClient;

/// Shared handler state. Every field is cheap to clone and holds no
/// mutable data.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub usaspending: UsaSpendingClient,
    pub llm: LlmClient,
}

impl AppState {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let usaspending = UsaSpendingClient::new(&config.usaspending)?;
        let llm = LlmClient::from_config(&config)?;

        Ok(Self {
            config,
            usaspending,
            llm,
        })
    }
}
