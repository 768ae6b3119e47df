//! Configuration for the chat engine
//!
//! The host injects the API base host at startup; everything else has
//! defaults matching the production deployment. Optional fields allow the
//! embedder to override timeouts and retry budgets without touching code.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Scheme and authority of the backend, without a version path segment.
    pub api_base_host: String,
    /// Version segment for the title endpoint.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Version segment for the chat endpoint.
    #[serde(default = "default_chat_api_version")]
    pub chat_api_version: String,
    /// How long to wait for the host to answer a token request, in seconds.
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    /// Automatic auth retries per submission lineage.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Cap on prior messages included in the chat request body.
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
}

fn default_api_version() -> String {
    "/v1".to_string()
}

fn default_chat_api_version() -> String {
    "/v2".to_string()
}

fn default_auth_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_max_context_messages() -> usize {
    20
}

impl ChatConfig {
    pub fn new(api_base_host: &str) -> ChatConfig {
        ChatConfig {
            api_base_host: api_base_host.to_string(),
            api_version: default_api_version(),
            chat_api_version: default_chat_api_version(),
            auth_timeout_secs: default_auth_timeout_secs(),
            max_retries: default_max_retries(),
            max_context_messages: default_max_context_messages(),
        }
    }

    /// Base URL for the title endpoint.
    pub fn title_base_url(&self) -> String {
        format!("{}{}", self.api_base_host, self.api_version)
    }

    /// Base URL for the chat endpoint.
    pub fn chat_base_url(&self) -> String {
        format!("{}{}", self.api_base_host, self.chat_api_version)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}
