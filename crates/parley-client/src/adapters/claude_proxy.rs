//! Backend-proxied LLM endpoint.
//!
//! Requests go to the backend edge function, not the vendor directly:
//! `POST {backend}/functions/v1/claude-proxy` with a bearer anon key plus
//! an `apikey` header. Responses arrive in the vendor shape
//! `{content: [{text}]}`; streaming responses are SSE `data:` lines with
//! `content_block_delta` events (see `sse`).

use async_trait::async_trait;
use parley_schema::{ClientError, WireMessage};
use serde::{Deserialize, Serialize};

use super::EndpointAdapter;

pub const CLAUDE_PROXY_PATH: &str = "/functions/v1/claude-proxy";

/// Backend proxy credentials, usually read from the environment.
/// Absence of any variable leaves the adapter non-configured rather than
/// failing construction.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub api_key: Option<String>,
}

impl ProxyConfig {
    pub fn from_env() -> Self {
        Self {
            backend_url: std::env::var("PARLEY_BACKEND_URL").ok().filter(|v| !v.is_empty()),
            anon_key: std::env::var("PARLEY_BACKEND_ANON_KEY").ok().filter(|v| !v.is_empty()),
            api_key: std::env::var("PARLEY_LLM_API_KEY").ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn new(
        backend_url: impl Into<String>,
        anon_key: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            backend_url: Some(backend_url.into()),
            anon_key: Some(anon_key.into()),
            api_key: Some(api_key.into()),
        }
    }
}

/// Wire payload for the proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPayload {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<WireMessage>,
    pub temperature: f64,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClaudeProxyAdapter {
    backend_url: String,
    anon_key: String,
    api_key: String,
    configured: bool,
}

impl ClaudeProxyAdapter {
    pub fn new(config: ProxyConfig) -> Self {
        let configured =
            config.backend_url.is_some() && config.anon_key.is_some() && config.api_key.is_some();
        Self {
            backend_url: config
                .backend_url
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            anon_key: config.anon_key.unwrap_or_default(),
            api_key: config.api_key.unwrap_or_default(),
            configured,
        }
    }

    /// Join all text blocks of a proxy response.
    pub fn response_text(value: &serde_json::Value) -> Option<String> {
        let blocks = value.get("content")?.as_array()?;
        let text: Vec<&str> = blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text.join("\n"))
        }
    }
}

#[async_trait]
impl EndpointAdapter for ClaudeProxyAdapter {
    fn name(&self) -> &'static str {
        "claude-proxy"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.backend_url, CLAUDE_PROXY_PATH)
    }

    fn cache_ttl(&self) -> chrono::Duration {
        parley_store::chat_response_ttl()
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("authorization", format!("Bearer {}", self.anon_key))
            .header("apikey", &self.api_key)
            .header("content-type", "application/json")
    }

    async fn parse_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<serde_json::Value, ClientError> {
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| ClientError::Transport(format!("invalid proxy response body: {e}")))
    }
}
