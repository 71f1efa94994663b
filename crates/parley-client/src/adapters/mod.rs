//! Per-vendor adapters for the generic dispatcher.
//!
//! The dispatcher implements the shared resilience behavior once; an
//! adapter supplies only what differs per vendor: endpoint, auth headers,
//! cache TTL, and response parsing.

pub mod claude_proxy;
pub mod speech;

use async_trait::async_trait;
use parley_schema::ClientError;

#[async_trait]
pub trait EndpointAdapter: Send + Sync {
    /// Short tag for logs and error messages.
    fn name(&self) -> &'static str;

    /// Whether the required credentials are present. Callers check this
    /// before use; dispatching an unconfigured adapter fails with
    /// `ClientError::NotConfigured`.
    fn is_configured(&self) -> bool;

    /// Full request URL.
    fn endpoint(&self) -> String;

    /// How long successful responses stay cacheable.
    fn cache_ttl(&self) -> chrono::Duration;

    /// Attach vendor auth headers.
    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder;

    /// Turn a 2xx response body into the cached/returned value.
    async fn parse_response(&self, resp: reqwest::Response) -> Result<serde_json::Value, ClientError>;
}
