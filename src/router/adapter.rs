//! Provider adapter seam.
//!
//! One [`ProviderAdapter`] implementation per provider replaces
//! per-provider branching at call sites: the router selects an adapter
//! from the tier's route and talks to it through this capability
//! interface only.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{CompletionRequest, CompletionResponse};
use crate::{BifrostError, Result};

/// Translates between the normalized request/response types and one
/// provider's native wire shapes, and carries the call over HTTP.
///
/// `build_request` and `parse_response` must be total and lossless for
/// the supported tool-calling subset (tool name, description,
/// JSON-schema parameter object). A construct the provider cannot
/// express is rejected with
/// [`BifrostError::UnsupportedCapability`](crate::BifrostError::UnsupportedCapability),
/// never silently dropped.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider id ("anthropic", "openai", ...).
    fn id(&self) -> &str;

    /// Rate-limiter resource this provider's quota draws from.
    fn resource_name(&self) -> &str;

    /// Translate the normalized request into the provider's native
    /// request body.
    fn build_request(&self, request: &CompletionRequest, model: &str) -> Result<serde_json::Value>;

    /// Translate the provider's native response body back into the
    /// normalized form.
    fn parse_response(&self, model: &str, native: serde_json::Value)
    -> Result<CompletionResponse>;

    /// Send a native request body to the provider and return the native
    /// response body.
    async fn send(&self, native: serde_json::Value) -> Result<serde_json::Value>;

    /// One full provider attempt: build, send, parse.
    async fn complete(
        &self,
        request: &CompletionRequest,
        model: &str,
    ) -> Result<CompletionResponse> {
        let native = self.build_request(request, model)?;
        let raw = self.send(native).await?;
        self.parse_response(model, raw)
    }
}

/// Map an HTTP response to the native JSON body or a classified error.
///
/// Shared by the concrete adapters so the status taxonomy stays in one
/// place: 401/403 are auth failures, 429 carries the `retry-after`
/// hint, other 4xx are permanent request errors, 5xx are transient.
pub(crate) async fn read_json_response(response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => BifrostError::AuthenticationFailed,
        429 => BifrostError::RateLimited { retry_after },
        code @ 400..=499 => BifrostError::PermanentRequest(format!("{code}: {body}")),
        code => BifrostError::Api {
            status: code,
            message: body,
        },
    })
}
