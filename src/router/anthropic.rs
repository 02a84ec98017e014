//! Anthropic messages API adapter.

use async_trait::async_trait;

use serde_json::{Value, json};

use super::adapter::{ProviderAdapter, read_json_response};
use crate::types::{
    CompletionRequest, CompletionResponse, FinishReason, Message, Role, ToolInvocation, Usage,
};
use crate::{BifrostError, Result};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// The messages API requires an explicit completion cap.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Adapter for the Anthropic messages API.
///
/// Schema notes relative to the normalized form: system messages are
/// lifted out of the message list into the top-level `system` field,
/// tool declarations use `input_schema`, assistant tool calls and tool
/// results are content blocks (`tool_use` / `tool_result`).
pub struct AnthropicAdapter {
    id: String,
    resource: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Override the base URL (tests, proxies).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: "anthropic".to_owned(),
            resource: "anthropic".to_owned(),
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        }
    }

    /// Draw from a different rate-limiter resource (e.g. per-account
    /// quotas behind one provider).
    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    fn convert_message(message: &Message) -> Result<Option<Value>> {
        match &message.role {
            // System messages are handled at the request level.
            Role::System => Ok(None),
            Role::User => Ok(Some(json!({
                "role": "user",
                "content": message.content,
            }))),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !message.content.is_empty() {
                    blocks.push(json!({"type": "text", "text": message.content}));
                }
                if let Some(calls) = &message.tool_calls {
                    for call in calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        }));
                    }
                }
                Ok(Some(json!({"role": "assistant", "content": blocks})))
            }
            Role::Tool { tool_call_id } => Ok(Some(json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": tool_call_id,
                    "content": message.content,
                }],
            }))),
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn resource_name(&self) -> &str {
        &self.resource
    }

    fn build_request(&self, request: &CompletionRequest, model: &str) -> Result<Value> {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let mut messages = Vec::new();
        for message in &request.messages {
            if let Some(native) = Self::convert_message(message)? {
                messages.push(native);
            }
        }

        let mut body = json!({
            "model": model,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }
        Ok(body)
    }

    fn parse_response(&self, model: &str, native: Value) -> Result<CompletionResponse> {
        let blocks = native
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                BifrostError::PermanentRequest("anthropic response missing content array".into())
            })?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        content.push_str(text);
                    }
                }
                Some("tool_use") => {
                    tool_calls.push(ToolInvocation::new(
                        block.get("id").and_then(Value::as_str).unwrap_or_default(),
                        block
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default(),
                        block.get("input").cloned().unwrap_or(json!({})),
                    ));
                }
                // Unknown block types (e.g. thinking) carry no data we
                // normalize; skipping them loses nothing the caller asked for.
                _ => {}
            }
        }

        let finish_reason = match native.get("stop_reason").and_then(Value::as_str) {
            Some("max_tokens") => FinishReason::Length,
            Some("tool_use") => FinishReason::ToolUse,
            Some("refusal") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        let usage = native.get("usage").map(|u| {
            let prompt = u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
            let completion = u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
            Usage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            }
        });

        Ok(CompletionResponse {
            content,
            tool_calls,
            provider: self.id.clone(),
            model: native
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(model)
                .to_owned(),
            usage,
            finish_reason,
        })
    }

    async fn send(&self, native: Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&native)
            .send()
            .await?;
        read_json_response(response).await
    }
}
