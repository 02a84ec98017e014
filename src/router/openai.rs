//! OpenAI chat-completions API adapter.

use async_trait::async_trait;

use serde_json::{Value, json};

use super::adapter::{ProviderAdapter, read_json_response};
use crate::types::{
    CompletionRequest, CompletionResponse, FinishReason, Message, Role, ToolInvocation, Usage,
};
use crate::{BifrostError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Adapter for the OpenAI chat-completions API.
///
/// Schema notes relative to the normalized form: system messages stay
/// in the message list, tool declarations wrap the schema in
/// `function.parameters`, and tool-call arguments travel as a JSON
/// string rather than an object.
pub struct OpenAiAdapter {
    id: String,
    resource: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Override the base URL (tests, proxies, compatible gateways).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: "openai".to_owned(),
            resource: "openai".to_owned(),
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        }
    }

    /// Draw from a different rate-limiter resource.
    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    fn convert_message(message: &Message) -> Result<Value> {
        match &message.role {
            Role::System => Ok(json!({"role": "system", "content": message.content})),
            Role::User => Ok(json!({"role": "user", "content": message.content})),
            Role::Assistant => {
                let mut native = json!({"role": "assistant", "content": message.content});
                if let Some(calls) = &message.tool_calls {
                    let tool_calls: Result<Vec<Value>> = calls
                        .iter()
                        .map(|call| {
                            Ok(json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": serde_json::to_string(&call.arguments)?,
                                },
                            }))
                        })
                        .collect();
                    native["tool_calls"] = json!(tool_calls?);
                }
                Ok(native)
            }
            Role::Tool { tool_call_id } => Ok(json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": message.content,
            })),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn resource_name(&self) -> &str {
        &self.resource
    }

    fn build_request(&self, request: &CompletionRequest, model: &str) -> Result<Value> {
        let messages: Result<Vec<Value>> =
            request.messages.iter().map(Self::convert_message).collect();
        let mut body = json!({
            "model": model,
            "messages": messages?,
        });
        if let Some(n) = request.max_tokens {
            body["max_tokens"] = json!(n);
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
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        },
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }
        Ok(body)
    }

    fn parse_response(&self, model: &str, native: Value) -> Result<CompletionResponse> {
        let message = native
            .pointer("/choices/0/message")
            .ok_or_else(|| {
                BifrostError::PermanentRequest("openai response missing choices[0].message".into())
            })?
            .clone();

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let arguments_raw = call
                    .pointer("/function/arguments")
                    .and_then(Value::as_str)
                    .unwrap_or("{}");
                let arguments: Value = serde_json::from_str(arguments_raw)?;
                tool_calls.push(ToolInvocation::new(
                    call.get("id").and_then(Value::as_str).unwrap_or_default(),
                    call.pointer("/function/name")
                        .and_then(Value::as_str)
                        .unwrap_or_default(),
                    arguments,
                ));
            }
        }

        let finish_reason = match native
            .pointer("/choices/0/finish_reason")
            .and_then(Value::as_str)
        {
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolUse,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        let usage = native.get("usage").map(|u| Usage {
            prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
            completion_tokens: u
                .get("completion_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
            total_tokens: u.get("total_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
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
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&native)
            .send()
            .await?;
        read_json_response(response).await
    }
}
