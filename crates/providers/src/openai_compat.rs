//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, and any other endpoint
//! that follows the chat completions contract.

use serde_json::Value;

use pf_domain::config::ProviderConfig;
use pf_domain::error::{Error, Result};
use pf_domain::stream::{BoxStream, StreamEvent, Usage};

use crate::sse::sse_response_stream;
use crate::traits::{GenerateRequest, GenerateResponse, LlmProvider, Role};
use crate::util::{from_reqwest, resolve_api_key};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for any OpenAI-compatible API endpoint.
pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new provider from the deserialized provider config.
    pub fn from_config(cfg: &ProviderConfig, timeout_ms: u64) -> Result<Self> {
        let api_key = resolve_api_key(cfg)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| from_reqwest(&cfg.id, e))?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: cfg.model.clone().unwrap_or_else(|| DEFAULT_MODEL.into()),
            client,
        })
    }

    fn build_body(&self, req: &GenerateRequest, stream: bool) -> Value {
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let mut messages: Vec<Value> = Vec::new();
        if let Some(ref system) = req.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for msg in &req.messages {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(serde_json::json!({"role": role, "content": msg.content}));
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if !req.stop.is_empty() {
            body["stop"] = serde_json::json!(req.stop);
        }

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_completion(body: &Value) -> GenerateResponse {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .cloned()
        .unwrap_or(Value::Null);

    let content = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|f| f.as_str())
        .map(String::from);

    GenerateResponse {
        content,
        finish_reason,
        usage: body.get("usage").and_then(parse_usage),
    }
}

fn parse_usage(v: &Value) -> Option<Usage> {
    let prompt = v.get("prompt_tokens")?.as_u64()? as u32;
    let completion = v.get("completion_tokens")?.as_u64()? as u32;
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: v
            .get("total_tokens")
            .and_then(|t| t.as_u64())
            .map(|t| t as u32)
            .unwrap_or(prompt + completion),
    })
}

/// Parse a single SSE data line, handling the `[DONE]` sentinel.
fn parse_stream_data(data: &str, done_emitted: &mut bool) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        if !*done_emitted {
            *done_emitted = true;
            return vec![Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            })];
        }
        return Vec::new();
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let mut events = Vec::new();
    let choice = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .cloned()
        .unwrap_or(Value::Null);

    if let Some(text) = choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
    {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Token {
                text: text.to_string(),
            }));
        }
    }

    if let Some(reason) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        *done_emitted = true;
        events.push(Ok(StreamEvent::Done {
            usage: v.get("usage").and_then(parse_usage),
            finish_reason: Some(reason.to_string()),
        }));
    }

    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LlmProvider impl
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(&req, false);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| from_reqwest(&self.id, e))?;

        let status = resp.status();
        let body: Value = resp.json().await.map_err(|e| from_reqwest(&self.id, e))?;

        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("request failed");
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {status}: {message}"),
            });
        }

        Ok(parse_completion(&body))
    }

    async fn generate_stream(
        &self,
        req: GenerateRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(&req, true);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| from_reqwest(&self.id, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {status}: {text}"),
            });
        }

        let mut done_emitted = false;
        Ok(sse_response_stream(self.id.clone(), resp, move |data| {
            parse_stream_data(data, &mut done_emitted)
        }))
    }

    fn supports_streaming(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ChatMessage;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider {
            id: "local".into(),
            base_url: "http://localhost:11434".into(),
            api_key: "none".into(),
            default_model: DEFAULT_MODEL.into(),
            client: reqwest::Client::new(),
        }
    }

    #[test]
    fn system_prompt_prepends_message_list() {
        let req = GenerateRequest {
            system: Some("be brief".into()),
            messages: vec![ChatMessage::user("hello")],
            ..Default::default()
        };
        let body = provider().build_body(&req, false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
    }

    #[test]
    fn parse_completion_extracts_content_and_usage() {
        let body = serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": "try a guard clause"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 4, "total_tokens": 13}
        });
        let resp = parse_completion(&body);
        assert_eq!(resp.content, "try a guard clause");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 13);
    }

    #[test]
    fn stream_delta_and_done_sentinel() {
        let mut done = false;
        let events = parse_stream_data(
            r#"{"choices":[{"delta":{"content":"to"},"finish_reason":null}]}"#,
            &mut done,
        );
        assert!(matches!(&events[0], Ok(StreamEvent::Token { text }) if text == "to"));

        let events = parse_stream_data(
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            &mut done,
        );
        assert!(matches!(&events[0], Ok(StreamEvent::Done { .. })));

        // Sentinel after an explicit finish must not double-emit.
        let events = parse_stream_data("[DONE]", &mut done);
        assert!(events.is_empty());
    }

    #[test]
    fn bare_done_sentinel_closes_stream() {
        let mut done = false;
        let events = parse_stream_data("[DONE]", &mut done);
        assert!(matches!(&events[0], Ok(StreamEvent::Done { .. })));
    }
}
