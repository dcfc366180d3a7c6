use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::RgbImage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::imaging::encode_data_uri;
use crate::llm::gateway::{GenerationError, GenerationGateway, SamplingParams};
use crate::prompt::{ChatMessage, ContentPart};
use crate::utils::http::get_http_client;

static THINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*<think>.*?</think>").expect("valid think regex"));

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_payload(payload: &Value) -> String {
    let model = payload
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let message_count = payload
        .get("messages")
        .and_then(|v| v.as_array())
        .map(|messages| messages.len())
        .unwrap_or(0);
    let max_tokens = payload
        .get("max_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    format!(
        "model={}, messages={}, max_tokens={}",
        model, message_count, max_tokens
    )
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

/// Drops a leading `<think>` block; keeps the reasoning only if nothing follows it.
fn strip_reasoning(content: &str) -> String {
    let Some(found) = THINK_RE.find(content) else {
        return content.trim().to_string();
    };
    let answer = content[found.end()..].trim();
    if !answer.is_empty() {
        return answer.to_string();
    }
    found
        .as_str()
        .trim()
        .trim_start_matches("<think>")
        .trim_end_matches("</think>")
        .trim()
        .to_string()
}

fn extract_content(response: &Value) -> String {
    let message = response
        .get("choices")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("message"));
    let Some(message) = message else {
        return String::new();
    };

    match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        // some providers answer with content parts
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

pub struct OpenRouterGateway {
    api_key: String,
    base_url: String,
    model: String,
    image_quality: u8,
    timeout: Option<Duration>,
}

impl OpenRouterGateway {
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.openrouter_api_key.trim().is_empty() {
            return Err(anyhow!("OPENROUTER_API_KEY is required"));
        }
        if config.poetry_model.trim().is_empty() {
            return Err(anyhow!("POETRY_MODEL must not be empty"));
        }
        let timeout = (config.generation_timeout_seconds > 0)
            .then(|| Duration::from_secs(config.generation_timeout_seconds));

        Ok(OpenRouterGateway {
            api_key: config.openrouter_api_key.clone(),
            base_url: config.openrouter_base_url.trim_end_matches('/').to_string(),
            model: config.poetry_model.trim().to_string(),
            image_quality: config.image_save_quality,
            timeout,
        })
    }

    fn build_payload(
        &self,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<Value, GenerationError> {
        let mut wire_messages = Vec::with_capacity(messages.len());
        for message in messages {
            let mut parts = Vec::with_capacity(message.content.len());
            for part in &message.content {
                match part {
                    ContentPart::Text(text) => parts.push(json!({
                        "type": "text",
                        "text": text
                    })),
                    ContentPart::Image(image) => {
                        let data_url = encode_data_uri(image, self.image_quality)
                            .map_err(|err| GenerationError(err.to_string()))?;
                        parts.push(json!({
                            "type": "image_url",
                            "image_url": { "url": data_url }
                        }));
                    }
                }
            }
            wire_messages.push(json!({
                "role": message.role.as_str(),
                "content": parts
            }));
        }

        Ok(json!({
            "model": self.model,
            "messages": wire_messages,
            "max_tokens": params.max_new_tokens,
            "top_p": params.top_p,
            "temperature": params.temperature,
        }))
    }

    async fn call_api(&self, payload: &Value) -> Result<Value, GenerationError> {
        debug!("OpenRouter request: {}", summarize_payload(payload));

        let mut request = get_http_client()
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", "PoetryMirror")
            .json(payload);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|err| GenerationError(format!("OpenRouter request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!(
                "OpenRouter API error: status={}, body={}",
                status, body_summary
            );
            return Err(GenerationError(message.unwrap_or_else(|| {
                format!("OpenRouter request failed with status {status}: {body_summary}")
            })));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| GenerationError(format!("Invalid OpenRouter response: {err}")))
    }
}

#[async_trait]
impl GenerationGateway for OpenRouterGateway {
    fn provider(&self) -> &str {
        "openrouter"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        _image: &RgbImage,
        params: &SamplingParams,
    ) -> Result<String, GenerationError> {
        // the image already travels inside the final message
        let payload = self.build_payload(messages, params)?;
        let response = self.call_api(&payload).await?;
        let content = strip_reasoning(&extract_content(&response));
        if content.is_empty() {
            warn!(
                "OpenRouter response had empty content: {}",
                truncate_for_log(&response.to_string(), 2000)
            );
            return Err(GenerationError("模型没有返回任何内容，请重试。".to_string()));
        }
        debug!("OpenRouter reply received ({} chars)", content.chars().count());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::messages::Role;
    use image::Rgb;
    use std::sync::Arc;

    fn gateway() -> OpenRouterGateway {
        OpenRouterGateway {
            api_key: "test-key".to_string(),
            base_url: "http://localhost".to_string(),
            model: "qwen/qwen3-vl-8b-instruct".to_string(),
            image_quality: 85,
            timeout: None,
        }
    }

    #[test]
    fn payload_carries_parts_and_sampling() {
        let image = Arc::new(RgbImage::from_pixel(4, 4, Rgb([200, 10, 10])));
        let messages = vec![
            ChatMessage::text(Role::User, "上一轮"),
            ChatMessage::text(Role::Assistant, "旧诗"),
            ChatMessage {
                role: Role::User,
                content: vec![
                    ContentPart::Image(image),
                    ContentPart::Text("写一首诗".to_string()),
                ],
            },
        ];
        let payload = gateway()
            .build_payload(&messages, &SamplingParams::new(256, 0.9, 1.1))
            .unwrap();

        assert_eq!(payload["model"], "qwen/qwen3-vl-8b-instruct");
        assert_eq!(payload["max_tokens"], 256);
        assert_eq!(payload["messages"][1]["role"], "assistant");
        assert_eq!(payload["messages"][1]["content"][0]["text"], "旧诗");
        let last = &payload["messages"][2]["content"];
        assert_eq!(last[0]["type"], "image_url");
        assert!(last[0]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
        assert_eq!(last[1]["text"], "写一首诗");
        assert!((payload["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn reasoning_preamble_is_removed() {
        assert_eq!(strip_reasoning("<think>想想</think>\n床前明月光"), "床前明月光");
        assert_eq!(strip_reasoning("<think>只有思考</think>   "), "只有思考");
        assert_eq!(strip_reasoning("  白日依山尽  "), "白日依山尽");
    }

    #[test]
    fn content_is_read_from_string_or_parts() {
        let plain = json!({"choices": [{"message": {"content": "春眠不觉晓"}}]});
        assert_eq!(extract_content(&plain), "春眠不觉晓");
        let parts = json!({"choices": [{"message": {"content": [{"type": "text", "text": "处处"}, {"type": "text", "text": "闻啼鸟"}]}}]});
        assert_eq!(extract_content(&parts), "处处闻啼鸟");
        assert_eq!(extract_content(&json!({"choices": []})), "");
    }

    #[test]
    fn provider_error_message_is_preferred() {
        let (message, _) = summarize_error_body(r#"{"error": {"message": "Rate limit exceeded"}}"#);
        assert_eq!(message.as_deref(), Some("Rate limit exceeded"));
        let (message, summary) = summarize_error_body("  ");
        assert!(message.is_none());
        assert_eq!(summary, "empty response body");
    }
}
