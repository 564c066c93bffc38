use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde_json::{Value, json};
use strum::VariantNames;
use tracing::{debug, warn};

use super::Planner;
use crate::config::Config;
use crate::error::AgentError;
use crate::types::{Action, Observation, Tool};

const SYSTEM_PROMPT: &str = "You are a computer-use planner. Always output a single JSON Action \
that matches the tool schema. Prefer DOM selectors when provided. Use bbox only as fallback. \
Keep responses minimal.";

const TOOL_NAME: &str = "propose_action";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Planner backed by an OpenAI-compatible chat-completions endpoint, forced
/// to answer with a single `propose_action` tool call.
pub struct OpenAiPlanner {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    snapshot_budget: usize,
}

impl OpenAiPlanner {
    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        let api_key = config.openai_api_key.clone().ok_or_else(|| {
            AgentError::Config("OPENAI_API_KEY is not set; cannot use the openai planner".into())
        })?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AgentError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: config.openai_model.clone(),
            endpoint: format!("{}/chat/completions", config.openai_base_url),
            snapshot_budget: config.snapshot_budget,
        })
    }

    fn request_body(&self, observation: &Observation) -> Value {
        let mut parts = vec![json!({
            "type": "text",
            "text": format!("Goal: {}", observation.goal),
        })];

        if let Some(dom) = observation.snapshot.as_deref().filter(|d| !d.is_empty()) {
            parts.push(json!({
                "type": "text",
                "text": format!("DOM:\n{}", truncate_chars(dom, self.snapshot_budget)),
            }));
        }
        if let Some(png) = observation.screenshot.as_deref().filter(|p| !p.is_empty()) {
            parts.push(json!({
                "type": "image_url",
                "image_url": { "url": format!("data:image/png;base64,{}", STANDARD.encode(png)) },
            }));
        }

        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": parts },
            ],
            "tools": [tool_spec()],
            "tool_choice": { "type": "function", "function": { "name": TOOL_NAME } },
            "temperature": 0.2,
        })
    }

    async fn call(&self, observation: &Observation) -> Result<Value, String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(observation))
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("unreadable response ({status}): {e}"))?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error");
            return Err(format!("API error ({status}): {message}"));
        }
        Ok(body)
    }
}

#[async_trait]
impl Planner for OpenAiPlanner {
    async fn plan(&self, observation: &Observation) -> Action {
        match self.call(observation).await {
            Ok(body) => interpret_response(&body),
            Err(reason) => {
                warn!(target: "brain", "planner call failed, waiting instead: {reason}");
                Action::default_wait(format!("Planner unavailable: {reason}"))
            }
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Turn a chat-completions response into an action, tolerating every kind of
/// malformed output.
pub fn interpret_response(body: &Value) -> Action {
    let message = &body["choices"][0]["message"];

    let raw = match message["tool_calls"][0]["function"]["arguments"].as_str() {
        Some(args) => args.to_string(),
        None => match message["content"].as_str() {
            // Some compatible servers ignore tool_choice and answer in text.
            Some(content) if !content.trim().is_empty() => strip_fences(content).to_string(),
            _ => return Action::default_wait("No tool call returned; waiting"),
        },
    };
    debug!(target: "brain", "model proposed: {raw}");

    let value: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(target: "brain", "unparseable tool arguments: {e}");
            return Action::default_wait(format!("Unparseable planner output: {e}"));
        }
    };

    match Action::from_value(value.clone()) {
        Ok(action) => action,
        Err(e) => {
            warn!(target: "brain", "planner output did not validate: {e}");
            value["tool"]
                .as_str()
                .and_then(|t| t.parse::<Tool>().ok())
                .map(Action::with_tool)
                .unwrap_or_else(|| Action::default_wait(format!("Invalid planner output: {e}")))
        }
    }
}

fn strip_fences(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn tool_spec() -> Value {
    let nullable_str = json!({ "type": ["string", "null"] });
    let tools: &[&str] = Tool::VARIANTS;
    json!({
        "type": "function",
        "function": {
            "name": TOOL_NAME,
            "description": "Propose the next UI action to make progress towards the goal.",
            "parameters": {
                "type": "object",
                "properties": {
                    "tool": { "type": "string", "enum": tools },
                    "target": {
                        "type": "object",
                        "properties": {
                            "by": {
                                "type": "object",
                                "properties": {
                                    "role": nullable_str,
                                    "text": nullable_str,
                                    "title": nullable_str,
                                    "selector": nullable_str,
                                    "ax_path": nullable_str,
                                    "uia_selector": nullable_str,
                                    "atspi_path": nullable_str,
                                }
                            },
                            "bbox": {
                                "type": ["array", "null"],
                                "items": { "type": "number" },
                                "minItems": 4,
                                "maxItems": 4,
                            }
                        }
                    },
                    "inputText": nullable_str,
                    "args": { "type": ["object", "null"] },
                    "assert": nullable_str,
                    "rationale": nullable_str,
                },
                "required": ["tool"],
            }
        }
    })
}
