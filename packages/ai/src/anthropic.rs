// ABOUTME: Anthropic Claude implementation of the completion provider
// ABOUTME: Maps chat messages and tool specs onto the Messages API

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::provider::{
    ChatMessage, Completion, CompletionOptions, CompletionProvider, ProviderError, ProviderResult,
    Role, ToolCall, ToolSpec,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MESSAGES_PATH: &str = "/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Completion provider backed by the Anthropic Messages API.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Create HTTP client with timeout configuration
    fn create_client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client")
    }

    /// Creates a provider from `ANTHROPIC_API_KEY`; model can be overridden
    /// with `ANTHROPIC_MODEL`.
    pub fn from_env() -> ProviderResult<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| ProviderError::NoApiKey)?;
        Ok(Self::with_api_key(api_key))
    }

    pub fn with_api_key(api_key: String) -> Self {
        let model = env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        if model != DEFAULT_MODEL {
            info!("Using custom Anthropic model: {}", model);
        }

        Self {
            client: Self::create_client(),
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the provider at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> AnthropicRequest {
        // The Messages API takes the system prompt out-of-band.
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let wire_messages = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: match m.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            messages: wire_messages,
            system: if system.is_empty() {
                None
            } else {
                Some(system.join("\n\n"))
            },
            tools: options.tools.iter().map(WireTool::from).collect(),
        }
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> ProviderResult<Completion> {
        let request = self.build_request(messages, options);

        info!(
            "Making Anthropic API request: model={}, max_tokens={}, tools={}",
            request.model,
            request.max_tokens,
            request.tools.len()
        );

        let response = self
            .client
            .post(format!("{}{}", self.base_url, MESSAGES_PATH))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("Anthropic API request timed out");
                    ProviderError::ApiError("Request timed out".to_string())
                } else if e.is_connect() {
                    error!("Failed to connect to Anthropic API: {}", e);
                    ProviderError::ApiError(format!("Connection failed: {}", e))
                } else {
                    error!("Anthropic API request failed: {}", e);
                    ProviderError::RequestFailed(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Anthropic API error: {} - {}", status, error_text);
            return Err(ProviderError::ApiError(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        if anthropic_response.content.is_empty() {
            return Err(ProviderError::InvalidResponse);
        }

        let mut completion = Completion::default();
        for block in anthropic_response.content {
            match block {
                ContentBlock::Text { text } => {
                    if !completion.content.is_empty() {
                        completion.content.push('\n');
                    }
                    completion.content.push_str(&text);
                }
                ContentBlock::ToolUse { name, input, .. } => {
                    completion.tool_calls.push(ToolCall {
                        name,
                        arguments: input,
                    });
                }
                ContentBlock::Unknown => {}
            }
        }

        Ok(completion)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

impl From<&ToolSpec> for WireTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            input_schema: spec.input_schema.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[allow(dead_code)]
    id: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[allow(dead_code)]
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider_for(server: &MockServer) -> AnthropicProvider {
        AnthropicProvider::with_api_key("test-key".to_string()).with_base_url(server.uri())
    }

    #[test]
    fn test_request_separates_system_prompt_and_tools() {
        let provider = AnthropicProvider::with_api_key("k".to_string());
        let messages = vec![
            ChatMessage::system("You are terse."),
            ChatMessage::user("hello"),
        ];
        let options = CompletionOptions::with_tools(vec![ToolSpec {
            name: "execute_code".to_string(),
            description: "Run code".to_string(),
            input_schema: json!({"type": "object"}),
        }]);

        let request = provider.build_request(&messages, &options);
        assert_eq!(request.system.as_deref(), Some("You are terse."));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.tools.len(), 1);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["tools"][0]["name"], json!("execute_code"));
    }

    #[tokio::test]
    async fn test_parses_text_and_tool_use_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "content": [
                    {"type": "text", "text": "Running it now."},
                    {
                        "type": "tool_use",
                        "id": "toolu_1",
                        "name": "execute_code",
                        "input": {"code": "print(1 + 2)", "language": "python"}
                    }
                ],
                "usage": {"input_tokens": 10, "output_tokens": 20}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let completion = provider
            .generate_chat_completion(
                &[ChatMessage::user("add 1 and 2")],
                &CompletionOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(completion.content, "Running it now.");
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "execute_code");
        assert_eq!(
            completion.tool_calls[0].arguments["language"],
            json!("python")
        );
    }

    #[tokio::test]
    async fn test_non_success_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "invalid api key"})),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider
            .generate_chat_completion(&[ChatMessage::user("hi")], &CompletionOptions::default())
            .await
            .unwrap_err();

        match err {
            ProviderError::ApiError(message) => assert!(message.contains("401")),
            other => panic!("Expected ApiError, got {:?}", other),
        }
    }
}
