use std::time::Duration;

use crate::core_types::{LLMResponse, Message, Role, ToolCall, Usage};
use crate::errors::AgentError;
use crate::llm::{ToolMetadata, LLM};
use async_trait::async_trait;
use reqwest::Client;

use serde_json::{json, Value};

pub const DEFAULT_CHAT_API_VERSION: &str = "2024-12-01-preview";

#[derive(Debug, Clone, PartialEq)]
enum ApiFlavor {
    /// `{api_base}/chat/completions` with a bearer token.
    OpenAI { api_base: String },
    /// `{endpoint}/openai/deployments/{deployment}/chat/completions` with an `api-key` header.
    Azure {
        endpoint: String,
        api_version: String,
    },
}

#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    flavor: ApiFlavor,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    request_timeout: Option<Duration>,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            flavor: ApiFlavor::OpenAI {
                api_base: "https://api.openai.com/v1".to_string(),
            },
            model,
            temperature: None,
            max_tokens: None,
            request_timeout: None,
        }
    }

    /// Client for an Azure OpenAI resource; `deployment` doubles as the model name.
    pub fn azure(endpoint: String, api_key: String, deployment: String) -> Self {
        let mut client = Self::new(api_key, deployment);
        client.flavor = ApiFlavor::Azure {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: DEFAULT_CHAT_API_VERSION.to_string(),
        };
        client
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.flavor = ApiFlavor::OpenAI {
            api_base: api_base.trim_end_matches('/').to_string(),
        };
        self
    }

    pub fn with_api_version(mut self, version: String) -> Self {
        if let ApiFlavor::Azure { api_version, .. } = &mut self.flavor {
            *api_version = version;
        }
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn endpoint_url(&self) -> String {
        match &self.flavor {
            ApiFlavor::OpenAI { api_base } => format!("{}/chat/completions", api_base),
            ApiFlavor::Azure {
                endpoint,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint, self.model, api_version
            ),
        }
    }

    fn build_request_body(
        &self,
        messages: &[Message],
        tools: Option<&[ToolMetadata]>,
    ) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.format_messages(messages),
        });

        if let Some(temp) = self.temperature {
            body["temperature"] = temp.into();
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                log::debug!("Sending {} tool definition(s) to the model", tools.len());
                let formatted_tools: Vec<Value> = tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": tool.name,
                                "description": tool.description,
                                "parameters": tool.input_schema
                            }
                        })
                    })
                    .collect();
                body["tools"] = formatted_tools.into();
                body["tool_choice"] = "auto".into();
            }
        }

        body
    }

    fn format_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut message = json!({
                    "role": self.format_role(&msg.role),
                    "content": msg.content
                });

                if let Role::Tool = msg.role {
                    if let Some(tool_call_id) = &msg.tool_call_id {
                        message["tool_call_id"] = json!(tool_call_id);
                    }
                }

                if let Role::Assistant = msg.role {
                    if let Some(tool_calls) = &msg.tool_calls {
                        if !tool_calls.is_empty() {
                            let formatted_tool_calls: Vec<Value> = tool_calls
                                .iter()
                                .map(|tc| {
                                    json!({
                                        "id": tc.id,
                                        "type": "function",
                                        "function": {
                                            "name": tc.name,
                                            "arguments": tc.arguments
                                        }
                                    })
                                })
                                .collect();
                            message["tool_calls"] = json!(formatted_tool_calls);
                            if msg.content.is_empty() {
                                message["content"] = Value::Null;
                            }
                        }
                    }
                }

                message
            })
            .collect()
    }

    fn format_role(&self, role: &Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

#[async_trait]
impl LLM for OpenAIClient {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError> {
        let url = self.endpoint_url();
        let body = self.build_request_body(&messages, tools.as_deref());

        log::debug!("Chat completion request to {} with {} message(s)", url, messages.len());
        for (i, msg) in messages.iter().enumerate() {
            log::trace!(
                "  Message #{}: role={:?}, content={}, tool_call_id={:?}",
                i,
                msg.role,
                msg.content,
                msg.tool_call_id
            );
        }

        let mut request = self.client.post(&url).json(&body);
        request = match &self.flavor {
            ApiFlavor::Azure { .. } => request.header("api-key", &self.api_key),
            ApiFlavor::OpenAI { .. } => request.bearer_auth(&self.api_key),
        };
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::LLMError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AgentError::LLMError(format!("Failed to read response: {}", e)))?;

        log::debug!("Chat completion response ({}): {}", status, response_text);

        if !status.is_success() {
            return Err(AgentError::LLMError(format!(
                "API request failed with status {}: {}",
                status, response_text
            )));
        }

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| AgentError::ParsingError(format!("Invalid JSON response: {}", e)))?;

        self.parse_response(response_json)
    }
}

impl OpenAIClient {
    fn parse_response(&self, response: Value) -> Result<LLMResponse, AgentError> {
        let choices = response["choices"]
            .as_array()
            .ok_or_else(|| AgentError::ParsingError("No choices in response".to_string()))?;

        let choice = choices
            .first()
            .ok_or_else(|| AgentError::ParsingError("Empty choices array".to_string()))?;
        let message = &choice["message"];

        let content = message["content"].as_str().map(|s| s.to_string());

        // Every requested call is kept, even incomplete ones: the orchestrator
        // answers each of them, with an error if need be.
        let tool_calls = message["tool_calls"].as_array().and_then(|calls| {
            let parsed: Vec<ToolCall> = calls
                .iter()
                .map(|call| {
                    let function = &call["function"];
                    let arguments = match &function["arguments"] {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    ToolCall {
                        id: call["id"].as_str().map(|s| s.to_string()).unwrap_or_else(|| {
                            format!("call_{}", uuid::Uuid::new_v4().simple())
                        }),
                        name: function["name"].as_str().unwrap_or_default().to_string(),
                        arguments,
                    }
                })
                .collect();
            if parsed.is_empty() {
                None
            } else {
                Some(parsed)
            }
        });

        if content.is_none() && tool_calls.is_none() {
            return Err(AgentError::ParsingError(
                "Response has neither content nor tool calls".to_string(),
            ));
        }

        let usage = serde_json::from_value::<Usage>(response["usage"].clone()).ok();

        Ok(LLMResponse {
            content,
            tool_calls,
            finish_reason: choice["finish_reason"].as_str().map(|s| s.to_string()),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Message, ToolResult};
    use crate::test_utils::mock_openai_server::MockOpenAIServer;
    use crate::test_utils::mock_sessions_server::MockResponse;
    use crate::tools::execute_python_code_metadata;

    #[test]
    fn test_openai_client_creation() {
        let client = OpenAIClient::new("test-key".to_string(), "gpt-4o".to_string())
            .with_temperature(0.7)
            .with_max_tokens(1000);

        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.model, "gpt-4o");
        assert_eq!(client.temperature, Some(0.7));
        assert_eq!(client.max_tokens, Some(1000));
        assert_eq!(client.endpoint_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_azure_endpoint_url() {
        let client = OpenAIClient::azure(
            "https://example.openai.azure.com/".to_string(),
            "k".to_string(),
            "gpt-4o".to_string(),
        );
        assert_eq!(
            client.endpoint_url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-12-01-preview"
        );
    }

    #[test]
    fn test_message_formatting_with_tool_round() {
        let client = OpenAIClient::new("test-key".to_string(), "gpt-4o".to_string());
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "execute_python_code".to_string(),
            arguments: r#"{"code":"print(1)"}"#.to_string(),
        };
        let messages = vec![
            Message::system("You are a helpful assistant."),
            Message::user("Hello!"),
            Message::assistant("", vec![call]),
            Message::tool_result(&ToolResult {
                tool_call_id: "call_1".to_string(),
                content: "1".to_string(),
                success: true,
            }),
        ];

        let formatted = client.format_messages(&messages);
        assert_eq!(formatted.len(), 4);
        assert_eq!(formatted[0]["role"], "system");
        assert_eq!(formatted[1]["content"], "Hello!");
        assert_eq!(formatted[2]["content"], Value::Null);
        assert_eq!(formatted[2]["tool_calls"][0]["function"]["arguments"], r#"{"code":"print(1)"}"#);
        assert_eq!(formatted[3]["role"], "tool");
        assert_eq!(formatted[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_request_body_declares_tools_with_auto_choice() {
        let client = OpenAIClient::new("k".to_string(), "gpt-4o".to_string());
        let tools = vec![execute_python_code_metadata()];
        let body = client.build_request_body(&[Message::user("hi")], Some(&tools));
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "execute_python_code");
    }

    #[test]
    fn test_parse_keeps_malformed_arguments_raw() {
        let client = OpenAIClient::new("k".to_string(), "gpt-4o".to_string());
        let response = json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "execute_python_code", "arguments": "{\"code\": "}},
                        {"id": "b", "type": "function", "function": {"name": "execute_python_code", "arguments": "{\"code\": \"x\"}"}}
                    ]
                }
            }]
        });
        let parsed = client.parse_response(response).unwrap();
        let calls = parsed.tool_calls.unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments, "{\"code\": ");
        assert_eq!(parsed.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn test_parse_rejects_empty_message() {
        let client = OpenAIClient::new("k".to_string(), "gpt-4o".to_string());
        let err = client
            .parse_response(json!({"choices": [{"message": {"content": null}}]}))
            .unwrap_err();
        assert!(matches!(err, AgentError::ParsingError(_)));
    }

    #[tokio::test]
    async fn test_azure_round_trip_against_mock_server() {
        let server = MockOpenAIServer::start(vec![MockResponse::ok(json!({
            "choices": [{
                "finish_reason": "stop",
                "message": {"role": "assistant", "content": "2^20 is 1048576."}
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))])
        .await;

        let client = OpenAIClient::azure(server.address(), "secret".to_string(), "gpt-4o".to_string());
        let response = client
            .generate(vec![Message::user("Compute 2^20")], Some(vec![execute_python_code_metadata()]))
            .await
            .unwrap();
        assert_eq!(response.content.as_deref(), Some("2^20 is 1048576."));
        assert_eq!(response.usage.unwrap().total_tokens, 15);

        let requests = server.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].deployment.as_deref(), Some("gpt-4o"));
        assert_eq!(requests[0].api_key.as_deref(), Some("secret"));
        assert_eq!(
            requests[0].query.get("api-version").map(String::as_str),
            Some(DEFAULT_CHAT_API_VERSION)
        );
        assert_eq!(requests[0].body["tool_choice"], "auto");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_http_failure_is_llm_error() {
        let server = MockOpenAIServer::start(vec![MockResponse::status(429, "rate limited")]).await;

        let client = OpenAIClient::new("k".to_string(), "gpt-4o".to_string())
            .with_api_base(format!("{}/v1", server.address()));
        let err = client.generate(vec![Message::user("hi")], None).await.unwrap_err();
        match err {
            AgentError::LLMError(msg) => assert!(msg.contains("429")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(server.get_requests()[0].authorization.as_deref(), Some("Bearer k"));

        server.shutdown().await;
    }
}
