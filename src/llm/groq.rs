use crate::llm::types::{ChatMessage, FunctionCall, StreamChunk, ToolCall, ToolCallKind};
use crate::llm::LlmError;
use eventsource_stream::Eventsource;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

pub const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Explicit model configuration handed to the client at construction time.
/// The credential lives here, not in the process environment.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Groq chat-completions client (OpenAI-compatible endpoint)
#[derive(Clone)]
pub struct GroqClient {
    client: Client,
    config: ModelConfig,
}

impl GroqClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Create a streaming chat completion
    pub async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<serde_json::Value>>,
    ) -> Result<Pin<Box<dyn Stream<Item = StreamChunk> + Send>>, LlmError> {
        let api_base = self.config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        let url = format!("{}/chat/completions", api_base);

        tracing::debug!(
            api_base = %api_base,
            model = %self.config.model,
            message_count = messages.len(),
            tool_count = tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "groq stream_chat request"
        );

        let request_body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: true,
            tools,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            tracing::warn!(
                status,
                error = %crate::logging::redact_secrets(&message),
                "groq api returned error"
            );

            return Err(match status {
                401 | 403 => LlmError::Unauthorized { status, message },
                400 | 404 | 422 => LlmError::BadRequest { status, message },
                429 => LlmError::RateLimited { status, message },
                500..=599 => LlmError::Server { status, message },
                _ => LlmError::Api { status, message },
            });
        }

        let stream = response
            .bytes_stream()
            .eventsource()
            .scan(StreamState::default(), |state, event| {
                let out: Vec<StreamChunk> = match event {
                    Err(e) => vec![StreamChunk::Error(e.to_string())],
                    Ok(event) if event.data.trim() == "[DONE]" => {
                        // Groq terminates the body with [DONE]; anything the
                        // finish_reason flush missed goes out here.
                        let mut chunks = state.flush();
                        chunks.push(StreamChunk::Done);
                        chunks
                    }
                    Ok(event) => match serde_json::from_str::<ChatCompletionChunk>(&event.data) {
                        Ok(chunk) => state.apply(chunk),
                        Err(e) => vec![StreamChunk::Error(format!(
                            "Failed to parse stream chunk: {e}"
                        ))],
                    },
                };

                futures::future::ready(Some(futures::stream::iter(out)))
            })
            .flatten();

        Ok(Box::pin(stream))
    }
}

/// Request body for a chat completion
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

/// One SSE chunk of a streamed completion
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Tool calls arrive as indexed fragments; id and name in the first
/// fragment, arguments spread across the rest.
#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Default)]
struct StreamState {
    pending: Vec<PendingToolCall>,
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl StreamState {
    fn apply(&mut self, chunk: ChatCompletionChunk) -> Vec<StreamChunk> {
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Vec::new();
        };

        let mut out = Vec::new();

        if let Some(text) = choice.delta.content {
            if !text.is_empty() {
                out.push(StreamChunk::Text(text));
            }
        }

        for delta in choice.delta.tool_calls.unwrap_or_default() {
            if self.pending.len() <= delta.index {
                self.pending
                    .resize_with(delta.index + 1, PendingToolCall::default);
            }
            let pending = &mut self.pending[delta.index];

            if let Some(id) = delta.id {
                pending.id = id;
            }
            if let Some(function) = delta.function {
                if let Some(name) = function.name {
                    tracing::debug!(tool_name = %name, "groq tool_call start");
                    pending.name = name;
                }
                if let Some(arguments) = function.arguments {
                    pending.arguments.push_str(&arguments);
                }
            }
        }

        if choice.finish_reason.as_deref() == Some("tool_calls") {
            out.extend(self.flush());
        }

        out
    }

    fn flush(&mut self) -> Vec<StreamChunk> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .filter(|p| !p.name.is_empty())
            .map(|p| {
                StreamChunk::ToolCall(ToolCall {
                    id: p.id,
                    kind: ToolCallKind::Function,
                    function: FunctionCall {
                        name: p.name,
                        arguments: p.arguments,
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(data: &str) -> ChatCompletionChunk {
        serde_json::from_str(data).unwrap()
    }

    #[test]
    fn assembles_tool_call_from_fragments() {
        let mut state = StreamState::default();

        let out = state.apply(chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"browser__navigate","arguments":""}}]},"finish_reason":null}]}"#,
        ));
        assert!(out.is_empty());

        let out = state.apply(chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"url\":\"https://example.com\"}"}}]},"finish_reason":null}]}"#,
        ));
        assert!(out.is_empty());

        let out = state.apply(chunk(
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
        ));
        assert_eq!(out.len(), 1);
        match &out[0] {
            StreamChunk::ToolCall(call) => {
                assert_eq!(call.id, "call_1");
                assert_eq!(call.function.name, "browser__navigate");
                assert_eq!(call.function.arguments, r#"{"url":"https://example.com"}"#);
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn emits_text_deltas_directly() {
        let mut state = StreamState::default();
        let out = state.apply(chunk(
            r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#,
        ));
        assert!(matches!(&out[0], StreamChunk::Text(t) if t == "Hello"));
    }

    #[test]
    fn flush_skips_nameless_fragments() {
        let mut state = StreamState::default();
        state.apply(chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_2","function":{"name":"browser__click","arguments":"{}"}}]},"finish_reason":null}]}"#,
        ));
        // Index 0 was never filled in; only the named call survives.
        let out = state.flush();
        assert_eq!(out.len(), 1);
    }
}
