use crate::llm::groq::GroqClient;
use crate::llm::types::{ChatMessage, StreamChunk, ToolCall};
use crate::llm::LlmError;
use crate::mcp::McpClient;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Errors a turn can end with.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("No final answer after {0} steps")]
    StepLimit(usize),
}

impl AgentError {
    /// Whether the chat loop may continue after this error.
    pub fn recoverable(&self) -> bool {
        match self {
            AgentError::Llm(e) => e.recoverable(),
            AgentError::StepLimit(_) => true,
        }
    }
}

/// The agent seam the chat loop drives. Kept narrow so the loop can be
/// exercised with a stub in tests.
#[async_trait::async_trait]
pub trait ChatAgent: Send + Sync {
    /// Process one user turn to completion and return the final answer text.
    async fn run(&self, input: &str) -> Result<String, AgentError>;

    /// Drop all retained conversation history.
    async fn clear_history(&self);
}

/// Conversational agent: wraps the model client and the MCP client, and
/// drives model rounds with sequential tool execution until the model
/// produces a final answer or the step limit is hit.
pub struct McpAgent {
    llm_client: GroqClient,
    mcp_client: Arc<McpClient>,
    max_steps: usize,
    memory_enabled: bool,
    conversation: Mutex<Vec<ChatMessage>>,
}

impl McpAgent {
    pub fn new(
        llm_client: GroqClient,
        mcp_client: Arc<McpClient>,
        max_steps: usize,
        memory_enabled: bool,
    ) -> Self {
        Self {
            llm_client,
            mcp_client,
            max_steps,
            memory_enabled,
            conversation: Mutex::new(Vec::new()),
        }
    }

    /// Number of retained messages (for tests and diagnostics).
    pub async fn history_len(&self) -> usize {
        self.conversation.lock().await.len()
    }

    async fn run_turn(&self, input: &str) -> Result<String, AgentError> {
        // Holding the lock for the whole turn also enforces that at most one
        // turn is in flight.
        let mut conversation = self.conversation.lock().await;

        if !self.memory_enabled {
            conversation.clear();
        }
        conversation.push(ChatMessage::user(input));

        let definitions = self.mcp_client.tool_definitions().await;
        let tools = if definitions.is_empty() {
            None
        } else {
            Some(definitions)
        };

        for step in 0..self.max_steps {
            tracing::debug!(step, history = conversation.len(), "agent model round");

            let mut stream = self
                .llm_client
                .stream_chat(conversation.clone(), tools.clone())
                .await?;

            let mut assistant_text = String::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    StreamChunk::Text(text) => assistant_text.push_str(&text),
                    StreamChunk::ToolCall(call) => tool_calls.push(call),
                    StreamChunk::Done => break,
                    StreamChunk::Error(message) => {
                        return Err(LlmError::Stream(message).into());
                    }
                }
            }

            if tool_calls.is_empty() {
                conversation.push(ChatMessage::assistant(assistant_text.clone()));
                return Ok(assistant_text);
            }

            conversation.push(ChatMessage::assistant_with_tool_calls(
                if assistant_text.is_empty() {
                    None
                } else {
                    Some(assistant_text)
                },
                tool_calls.clone(),
            ));

            // Execute requested tools sequentially; failures go back to the
            // model as tool output rather than ending the turn.
            for call in tool_calls {
                let content = match parse_arguments(&call.function.arguments) {
                    Ok(arguments) => {
                        match self
                            .mcp_client
                            .call_tool(&call.function.name, arguments)
                            .await
                        {
                            Ok(output) => output,
                            Err(e) => format!("Tool execution failed: {e}"),
                        }
                    }
                    Err(e) => format!(
                        "Invalid arguments for tool '{}': {e}",
                        call.function.name
                    ),
                };

                tracing::debug!(
                    tool = %call.function.name,
                    output_len = content.len(),
                    "tool round complete"
                );
                conversation.push(ChatMessage::tool_result(call.id, content));
            }
        }

        Err(AgentError::StepLimit(self.max_steps))
    }
}

#[async_trait::async_trait]
impl ChatAgent for McpAgent {
    async fn run(&self, input: &str) -> Result<String, AgentError> {
        self.run_turn(input).await
    }

    async fn clear_history(&self) {
        self.conversation.lock().await.clear();
    }
}

fn parse_arguments(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw)
}
