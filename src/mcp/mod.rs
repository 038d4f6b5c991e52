pub mod config;
pub mod session;

pub use config::{ServerSpec, ServersFile};
pub use session::{Session, ToolInfo};

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Separator between server name and tool name in qualified tool names.
pub const TOOL_NAME_SEPARATOR: &str = "__";

/// MCP client errors
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Failed to read servers file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid servers file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("[{server}] failed to spawn '{command}': {source}")]
    Spawn {
        server: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[{server}] i/o error: {source}")]
    Io {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[{server}] server closed the connection")]
    Closed { server: String },

    #[error("[{server}] JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("[{server}] protocol error: {message}")]
    Protocol { server: String, message: String },

    #[error("Tool call failed: {0}")]
    ToolFailed(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// Automation client: owns one session per configured MCP server and routes
/// qualified tool calls to the right one.
#[derive(Debug)]
pub struct McpClient {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl McpClient {
    /// Read the servers file and open a session to every server it lists.
    /// Any spawn or handshake failure is fatal here; partial startup is not
    /// useful for a chat whose tools all come from these servers.
    pub async fn from_config_file(path: &Path) -> Result<Self, McpError> {
        let file = ServersFile::load(path)?;
        Self::connect(file).await
    }

    pub async fn connect(file: ServersFile) -> Result<Self, McpError> {
        let mut sessions = HashMap::new();

        for (name, spec) in file.servers {
            let session = Session::start(&name, &spec).await?;
            info!(
                server = %name,
                tool_count = session.tools().len(),
                "mcp session ready"
            );
            sessions.insert(name, Arc::new(session));
        }

        Ok(Self {
            sessions: Mutex::new(sessions),
        })
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn has_sessions(&self) -> bool {
        self.session_count().await > 0
    }

    /// Every session's tools as OpenAI-style function definitions, named
    /// `<server>__<tool>` so the model's choice maps back to a session.
    pub async fn tool_definitions(&self) -> Vec<Value> {
        let sessions = self.sessions.lock().await;
        let mut definitions = Vec::new();

        for (server, session) in sessions.iter() {
            for tool in session.tools() {
                definitions.push(serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": format!("{server}{TOOL_NAME_SEPARATOR}{}", tool.name),
                        "description": tool.description.clone().unwrap_or_default(),
                        "parameters": tool.input_schema.clone(),
                    }
                }));
            }
        }

        definitions
    }

    /// Route a qualified tool call to its session.
    pub async fn call_tool(&self, qualified: &str, arguments: Value) -> Result<String, McpError> {
        let (server, tool) = qualified
            .split_once(TOOL_NAME_SEPARATOR)
            .ok_or_else(|| McpError::UnknownTool(qualified.to_string()))?;

        let session = {
            let sessions = self.sessions.lock().await;
            sessions
                .get(server)
                .cloned()
                .ok_or_else(|| McpError::UnknownTool(qualified.to_string()))?
        };

        info!(server = %server, tool = %tool, "executing mcp tool");
        session.call_tool(tool, arguments).await
    }

    /// Close every session, best-effort. The map is drained first, so a
    /// second call finds nothing to close.
    pub async fn close_all_sessions(&self) {
        let drained: Vec<(String, Arc<Session>)> =
            { self.sessions.lock().await.drain().collect() };

        for (name, session) in drained {
            if let Err(e) = session.close().await {
                warn!(server = %name, error = %e, "failed to close mcp session");
            }
        }
    }
}
