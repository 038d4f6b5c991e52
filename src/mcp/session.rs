use crate::mcp::config::ServerSpec;
use crate::mcp::McpError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<u64>,
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// A tool advertised by an MCP server
#[derive(Debug, Clone, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, RpcFailure>>>>>;

#[derive(Debug)]
enum RpcFailure {
    Rpc { code: i64, message: String },
    Closed,
}

/// One open connection to an MCP server: a spawned child process speaking
/// newline-delimited JSON-RPC over stdin/stdout.
///
/// The tool list is fetched once during `start` and is immutable afterwards.
#[derive(Debug)]
pub struct Session {
    name: String,
    stdin: Mutex<ChildStdin>,
    next_id: AtomicU64,
    pending: PendingMap,
    tools: Vec<ToolInfo>,
    child: Mutex<Option<Child>>,
}

impl Session {
    /// Spawn the server process and run the MCP handshake.
    pub async fn start(name: &str, spec: &ServerSpec) -> Result<Self, McpError> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        for (k, v) in &spec.env {
            cmd.env(k, v);
        }
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            server: name.to_string(),
            command: spec.command.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::Protocol {
            server: name.to_string(),
            message: "child has no stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::Protocol {
            server: name.to_string(),
            message: "child has no stdout".to_string(),
        })?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(Self::reader_task(stdout, pending.clone(), name.to_string()));

        let mut session = Self {
            name: name.to_string(),
            stdin: Mutex::new(stdin),
            next_id: AtomicU64::new(1),
            pending,
            tools: Vec::new(),
            child: Mutex::new(Some(child)),
        };

        session.initialize().await?;
        session.tools = session.fetch_tools().await?;

        Ok(session)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tools advertised by this server.
    pub fn tools(&self) -> &[ToolInfo] {
        &self.tools
    }

    /// Call `tools/call` and collapse the reply's text content blocks into
    /// one string. A reply flagged `isError` becomes `McpError::ToolFailed`.
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<String, McpError> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });
        let result = self.request("tools/call", Some(params)).await?;

        let text = collect_text(result.get("content"));

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            let message = if text.is_empty() {
                format!("tool '{tool_name}' returned an error")
            } else {
                text
            };
            return Err(McpError::ToolFailed(message));
        }

        Ok(text)
    }

    /// Terminate the server process. Safe to call more than once.
    pub async fn close(&self) -> Result<(), McpError> {
        let child = { self.child.lock().await.take() };
        let Some(mut child) = child else {
            return Ok(());
        };

        debug!(server = %self.name, "closing mcp session");
        child.kill().await.map_err(|source| McpError::Io {
            server: self.name.clone(),
            source,
        })
    }

    async fn initialize(&self) -> Result<(), McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let result = self.request("initialize", Some(params)).await?;
        debug!(server = %self.name, ?result, "mcp session initialized");

        self.notify("notifications/initialized", None).await
    }

    async fn fetch_tools(&self) -> Result<Vec<ToolInfo>, McpError> {
        let result = self.request("tools/list", None).await?;
        let tools: Vec<ToolInfo> = serde_json::from_value(
            result.get("tools").cloned().unwrap_or(Value::Array(vec![])),
        )
        .map_err(|e| McpError::Protocol {
            server: self.name.clone(),
            message: format!("invalid tools/list reply: {e}"),
        })?;
        debug!(server = %self.name, count = tools.len(), "mcp tools loaded");
        Ok(tools)
    }

    /// Send a request and wait for the matching response.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut map = self.pending.lock().await;
            map.insert(id, tx);
        }

        debug!(server = %self.name, id, method, "mcp request");
        if let Err(e) = self.send_line(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(RpcFailure::Rpc { code, message })) => Err(McpError::Rpc {
                server: self.name.clone(),
                code,
                message,
            }),
            Ok(Err(RpcFailure::Closed)) | Err(_) => Err(McpError::Closed {
                server: self.name.clone(),
            }),
        }
    }

    /// Fire-and-forget notification (no id, no response).
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let mut notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
        });
        if let Some(params) = params {
            notification["params"] = params;
        }
        self.send_line(&notification).await
    }

    async fn send_line<T: Serialize>(&self, payload: &T) -> Result<(), McpError> {
        let line = serde_json::to_string(payload).map_err(|e| McpError::Protocol {
            server: self.name.clone(),
            message: format!("serialize request: {e}"),
        })?;

        let mut stdin = self.stdin.lock().await;
        let io_err = |source| McpError::Io {
            server: self.name.clone(),
            source,
        };
        stdin.write_all(line.as_bytes()).await.map_err(io_err)?;
        stdin.write_all(b"\n").await.map_err(io_err)?;
        stdin.flush().await.map_err(io_err)?;
        Ok(())
    }

    /// Background reader: dispatches responses by id to waiting callers.
    async fn reader_task(stdout: ChildStdout, pending: PendingMap, server: String) {
        let reader = BufReader::new(stdout);
        let mut lines = reader.lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) if !line.trim().is_empty() => {
                    let preview = line.get(..200).unwrap_or(&line);
                    debug!(server = %server, "mcp <- {preview}");
                    match serde_json::from_str::<RpcResponse>(&line) {
                        Ok(response) => {
                            // Server-initiated notifications carry no id and
                            // are ignored.
                            let Some(id) = response.id else { continue };

                            let mut map = pending.lock().await;
                            if let Some(tx) = map.remove(&id) {
                                let payload = match response.error {
                                    Some(err) => Err(RpcFailure::Rpc {
                                        code: err.code,
                                        message: err.message,
                                    }),
                                    None => Ok(response.result.unwrap_or(Value::Null)),
                                };
                                let _ = tx.send(payload);
                            }
                        }
                        Err(e) => {
                            warn!(server = %server, "mcp: unparseable response line: {e}");
                        }
                    }
                }
                Ok(Some(_)) => {} // blank line
                Ok(None) => {
                    error!(server = %server, "mcp: stdout closed");
                    let mut map = pending.lock().await;
                    for (_, tx) in map.drain() {
                        let _ = tx.send(Err(RpcFailure::Closed));
                    }
                    break;
                }
                Err(e) => {
                    error!(server = %server, "mcp: read error: {e}");
                    break;
                }
            }
        }
    }
}

fn collect_text(content: Option<&Value>) -> String {
    let Some(items) = content.and_then(Value::as_array) else {
        return String::new();
    };

    items
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}
