//! Common test utilities and fixtures

#![allow(dead_code)]

use std::path::PathBuf;
use tempfile::TempDir;

/// Test fixture with a temporary directory for config files and stub
/// server scripts
pub struct TestFixture {
    /// Temporary directory that gets cleaned up automatically
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { temp_dir }
    }

    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    /// Create a file with given content
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let filepath = self.path().join(name);
        std::fs::write(&filepath, content).expect("Failed to write test file");
        filepath
    }

    /// Write a servers file that launches the given script through `sh`.
    pub fn create_servers_file(&self, server_name: &str, script: &PathBuf) -> PathBuf {
        let config = serde_json::json!({
            "mcpServers": {
                server_name: {
                    "command": "sh",
                    "args": [script.to_str().unwrap()],
                }
            }
        });
        self.create_file("browser_mcp.json", &config.to_string())
    }

    /// Write a scripted MCP server: a POSIX-sh loop that answers the
    /// handshake, advertises a `navigate` and a `fail` tool, and echoes
    /// canned `tools/call` replies. Request ids are extracted from the
    /// incoming line, so any number of calls works.
    pub fn create_stub_server(&self) -> PathBuf {
        let script = r#"#!/bin/sh
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"stub","version":"0.0.1"}}}\n' "$id"
      ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"navigate","description":"Open a URL","inputSchema":{"type":"object","properties":{"url":{"type":"string"}},"required":["url"]}},{"name":"fail","description":"Always errors","inputSchema":{"type":"object","properties":{}}}]}}\n' "$id"
      ;;
    *'"name":"fail"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"isError":true,"content":[{"type":"text","text":"boom"}]}}\n' "$id"
      ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"navigated"},{"type":"text","text":"title: Example"}]}}\n' "$id"
      ;;
  esac
done
"#;
        self.create_file("stub_mcp_server.sh", script)
    }
}
