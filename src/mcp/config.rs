use crate::mcp::McpError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// The servers file (`browser_mcp.json`): a `mcpServers` map of server name
/// to launch spec. The schema is owned by this client; the chat loop only
/// hands over a path.
#[derive(Debug, Clone, Deserialize)]
pub struct ServersFile {
    #[serde(rename = "mcpServers", default)]
    pub servers: HashMap<String, ServerSpec>,
}

/// How to launch one MCP server
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<String>,
}

impl ServersFile {
    pub fn load(path: &Path) -> Result<Self, McpError> {
        let content = std::fs::read_to_string(path).map_err(|source| McpError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| McpError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_playwright_style_config() {
        let config: ServersFile = serde_json::from_str(
            r#"{
                "mcpServers": {
                    "playwright": {
                        "command": "npx",
                        "args": ["@playwright/mcp@latest"],
                        "env": { "DISPLAY": ":1" }
                    }
                }
            }"#,
        )
        .unwrap();

        let spec = &config.servers["playwright"];
        assert_eq!(spec.command, "npx");
        assert_eq!(spec.args, vec!["@playwright/mcp@latest"]);
        assert_eq!(spec.env["DISPLAY"], ":1");
        assert!(spec.cwd.is_none());
    }

    #[test]
    fn empty_document_means_no_servers() {
        let config: ServersFile = serde_json::from_str("{}").unwrap();
        assert!(config.servers.is_empty());
    }
}
