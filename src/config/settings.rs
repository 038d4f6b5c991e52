use serde::{Deserialize, Serialize};

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Model identifier sent to the Groq API
    #[serde(default = "default_model")]
    pub model: String,

    /// Optional custom API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Maximum tokens to generate per completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum model/tool rounds per user turn
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Whether conversation history is retained across turns
    #[serde(default = "default_memory_enabled")]
    pub memory_enabled: bool,

    /// Path to the MCP servers file (defaults to browser_mcp.json next to
    /// the executable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers_file: Option<String>,

    /// Enable debug logging to a file
    #[serde(default)]
    pub debug: bool,

    /// Override for the debug log path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_log_path: Option<String>,

    /// How many old session logs to keep
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_log_keep: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: None,
            max_tokens: None,
            temperature: None,
            max_steps: default_max_steps(),
            memory_enabled: default_memory_enabled(),
            servers_file: None,
            debug: false,
            debug_log_path: None,
            debug_log_keep: None,
        }
    }
}

fn default_model() -> String {
    "qwen/qwen3-32b".to_string()
}

fn default_max_steps() -> usize {
    15
}

fn default_memory_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_chat_profile() {
        let settings = Settings::default();
        assert_eq!(settings.model, "qwen/qwen3-32b");
        assert_eq!(settings.max_steps, 15);
        assert!(settings.memory_enabled);
        assert!(!settings.debug);
    }

    #[test]
    fn empty_toml_fills_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.max_steps, 15);
        assert!(settings.memory_enabled);
        assert!(settings.servers_file.is_none());
    }

    #[test]
    fn partial_toml_keeps_overrides() {
        let settings: Settings = toml::from_str(
            r#"
            model = "llama3-8b-8192"
            max_steps = 5
            memory_enabled = false
            servers_file = "~/browser_mcp.json"
            "#,
        )
        .unwrap();
        assert_eq!(settings.model, "llama3-8b-8192");
        assert_eq!(settings.max_steps, 5);
        assert!(!settings.memory_enabled);
        assert_eq!(settings.servers_file.as_deref(), Some("~/browser_mcp.json"));
    }
}
