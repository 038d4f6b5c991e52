pub mod settings;

pub use settings::Settings;

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Name of the environment variable holding the Groq API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Failed to get config directory")?
        .join("mcpchat");

    // Create config directory if it doesn't exist
    fs::create_dir_all(&config_dir)
        .context("Failed to create config directory")?;

    Ok(config_dir.join("config.toml"))
}

/// Load settings from file, or create defaults if not exists
pub fn load_or_create_settings() -> Result<Settings> {
    let path = config_path()?;

    if path.exists() {
        let content = fs::read_to_string(&path)
            .context("Failed to read config file")?;
        let settings: Settings = toml::from_str(&content)
            .context("Failed to parse config file")?;
        Ok(settings)
    } else {
        let settings = Settings::default();
        save_settings(&settings)?;

        println!("Created default config at: {}", path.display());

        Ok(settings)
    }
}

/// Save settings to file
pub fn save_settings(settings: &Settings) -> Result<()> {
    let path = config_path()?;
    let content = toml::to_string_pretty(settings)
        .context("Failed to serialize config")?;
    fs::write(&path, content)
        .context("Failed to write config file")?;
    Ok(())
}

/// Read the Groq API key from the environment.
///
/// The key is returned as a value and handed to the model client explicitly;
/// the process environment is never written back.
pub fn api_key_from_env() -> Result<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => anyhow::bail!(
            "Missing credential: set the {} environment variable to your Groq API key",
            API_KEY_ENV
        ),
    }
}

/// Resolve the MCP servers file path.
///
/// Defaults to `browser_mcp.json` next to the executable; the settings file
/// can point somewhere else.
pub fn servers_file_path(settings: &Settings) -> Result<PathBuf> {
    if let Some(raw) = settings.servers_file.as_deref() {
        return Ok(PathBuf::from(expand_tilde(raw)));
    }

    let exe = std::env::current_exe().context("Failed to locate executable")?;
    let dir = exe
        .parent()
        .context("Executable has no parent directory")?;
    Ok(dir.join("browser_mcp.json"))
}

pub(crate) fn expand_tilde(raw: &str) -> String {
    if raw == "~" || raw.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let suffix = raw.strip_prefix('~').unwrap_or("");
            return format!("{}{}", home.display(), suffix);
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_descriptive_error() {
        // Use a scoped fake name so the test never depends on the real env.
        let err = match std::env::var(API_KEY_ENV) {
            Err(_) => api_key_from_env().unwrap_err(),
            Ok(_) => return, // key present in this environment, nothing to assert
        };
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn tilde_expansion_leaves_plain_paths_alone() {
        assert_eq!(expand_tilde("/tmp/x.json"), "/tmp/x.json");
        assert_eq!(expand_tilde("relative/x.json"), "relative/x.json");
    }
}
