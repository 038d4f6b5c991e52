use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[allow(dead_code)]
pub struct LogGuard(tracing_appender::non_blocking::WorkerGuard);

/// Initialize debug logging.
///
/// When `debug` is enabled, each process invocation writes to its own
/// session log under the config directory (default
/// `~/.config/mcpchat/mcpchat-debug.log.session-<ts>`). When `debug` is
/// disabled, this is a no-op. Stdout is reserved for the chat surface, so
/// diagnostics only ever go to the file.
pub fn init(settings: &crate::config::Settings) -> Result<Option<LogGuard>> {
    if !settings.debug {
        return Ok(None);
    }

    let base = resolve_base_log_path(settings.debug_log_path.as_deref())?;
    let (dir, base_name) = split_dir_and_name(&base)?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    // Clean up before opening the new writer to keep the directory tidy.
    cleanup_session_logs(&dir, &base_name, settings.debug_log_keep)?;

    let session_path = build_session_log_path(&dir, &base_name);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&session_path)
        .with_context(|| format!("Failed to open log file: {}", session_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // Default: debug our crate, warn for everything else.
    let filter =
        EnvFilter::try_new("mcpchat=debug,warn").unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_writer(non_blocking)
        .try_init()
        .ok(); // If already initialized (e.g., in tests), don't crash.

    tracing::info!(log_file = %session_path.display(), "debug logging enabled");

    Ok(Some(LogGuard(guard)))
}

fn default_log_path() -> Result<PathBuf> {
    let config_path = crate::config::config_path()?;
    Ok(config_path.with_file_name("mcpchat-debug.log"))
}

fn resolve_base_log_path(config_value: Option<&str>) -> Result<PathBuf> {
    let Some(raw) = config_value else {
        return default_log_path();
    };

    let path = PathBuf::from(crate::config::expand_tilde(raw));

    // A trailing separator or an existing directory means "put the default
    // file name in there".
    if raw.ends_with(std::path::MAIN_SEPARATOR) || path.is_dir() {
        return Ok(path.join("mcpchat-debug.log"));
    }

    Ok(path)
}

fn split_dir_and_name(path: &Path) -> Result<(PathBuf, String)> {
    let dir = path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .context("Invalid debug_log_path: not valid UTF-8")?
        .to_string();
    Ok((dir, name))
}

fn build_session_log_path(dir: &Path, base_name: &str) -> PathBuf {
    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    dir.join(format!("{base_name}.session-{ts}"))
}

fn cleanup_session_logs(dir: &Path, base_name: &str, keep: Option<usize>) -> Result<()> {
    let keep = keep.unwrap_or(20);
    if keep == 0 {
        return Ok(());
    }

    let prefix = format!("{base_name}.session-");
    let mut candidates: Vec<String> = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read log directory: {}", dir.display()))?
    {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else { continue };
        if name.starts_with(&prefix) {
            candidates.push(name.to_string());
        }
    }

    candidates.sort();
    candidates.reverse(); // newest first (timestamp suffix sorts lexicographically)

    for name in candidates.iter().skip(keep) {
        let path = dir.join(name);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::debug!(error = %e, file = %path.display(), "failed to remove old log file");
        }
    }

    Ok(())
}

/// Best-effort redaction for API-key-shaped substrings (`gsk_...`, `sk-...`)
/// before error text is written to the log.
pub fn redact_secrets(input: &str) -> String {
    const PREFIXES: [&str; 2] = ["gsk_", "sk-"];

    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut last = 0usize;
    let mut i = 0usize;

    'outer: while i < input.len() {
        for prefix in PREFIXES {
            if input[i..].starts_with(prefix) && i + prefix.len() < input.len() {
                let mut j = i + prefix.len();
                while j < input.len() {
                    match bytes[j] {
                        b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => j += 1,
                        _ => break,
                    }
                }

                // Require a minimum tail length to reduce false positives.
                if j.saturating_sub(i + prefix.len()) >= 8 {
                    out.push_str(&input[last..i]);
                    out.push_str(prefix);
                    out.push_str("***REDACTED***");
                    last = j;
                    i = j;
                    continue 'outer;
                }
            }
        }

        let ch = input[i..].chars().next().unwrap();
        i += ch.len_utf8();
    }

    out.push_str(&input[last..]);
    out
}
