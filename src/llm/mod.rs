pub mod groq;
pub mod types;

/// LLM client errors.
///
/// Recoverability drives the REPL's per-turn error boundary: transient
/// failures are reported and the chat continues, misconfiguration surfaced
/// by the endpoint propagates and ends the process.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Bad request ({status}): {message}")]
    BadRequest { status: u16, message: String },

    #[error("Rate limit exceeded ({status}): {message}")]
    RateLimited { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("API request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Stream(String),
}

impl LlmError {
    /// Whether the chat loop may continue after this error.
    pub fn recoverable(&self) -> bool {
        !matches!(
            self,
            LlmError::Unauthorized { .. } | LlmError::BadRequest { .. }
        )
    }
}
