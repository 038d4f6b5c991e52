use crate::agent::{ChatAgent, McpAgent};
use crate::config;
use crate::llm::groq::{GroqClient, ModelConfig};
use crate::mcp::McpClient;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Run the chat: construct everything, drive the loop, close the sessions.
///
/// Startup failures (missing credential, missing/invalid servers file,
/// unreachable server) propagate out of here and terminate the process;
/// only per-turn failures are handled inside the loop.
pub async fn run() -> Result<()> {
    // A .env file next to the process may supply the credential.
    dotenvy::dotenv().ok();

    let api_key = config::api_key_from_env()?;
    let settings = config::load_or_create_settings()?;
    let _log_guard = crate::logging::init(&settings)?;

    println!("Initializing chat");

    let servers_path = config::servers_file_path(&settings)?;
    let client = Arc::new(
        McpClient::from_config_file(&servers_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to start MCP servers from {}",
                    servers_path.display()
                )
            })?,
    );

    let llm_client = GroqClient::new(ModelConfig {
        api_key,
        api_base: settings.api_base.clone(),
        model: settings.model.clone(),
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    });

    let agent = McpAgent::new(
        llm_client,
        client.clone(),
        settings.max_steps,
        settings.memory_enabled,
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let loop_result = run_loop(&agent, stdin, stdout).await;

    // Sessions are closed before the loop result propagates, so cleanup
    // runs on the error path as well.
    if client.has_sessions().await {
        client.close_all_sessions().await;
    }

    loop_result
}

enum Command<'a> {
    Quit,
    Clear,
    Turn(&'a str),
}

/// Control commands are matched on the trimmed, lowercased input; everything
/// else is forwarded to the agent verbatim.
fn classify(raw: &str) -> Command<'_> {
    match raw.trim().to_lowercase().as_str() {
        "exit" | "quit" | "bye" => Command::Quit,
        "clear" => Command::Clear,
        _ => Command::Turn(raw),
    }
}

/// The request/response loop, generic over its agent and streams so the
/// observable contract is testable without a terminal or network.
pub async fn run_loop<A, R, W>(agent: &A, mut input: R, mut output: W) -> Result<()>
where
    A: ChatAgent,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        output.write_all(b"Enter your message: ").await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            // End of input behaves like an exit command.
            output.write_all(b"Exiting chat\n").await?;
            output.flush().await?;
            return Ok(());
        }
        let text = line.trim_end_matches(['\r', '\n']);

        match classify(text) {
            Command::Quit => {
                output.write_all(b"Exiting chat\n").await?;
                output.flush().await?;
                return Ok(());
            }
            Command::Clear => {
                agent.clear_history().await;
                output.write_all(b"Conversation history cleared\n").await?;
                output.flush().await?;
            }
            Command::Turn(text) => {
                output.write_all(b"chatbot:").await?;
                output.flush().await?;

                match agent.run(text).await {
                    Ok(result) => {
                        output
                            .write_all(format!("\nResult: {result}\n").as_bytes())
                            .await?;
                    }
                    Err(e) if e.recoverable() => {
                        tracing::warn!(error = %e, "turn failed");
                        output
                            .write_all(format!("Error: {e}\n").as_bytes())
                            .await?;
                    }
                    Err(e) => return Err(e.into()),
                }
                output.flush().await?;
            }
        }
    }
}
