use anyhow::Result;

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    mcpchat::repl::run().await
}
