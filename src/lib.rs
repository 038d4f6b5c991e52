//! mcpchat library
//!
//! Exposes the configuration, MCP client, LLM, and agent layers for testing
//! and potential reuse.

pub mod agent;
pub mod config;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod repl;
