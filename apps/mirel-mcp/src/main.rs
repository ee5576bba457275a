//! # Mirel MCP Server
//!
//! Model Context Protocol bridge: speaks MCP over stdio to an AI client
//! and forwards every tool call to a running mirel HTTP server.
//!
//! Configured entirely through the environment:
//! - `MIREL_URL`: where the HTTP API lives (default `http://localhost:8080`)
//! - `MIREL_API_KEY`: optional bearer token forwarded to the API
//!
//! Log verbosity follows `RUST_LOG` (default `mirel_mcp=info`).

mod client;
mod server;

use client::MirelClient;
use rmcp::{ServiceExt, transport::stdio};
use server::MirelMcp;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP stdio transport, so logs go to stderr.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mirel_mcp=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let url = std::env::var("MIREL_URL").unwrap_or_else(|_| "http://localhost:8080".into());
    let api_key = std::env::var("MIREL_API_KEY").ok();

    let auth = if api_key.is_some() { "bearer" } else { "none" };
    tracing::info!("Mirel MCP bridge starting, target: {url} (auth: {auth})");

    let client = MirelClient::new(url, api_key);
    let mcp = MirelMcp::new(client);

    let service = mcp.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("stdio transport failed: {e:?}");
    })?;

    service.waiting().await?;
    Ok(())
}
