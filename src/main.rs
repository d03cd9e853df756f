//! Picky MCP Server
//!
//! Personalized restaurant recommendations backed by a Notion database and
//! Google Maps place data.
//!
//! Run with no args to serve MCP over stdio, or via your MCP client config.

use anyhow::Result;
use picky_mcp::{config::Settings, manager::RestaurantManager, mcp, server, sync};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the MCP protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "picky_mcp=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--tools" => {
                // Output MCP tool definitions as JSON
                println!("{}", serde_json::to_string_pretty(&mcp::get_tools())?);
                return Ok(());
            }
            "--resources" => {
                println!("{}", serde_json::to_string_pretty(&mcp::get_resources())?);
                return Ok(());
            }
            "--status" => {
                let settings = Settings::from_env()?;
                let manager = RestaurantManager::new(settings)?;
                let status = manager.status().await;
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(());
            }
            "--sync" => {
                let settings = Settings::from_env()?;
                let manager = RestaurantManager::new(settings)?;
                let summary = sync::manual_sync(&manager).await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {other}");
                eprintln!("Usage: picky [--tools | --resources | --status | --sync]");
                std::process::exit(2);
            }
        }
    }

    // SERVER MODE: stdio MCP with background enrichment
    let settings = Settings::from_env()?;
    let sync_interval = settings.sync_interval_secs;
    let manager = Arc::new(RestaurantManager::new(settings)?);

    if sync_interval > 0 {
        tokio::spawn(sync::run_periodic(Arc::clone(&manager), sync_interval));
    }

    server::run(manager).await
}
