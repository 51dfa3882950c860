//! Keyward reference license authority
//!
//! Serves licenses from memory over the `/api/v1/licenses` HTTP API, for
//! local development and end-to-end testing of the validator and the
//! registry. Nothing is persisted: a restart forgets every license.
//!
//! Usage:
//!   keyward-authority --port 8787 --api-key secret

use anyhow::{Context, Result};
use clap::Parser;
use keyward_authority::InMemoryAuthority;
use keyward_authority_server::build_router;
use keyward_types::SystemClock;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "keyward-authority")]
#[command(about = "Keyward reference license authority")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8787")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Require this bearer key on every request
    #[arg(long)]
    api_key: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let authority = Arc::new(InMemoryAuthority::new(Arc::new(SystemClock)));
    let app = build_router(authority, args.api_key.clone());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    println!("\n========================================");
    println!("  Keyward Authority Running");
    println!("========================================");
    println!("  Listening: http://{addr}");
    println!("  API key:   {}", if args.api_key.is_some() { "required" } else { "none" });
    println!("  Storage:   in-memory");
    println!("========================================\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Keyward authority stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
