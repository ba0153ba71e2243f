use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use server::{open_app, reader_config};
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Metadata file of the final index generation
    #[arg(long)]
    metadata: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// JSON index config; only `cache_capacity` is read here
    #[arg(long)]
    config: Option<PathBuf>,
    /// Term vectors kept in the LRU cache (overrides the config file)
    #[arg(long)]
    cache_capacity: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let metadata = args.metadata.clone();
    let cache_capacity = reader_config(args.config.as_deref(), args.cache_capacity)?.cache_capacity();
    // opening scans the whole vocabulary once
    let app: Router = tokio::task::spawn_blocking(move || open_app(&metadata, cache_capacity)).await??;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
