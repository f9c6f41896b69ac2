//! CLI entry point for the swarmctl coordinator.
//!
//! Provides the `swarmctl` command: `serve` binds the coordinator,
//! worker, and observer MCP endpoints over HTTP; `mcp-config` prints the
//! `--mcp-config`-style fragment an LLM CLI needs to talk to one of them.
//! CLI ergonomics are intentionally thin -- this binary exists to wire the
//! library crates together, not to be a product surface in its own right.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use swarmctl_core::{CoordinatorState, NoopExecutor, NoopLlmDriver, QueueManager};
use swarmctl_kernel::{Deduplicator, MessageLog};
use swarmctl_mcp::{build_coordinator_server, build_observer_server, build_worker_server, http_router, mcp_config, ServerInfo};
use swarmctl_pool::WorkerPool;

#[derive(Parser)]
#[command(name = "swarmctl", version, about = "Coordinator for LLM-worker swarms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind the coordinator, observer, and per-worker MCP endpoints over HTTP.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 8787)]
        port: u16,
        /// Pre-register a worker, as `id` or `id=session_id`.
        #[arg(long = "worker")]
        workers: Vec<String>,
    },
    /// Print an `--mcp-config` fragment for one of the supported LLM CLI shapes.
    McpConfig {
        /// One of: generic, streamable-http, flat, toml, remote.
        #[arg(long, default_value = "generic")]
        variant: String,
        #[arg(long, default_value = "swarmctl")]
        name: String,
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 8787)]
        port: u16,
        /// Render a worker URL instead of the coordinator's.
        #[arg(long)]
        worker: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { bind, port, workers } => cmd_serve(bind, port, workers).await,
        Commands::McpConfig {
            variant,
            name,
            bind,
            port,
            worker,
        } => cmd_mcp_config(variant, name, bind, port, worker),
    }
}

fn parse_worker_spec(spec: &str) -> (String, Option<String>) {
    match spec.split_once('=') {
        Some((id, session)) => (id.to_string(), Some(session.to_string())),
        None => (spec.to_string(), None),
    }
}

async fn cmd_serve(bind: String, port: u16, workers: Vec<String>) -> Result<()> {
    init_tracing();
    info!(bind, port, "starting swarmctl coordinator");

    let pool = WorkerPool::new();
    let llm = Arc::new(NoopLlmDriver);
    let queue_manager = QueueManager::new(pool.clone(), llm.clone());
    queue_manager.attach_to_pool().await;
    let message_log = Arc::new(MessageLog::new());
    let state = CoordinatorState::new(
        pool.clone(),
        queue_manager,
        message_log,
        Arc::new(NoopExecutor),
        llm,
    );

    for spec in &workers {
        let (id, session_id) = parse_worker_spec(spec);
        pool.register(id.clone(), session_id)
            .with_context(|| format!("failed to register worker {id}"))?;
        info!(worker_id = %id, "worker pre-registered");
    }

    let dedup = Arc::new(Deduplicator::default());

    let coordinator = Arc::new(build_coordinator_server(
        Arc::clone(&state),
        ServerInfo {
            name: "swarmctl-coordinator".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            instructions: Some("Coordinator tools for assigning and tracking swarm tasks.".into()),
        },
    ));
    let observer = Arc::new(build_observer_server(
        Arc::clone(&state),
        ServerInfo {
            name: "swarmctl-observer".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            instructions: Some("Read-only view of the swarm message bus.".into()),
        },
    ));

    let mut app = http_router("/mcp", coordinator).merge(http_router("/observer", observer));

    for record in pool.all_workers().await {
        let worker_server = Arc::new(build_worker_server(
            Arc::clone(&state),
            Arc::clone(&dedup),
            record.id.clone(),
            ServerInfo {
                name: format!("swarmctl-worker-{}", record.id),
                version: env!("CARGO_PKG_VERSION").into(),
                instructions: Some("Worker tools for reporting task progress.".into()),
            },
        ));
        let path = format!("/worker/{}", record.id);
        app = app.merge(http_router(&path, worker_server));
        info!(worker_id = %record.id, path, "worker endpoint mounted");
    }

    println!();
    println!("  swarmctl v{}", env!("CARGO_PKG_VERSION"));
    println!("  Coordinator MCP: http://{bind}:{port}/mcp");
    println!("  Observer MCP:    http://{bind}:{port}/observer");
    for record in pool.all_workers().await {
        println!("  Worker MCP:      http://{bind}:{port}/worker/{}", record.id);
    }
    println!();

    let listener = tokio::net::TcpListener::bind((bind.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    axum::serve(listener, app)
        .await
        .context("swarmctl server exited with an error")?;

    Ok(())
}

fn cmd_mcp_config(variant: String, name: String, bind: String, port: u16, worker: Option<String>) -> Result<()> {
    let worker_id = worker.as_deref();
    let output = match variant.as_str() {
        "generic" => serde_json::to_string_pretty(&mcp_config::generic(&name, &bind, port, worker_id))?,
        "streamable-http" => {
            serde_json::to_string_pretty(&mcp_config::streamable_http(&name, &bind, port, worker_id))?
        }
        "flat" => serde_json::to_string_pretty(&mcp_config::flat(&name, &bind, port, worker_id))?,
        "remote" => serde_json::to_string_pretty(&mcp_config::remote(&name, &bind, port, worker_id))?,
        "toml" => mcp_config::toml_fragment(&name, &bind, port, worker_id),
        other => anyhow::bail!("unknown --variant `{other}` (expected one of: generic, streamable-http, flat, toml, remote)"),
    };
    println!("{output}");
    Ok(())
}
