use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use seed_agents::{Agent, ChatAgent, FakeLlmClient, LlmClient};
use seed_domain::Config;
use seed_kernel::{AgentRegistry, Kernel, KernelConfig};
use seed_server::cli::{Cli, Command};
use seed_server::routes;
use seed_server::state::AppState;
use seed_tools::builtin::{ReadFileTool, ShellExecTool};
use seed_tools::ToolRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _path) = seed_server::cli::load_config()?;
            run_server(config).await
        }
        Some(Command::CheckConfig) => {
            let (_config, path) = seed_server::cli::load_config()?;
            println!("{path}: ok");
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,seed_server=debug")))
        .json()
        .init();
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("seed starting");

    std::fs::create_dir_all(&config.storage.data_dir)
        .with_context(|| format!("creating data dir {}", config.storage.data_dir.display()))?;

    // ── Tools ────────────────────────────────────────────────────────
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(ReadFileTool));
    tools.register(Arc::new(ShellExecTool));
    let tools = Arc::new(tools);
    tracing::info!(count = tools.len(), "tool registry ready");

    // ── Agents ───────────────────────────────────────────────────────
    let mut agents = AgentRegistry::new();
    let chat_agent = Arc::new(ChatAgent::new("agent_seed_chat"));
    tracing::info!(agent_id = chat_agent.id(), "chat agent registered");
    agents.register(chat_agent);
    let agents = Arc::new(agents);

    // ── LLM profiles ─────────────────────────────────────────────────
    // No real HTTP provider is wired up yet — `FakeLlmClient` is the only
    // "default" profile available until a concrete `LlmClient` adapter
    // exists. Swapping it for a real provider does not change anything
    // above or below this block.
    let mut llm_profiles: HashMap<String, Arc<dyn LlmClient>> = HashMap::new();
    llm_profiles.insert("default".into(), Arc::new(FakeLlmClient::with_text("(no LLM provider configured)")));
    tracing::warn!("no real LLM provider wired up; running with FakeLlmClient only");

    // ── Kernel ───────────────────────────────────────────────────────
    let kernel_config = KernelConfig {
        work_dir: config.storage.data_dir.join("work"),
        max_tool_loops: config.kernel.max_tool_loops,
        default_streaming: config.kernel.streaming_enabled,
        projection_checkpoint_interval: config.storage.projection_checkpoint_interval,
    };
    let kernel = Arc::new(
        Kernel::open(&config.storage.data_dir, tools, agents, llm_profiles, kernel_config).context("opening kernel")?,
    );
    let (_router, _projector) = kernel.start();
    tracing::info!(data_dir = %config.storage.data_dir.display(), "kernel ready");

    // ── Periodic housekeeping (task count, for operators tailing logs) ──
    {
        let kernel = Arc::clone(&kernel);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                tracing::info!(tasks = kernel.list_tasks().len(), "housekeeping tick");
            }
        });
    }

    let state = AppState::new(kernel, config.server.bearer_token_hash.clone());
    if state.bearer_token_hash.is_some() {
        tracing::info!("bearer-token auth enabled");
    } else {
        tracing::warn!("bearer-token auth DISABLED — set server.bearer_token_hash to enable");
    }

    let max_concurrent = std::env::var("SEED_MAX_CONCURRENT_REQUESTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);

    let app = routes::router(state.clone())
        .layer(CorsLayer::permissive())
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent))
        .with_state(state);

    let addr = &config.server.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "seed listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("axum server error")?;

    Ok(())
}
