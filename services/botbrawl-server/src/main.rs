//! BotBrawl Server
//!
//! Serves the HTTP API and drives the battle lifecycle in the background:
//! the scheduler tick (matchmaking expiry, phase transitions, settlement)
//! and the generation worker (responses, verdicts, recaps) run on their own
//! intervals until shutdown.
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings (scripted completions, port 3000)
//! botbrawl-server
//!
//! # Start with custom config
//! botbrawl-server --config /path/to/config.toml
//!
//! # Start with environment overrides
//! BOTBRAWL__SERVER__PORT=8080 BOTBRAWL__LLM__PROVIDER=openai_compat botbrawl-server
//! ```

mod config;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use botbrawl_api::{create_router, AppState};
use botbrawl_llm::{OpenAiCompatProvider, ScriptedProvider, SharedProvider};
use botbrawl_matchmaking::InMemoryAgentDirectory;
use botbrawl_orchestrator::{BrawlEngine, Collaborators, InMemoryAuthenticator, RateLimiter};
use botbrawl_types::OwnerId;

use crate::config::{LlmSettings, LoggingConfig, ProviderKind, ServerConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// BotBrawl Server - AI agent battle arena
#[derive(Parser, Debug)]
#[command(name = "botbrawl-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "BOTBRAWL_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "BOTBRAWL_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "BOTBRAWL_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BOTBRAWL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "BOTBRAWL_LOG_FORMAT")]
    log_format: Option<String>,

    /// Completion backend (scripted, openai_compat)
    #[arg(long, env = "BOTBRAWL_LLM_PROVIDER", value_parser = parse_provider)]
    llm_provider: Option<ProviderKind>,
}

fn parse_provider(raw: &str) -> Result<ProviderKind, String> {
    match raw {
        "scripted" => Ok(ProviderKind::Scripted),
        "openai_compat" | "openai-compat" => Ok(ProviderKind::OpenaiCompat),
        other => Err(format!("unknown provider {other:?}")),
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;

    // Flags win over files and environment
    if let Some(host) = args.host {
        server_config.server.host = host;
    }
    if let Some(port) = args.port {
        server_config.server.port = port;
    }
    if let Some(level) = args.log_level {
        server_config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        server_config.logging.format = format;
    }
    if let Some(provider) = args.llm_provider {
        server_config.llm.provider = provider;
    }

    server_config.validate()?;
    init_logging(&server_config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting BotBrawl server");

    let directory = Arc::new(InMemoryAgentDirectory::new());
    let provider = init_provider(&server_config.llm)?;
    let collaborators = Collaborators::offline(directory.clone()).with_provider(provider);
    let engine = Arc::new(BrawlEngine::new(server_config.brawl.clone(), collaborators));

    let auth = Arc::new(InMemoryAuthenticator::new());
    seed_accounts(&server_config, &engine, &auth, &directory).await?;

    let rate_limiter = RateLimiter::new(server_config.rate_limit.clone());
    let state = Arc::new(AppState::new(engine.clone(), auth, rate_limiter.clone()));
    let app = create_router(state, server_config.api.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = &server_config.brawl.scheduler;
    let loops = vec![
        spawn_periodic("scheduler", scheduler.tick_interval(), shutdown_rx.clone(), {
            let engine = engine.clone();
            move || {
                let engine = engine.clone();
                async move {
                    engine.run_tick().await;
                }
            }
        }),
        spawn_periodic("worker", scheduler.worker_interval(), shutdown_rx.clone(), {
            let engine = engine.clone();
            move || {
                let engine = engine.clone();
                async move {
                    let report = engine.run_worker().await;
                    if report.completed + report.retried + report.failed > 0 {
                        debug!(
                            completed = report.completed,
                            retried = report.retried,
                            failed = report.failed,
                            "Generation jobs drained"
                        );
                    }
                }
            }
        }),
        spawn_periodic(
            "rate-limit-cleanup",
            server_config.rate_limit.window(),
            shutdown_rx,
            move || {
                let limiter = rate_limiter.clone();
                async move { limiter.cleanup().await }
            },
        ),
    ];

    let addr = server_config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    let grace = server_config.server.shutdown_timeout();
    if tokio::time::timeout(grace, join_loops(loops)).await.is_err() {
        warn!(timeout_secs = grace.as_secs(), "Background loops did not stop in time");
    }

    info!("Server shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => subscriber.with(fmt::layer().json().with_target(true)).try_init()?,
        _ => subscriber.with(fmt::layer().pretty().with_target(true)).try_init()?,
    }

    Ok(())
}

/// Build the completion backend named in the config
fn init_provider(config: &LlmSettings) -> anyhow::Result<SharedProvider> {
    let provider: SharedProvider = match config.provider {
        ProviderKind::Scripted => Arc::new(ScriptedProvider::new(config.scripted_reply.clone())),
        ProviderKind::OpenaiCompat => {
            if config.openai_compat.api_key.is_none() {
                warn!(base_url = %config.openai_compat.base_url, "No API key set for the completion endpoint");
            }
            Arc::new(OpenAiCompatProvider::new(config.openai_compat.clone())?)
        }
    };
    info!(provider = provider.name(), "Completion provider ready");
    Ok(provider)
}

/// Register configured tokens, fund their accounts, and create their agents
async fn seed_accounts(
    config: &ServerConfig,
    engine: &BrawlEngine,
    auth: &InMemoryAuthenticator,
    directory: &InMemoryAgentDirectory,
) -> anyhow::Result<()> {
    if config.accounts.is_empty() {
        warn!("No accounts configured; authenticated routes will reject every token");
    }

    for seed in &config.accounts {
        let owner_id = seed.owner_id.unwrap_or_else(OwnerId::new);
        auth.insert(seed.token.clone(), owner_id, seed.admin);

        if seed.starting_balance > 0 {
            engine.deposit(&owner_id, seed.starting_balance).await?;
        }

        for name in &seed.agents {
            let profile = directory.register(owner_id, name.clone());
            info!(
                owner_id = %owner_id,
                agent_id = %profile.agent_id,
                display_name = %profile.display_name,
                "Agent registered"
            );
        }

        info!(
            owner_id = %owner_id,
            admin = seed.admin,
            starting_balance = seed.starting_balance,
            "Account seeded"
        );
    }

    Ok(())
}

// =============================================================================
// Background Loops
// =============================================================================

/// Run `task` every `period` until the shutdown channel flips
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut task: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(task = name, period_secs = period.as_secs(), "Background loop started");

        loop {
            tokio::select! {
                _ = interval.tick() => task().await,
                _ = shutdown.changed() => break,
            }
        }

        info!(task = name, "Background loop stopped");
    })
}

async fn join_loops(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(err) = handle.await {
            error!(error = %err, "Background loop panicked");
        }
    }
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for Ctrl+C or SIGTERM, then tell the background loops to stop
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }

    let _ = shutdown_tx.send(true);
}

// =============================================================================
// Tests
// =============================================================================
