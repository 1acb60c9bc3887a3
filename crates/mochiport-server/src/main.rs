mod config;
mod sweeper;

use std::sync::Arc;

use tracing::{info, warn};

use mochiport_api::ai::{AiService, AzureOpenAiService, MockAiService};
use mochiport_api::{AppStateInner, build_router};
use mochiport_db::{Database, MemoryStore, Store};
use mochiport_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mochiport=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Persistence
    let store: Arc<dyn Store> = if config.use_mock_database {
        info!("Using in-memory store, data will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(Database::open(&config.database_path)?)
    };

    // AI back end
    let ai: Arc<dyn AiService> = match &config.azure {
        Some(azure) if !config.use_mock_ai => {
            info!("Using Azure OpenAI deployment {}", azure.deployment);
            Arc::new(AzureOpenAiService::new(azure.clone())?)
        }
        _ => {
            if !config.use_mock_ai {
                warn!("Azure OpenAI is not fully configured, falling back to the mock AI service");
            }
            Arc::new(MockAiService)
        }
    };

    if config.jwt_secret.is_none() {
        warn!("JWT_SECRET is not set, API authentication is disabled");
    }

    let state = AppStateInner::new(
        store,
        ai,
        Dispatcher::new(),
        config.jwt_secret.clone(),
        config.system_prompt.clone(),
    );

    if let Some(period) = config.sweep_interval {
        tokio::spawn(sweeper::run_sweep_loop(state.reminders.clone(), period));
        info!("Overdue sweep every {}s", period.as_secs());
    }

    let app = build_router(state, config.cors_layer()?);

    let addr = config.bind_addr()?;
    info!("Mochiport server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
