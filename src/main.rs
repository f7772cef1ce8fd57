//! SmartStocks PvP binary entrypoint wiring REST, WebSocket and background tasks.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smartstocks_pvp::{
    config::AppConfig,
    dao::stats_store::InMemoryStatsStore,
    routes,
    services::{
        queue_sweeper,
        scenario_provider::{ScenarioProvider, StaticScenarioProvider},
    },
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(
        config,
        scenario_provider(),
        Arc::new(InMemoryStatsStore::new()),
    );

    tokio::spawn(queue_sweeper::run(app_state.clone()));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the scenario source: generated scenarios when configured, the static bank otherwise.
fn scenario_provider() -> Arc<dyn ScenarioProvider> {
    #[cfg(feature = "ai-scenarios")]
    {
        use smartstocks_pvp::services::scenario_provider::{
            FallbackScenarioProvider, OpenAiScenarioProvider,
        };

        const GENERATION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

        if let Some(generator) = OpenAiScenarioProvider::from_env() {
            info!("generated scenarios enabled; static bank kept as fallback");
            return Arc::new(FallbackScenarioProvider::new(
                Arc::new(generator),
                GENERATION_TIMEOUT,
            ));
        }
    }

    info!("serving scenarios from the static bank");
    Arc::new(StaticScenarioProvider::default())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
