mod api;
mod config;
mod range;
mod scan;
mod state;
mod streaming;
mod upload;
mod utils;
mod watch;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use api::api_router;
use config::{
    config_path_from_env, load_or_create_config, resolve_music_root, resolve_staging_dir,
};
use library::Library;
use parking_lot::RwLock;
use scan::start_index;
use state::AppState;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (mut config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }
    config.apply_env_overrides(|key| std::env::var(key).ok());

    let music_root = resolve_music_root(&config_path, &config);
    let staging_dir = resolve_staging_dir(&music_root, &config);
    std::fs::create_dir_all(&music_root)?;
    info!(
        "Music root {} (staging {})",
        music_root.display(),
        staging_dir.display()
    );

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let body_limit = config.max_upload_bytes;
    let state = AppState {
        library: Library::new(music_root, staging_dir),
        config: Arc::new(config),
        watcher: Arc::new(RwLock::new(None)),
    };
    match state.library.staging().purge().await {
        Ok(0) => {}
        Ok(count) => info!("Removed {} stale staged uploads", count),
        Err(err) => warn!("Failed to clear staging area: {}", err),
    }
    start_index(state.clone());

    let covers = Router::new()
        .route("/covers/:album_id/:file_name", get(api::albums::get_cover))
        .with_state(state.clone());
    let app = Router::new()
        .nest("/api", api_router(state.clone()))
        .merge(covers)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
