//! ImaginArena binary entrypoint wiring REST, SSE and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imaginarena_back::{
    config::AppConfig,
    dao::{blob::FsBlobStore, storage::StorageError, store::TournamentStore},
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let uploads_dir = config.uploads_dir().to_path_buf();
    let uploads_base_url = config.uploads_base_url().to_owned();
    let blob = Arc::new(FsBlobStore::new(
        uploads_dir.clone(),
        uploads_base_url.clone(),
    ));

    let app_state = AppState::new(config, blob);
    spawn_storage_supervisor(app_state.clone()).await?;

    let app = build_router(app_state, &uploads_base_url, uploads_dir);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the storage supervisor for the backend selected by the
/// `STORAGE_BACKEND` environment variable.
async fn spawn_storage_supervisor(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| default_backend().to_owned());

    match backend.as_str() {
        #[cfg(feature = "memory-store")]
        "memory" => {
            use imaginarena_back::dao::store::memory::MemoryTournamentStore;

            info!("using in-memory storage backend");
            tokio::spawn(storage_supervisor::run(state, || async {
                Ok::<Arc<dyn TournamentStore>, StorageError>(Arc::new(
                    MemoryTournamentStore::new(),
                ))
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use imaginarena_back::dao::store::mongodb::{MongoConfig, MongoTournamentStore};

            let mongo_config = MongoConfig::from_env()
                .await
                .context("loading MongoDB configuration")?;
            info!("using MongoDB storage backend");
            tokio::spawn(storage_supervisor::run(state, move || {
                let config = mongo_config.clone();
                async move {
                    let store = MongoTournamentStore::connect(config).await?;
                    Ok(Arc::new(store) as Arc<dyn TournamentStore>)
                }
            }));
        }
        other => anyhow::bail!("unsupported STORAGE_BACKEND `{other}`"),
    }

    Ok(())
}

fn default_backend() -> &'static str {
    if cfg!(feature = "mongo-store") {
        "mongo"
    } else {
        "memory"
    }
}

/// Build the top-level router, attach cross-cutting middleware layers and
/// serve the upload directory as static files.
fn build_router(
    state: SharedState,
    uploads_base_url: &str,
    uploads_dir: std::path::PathBuf,
) -> Router<()> {
    routes::router(state)
        .nest_service(uploads_base_url, ServeDir::new(uploads_dir))
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

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
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
        let _ = tokio::signal::ctrl_c().await;
    }
}
