use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use yatube::{AppState, app, config::Config, store::Store};

const DEFAULT_LOG_FILTER: &str = "yatube=info,tower_http=info";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(false)
        .compact()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    let store = Store::new();
    if let Some(path) = &config.groups_file {
        if let Err(err) = seed_groups(&store, path).await {
            error!("Could not seed groups from {}: {}", path.display(), err);
            std::process::exit(1);
        }
    }

    let addr = config.bind_addr.clone();
    let state = AppState::new(config, store);
    let app = app(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Could not bind {}: {}", addr, err);
            std::process::exit(1);
        }
    };

    info!("Server running on http://{}", addr);
    info!("Pages:");
    info!("  GET      /                         - Latest posts (cached)");
    info!("  GET      /group/:slug/             - Posts of a group");
    info!("  GET      /profile/:username/       - Posts of an author");
    info!("  GET      /posts/:id/               - Post with comments");
    info!("  GET,POST /create/                  - New post (auth)");
    info!("  GET,POST /posts/:id/edit/          - Edit post (author)");
    info!("  GET      /follow/                  - Followed authors (auth)");
    info!("  GET,POST /auth/login/              - Login");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
        std::process::exit(1);
    }
}

async fn seed_groups(store: &Store, path: &std::path::Path) -> Result<(), String> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| e.to_string())?;
    let created = store
        .seed_groups_from_json(&json)
        .map_err(|e| e.to_string())?;
    info!("Seeded {} groups", created);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
