use std::path::PathBuf;
use std::sync::Arc;

use gardenia::config::load_config;
use gardenia::db::LeadDb;
use gardenia::http::create_router;
use gardenia::state::AppState;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db = match &config.database_path {
        Some(path) => LeadDb::open_at(PathBuf::from(path)),
        None => LeadDb::open(),
    };
    let db = match db {
        Ok(db) => db,
        Err(e) => {
            log::error!("Failed to open lead database: {}", e);
            std::process::exit(1);
        }
    };

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, db));
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    log::info!(
        "Gardenia v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        log::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        log::info!("Shutting down");
    }
}
