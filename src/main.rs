// Host-runtime harness: exposes the print bridge over HTTP.

use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use tracing::{error, info, warn};

use native_print_bridge::{
    new_print_interaction, routes, AppError, AppResult, Config, ContentResolver, PrintCoordinator,
};

// ============================================================================
// Application State
// ============================================================================

struct AppState {
    config: Config,
    coordinator: web::Data<PrintCoordinator>,
}

impl AppState {
    fn new(config: Config) -> AppResult<Self> {
        info!("Initializing print bridge");
        info!("Resource root: {:?}", config.resources.root);

        if !config.resources.root.is_dir() {
            // Relative content will fail to load, but data and remote content still work
            warn!("Resource root does not exist yet: {:?}", config.resources.root);
        }

        let resolver = ContentResolver::new(config.resources.root.clone())
            .with_fetch_timeout(config.fetch.timeout());
        let backend = new_print_interaction(&config);

        let coordinator = PrintCoordinator::new(resolver, backend).map_err(|e| {
            AppError::Initialization(format!("Failed to start print UI context: {}", e))
        })?;

        Ok(Self {
            config,
            coordinator: web::Data::from(Arc::new(coordinator)),
        })
    }
}

// ============================================================================
// Shutdown Handling
// ============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting print bridge");

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to load configuration: {}", e),
        )
    })?;

    let socket_addr = config.socket_addr().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Invalid bind address: {}", e),
        )
    })?;

    let app_state = AppState::new(config).map_err(|e| {
        error!("Application initialization error: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to initialize application: {}", e),
        )
    })?;

    let coordinator = app_state.coordinator.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(coordinator.clone())
            .service(routes::exec)
            .service(routes::health)
    })
    .bind(socket_addr)?
    .shutdown_timeout(5)
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(async move { server.await });

    info!("Print bridge listening on {}", socket_addr);
    info!(
        "Printer preference: '{}' (fallbacks: {:?}, mock: {})",
        app_state.config.printer.name,
        app_state.config.printer.fallback_names,
        app_state.config.printer.use_mock
    );

    shutdown_signal().await;

    info!("Initiating graceful shutdown...");

    // Release the open session first so its pending request can answer
    app_state.coordinator.shutdown();
    server_handle.stop(true).await;

    server_task.await.map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Server task error: {}", e),
        )
    })??;

    info!("Graceful shutdown complete");
    Ok(())
}
