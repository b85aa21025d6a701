use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{error_handling::HandleErrorLayer, http::StatusCode};
use tower::{BoxError, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use zoom_crm_sync::{
    config, create_router, services::accounts::AccountStore, services::settings::SettingsService,
    AppState, CrmClient, ZoomClient,
};

// Error handler
async fn handle_error(error: BoxError) -> (StatusCode, String) {
    if error.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            "Request took too long".to_string(),
        )
    } else if error.is::<tower::load_shed::error::Overloaded>() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Service is overloaded, try again later".to_string(),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unhandled internal error: {}", error),
        )
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match config::load() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    #[cfg(feature = "sentry-monitoring")]
    let _sentry = config.sentry_dsn.as_deref().map(|dsn| {
        info!("Sentry error reporting enabled");
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let accounts = match AccountStore::new(&config.zoom_accounts_path.to_string_lossy()) {
        Ok(store) => store,
        Err(err) => {
            error!("Failed to open Zoom account store: {}", err);
            std::process::exit(1);
        }
    };
    info!(
        "Zoom account store initialized at {}",
        config.zoom_accounts_path.display()
    );

    let settings = match SettingsService::load(&config.zoom_settings_path, accounts) {
        Ok(settings) => settings,
        Err(err) => {
            error!("Failed to load Zoom settings: {}", err);
            std::process::exit(1);
        }
    };

    if config.api_auth_token.is_some() {
        info!("API authentication enabled with provided token");
    } else {
        info!("No API authentication token provided - authentication disabled");
    }

    if config.is_production {
        info!("Running in PRODUCTION mode - restricting available endpoints");
    } else {
        info!("Running in DEVELOPMENT mode - all endpoints will be available");
    }

    let app_state = Arc::new(AppState {
        crm: Arc::new(CrmClient::new(
            &config.crm_base_url,
            &config.crm_api_key,
            &config.crm_site_key,
        )),
        zoom: Arc::new(ZoomClient::new()),
        settings: Arc::new(settings),
        api_auth_token: config.api_auth_token.clone(),
    });

    // Attendance runs page through Zoom for every recent event, so allow
    // more time than a plain lookup needs
    let app = create_router(app_state, config.is_production).layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_error))
            .load_shed()
            .concurrency_limit(64)
            .timeout(Duration::from_secs(120))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any)),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    // Set up signal handler for graceful shutdown
    let shutdown = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received interrupt signal, starting graceful shutdown");
            },
            _ = terminate => {
                info!("Received terminate signal, starting graceful shutdown");
            },
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Failed to start server");

    info!("Server has been gracefully shut down");
}
