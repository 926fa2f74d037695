//! HTTP service for pageant registration, payment review, photo uploads and
//! public voting.
//!
//! All routes live under `/api` and answer with the `{success, data}` /
//! `{success: false, message, statusCode}` envelopes from [`error`].

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod media;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::{delete, get, patch, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use config::Config;
use error::ApiError;
use handlers::{admin, auth as auth_routes, competition, contestants, upload, users};
use media::{MAX_GALLERY_UPLOAD, MAX_PHOTO_BYTES};
use state::AppState;

/// Multipart bodies carry up to a full gallery batch plus form overhead
const UPLOAD_BODY_LIMIT: usize = MAX_GALLERY_UPLOAD * MAX_PHOTO_BYTES + 1024 * 1024;

/// Build the full application router
pub fn build_router(state: Arc<AppState>, cors_origin: Option<&str>) -> anyhow::Result<Router> {
    let auth = Router::new()
        .route("/register", post(auth_routes::register))
        .route("/login", post(auth_routes::login))
        .route("/update-payment-id", post(auth_routes::update_payment_id))
        .route("/updatePaymentId", post(auth_routes::update_payment_id));

    let users = Router::new()
        .route("/me", get(users::get_me).patch(users::update_me))
        .route("/updateme", patch(users::update_me))
        .route("/submit-payment", post(users::submit_payment))
        .route("/payment-status", get(users::payment_status))
        .route("/payment-status/:user_id", patch(users::update_payment_status));

    let competition = Router::new()
        .route("/register", post(competition::register))
        .route("/registration-status", get(competition::registration_status));

    let contestants = Router::new()
        .route("/", get(contestants::list))
        .route("/stats", get(contestants::stats))
        .route("/:id", get(contestants::detail))
        .route("/:id/vote", post(contestants::vote));

    let admin = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/contestants", get(admin::contestants))
        .route("/contestants/export", get(admin::export))
        .route("/contestants/bulk-update", post(admin::bulk_update))
        .route(
            "/contestants/:id",
            get(admin::detail).patch(admin::update_contestant),
        )
        .route("/payment-stats", get(admin::payment_stats))
        .route("/revenue-analytics", get(admin::revenue_analytics))
        .route("/categories", get(admin::categories))
        .route("/voting-analytics", get(admin::voting_analytics));

    let upload = Router::new()
        .route("/profile-photo", post(upload::profile_photo))
        .route("/competition-photos", post(upload::competition_photos))
        .route(
            "/competition-photos/*photo_id",
            delete(upload::delete_competition_photo),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    let api = Router::new()
        .nest("/auth", auth)
        .nest("/users", users)
        .nest("/competition", competition)
        .nest("/contestants", contestants)
        .nest("/admin", admin)
        .nest("/upload", upload);

    Ok(Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(cors_layer(cors_origin)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Ok(match origin {
        Some(origin) => layer.allow_origin(HeaderValue::from_str(origin)?),
        None => {
            warn!("CORS_ORIGIN not set; allowing any origin");
            layer.allow_origin(Any)
        }
    })
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "pageant-api",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

/// Bind, serve until SIGINT/SIGTERM, then drain in-flight requests
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(&config).await?);
    let app = build_router(state, config.cors_origin.as_deref())?;

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    info!(address = %address, "Pageant API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
}
