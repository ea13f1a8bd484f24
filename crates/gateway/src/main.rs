//! Linkdir API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Submission intake and badge checks
//! - Public bookmark listing and outbound redirects
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod extract;
mod handlers;
mod middleware;
mod publisher;


use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use linkdir_common::{
    badge::BadgeVerifier,
    captcha::{CaptchaMode, CaptchaVerifier},
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, Repository, SubmissionStore},
    intake::IntakeService,
    metrics::{self, BADGE_CHECK_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
    storage::ObjectStorage,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SubmissionStore>,
    pub verifier: Arc<BadgeVerifier>,
    pub intake: Arc<IntakeService>,
    pub captcha: Arc<CaptchaVerifier>,
    pub storage: Arc<ObjectStorage>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Arc::new(AppConfig::load().context("failed to load configuration")?);

    init_tracing(&config.observability);

    info!(
        version = linkdir_common::VERSION,
        service = %config.observability.service_name,
        "Starting Linkdir API Gateway"
    );

    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    info!("Connecting to database...");
    let pool = DbPool::new(&config.database).await?;
    let store: Arc<dyn SubmissionStore> = Arc::new(Repository::new(pool));

    let verifier = Arc::new(BadgeVerifier::new(&config.badge, &config.site)?);
    let intake = Arc::new(IntakeService::new(
        store.clone(),
        verifier.clone(),
        &config.submission,
    )?);

    let captcha_mode = CaptchaMode::from_config(&config.captcha);
    info!(enabled = captcha_mode.is_enabled(), "CAPTCHA mode resolved");
    let captcha = Arc::new(CaptchaVerifier::new(captcha_mode)?);

    let storage = Arc::new(ObjectStorage::from_config(&config.storage).await);

    if config.submission.trusted_intake {
        warn!("Trusted intake enabled: /api/submissions/test skips badge checks");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let publisher = publisher::spawn_publisher(
        intake.clone(),
        Duration::from_secs(config.submission.publish_interval_secs),
        shutdown_rx,
    );

    let state = AppState {
        config: config.clone(),
        store,
        verifier,
        intake,
        captcha,
        storage,
    };

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(config.shutdown_timeout(), publisher).await.is_err() {
        warn!("Publisher did not stop before the shutdown timeout");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Structured logging; `RUST_LOG` overrides the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{METRICS_PREFIX}_request_duration_seconds")),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{METRICS_PREFIX}_badge_check_duration_seconds")),
            BADGE_CHECK_BUCKETS,
        )?
        .install()
        .context("failed to install Prometheus exporter")?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Uploads get headroom above the storage limit so oversize bodies reach
    // the storage check and receive a structured 413
    let upload_body_limit = state.config.storage.max_upload_bytes.saturating_mul(2);

    // Mutating endpoints (rate limited)
    let mut writes = Router::new()
        .route("/api/verify-badge", post(handlers::badge::verify_badge))
        .route("/api/submissions", post(handlers::submissions::create_submission))
        .route(
            "/api/submissions/{id}/verify",
            post(handlers::submissions::verify_submission),
        )
        .route(
            "/api/uploads",
            post(handlers::uploads::upload_asset).layer(DefaultBodyLimit::max(upload_body_limit)),
        );

    if state.intake.trusted_intake_enabled() {
        writes = writes.route(
            "/api/submissions/test",
            post(handlers::submissions::create_test_submission),
        );
    }

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        writes = writes.route_layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Read endpoints
    let reads = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/api/bookmarks", get(handlers::bookmarks::list_bookmarks))
        .route("/go/{encoded}", get(handlers::redirect::follow));

    Router::new()
        .merge(reads)
        .merge(writes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
