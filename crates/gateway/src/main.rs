//! CampusDesk API Gateway
//!
//! The HTTP entry point for every tenant-facing resource.
//! Handles:
//! - Authentication and authorization
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod extract;
mod handlers;
mod middleware;
mod telemetry;

#[cfg(test)]
mod tests;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, put},
    Router,
};
use campusdesk_common::{
    auth::JwtManager,
    config::AppConfig,
    db::{ensure_schema, DbPool, Repository},
    errors::AppError,
    metrics,
};
use handlers::{
    accounting, admin, campaigns, dashboard, facilities, finance, health, kaizen, leads,
    meetings, people, sessions, tickets,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

/// Application state shared across handlers
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, pool: DbPool) -> Result<Self, AppError> {
        let secret = config.jwt_secret().ok_or_else(|| AppError::Configuration {
            message: "auth.jwt_secret must be set".to_string(),
        })?;
        let jwt = Arc::new(JwtManager::new(secret, config.auth.jwt_expiration_secs));

        Ok(Self {
            config,
            repo: Repository::new(pool),
            jwt,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    config.validate()?;
    let config = Arc::new(config);

    // Initialize tracing
    telemetry::init_tracing(&config.observability)?;

    info!("Starting CampusDesk API Gateway v{}", campusdesk_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        telemetry::install_metrics_exporter(config.observability.metrics_port)?;
        info!(port = config.observability.metrics_port, "Metrics exporter listening");
    }
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let pool = DbPool::new(&config.database).await?;
    if config.database.auto_migrate {
        ensure_schema(pool.write()).await.map_err(AppError::from)?;
        info!("Schema is up to date");
    }

    // Create app state
    let state = AppState::new(config.clone(), pool)?;

    // Build the router
    let app = create_router(state)?;

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = stop_tx.send(true);
        })
        .into_future();
    tokio::pin!(server);

    // in-flight requests get `shutdown_timeout` to drain
    let grace = config.shutdown_timeout();
    tokio::select! {
        result = &mut server => result?,
        _ = async {
            let _ = stop_rx.changed().await;
            tokio::time::sleep(grace).await;
        } => warn!(timeout_secs = grace.as_secs(), "Shutdown timeout elapsed, dropping connections"),
    }

    telemetry::shutdown_tracing();
    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Result<Router, AppError> {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Provisioning and sessions (no bearer token)
        .route("/admin/organizations", post(admin::create_organization))
        .route("/sessions", post(sessions::create_session))

        // People
        .route("/me", get(people::me))
        .route("/people", get(people::list_people).post(people::create_person))
        .route("/people/{id}", patch(people::update_person))

        // Commercial
        .route("/leads", get(leads::list_leads).post(leads::create_lead))
        .route("/leads/summary", get(leads::lead_summary))
        .route("/leads/{id}", get(leads::get_lead).patch(leads::update_lead))

        // Accounting
        .route("/accounts", get(accounting::list_accounts).post(accounting::create_account))
        .route("/accounts/{id}", get(accounting::get_account).patch(accounting::update_account))
        .route("/journal-entries", get(accounting::list_entries).post(accounting::create_entry))
        .route("/journal-entries/{id}", get(accounting::get_entry).patch(accounting::update_entry))
        .route("/journal-entries/{id}/post", post(accounting::post_entry))
        .route("/journal-entries/{id}/reverse", post(accounting::reverse_entry))
        .route("/accounting/trial-balance", get(accounting::trial_balance))

        // Kaizen
        .route("/kaizen/suggestions", get(kaizen::list_suggestions).post(kaizen::create_suggestion))
        .route("/kaizen/suggestions/{id}", get(kaizen::get_suggestion).patch(kaizen::update_suggestion))
        .route("/kaizen/suggestions/{id}/vote", put(kaizen::cast_vote).delete(kaizen::withdraw_vote))

        // Finance
        .route("/invoices", get(finance::list_invoices).post(finance::create_invoice))
        .route("/invoices/summary", get(finance::invoices_summary))
        .route("/invoices/{id}", get(finance::get_invoice).patch(finance::update_invoice))
        .route("/obligations", get(finance::list_obligations).post(finance::create_obligation))
        .route("/obligations/summary", get(finance::obligations_summary))
        .route("/obligations/{id}", get(finance::get_obligation).patch(finance::update_obligation))

        // Communications
        .route("/meetings", get(meetings::list_meetings).post(meetings::create_meeting))
        .route("/meetings/{id}", get(meetings::get_meeting).patch(meetings::update_meeting))
        .route("/meetings/{id}/decision", post(meetings::decide_meeting))
        .route("/meetings/{id}/participants", post(meetings::add_participant))
        .route("/meetings/{id}/participants/{participant_id}", delete(meetings::remove_participant))
        .route("/meetings/{id}/transcript", get(meetings::get_transcript).post(meetings::append_transcript))

        // Facilities
        .route("/rooms", get(facilities::list_rooms).post(facilities::create_room))
        .route(
            "/rooms/{id}",
            get(facilities::get_room)
                .patch(facilities::update_room)
                .delete(facilities::delete_room),
        )

        // Marketing
        .route("/campaigns", get(campaigns::list_campaigns).post(campaigns::create_campaign))
        .route("/campaigns/summary", get(campaigns::campaigns_summary))
        .route("/campaigns/{id}", get(campaigns::get_campaign).patch(campaigns::update_campaign))

        // Support
        .route("/tickets", get(tickets::list_tickets).post(tickets::create_ticket))
        .route("/tickets/summary", get(tickets::tickets_summary))
        .route("/tickets/{id}", get(tickets::get_ticket).patch(tickets::update_ticket))

        // Dashboard
        .route("/dashboard", get(dashboard::dashboard));

    let mut app = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .nest("/api", api_routes)
        .route_layer(from_fn(middleware::metrics::track_metrics));

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(&config.rate_limit)?;
        app = app.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app; the request id is set outermost so every layer sees it
    Ok(app
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
