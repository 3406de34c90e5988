//! # Web Server Crate
//!
//! The JSON API behind the journal dashboard.
//!
//! ## Architectural Principles
//!
//! - **Request-Scoped Identity:** every `/api` route except health and account
//!   creation takes an `AccountContext` extracted from the `x-account-id`
//!   header. Handlers pass the account id down explicitly.
//! - **Fresh Snapshots:** analytics handlers load the account's trades and
//!   compute each view synchronously; nothing derived is cached.
//! - **One Error Shape:** every failure becomes `{ "error": "..." }` via
//!   `AppError`.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use broker_sync::{BrokerSync, CredentialVault, TradovateFactory};
use configuration::Settings;
use database::DbRepository;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer, ExposeHeaders},
    trace::TraceLayer,
};

pub mod context;
pub mod error;
pub mod handlers;

pub use context::{AccountContext, ACCOUNT_HEADER};
pub use error::AppError;

use handlers::{account, analytics, broker, import, tags, trades};

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub db_repo: DbRepository,
    pub settings: Settings,
    pub broker: BrokerSync,
}

impl AppState {
    /// Wires the broker sync to the same repository the handlers use.
    pub fn new(db_repo: DbRepository, settings: Settings, vault: CredentialVault) -> Self {
        let broker = BrokerSync::new(
            Arc::new(db_repo.clone()),
            Arc::new(TradovateFactory::new(settings.broker.clone())),
            vault,
        );
        Self {
            db_repo,
            settings,
            broker,
        }
    }
}

/// Builds the full application router.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.settings.server.body_limit_mb * 1024 * 1024;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any())
        .expose_headers(ExposeHeaders::any());

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/accounts", post(account::create_account))
        .route("/api/account", get(account::get_account))
        .route("/api/account/theme", post(account::set_theme))
        .route("/api/trades", get(trades::list_trades).post(trades::create_trade))
        .route("/api/trades/bulk", post(trades::bulk_import))
        .route("/api/trades/:id", put(trades::update_trade).delete(trades::delete_trade))
        .route("/api/import/preview", post(import::preview_import))
        .route("/api/import", post(import::import_csv))
        .route("/api/export", get(import::export_csv))
        .route("/api/tags", get(tags::list_tags).post(tags::create_tag))
        .route("/api/tags/:id", put(tags::update_tag).delete(tags::delete_tag))
        .route("/api/analytics/summary", get(analytics::summary))
        .route("/api/analytics/breakdown", get(analytics::breakdown))
        .route("/api/analytics/daily", get(analytics::daily))
        .route("/api/analytics/calendar", get(analytics::calendar))
        .route("/api/analytics/monthly", get(analytics::monthly))
        .route("/api/analytics/heatmap", get(analytics::heatmap))
        .route("/api/analytics/sessions", get(analytics::sessions))
        .route("/api/tradovate/status", get(broker::status))
        .route(
            "/api/tradovate/credentials",
            post(broker::save_credentials).delete(broker::delete_credentials),
        )
        .route("/api/tradovate/sync", post(broker::sync))
        .with_state(state)
        .layer(cors)
        // Logs every incoming request.
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}

/// The main function to configure and run the web server.
/// Tracing must already be initialised by the caller.
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let vault = CredentialVault::from_env()?;
    let db_pool = database::connect().await?;
    database::run_migrations(&db_pool).await?;
    let db_repo = DbRepository::new(db_pool);

    let addr = settings.server.socket_addr();
    let app_state = Arc::new(AppState::new(db_repo, settings, vault));
    let app = app(app_state);

    tracing::info!("Web server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
