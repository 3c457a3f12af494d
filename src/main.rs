use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod crypto;
mod db;
mod error;
mod handlers;
mod models;
mod services;
mod streak;

use config::Config;
use crypto::EntryCipher;
use services::llm::{GeminiClient, TextCompletionService};
use streak::StreakLocks;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub cipher: Arc<EntryCipher>,
    pub llm: Arc<dyn TextCompletionService>,
    pub streak_locks: StreakLocks,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mindlog_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());

    // Journal routes must never come up with a bad key.
    let cipher = Arc::new(
        EntryCipher::from_hex(&config.encryption_key_hex)
            .expect("ENCRYPTION_KEY must be 32 bytes of hex"),
    );

    let llm: Arc<dyn TextCompletionService> =
        Arc::new(GeminiClient::new(&config).expect("Failed to build Gemini client"));

    // Database
    let db = db::create_pool(&config.database_url).await;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations applied");

    let state = AppState {
        db,
        config: config.clone(),
        cipher,
        llm,
        streak_locks: StreakLocks::new(),
    };

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh));

    let protected_routes = Router::new()
        .route("/api/me", get(handlers::auth::me))
        .route("/api/auth/logout", post(handlers::auth::logout))
        // Journals
        .route("/api/journals", post(handlers::journals::create_journal))
        .route("/api/journals", get(handlers::journals::list_journals))
        .route("/api/journals/summary", get(handlers::journals::get_summary))
        .route("/api/journals/:id", delete(handlers::journals::delete_journal))
        .route("/api/streak", get(handlers::journals::get_streak))
        // Companion chat
        .route("/api/chat", post(handlers::chat::chat))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .frontend_url
                .parse::<axum::http::HeaderValue>()
                .expect("FRONTEND_URL must be a valid origin"),
        )
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
