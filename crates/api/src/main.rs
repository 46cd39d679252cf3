// DevTrust API Server
// Session & device-trust security service: per-device session registry,
// token lifetime policy, and real-time cross-device revocation.

mod config;
mod handlers;
mod middleware;
mod routes;
mod ws;

use config::Config;
use devtrust_channel::{RedisRevocationBus, RevocationBus};
use devtrust_database::{Database, PgSessionStore, SessionStore};
use devtrust_session::SessionManager;
use dotenvy::dotenv;
use middleware::TokenVerifier;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub struct AppState {
    pub manager: SessionManager,
    pub bus: Arc<dyn RevocationBus>,
    pub db: Database,
    pub redis: RedisRevocationBus,
    pub verifier: TokenVerifier,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,devtrust_api=debug,tower_http=debug".to_string()),
        )
        .init();

    tracing::info!("🚀 Starting DevTrust API Server");
    tracing::info!("📦 Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env();
    tracing::info!("🔌 Server: {}:{}", config.server_host, config.server_port);

    // Initialize database
    tracing::info!("🗄️  Connecting to database...");
    let database = Database::new(config.database.clone())
        .await
        .expect("Failed to connect to database");
    database.migrate().await.expect("Database migration failed");
    database.ping().await.expect("Database ping failed");
    tracing::info!("✅ Database connected");

    // Initialize revocation channel
    tracing::info!("⚡ Connecting to Redis...");
    let redis = RedisRevocationBus::new(config.channel.clone())
        .await
        .expect("Failed to connect to Redis");
    redis.ping().await.expect("Redis ping failed");
    tracing::info!("✅ Redis connected");

    // Session store and lifecycle manager
    let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(database.pool().clone()));
    let bus: Arc<dyn RevocationBus> = Arc::new(redis.clone());

    let manager = SessionManager::new(
        store.clone(),
        bus.clone(),
        devtrust_session::GeoLocator::from_env(),
        config.ip_hash_salt.clone(),
    );
    tracing::info!("🔑 Session manager initialized");

    // Background expiry sweep
    let _sweeper = devtrust_session::spawn_sweeper(store.clone(), config.sweep_interval);
    tracing::info!(
        "🧹 Expiry sweeper running every {}s",
        config.sweep_interval.as_secs()
    );

    // Token verifier for the identity provider's bearer tokens
    let verifier = TokenVerifier::new(&config.jwt_secret);
    tracing::info!("🔐 Token verifier initialized");

    // Create app state
    let state = Arc::new(AppState {
        manager,
        bus,
        db: database,
        redis,
        verifier,
    });

    // Create router
    let app = routes::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    tracing::info!("📡 Routes configured:");
    tracing::info!("   GET  /health");
    tracing::info!("   POST /api/sessions/register");
    tracing::info!("   POST /api/sessions/heartbeat");
    tracing::info!("   POST /api/sessions/revoke");
    tracing::info!("   POST /api/sessions/trust");
    tracing::info!("   GET  /api/sessions");
    tracing::info!("   GET  /api/sessions/events  [WebSocket]");
    tracing::info!("   GET  /api/policy");

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("✅ Server ready at http://{}", addr);

    axum::serve(listener, app).await.expect("Server error");

    Ok(())
}
