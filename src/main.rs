use chat_service::middleware::auth::{IdentityVerifier, JwtVerifier};
use chat_service::websocket::bus::{LocalRoomBus, RedisRoomBus, RoomBus};
use chat_service::websocket::{pubsub, RoomRegistry};
use chat_service::{config, db, error, logging, routes, state::AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // Run embedded migrations (idempotent). A schema out of sync is fatal.
    db::MIGRATOR
        .run(&db)
        .await
        .map_err(|e| error::AppError::StartServer(format!("database migrations failed: {e}")))?;

    identity_core::initialize_validation_only(&cfg.jwt_public_key_pem)
        .map_err(|e| error::AppError::StartServer(format!("init jwt: {e}")))?;

    let registry = RoomRegistry::new();
    let rooms: Arc<dyn RoomBus> = match cfg.redis_url.as_deref() {
        Some(url) => {
            let client = redis::Client::open(url)
                .map_err(|e| error::AppError::StartServer(format!("redis: {e}")))?;

            // Bridge cross-instance publishes into the local registry
            let listener_client = client.clone();
            let listener_registry = registry.clone();
            tokio::spawn(async move {
                if let Err(e) = pubsub::start_listener(listener_client, listener_registry).await {
                    tracing::error!(error = %e, "redis pub/sub listener failed");
                }
            });

            tracing::info!("room fan-out backend: redis pub/sub");
            Arc::new(RedisRoomBus::new(registry, client)) as Arc<dyn RoomBus>
        }
        None => {
            tracing::info!("room fan-out backend: in-process");
            Arc::new(LocalRoomBus::new(registry)) as Arc<dyn RoomBus>
        }
    };

    let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier);

    let state = AppState {
        db,
        rooms,
        verifier,
        config: cfg.clone(),
    };

    let router = routes::build_router(state);

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting chat-service");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;
    axum::serve(listener, router)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    Ok(())
}
